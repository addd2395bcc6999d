//! Invocation envelope construction
//!
//! One remote invocation carries three parts: a header replaying the
//! session's accumulated state adjustments (cd/export), the raw user
//! command, and a footer that echoes marker-prefixed exit code, working
//! directory and environment from the *same* shell process. Capturing
//! `$?` is the footer's first statement so the echoes themselves cannot
//! clobber the user command's status.

use crate::marker::Marker;

/// Build the envelope script for one invocation.
///
/// `preamble` holds the state-replay statements produced by the session
/// state store; it may be empty on the first invocation.
pub fn build_envelope(preamble: &[String], command: &str, marker: &Marker) -> String {
    let header = preamble.join("\n");
    let footer = format!(
        "EXIT_CODE=$?\n\
         echo {m}code: $EXIT_CODE\n\
         echo {m}pwd: $(pwd)\n\
         echo {m}env: $(cat -v <(env -0))",
        m = marker.as_str()
    );

    format!("{header}\n{command}\n{footer}\n")
}

/// Wrap an envelope script into the command sent over the wire.
///
/// The footer relies on process substitution, so the script is run
/// explicitly under bash rather than the remote user's login shell.
pub fn wire_command(shell: &str, envelope: &str) -> String {
    format!("{} -c {}", shell, shell_quote(envelope))
}

/// Single-quote a string for POSIX shells.
///
/// Embedded single quotes use the standard `'\''` splice.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
