//! remsh CLI
//!
//! Interactive front end for a stateful remote shell session: connect
//! once, then run commands that keep their working directory and
//! exported variables across invocations. Stands in for any caller that
//! feeds the session command strings and consumes its line stream.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use remsh_core::SessionConfig;
use remsh_session::SshSession;

#[derive(Parser)]
#[command(name = "remsh")]
#[command(author, version, about = "Stateful remote shell over one-shot SSH exec")]
struct Cli {
    /// Target host ([user@]host[:port])
    host: String,

    /// Run a single command and exit with its code
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => SessionConfig::default(),
    };

    let mut session = SshSession::over_ssh(config);
    session
        .connect(&cli.host)
        .await
        .with_context(|| format!("failed to connect to {}", cli.host))?;

    let exit = match &cli.command {
        Some(command) => run_command(&mut session, command).await?,
        None => repl(&mut session, &cli.host).await?,
    };

    session.close().await?;
    std::process::exit(exit);
}

async fn run_command(session: &mut SshSession, command: &str) -> Result<i32> {
    let code = session.execute(command, |line| println!("{line}")).await?;
    Ok(code)
}

/// Read commands from stdin until EOF; the last exit code becomes ours
async fn repl(session: &mut SshSession, host: &str) -> Result<i32> {
    let mut reader = BufReader::new(tokio::io::stdin()).lines();
    let mut last_code = 0;

    loop {
        let cwd = session.cwd().unwrap_or("?").to_string();
        eprint!("{host}:{cwd}$ ");

        let Some(line) = reader.next_line().await? else {
            break;
        };
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "exit" {
            break;
        }

        last_code = session.execute(command, |line| println!("{line}")).await?;
        if last_code != 0 {
            eprintln!("[exit {last_code}]");
        }
    }

    Ok(last_code)
}
