//! Line assembly for the merged output stream
//!
//! Remote output arrives as raw byte chunks, split wherever the
//! transport happened to flush. The assembler buffers across chunk
//! boundaries and yields complete lines in arrival order. Stdout and
//! stderr are fed through the same assembler by the session layer, so
//! the caller sees one merged stream with no origin tagging.

/// Incremental byte-chunk to text-line converter
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: Vec<u8>,
}

impl LineAssembler {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning the lines it completed.
    ///
    /// Lines are decoded lossily as UTF-8 with the trailing `\n` (and a
    /// preceding `\r`, if any) stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop(); // the \n itself
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Drain a trailing unterminated line, if any.
    ///
    /// Called once when the stream ends so output that was not
    /// newline-terminated still reaches the caller.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_complete_line() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push(b"hello\n"), vec!["hello"]);
        assert_eq!(asm.finish(), None);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut asm = LineAssembler::new();
        assert!(asm.push(b"hel").is_empty());
        assert_eq!(asm.push(b"lo\nwor"), vec!["hello"]);
        assert_eq!(asm.push(b"ld\n"), vec!["world"]);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push(b"a\nb\nc\n"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_crlf_stripped() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push(b"dos line\r\n"), vec!["dos line"]);
    }

    #[test]
    fn test_trailing_partial_line() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push(b"done\nno newline"), vec!["done"]);
        assert_eq!(asm.finish(), Some("no newline".to_string()));
        assert_eq!(asm.finish(), None);
    }

    #[test]
    fn test_empty_lines_preserved() {
        let mut asm = LineAssembler::new();
        assert_eq!(asm.push(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut asm = LineAssembler::new();
        let lines = asm.push(b"ok \xff\xfe bytes\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ok "));
        assert!(lines[0].contains('\u{fffd}'));
    }
}
