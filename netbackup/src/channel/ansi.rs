//! ANSI escape stripping with vte.
//!
//! Devices decorate prompts with colour codes and cursor movement. Prompt
//! matching runs on the stripped text; captured configuration is never
//! stripped.

use vte::{Parser, Perform};

/// Collects printable text and line control characters.
struct Printable {
    out: Vec<u8>,
}

impl Perform for Printable {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out
            .extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }
}

/// Incremental ANSI stripper.
///
/// The parser state is kept between calls so an escape sequence split
/// across two reads is still removed.
pub struct AnsiStripper {
    parser: Parser,
}

impl AnsiStripper {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Strip escape sequences from `data`.
    pub fn strip(&mut self, data: &[u8]) -> Vec<u8> {
        let mut printable = Printable {
            out: Vec::with_capacity(data.len()),
        };
        self.parser.advance(&mut printable, data);
        printable.out
    }
}

impl Default for AnsiStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnsiStripper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsiStripper").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ansi(data: &[u8]) -> Vec<u8> {
        AnsiStripper::new().strip(data)
    }

    #[test]
    fn test_colour_codes_removed() {
        assert_eq!(strip_ansi(b"\x1b[32mrouter#\x1b[0m"), b"router#");
    }

    #[test]
    fn test_line_breaks_kept() {
        assert_eq!(strip_ansi(b"line1\r\nline2\tx"), b"line1\r\nline2\tx");
    }

    #[test]
    fn test_bell_and_backspace_dropped() {
        assert_eq!(strip_ansi(b"ab\x07c\x08"), b"abc");
    }

    #[test]
    fn test_sequence_split_across_calls() {
        let mut stripper = AnsiStripper::new();
        let mut out = stripper.strip(b"user@r1\x1b[");
        out.extend(stripper.strip(b"0m> "));
        assert_eq!(out, b"user@r1> ");
    }
}
