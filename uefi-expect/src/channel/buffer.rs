//! Pattern buffer with ANSI stripping and match consumption.
//!
//! Output read from the console is appended here and searched as a whole.
//! Bytes are never discarded until a match consumes them, so a prompt split
//! across two reads is still found once its tail arrives.

use std::fmt;

use vte::{Parser, Perform};

use super::patterns::{Found, PatternSet};

/// Buffer for accumulating console output and searching it for patterns.
pub struct PatternBuffer {
    /// Unconsumed output, with escape sequences removed when stripping.
    buffer: Vec<u8>,

    /// Terminal parser used to strip escape sequences. Kept across calls
    /// so a sequence split over two reads is still recognised.
    parser: Option<Parser>,
}

/// Collects printable text and line-oriented control characters.
struct Printable<'a>(&'a mut Vec<u8>);

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.0.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t' | 0x08) {
            self.0.push(byte);
        }
    }
}

impl PatternBuffer {
    /// Create a new pattern buffer.
    ///
    /// # Arguments
    ///
    /// * `strip_ansi` - Remove terminal escape sequences before buffering.
    pub fn new(strip_ansi: bool) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            parser: strip_ansi.then(Parser::new),
        }
    }

    /// Extend the buffer with new data.
    pub fn extend(&mut self, data: &[u8]) {
        match self.parser.as_mut() {
            Some(parser) => parser.advance(&mut Printable(&mut self.buffer), data),
            None => self.buffer.extend_from_slice(data),
        }
    }

    /// Search the unconsumed output for the first matching pattern of `set`.
    pub fn find(&self, set: &PatternSet) -> Option<Found> {
        set.find(&self.buffer)
    }

    /// Consume the buffer up to `end`, returning the consumed bytes.
    ///
    /// Later searches start after `end`, so an occurrence that was already
    /// matched is never reported twice.
    pub fn consume(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.buffer.len());
        self.buffer.drain(..end).collect()
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("buffer", &self.as_str_lossy())
            .field("strip_ansi", &self.parser.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = PatternBuffer::new(false);
        buffer.extend(b"Hello, world!");
        assert_eq!(buffer.as_slice(), b"Hello, world!");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = PatternBuffer::new(true);
        // Typical UEFI console attribute change around a prompt
        buffer.extend(b"\x1b[0m\x1b[37m\x1b[40mShell> \x1b[0m");
        assert_eq!(buffer.as_slice(), b"Shell> ");
    }

    #[test]
    fn test_ansi_sequence_split_across_reads() {
        let mut buffer = PatternBuffer::new(true);
        buffer.extend(b"FS0:\\> \x1b[");
        buffer.extend(b"1;3");
        buffer.extend(b"3mtext\r\n");
        assert_eq!(buffer.as_slice(), b"FS0:\\> text\r\n");
    }

    #[test]
    fn test_raw_mode_keeps_escapes() {
        let mut buffer = PatternBuffer::new(false);
        buffer.extend(b"\x1b[2J");
        assert_eq!(buffer.as_slice(), b"\x1b[2J");
    }

    #[test]
    fn test_pattern_split_across_reads() {
        let set = PatternSet::compile([r"Shell> "]).unwrap();
        let mut buffer = PatternBuffer::new(true);

        buffer.extend(b"UEFI Interactive Shell v2.2\r\nShe");
        assert!(buffer.find(&set).is_none());

        buffer.extend(b"ll> ");
        assert!(buffer.find(&set).is_some());
    }

    #[test]
    fn test_consume_advances_past_match() {
        let set = PatternSet::compile([r"Shell> "]).unwrap();
        let mut buffer = PatternBuffer::new(false);
        buffer.extend(b"Shell> reset -s\r\n");

        let found = buffer.find(&set).unwrap();
        assert_eq!(buffer.consume(found.span.end), b"Shell> ");
        assert_eq!(buffer.as_slice(), b"reset -s\r\n");
        assert!(buffer.find(&set).is_none());
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut buffer = PatternBuffer::new(false);
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), b"test data");
        assert!(buffer.is_empty());
    }
}
