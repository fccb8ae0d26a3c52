//! Incremental newline-delimited JSON splitting.
//!
//! Network chunks do not respect line (or UTF-8) boundaries, so bytes are
//! buffered until a full line is available.

/// Splits a byte stream into complete, non-empty lines.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// Remaining unterminated line at end of input, if any.
    pub fn finish(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(b"{\"a\":").is_empty());
        assert_eq!(decoder.push(b"1}\n{\"b\":2}\n{\"c\""), vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(decoder.push(b":3}\n"), vec!["{\"c\":3}"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_multibyte_char_split() {
        let text = "{\"t\":\"é\"}\n".as_bytes();
        let split = text.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(decoder.push(&text[split..]), vec!["{\"t\":\"é\"}"]);
    }

    #[test]
    fn test_blank_lines_skipped_and_tail_flushed() {
        let mut decoder = NdjsonDecoder::new();
        assert_eq!(decoder.push(b"\n\r\n{}\n{\"x\":1}"), vec!["{}"]);
        assert_eq!(decoder.finish(), Some("{\"x\":1}".to_string()));
    }
}
