//! Event frame decoder.
//!
//! Reassembles `data: ` record lines from a byte stream that the transport
//! may slice anywhere: inside a marker, inside a JSON payload, or in the
//! middle of a multi-byte UTF-8 character.

use ms_base::constants::RECORD_MARKER;

/// One complete record line, marker included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    line: String,
}

impl Frame {
    pub fn new(line: impl Into<String>) -> Self {
        Self { line: line.into() }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    /// Text after the record marker.
    pub fn payload(&self) -> &str {
        self.line.strip_prefix(RECORD_MARKER).unwrap_or(&self.line)
    }
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes of a UTF-8 sequence cut off at the end of the last chunk
    pending_utf8: Vec<u8>,
    /// Decoded text after the last newline
    pending_line: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes and text held back waiting for a line terminator.
    pub fn pending_len(&self) -> usize {
        self.pending_utf8.len() + self.pending_line.len()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.pending_utf8.extend_from_slice(chunk);
        self.decode_pending();

        let mut frames = Vec::new();
        while let Some(pos) = self.pending_line.find('\n') {
            let mut line: String = self.pending_line.drain(..=pos).collect();
            line.pop(); // '\n'
            if line.ends_with('\r') {
                line.pop();
            }
            if line.starts_with(RECORD_MARKER) {
                frames.push(Frame { line });
            } else if !line.is_empty() {
                tracing::trace!(line = %line, "dropping non-record line");
            }
        }
        frames
    }

    /// End of stream. An unterminated tail cannot be a complete record, so it
    /// is discarded rather than emitted. The decoder is empty afterwards.
    pub fn finish(&mut self) -> Vec<Frame> {
        let dropped = self.pending_len();
        if dropped > 0 {
            tracing::debug!(dropped, "discarding unterminated stream tail");
        }
        self.pending_utf8.clear();
        self.pending_line.clear();
        Vec::new()
    }

    /// Move every complete UTF-8 sequence from `pending_utf8` into
    /// `pending_line`. An incomplete sequence at the end stays buffered;
    /// invalid bytes become U+FFFD.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending_utf8) {
                Ok(valid) => {
                    self.pending_line.push_str(valid);
                    self.pending_utf8.clear();
                    return;
                }
                Err(err) => {
                    let valid_up_to = err.valid_up_to();
                    if valid_up_to > 0 {
                        let valid = String::from_utf8_lossy(&self.pending_utf8[..valid_up_to]);
                        self.pending_line.push_str(&valid);
                        self.pending_utf8.drain(..valid_up_to);
                    }
                    match err.error_len() {
                        Some(len) => {
                            self.pending_line.push(char::REPLACEMENT_CHARACTER);
                            let len = len.min(self.pending_utf8.len());
                            self.pending_utf8.drain(..len);
                        }
                        // Truncated sequence: wait for the next chunk
                        None => return,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(frames: &[Frame]) -> Vec<&str> {
        frames.iter().map(|f| f.line()).collect()
    }

    #[test]
    fn empty_chunk_yields_nothing() {
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(b"").is_empty());
        assert_eq!(dec.pending_len(), 0);
    }

    #[test]
    fn multiple_frames_in_one_chunk() {
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(lines(&frames), vec!["data: {\"a\":1}", "data: {\"b\":2}"]);
    }

    #[test]
    fn frame_split_across_chunks() {
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(b"da").is_empty());
        assert!(dec.feed(b"ta: {\"x\"").is_empty());
        let frames = dec.feed(b":1}\n");
        assert_eq!(lines(&frames), vec!["data: {\"x\":1}"]);
        assert_eq!(frames[0].payload(), "{\"x\":1}");
    }

    #[test]
    fn non_record_lines_are_dropped() {
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(b": keepalive\nevent: message\ndata: ok\n");
        assert_eq!(lines(&frames), vec!["data: ok"]);
    }

    #[test]
    fn crlf_terminators() {
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(b"data: one\r\n\r\ndata: two\r");
        assert_eq!(lines(&frames), vec!["data: one"]);
        let frames = dec.feed(b"\n");
        assert_eq!(lines(&frames), vec!["data: two"]);
    }

    #[test]
    fn multibyte_char_split_between_chunks() {
        // "π" is 0xCF 0x80
        let mut dec = FrameDecoder::new();
        assert!(dec.feed(b"data: \xCF").is_empty());
        let frames = dec.feed(b"\x80\n");
        assert_eq!(lines(&frames), vec!["data: π"]);
    }

    #[test]
    fn invalid_bytes_become_replacement_char() {
        let mut dec = FrameDecoder::new();
        let frames = dec.feed(b"data: a\xFFb\n");
        assert_eq!(lines(&frames), vec!["data: a\u{FFFD}b"]);
    }

    #[test]
    fn finish_discards_unterminated_tail() {
        let mut dec = FrameDecoder::new();
        dec.feed(b"data: {\"complete\":true}\ndata: {\"trunc");
        assert!(dec.finish().is_empty());
        assert_eq!(dec.pending_len(), 0);
        // Reusable after finish
        assert_eq!(lines(&dec.feed(b"data: again\n")), vec!["data: again"]);
    }
}
