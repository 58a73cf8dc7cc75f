//! Newline splitting for streamed bodies
//!
//! Shared by the frame decoder and the SSE reader. Each byte is scanned once,
//! and a line that grows past the limit is dropped up to its newline instead
//! of being buffered.

/// Longest line kept, newline excluded
pub const MAX_LINE_BYTES: usize = 1 << 20;

#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline
    scanned: usize,
    max_line: usize,
    /// Skipping the rest of an overlong line
    discarding: bool,
}

impl LineBuffer {
    pub fn new(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            discarding: false,
        }
    }

    /// Feed a chunk, returning the lines it completed without their `\n`
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();

        let mut chunk = chunk;
        if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return lines,
            }
        }

        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            lines.push(self.buffer[start..end].to_vec());
            start = end + 1;
            self.scanned = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line {
            tracing::warn!(bytes = self.buffer.len(), "Dropping overlong stream line");
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }

        lines
    }

    /// The unterminated tail, if any
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            self.buffer.clear();
            return None;
        }
        let tail = std::mem::take(&mut self.buffer);
        (!tail.is_empty()).then_some(tail)
    }

    /// Bytes currently held back waiting for a newline
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(MAX_LINE_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_across_chunks() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"ab").is_empty());
        assert!(lines.push(b"c").is_empty());
        assert_eq!(lines.push(b"d\nef\ng"), vec![b"abcd".to_vec(), b"ef".to_vec()]);
        assert_eq!(lines.buffered(), 1);
        assert_eq!(lines.finish(), Some(b"g".to_vec()));
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_overlong_line_is_dropped_not_buffered() {
        let mut lines = LineBuffer::new(8);
        assert!(lines.push(b"0123456789").is_empty());
        assert_eq!(lines.buffered(), 0);

        // still inside the dropped line
        assert!(lines.push(&[b'x'; 4096]).is_empty());
        assert_eq!(lines.buffered(), 0);

        assert_eq!(lines.push(b"tail\nok\n"), vec![b"ok".to_vec()]);
    }

    #[test]
    fn test_newline_free_stream_stays_bounded() {
        let mut lines = LineBuffer::new(64);
        for _ in 0..1000 {
            assert!(lines.push(&[b'a'; 50]).is_empty());
            assert!(lines.buffered() <= 64);
        }
        assert_eq!(lines.finish(), None);
    }

    #[test]
    fn test_complete_lines_before_overlong_tail_survive() {
        let mut lines = LineBuffer::new(8);
        assert_eq!(lines.push(b"hi\n0123456789abc"), vec![b"hi".to_vec()]);
        assert_eq!(lines.push(b"\nnext\n"), vec![b"next".to_vec()]);
    }
}
