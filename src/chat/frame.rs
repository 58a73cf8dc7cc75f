//! Framed token stream
//!
//! The chat route streams newline-delimited frames:
//!
//! ```text
//! 0:"Hello"
//! 0:", how are you?"
//! 3:"upstream failed"
//! ```
//!
//! `0:` carries a text fragment, `3:` an error message; both payloads are
//! JSON string literals. Lines with any other prefix or a payload that is not
//! a JSON string are skipped.

use serde_json::Value;

use super::lines::LineBuffer;

const TEXT_PREFIX: &str = "0:";
const ERROR_PREFIX: &str = "3:";

/// Encode a text fragment as a `0:` frame, newline included
pub fn encode_text(fragment: &str) -> String {
    format!("{}{}\n", TEXT_PREFIX, Value::String(fragment.to_string()))
}

/// Encode an error message as a `3:` frame, newline included
pub fn encode_error(message: &str) -> String {
    format!("{}{}\n", ERROR_PREFIX, Value::String(message.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Error(String),
}

/// Incremental decoder; chunks may split lines and UTF-8 sequences anywhere
#[derive(Debug, Default)]
pub struct FrameDecoder {
    lines: LineBuffer,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines longer than `max_line` bytes are skipped
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            lines: LineBuffer::new(max_line),
        }
    }

    /// Feed a chunk, returning every frame completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.lines
            .push(chunk)
            .iter()
            .filter_map(|line| decode_line(line))
            .collect()
    }

    /// Decode a trailing line that never got its newline
    pub fn finish(&mut self) -> Option<Frame> {
        self.lines.finish().and_then(|line| decode_line(&line))
    }
}

fn decode_line(line: &[u8]) -> Option<Frame> {
    let line = std::str::from_utf8(line).ok()?;
    let line = line.strip_suffix('\r').unwrap_or(line);

    let (payload, is_error) = if let Some(rest) = line.strip_prefix(TEXT_PREFIX) {
        (rest, false)
    } else if let Some(rest) = line.strip_prefix(ERROR_PREFIX) {
        (rest, true)
    } else {
        return None;
    };

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::String(text)) if is_error => Some(Frame::Error(text)),
        Ok(Value::String(text)) => Some(Frame::Text(text)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode() {
        assert_eq!(encode_text("Hi \"you\"\n"), "0:\"Hi \\\"you\\\"\\n\"\n");
        assert_eq!(encode_error("boom"), "3:\"boom\"\n");
    }

    #[test]
    fn test_split_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"0:\"Hel").is_empty());
        assert_eq!(decoder.push(b"lo\"\n0:\" wor"), vec![Frame::Text("Hello".to_string())]);
        assert_eq!(decoder.push(b"ld\"\n"), vec![Frame::Text(" world".to_string())]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_overlong_frame_skipped() {
        let mut decoder = FrameDecoder::with_max_line(16);
        let long = encode_text(&"x".repeat(64));
        assert!(decoder.push(&long.as_bytes()[..40]).is_empty());
        assert_eq!(
            decoder.push(format!("{}0:\"short\"\n", &long[40..]).as_bytes()),
            vec![Frame::Text("short".to_string())]
        );
    }

    #[test]
    fn test_skips_malformed_and_unknown_lines() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"0:not json\n2:\"data\"\n0:42\n\n0:\"ok\"\n");
        assert_eq!(frames, vec![Frame::Text("ok".to_string())]);
    }

    #[test]
    fn test_error_frame_and_trailing_line() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.push(b"3:\"provider down\"\r\n"), vec![Frame::Error("provider down".to_string())]);
        assert!(decoder.push(b"0:\"tail\"").is_empty());
        assert_eq!(decoder.finish(), Some(Frame::Text("tail".to_string())));
    }

    #[test]
    fn test_multibyte_split() {
        let encoded = encode_text("Kushɛ");
        let bytes = encoded.as_bytes();
        let split = bytes.len() - 3;

        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(decoder.push(&bytes[split..]), vec![Frame::Text("Kushɛ".to_string())]);
    }

    proptest! {
        #[test]
        fn prop_any_chunking_yields_same_text(
            parts in proptest::collection::vec(".{0,12}", 1..8),
            cut in 1usize..16,
        ) {
            let stream: String = parts.iter().map(|p| encode_text(p)).collect();
            let mut decoder = FrameDecoder::new();
            let mut text = String::new();
            for chunk in stream.as_bytes().chunks(cut) {
                for frame in decoder.push(chunk) {
                    if let Frame::Text(t) = frame {
                        text.push_str(&t);
                    }
                }
            }
            prop_assert!(decoder.finish().is_none());
            prop_assert_eq!(text, parts.concat());
        }
    }
}
