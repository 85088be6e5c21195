use tracing::{debug, warn};

use crate::codec::{self, DELIMITER};
use crate::message::Message;

/// Tracing target for frame reassembly.
const PARSER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::parser");

/// Stateful reassembler for delimiter-framed messages.
///
/// Transport reads deliver arbitrary fragments; the parser accumulates them
/// and yields every complete frame found so far. A frame split across any
/// number of `parse` calls decodes identically to one delivered whole, and
/// the buffer drains back to empty once all frames are consumed. Malformed
/// frames are dropped with a log line; the remainder of the buffer is still
/// processed.
///
/// The buffer is owned by exactly one reader (the session read loop) and is
/// not safe for concurrent use without external synchronisation.
#[derive(Debug, Default)]
pub struct MessageParser {
    buffer: String,
}

impl MessageParser {
    /// Creates an empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends transport data and extracts every complete message.
    ///
    /// Returns the successfully decoded messages in arrival order, possibly
    /// none. Empty or whitespace-only frames are skipped silently; frames
    /// that fail to decode are logged and skipped without aborting the rest
    /// of the buffer.
    pub fn parse(&mut self, data: &str) -> Vec<Message> {
        if data.is_empty() {
            return Vec::new();
        }
        self.buffer.push_str(data);

        let mut messages = Vec::new();
        while let Some(index) = self.buffer.find(DELIMITER) {
            let mut frame: String = self.buffer.drain(..=index).collect();
            frame.pop();

            if frame.trim().is_empty() {
                continue;
            }

            match codec::deserialize(&frame) {
                Ok(message) => {
                    debug!(
                        target: PARSER_TARGET,
                        action = message.action.as_deref().unwrap_or(""),
                        "parsed message"
                    );
                    messages.push(message);
                }
                Err(error) => {
                    warn!(target: PARSER_TARGET, %error, "skipping invalid frame");
                    debug!(target: PARSER_TARGET, frame = %frame, "invalid frame content");
                }
            }
        }
        messages
    }

    /// Number of buffered bytes still awaiting a delimiter.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Reports whether a partial frame is buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Discards any buffered partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::codec::serialize;
    use crate::message::Message;

    use super::*;

    fn frame(action: &str) -> String {
        serialize(&Message::request("code", action).with_data(json!({"n": action})))
            .expect("serialize")
    }

    #[test]
    fn whole_frame_parses_in_one_call() {
        let mut parser = MessageParser::new();
        let messages = parser.parse(&frame("active-path"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].action.as_deref(), Some("active-path"));
        assert!(!parser.has_partial());
    }

    #[test]
    fn fragmentation_is_invariant_at_every_split_point() {
        let whole = frame("file-saved");
        for split in 1..whole.len() {
            let mut parser = MessageParser::new();
            let (head, tail) = whole.split_at(split);
            let mut messages = parser.parse(head);
            messages.extend(parser.parse(tail));
            assert_eq!(messages.len(), 1, "split at byte {split}");
            assert_eq!(messages[0].action.as_deref(), Some("file-saved"));
            assert_eq!(parser.buffered_len(), 0, "split at byte {split}");
        }
    }

    #[test]
    fn batched_frames_decode_in_order() {
        let mut parser = MessageParser::new();
        let batch = format!("{}{}", frame("first"), frame("second"));
        let messages = parser.parse(&batch);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].action.as_deref(), Some("first"));
        assert_eq!(messages[1].action.as_deref(), Some("second"));
    }

    #[test]
    fn malformed_frame_does_not_abort_the_batch() {
        let mut parser = MessageParser::new();
        let batch = format!("{}not json\u{000C}{}", frame("first"), frame("second"));
        let messages = parser.parse(&batch);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].action.as_deref(), Some("first"));
        assert_eq!(messages[1].action.as_deref(), Some("second"));
        assert!(!parser.has_partial());
    }

    #[test]
    fn empty_frames_are_skipped() {
        let mut parser = MessageParser::new();
        let batch = format!("\u{000C}  \u{000C}{}", frame("only"));
        let messages = parser.parse(&batch);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn partial_frame_stays_buffered() {
        let mut parser = MessageParser::new();
        let messages = parser.parse(r#"{"flow":"req""#);
        assert!(messages.is_empty());
        assert!(parser.has_partial());
        parser.clear();
        assert!(!parser.has_partial());
    }
}
