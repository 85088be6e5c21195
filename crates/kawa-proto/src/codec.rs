use serde_json::error::Category;
use thiserror::Error;

use crate::message::Message;

/// Form-feed delimiter separating frames on the wire.
pub const DELIMITER: char = '\u{000C}';

/// Byte value of the frame delimiter.
pub const DELIMITER_BYTE: u8 = 0x0C;

/// Errors surfaced while encoding or decoding protocol frames.
///
/// Syntax and structure failures are recoverable: the offending frame is
/// dropped and processing continues. Serialisation failures indicate an
/// internal fault and are fatal to the exchange that produced them.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame body was not valid JSON.
    #[error("invalid frame syntax: {source}")]
    InvalidSyntax {
        /// Underlying JSON parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// Frame was syntactically valid JSON but not a valid message.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// What the frame was missing or carrying in excess.
        reason: String,
    },
    /// Message failed to serialise.
    #[error("failed to serialise message: {source}")]
    Serialize {
        /// Underlying JSON emit failure.
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// Reports whether the error is a recoverable decode failure rather
    /// than an internal fault.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidSyntax { .. } | Self::InvalidMessage { .. }
        )
    }
}

/// Encodes a message as a JSON frame followed by the form-feed delimiter.
///
/// # Errors
///
/// Returns [`ProtocolError::Serialize`] when the payload cannot be emitted
/// as JSON.
pub fn serialize(message: &Message) -> Result<String, ProtocolError> {
    let mut frame = serde_json::to_string(message)
        .map_err(|source| ProtocolError::Serialize { source })?;
    frame.push(DELIMITER);
    Ok(frame)
}

/// Decodes a single frame, with or without its trailing delimiter.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidSyntax`] for malformed JSON and
/// [`ProtocolError::InvalidMessage`] for well-formed JSON that is missing
/// the required `flow` tag or carries an unknown tag value. Both are
/// recoverable; callers drop the frame and continue.
pub fn deserialize(raw: &str) -> Result<Message, ProtocolError> {
    let body = raw.strip_suffix(DELIMITER).unwrap_or(raw);
    if body.trim().is_empty() {
        return Err(ProtocolError::InvalidMessage {
            reason: "empty frame".to_owned(),
        });
    }
    serde_json::from_str(body).map_err(|source| match source.classify() {
        Category::Data => ProtocolError::InvalidMessage {
            reason: source.to_string(),
        },
        _ => ProtocolError::InvalidSyntax { source },
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use crate::message::{Flow, Message};

    use super::*;

    #[test]
    fn round_trip_preserves_all_fields() {
        let message = Message::request("code", "diff-peer")
            .with_data(json!({"origin": "o", "fpath": "/f", "peer": "p"}))
            .with_caw("123456-789012");
        let frame = serialize(&message).expect("serialize");
        assert!(frame.ends_with(DELIMITER));
        let decoded = deserialize(&frame).expect("deserialize");
        assert_eq!(decoded, message);
    }

    #[rstest]
    #[case::request(Flow::Req, "req")]
    #[case::response(Flow::Res, "res")]
    #[case::error(Flow::Err, "err")]
    fn flow_tags_use_short_names(#[case] flow: Flow, #[case] tag: &str) {
        let message = Message {
            flow,
            domain: None,
            action: None,
            data: None,
            caw: None,
        };
        let frame = serialize(&message).expect("serialize");
        assert!(frame.contains(&format!("\"flow\":\"{tag}\"")));
    }

    #[test]
    fn absent_fields_are_omitted_from_the_frame() {
        let frame = serialize(&Message {
            flow: Flow::Req,
            domain: None,
            action: Some("clientId".to_owned()),
            data: None,
            caw: None,
        })
        .expect("serialize");
        assert!(!frame.contains("domain"));
        assert!(!frame.contains("data"));
        assert!(!frame.contains("caw"));
    }

    #[test]
    fn deserialize_accepts_missing_delimiter() {
        let decoded = deserialize(r#"{"flow":"res","action":"auth:info"}"#).expect("decode");
        assert_eq!(decoded.flow, Flow::Res);
        assert_eq!(decoded.action.as_deref(), Some("auth:info"));
    }

    #[test]
    fn malformed_json_is_a_syntax_error() {
        let result = deserialize("{not json");
        assert!(matches!(result, Err(ProtocolError::InvalidSyntax { .. })));
        assert!(result.unwrap_err().is_recoverable());
    }

    #[test]
    fn missing_flow_is_an_invalid_message() {
        let result = deserialize(r#"{"domain":"code","action":"active-path"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage { .. })));
    }

    #[test]
    fn unknown_flow_is_an_invalid_message() {
        let result = deserialize(r#"{"flow":"bogus"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage { .. })));
    }

    #[test]
    fn empty_frame_is_rejected() {
        assert!(matches!(
            deserialize("  "),
            Err(ProtocolError::InvalidMessage { .. })
        ));
    }
}
