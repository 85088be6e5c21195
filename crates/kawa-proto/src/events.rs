//! Typed payloads for inbound backend events.
//!
//! The dispatcher hands collaborators the raw [`Message`]; these types give
//! the well-known payloads a typed surface. Fields the backend may omit are
//! optional so partially-populated events still decode.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::codec::ProtocolError;
use crate::message::Message;

/// Payload of the `auth:info` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthInfo {
    /// Whether the local daemon holds an authenticated session.
    #[serde(default)]
    pub authenticated: Option<bool>,
    /// Account details, when authenticated.
    #[serde(default)]
    pub user: Option<UserInfo>,
    /// Directory where the daemon materialises peer file content.
    #[serde(default, rename = "tmpDir")]
    pub tmp_dir: Option<String>,
}

/// Account details inside [`AuthInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Payload of the `code:active-path` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActivePathInfo {
    /// Line numbers the editor should highlight.
    #[serde(default)]
    pub hl: Vec<u64>,
}

/// Payload of `code:diff-peer` and `code:open-peer-file` responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PeerFileInfo {
    /// Path of the local file the event refers to.
    #[serde(default)]
    pub fpath: Option<String>,
    /// Identifier of the peer whose content is involved.
    #[serde(default)]
    pub peer: Option<String>,
    /// Repository origin, when the backend includes it.
    #[serde(default)]
    pub origin: Option<String>,
}

/// Decodes a message's `data` payload into a typed event.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidMessage`] when the message has no payload
/// or the payload does not match the expected shape.
pub fn decode_data<T: DeserializeOwned>(message: &Message) -> Result<T, ProtocolError> {
    let data = message
        .data
        .clone()
        .ok_or_else(|| ProtocolError::InvalidMessage {
            reason: "message carries no data payload".to_owned(),
        })?;
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidMessage {
        reason: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::message::Message;

    use super::*;

    #[test]
    fn auth_info_decodes_nested_user() {
        let message = Message::response("*", "auth:info").with_data(json!({
            "authenticated": true,
            "user": {"name": "Ada", "email": "ada@example.com"},
            "tmpDir": "/tmp/caw",
        }));
        let info: AuthInfo = decode_data(&message).expect("decode");
        assert_eq!(info.authenticated, Some(true));
        assert_eq!(info.user.and_then(|u| u.name).as_deref(), Some("Ada"));
        assert_eq!(info.tmp_dir.as_deref(), Some("/tmp/caw"));
    }

    #[test]
    fn active_path_defaults_to_no_highlights() {
        let message = Message::response("code", "active-path").with_data(json!({}));
        let info: ActivePathInfo = decode_data(&message).expect("decode");
        assert!(info.hl.is_empty());
    }

    #[test]
    fn missing_payload_is_an_invalid_message() {
        let message = Message::response("code", "active-path");
        let result: Result<ActivePathInfo, _> = decode_data(&message);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage { .. })));
    }
}
