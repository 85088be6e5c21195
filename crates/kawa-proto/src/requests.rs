//! Builders for the outbound request catalog.
//!
//! Every request the client sends to the backend is constructed here, so
//! the payload shapes live in one place. All requests are stamped with the
//! client GUID in the `caw` field.

use serde_json::json;

use crate::message::Message;

/// Wildcard domain accepted by every backend service.
pub const WILDCARD_DOMAIN: &str = "*";
/// Domain for source-code awareness operations.
pub const CODE_DOMAIN: &str = "code";

/// Builds the `*:clientId` registration request sent to the catalog.
#[must_use]
pub fn client_id(guid: &str) -> Message {
    Message::request(WILDCARD_DOMAIN, "clientId")
        .with_data(json!({ "guid": guid }))
        .with_caw(guid)
}

/// Builds the `*:clientDisconnect` courtesy notification.
#[must_use]
pub fn client_disconnect(guid: &str) -> Message {
    Message::request(WILDCARD_DOMAIN, "clientDisconnect").with_caw(guid)
}

/// Builds the `*:auth:info` request.
#[must_use]
pub fn auth_info(guid: &str) -> Message {
    Message::request(WILDCARD_DOMAIN, "auth:info").with_caw(guid)
}

/// Builds the `code:active-path` notification for the active editor file.
#[must_use]
pub fn active_path(guid: &str, fpath: &str, doc: &str) -> Message {
    Message::request(CODE_DOMAIN, "active-path")
        .with_data(json!({ "fpath": fpath, "doc": doc, "caw": guid }))
        .with_caw(guid)
}

/// Builds the `code:file-saved` notification.
#[must_use]
pub fn file_saved(guid: &str, fpath: &str, doc: &str) -> Message {
    Message::request(CODE_DOMAIN, "file-saved")
        .with_data(json!({ "fpath": fpath, "doc": doc, "caw": guid }))
        .with_caw(guid)
}

/// Builds the `code:diff-peer` request asking for a peer diff.
#[must_use]
pub fn diff_peer(guid: &str, origin: &str, fpath: &str, peer: &str) -> Message {
    Message::request(CODE_DOMAIN, "diff-peer")
        .with_data(json!({
            "origin": origin,
            "fpath": fpath,
            "peer": peer,
            "caw": guid,
        }))
        .with_caw(guid)
}
