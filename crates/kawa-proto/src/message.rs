use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Direction tag carried by every protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    /// Request issued by either side.
    Req,
    /// Response to an earlier request.
    Res,
    /// Error response.
    Err,
}

impl Flow {
    /// Returns the wire representation of the tag.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Req => "req",
            Self::Res => "res",
            Self::Err => "err",
        }
    }
}

/// A single protocol message.
///
/// The `flow` tag is the only required field; a frame without it is rejected
/// during decoding, before dispatch. `data` is an opaque JSON tree whose
/// shape depends on the routing key. `caw` echoes the client identity for
/// correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Direction tag (`req`, `res`, or `err`).
    pub flow: Flow,
    /// Optional namespace, e.g. `code`, `auth`, or the wildcard `*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Optional verb, e.g. `active-path` or `auth:info`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Optional client identity echo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caw: Option<String>,
}

impl Message {
    /// Creates a request message for the given domain and action.
    #[must_use]
    pub fn request(domain: impl Into<String>, action: impl Into<String>) -> Self {
        Self::with_flow(Flow::Req, domain, action)
    }

    /// Creates a response message for the given domain and action.
    #[must_use]
    pub fn response(domain: impl Into<String>, action: impl Into<String>) -> Self {
        Self::with_flow(Flow::Res, domain, action)
    }

    /// Creates an error message for the given domain and action.
    #[must_use]
    pub fn error(domain: impl Into<String>, action: impl Into<String>) -> Self {
        Self::with_flow(Flow::Err, domain, action)
    }

    fn with_flow(flow: Flow, domain: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            flow,
            domain: Some(domain.into()),
            action: Some(action.into()),
            data: None,
            caw: None,
        }
    }

    /// Attaches a structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Stamps the client identity onto the message.
    #[must_use]
    pub fn with_caw(mut self, caw: impl Into<String>) -> Self {
        self.caw = Some(caw.into());
        self
    }

    /// Reports whether this is a request.
    #[must_use]
    pub fn is_request(&self) -> bool {
        self.flow == Flow::Req
    }

    /// Reports whether this is a response.
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.flow == Flow::Res
    }

    /// Reports whether this is an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.flow == Flow::Err
    }

    /// Computes the routing key used for dispatch and correlation.
    ///
    /// The key is `domain:action`, or the bare action when no domain is
    /// present. A message without an action has no routing key and cannot be
    /// matched to a handler.
    #[must_use]
    pub fn routing_key(&self) -> Option<String> {
        let action = self.action.as_deref()?;
        Some(match self.domain.as_deref() {
            Some(domain) => format!("{domain}:{action}"),
            None => action.to_owned(),
        })
    }

    /// Returns the payload as a JSON object, when it is one.
    #[must_use]
    pub fn data_object(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref().and_then(Value::as_object)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn routing_key_joins_domain_and_action() {
        let message = Message::request("code", "active-path");
        assert_eq!(message.routing_key().as_deref(), Some("code:active-path"));
    }

    #[test]
    fn routing_key_falls_back_to_bare_action() {
        let message = Message {
            flow: Flow::Res,
            domain: None,
            action: Some("auth:info".to_owned()),
            data: None,
            caw: None,
        };
        assert_eq!(message.routing_key().as_deref(), Some("auth:info"));
    }

    #[test]
    fn routing_key_absent_without_action() {
        let message = Message {
            flow: Flow::Res,
            domain: Some("code".to_owned()),
            action: None,
            data: None,
            caw: None,
        };
        assert_eq!(message.routing_key(), None);
    }

    #[test]
    fn flow_predicates_follow_tag() {
        assert!(Message::request("*", "clientId").is_request());
        assert!(Message::response("code", "active-path").is_response());
        assert!(Message::error("code", "active-path").is_error());
    }

    #[test]
    fn data_object_filters_non_objects() {
        let scalar = Message::request("code", "x").with_data(json!(42));
        assert!(scalar.data_object().is_none());
        let object = Message::request("code", "x").with_data(json!({"fpath": "/a"}));
        assert_eq!(
            object.data_object().and_then(|o| o.get("fpath")),
            Some(&json!("/a"))
        );
    }
}
