//! Wire envelope sum type.
//!
//! Every string crossing a [`Transport`](crate::transport::Transport) is one
//! [`Message`]. JSON parsing and serialization happen only here, so the
//! inspector and agents work with typed values.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::event::Event;
use super::request::{RemoteError, Request, Response};

// ============================================================================
// Message
// ============================================================================

/// One protocol envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `{"id", "method", "params"}`
    Command(Request),
    /// `{"id", "result"}` or `{"id", "error"}`
    Response(Response),
    /// `{"method", "params"}`
    Event(Event),
}

/// Loose shape every envelope deserializes into before classification.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: Option<RequestId>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RemoteError>,
}

impl Message {
    /// Parses one envelope.
    ///
    /// Classification: an `error`, a `result` or a missing `method` next to
    /// an `id` is a response; `id` with `method` is a command; `method`
    /// alone is an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the text is not JSON or fits none of
    /// the shapes.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(text)
            .map_err(|e| Error::protocol(format!("malformed envelope: {e}")))?;

        let message = match (raw.id, raw.method) {
            (Some(id), _) if raw.error.is_some() => Self::Response(Response::Error {
                id,
                error: raw.error.unwrap_or_else(|| RemoteError::new("")),
            }),
            (Some(id), None) => Self::Response(Response::Ok {
                id,
                result: raw.result.unwrap_or(Value::Null),
            }),
            (Some(id), Some(_)) if raw.result.is_some() => Self::Response(Response::Ok {
                id,
                result: raw.result.unwrap_or(Value::Null),
            }),
            (Some(id), Some(method)) => Self::Command(Request::new(
                id,
                method,
                raw.params.unwrap_or(Value::Null),
            )),
            (None, Some(method)) => {
                Self::Event(Event::new(method, raw.params.unwrap_or(Value::Null)))
            }
            (None, None) => {
                return Err(Error::protocol("envelope has neither id nor method"));
            }
        };

        Ok(message)
    }

    /// Serializes the envelope to its wire string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        let text = match self {
            Self::Command(request) => serde_json::to_string(request)?,
            Self::Response(response) => serde_json::to_string(&response.to_value())?,
            Self::Event(event) => serde_json::to_string(event)?,
        };
        Ok(text)
    }

    /// Returns the id of a response envelope.
    #[inline]
    #[must_use]
    pub fn response_id(&self) -> Option<RequestId> {
        match self {
            Self::Response(response) => Some(response.id()),
            _ => None,
        }
    }

    /// Returns the method name of a command or event envelope.
    #[inline]
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Command(request) => Some(&request.method),
            Self::Event(event) => Some(&event.method),
            Self::Response(_) => None,
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Self::Command(request)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_parse_success_response() {
        let message = Message::parse(r#"{"id": 3, "result": {"root": {}}}"#).expect("parse");
        assert_eq!(message.response_id(), Some(RequestId::new(3)));
        assert!(matches!(message, Message::Response(Response::Ok { .. })));
    }

    #[test]
    fn test_parse_error_response() {
        let message =
            Message::parse(r#"{"id": 5, "error": {"message": "No node"}}"#).expect("parse");
        match message {
            Message::Response(Response::Error { id, error }) => {
                assert_eq!(id, RequestId::new(5));
                assert_eq!(error.message, "No node");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_event() {
        let message =
            Message::parse(r#"{"method": "Page.loadEventFired", "params": {}}"#).expect("parse");
        assert_eq!(message.method(), Some("Page.loadEventFired"));
        assert!(message.response_id().is_none());
    }

    #[test]
    fn test_parse_command() {
        let message =
            Message::parse(r#"{"id": 1, "method": "Page.reload", "params": {"ignoreCache": true}}"#)
                .expect("parse");
        match message {
            Message::Command(request) => {
                assert_eq!(request.method, "Page.reload");
                assert_eq!(request.params, json!({"ignoreCache": true}));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_result_with_method_is_response() {
        let message = Message::parse(
            r#"{"id": 1, "method": "CSS.getAllStyleSheets", "result": {"headers": []}}"#,
        )
        .expect("parse");
        match message {
            Message::Response(Response::Ok { id, result }) => {
                assert_eq!(id, RequestId::new(1));
                assert_eq!(result, json!({"headers": []}));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Message::parse("bramble-navigate:/index.html").is_err());
        assert!(Message::parse(r#"{"params": {}}"#).is_err());
    }

    #[test]
    fn test_to_json_command() {
        let message = Message::Command(Request::new(RequestId::new(8), "DOM.getDocument", json!({})));
        let value: Value = serde_json::from_str(&message.to_json().expect("json")).expect("parse");
        assert_eq!(
            value,
            json!({"id": 8, "method": "DOM.getDocument", "params": {}})
        );
    }
}
