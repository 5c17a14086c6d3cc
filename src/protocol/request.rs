//! Request and Response message types.
//!
//! Defines the command and response envelopes exchanged between the editor
//! and the live page.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request from the editor to the live page.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "Domain.command",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Identifier for request/response correlation.
    pub id: RequestId,

    /// Command name in `Domain.command` format.
    pub method: String,

    /// Command params.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Creates a request from a method name and params.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Creates a request from a typed command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be serialized.
    pub fn from_command(id: RequestId, command: &Command) -> Result<Self> {
        let (method, params) = command.to_parts()?;
        Ok(Self::new(id, method, params))
    }

    /// Returns the domain part of the method.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    /// Returns the command part of the method.
    #[inline]
    #[must_use]
    pub fn command(&self) -> &str {
        self.method.split_once('.').map(|(_, c)| c).unwrap_or_default()
    }
}

// ============================================================================
// RemoteError
// ============================================================================

/// Error payload of a failed response.
///
/// The remote end sends either an object with a `message` or a bare
/// string; both deserialize to this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ErrorPayload")]
pub struct RemoteError {
    /// Numeric error code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,

    /// Error message.
    pub message: String,

    /// Extra detail attached by the remote end.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RemoteError {
    /// Creates an error payload with only a message.
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }
}

/// Accepted wire shapes for an error payload.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorPayload {
    Object {
        #[serde(default)]
        code: Option<i64>,
        #[serde(default)]
        message: String,
        #[serde(default)]
        data: Option<Value>,
    },
    Text(String),
}

impl From<ErrorPayload> for RemoteError {
    fn from(payload: ErrorPayload) -> Self {
        match payload {
            ErrorPayload::Object {
                code,
                message,
                data,
            } => Self {
                code,
                message,
                data,
            },
            ErrorPayload::Text(message) => Self::new(message),
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from the live page to the editor.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 1, "result": { ... } }
/// ```
///
/// Error:
/// ```json
/// { "id": 1, "error": { "message": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Successful response.
    Ok {
        /// Matches the command `id`.
        id: RequestId,
        /// Result data.
        result: Value,
    },

    /// Error response.
    Error {
        /// Matches the command `id`.
        id: RequestId,
        /// Error payload.
        error: RemoteError,
    },
}

impl Response {
    #[inline]
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Ok { id, .. } | Self::Error { id, .. } => *id,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Extracts the result value, attributing failures to `method`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the response was an error.
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self {
            Self::Ok { result, .. } => Ok(result),
            Self::Error { error, .. } => Err(Error::remote(method, error.code, error.message)),
        }
    }

    /// Serializes to the wire envelope.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Ok { id, result } => json!({ "id": id, "result": result }),
            Self::Error { id, error } => json!({ "id": id, "error": error }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
