//! Error types for the live development bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use livedev_bridge::{Error, Result};
//!
//! async fn example(inspector: &Inspector) -> Result<()> {
//!     inspector.call("Page", "reload", json!({ "ignoreCache": true })).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`], [`Error::ConnectCancelled`], [`Error::PageNotFound`] |
//! | Protocol | [`Error::Protocol`], [`Error::Remote`], [`Error::RequestTimeout`], [`Error::TooManyPendingRequests`] |
//! | Domains | [`Error::UnknownCommand`], [`Error::DomainConflict`], [`Error::CommandConflict`], [`Error::InvalidArgument`] |
//! | Agents | [`Error::AgentNotLoaded`], [`Error::NodeNotFound`] |
//! | Server | [`Error::PathNotServed`], [`Error::UrlNotMapped`], [`Error::LaunchFailed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::{NodeId, RequestId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session or server configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Transport connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The remote page did not connect in time.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Transport closed while a request was outstanding.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A message was sent before the transport connected.
    ///
    /// The message is dropped, never queued.
    #[error("Not connected")]
    NotConnected,

    /// A newer connect attempt replaced this one.
    #[error("Connect attempt cancelled")]
    ConnectCancelled,

    /// The remote debugger lists no page at the requested URL.
    #[error("No debuggable page at {url}")]
    PageNotFound {
        /// The requested page URL.
        url: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed envelope or unexpected payload shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The remote end answered a command with an `error` envelope.
    #[error("Remote error in {method}: {message}")]
    Remote {
        /// Method of the failed command.
        method: String,
        /// Optional numeric error code reported by the remote end.
        code: Option<i64>,
        /// Error message reported by the remote end.
        message: String,
    },

    /// No response arrived within the per-call window.
    #[error("Request {request_id} ({method}) timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Method of the timed-out command.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Pending request limit reached.
    #[error("Too many pending requests (limit {limit})")]
    TooManyPendingRequests {
        /// Configured limit.
        limit: usize,
    },

    // ========================================================================
    // Domain Errors
    // ========================================================================
    /// Unknown command in the native domain namespace.
    #[error("no such command: {command}")]
    UnknownCommand {
        /// The unrecognized `domain.command`.
        command: String,
    },

    /// Domain registered twice.
    #[error("Domain {name} already registered")]
    DomainConflict {
        /// Domain name.
        name: String,
    },

    /// Command registered twice.
    #[error("Command {command} already registered")]
    CommandConflict {
        /// The `domain.command` name.
        command: String,
    },

    /// Invalid argument in command params.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Agent Errors
    // ========================================================================
    /// Agent query or mutation issued before `load()`.
    #[error("Agent not loaded: {agent}")]
    AgentNotLoaded {
        /// Agent name.
        agent: &'static str,
    },

    /// DOM node missing from the mirrored tree.
    #[error("Node not found: {node_id}")]
    NodeNotFound {
        /// The missing node ID.
        node_id: NodeId,
    },

    // ========================================================================
    // Server Errors
    // ========================================================================
    /// Path is outside the served project.
    #[error("Path not served: {path}")]
    PathNotServed {
        /// The requested path.
        path: String,
    },

    /// URL has no path mapping.
    #[error("URL not mapped: {url}")]
    UrlNotMapped {
        /// The unmapped URL.
        url: String,
    },

    /// Browser launch failed.
    #[error("Failed to launch browser: {message}")]
    LaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error talking to the remote debugger.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a remote error from an error envelope.
    #[inline]
    pub fn remote(method: impl Into<String>, code: Option<i64>, message: impl Into<String>) -> Self {
        Self::Remote {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates an unknown command error.
    #[inline]
    pub fn unknown_command(domain: &str, command: &str) -> Self {
        Self::UnknownCommand {
            command: format!("{domain}.{command}"),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a path not served error.
    #[inline]
    pub fn path_not_served(path: impl Into<String>) -> Self {
        Self::PathNotServed { path: path.into() }
    }

    /// Creates a URL not mapped error.
    #[inline]
    pub fn url_not_mapped(url: impl Into<String>) -> Self {
        Self::UrlNotMapped { url: url.into() }
    }

    /// Creates a launch failed error.
    #[inline]
    pub fn launch_failed(message: impl Into<String>) -> Self {
        Self::LaunchFailed {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if the remote end reported this error.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` if this is a connection error.
    ///
    /// These surface to the user as "live preview disconnected".
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::ConnectCancelled
                | Self::PageNotFound { .. }
                | Self::WebSocket(_)
                | Self::Http(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry after a reconnect.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::RequestTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("port in use");
        assert_eq!(err.to_string(), "Connection failed: port in use");
    }

    #[test]
    fn test_remote_error_display() {
        let err = Error::remote("CSS.setStyleSheetText", Some(-32000), "No style sheet");
        assert_eq!(
            err.to_string(),
            "Remote error in CSS.setStyleSheetText: No style sheet"
        );
        assert!(err.is_remote());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_is_distinct_from_remote() {
        let err = Error::request_timeout(RequestId::new(7), "DOM.getDocument", 5000);
        assert!(err.is_timeout());
        assert!(!err.is_remote());
        assert!(err.to_string().contains("DOM.getDocument"));
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::connection_timeout(100).is_connection_error());
        assert!(Error::ConnectCancelled.is_connection_error());
        assert!(Error::PageNotFound { url: "x".into() }.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::ConnectionClosed.is_recoverable());
        assert!(!Error::config("test").is_recoverable());
    }

    #[test]
    fn test_unknown_command_display() {
        let err = Error::unknown_command("launcher", "explode");
        assert_eq!(err.to_string(), "no such command: launcher.explode");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
