//! Protocol client ("Inspector").
//!
//! Turns a bare string [`Transport`](crate::transport::Transport) into a
//! typed request/response/event API.
//!
//! # Dispatch
//!
//! ```text
//! inbound text ──► Message::parse ─┬─ Response ──► pending[id] resolved, entry removed
//!                                  ├─ Command ───► pending[id] if any, else an event
//!                                  ├─ Event ─────► handlers for its kind, in order
//!                                  └─ invalid ───► ConnectionEvent::Error
//! transport close ──► every pending call rejected with ConnectionClosed,
//!                     ConnectionEvent::Disconnected published
//! ```
//!
//! Request ids count up from 1 per client. Id `0` marks a notification
//! that expects no response.

// ============================================================================
// Submodules
// ============================================================================

/// Request correlation and dispatch.
pub mod client;

/// Remote debugger page discovery.
pub mod discovery;

/// Event subscriptions and connection notifications.
pub mod events;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_PENDING, Inspector, InspectorConfig, WeakInspector,
};
pub use discovery::DebuggerEndpoint;
pub use events::ConnectionEvent;
