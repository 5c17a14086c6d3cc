//! Live development session.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`LiveSession`] | Connection, agents and status of one live page |
//! | [`SessionBuilder`] | Fluent configuration builder |
//! | [`LiveDevOptions`] | Timeouts and agent selection |
//! | [`SessionStatus`] | Lifecycle status, published on a watch channel |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use livedev_bridge::agents::AgentKind;
//! use livedev_bridge::session::LiveSession;
//! use livedev_bridge::transport::WebSocketTransport;
//!
//! # async fn example() -> livedev_bridge::Result<()> {
//! let session = LiveSession::builder()
//!     .transport(Arc::new(WebSocketTransport::new()))
//!     .agents([AgentKind::Dom, AgentKind::Css, AgentKind::Highlight])
//!     .build()?;
//!
//! session.open("ws://127.0.0.1:9222/devtools/page/1").await?;
//!
//! if let Some(node) = session.agents().dom.node_at_location(120) {
//!     session.agents().highlight.node(&node).await?;
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for session configuration.
pub mod builder;

/// Session lifecycle.
pub mod core;

/// Session options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::SessionBuilder;
pub use core::{LiveSession, REASON_DISCONNECTED, SaveAction, SessionStatus};
pub use options::LiveDevOptions;
