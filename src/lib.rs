//! Live development bridge between a code editor and a previewing browser.
//!
//! The editor talks to an instrumented live page over a DevTools-style
//! remote debugging protocol. Edits in the editor show up in the page
//! without a reload, and the page's DOM, style sheets, network requests
//! and console are mirrored back into the editor.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────── editor process ─────────────┐          ┌──── live page ────┐
//! │ LiveSession                             │          │                   │
//! │  ├─ Agents (dom, css, network, ...)     │          │  remote runtime   │
//! │  ├─ Inspector  (call / notify / on)     │◄────────►│  script (_LD)     │
//! │  │   └─ Transport (ws / postMessage)    │ messages │                   │
//! │  └─ Launcher → LiveServer → Browser     │          │                   │
//! └─────────────────────────────────────────┘          └───────────────────┘
//! ```
//!
//! Key design points:
//!
//! - Commands are correlated with responses by id, never by order
//! - Every call has a timeout; a closed transport rejects every pending call
//! - Agents are per-session; two sessions never share caches
//! - Native actions such as launching a browser go through the
//!   [`DomainManager`] command surface
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use livedev_bridge::{LiveSession, Result, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let session = LiveSession::builder()
//!         .transport(Arc::new(WebSocketTransport::new()))
//!         .build()?;
//!
//!     session.open("ws://127.0.0.1:9222/devtools/page/1").await?;
//!
//!     for url in session.agents().css.style_sheet_urls() {
//!         println!("live style sheet: {url}");
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | Session lifecycle, builder and options |
//! | [`agents`] | Per-session mirrors of live page state |
//! | [`inspector`] | Protocol client |
//! | [`transport`] | WebSocket, postMessage and in-memory transports |
//! | [`protocol`] | Message envelopes, typed commands and events |
//! | [`server`] | Live document servers, launcher, browsers |
//! | [`remote`] | In-page runtime script and navigation messages |
//! | [`domains`] | Native command/event surface |
//! | [`document`] | Editor document collaborator |
//! | [`fs`] | File system collaborator |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Per-session mirrors of live page state.
pub mod agents;

/// Editor document collaborator.
pub mod document;

/// Native command and event domains.
///
/// Use [`DomainManager`] to expose native actions to the live page.
pub mod domains;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// File system collaborator.
pub mod fs;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Remote debugging protocol client.
pub mod inspector;

/// Protocol message types.
pub mod protocol;

/// Remote page runtime script.
pub mod remote;

/// Live document servers and the launcher.
pub mod server;

/// Live development session.
///
/// Use [`LiveSession::builder()`] to create a configured session.
pub mod session;

/// Transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{LiveDevOptions, LiveSession, SaveAction, SessionBuilder, SessionStatus};

// Agent types
pub use agents::{
    Agent, AgentContext, AgentKind, Agents, ConsoleAgent, CssAgent, DomAgent, DomNode, EditAgent,
    HighlightAgent, HighlightTarget, NetworkAgent,
};

// Protocol client
pub use inspector::{ConnectionEvent, DebuggerEndpoint, Inspector, InspectorConfig};

// Transports
pub use transport::{
    ConnectionState, MemoryPeer, MemoryTransport, PostMessageTransport, Transport,
    TransportListener, WebSocketTransport,
};

// Collaborators
pub use document::{Document, Position, TextDocument};
pub use fs::{FileSystem, LocalFileSystem, MemoryFileSystem};
pub use server::{Browser, ExternalBrowser, LaunchTarget, Launcher, LiveServer, UrlMapper};

// Native domains
pub use domains::DomainManager;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{NodeId, RequestId, SubscriptionId};
