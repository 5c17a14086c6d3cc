//! Remote debugging protocol message types.
//!
//! This module defines the messages exchanged between the editor and the
//! live page.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Editor → Page | Command request |
//! | `Response` | Page → Editor | Command result or error |
//! | `Event` | Page → Editor | Unsolicited notification |
//!
//! # Command Naming
//!
//! Commands and events follow `Domain.name` format:
//!
//! - `CSS.setStyleSheetText`
//! - `DOM.getDocument`
//! - `Page.loadEventFired`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types and the dispatch key |
//! | `message` | Envelope sum type |
//! | `request` | Request and Response types |
//! | `types` | Shared payload types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by domain.
pub mod command;

/// Event message types.
pub mod event;

/// Envelope sum type.
pub mod message;

/// Request and Response message types.
pub mod request;

/// Shared payload types.
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    Command, ConsoleCommand, CssCommand, DomCommand, NetworkCommand, PageCommand, RuntimeCommand,
};
pub use event::{Event, EventKind, ParsedEvent};
pub use message::Message;
pub use request::{RemoteError, Request, Response};
pub use types::{ConsoleMessage, HighlightConfig, NodePayload, Rgba, StyleSheetHeader};
