//! Native command and event namespace.
//!
//! Native side effects such as opening an external browser go through
//! commands registered on a [`DomainManager`], never through direct OS calls
//! from the agents or the launcher.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use livedev_bridge::domains::{DomainManager, LauncherDomain};
//!
//! let manager = Arc::new(DomainManager::new());
//! LauncherDomain::new("firefox").register(&manager)?;
//! manager
//!     .execute_command("launcher", "launch", json!({ "url": "http://127.0.0.1:8000/" }))
//!     .await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Domain registry and dispatch.
pub mod manager;

/// `launcher` domain.
pub mod launcher;

// ============================================================================
// Re-exports
// ============================================================================

pub use launcher::{LAUNCH_COMMAND, LAUNCHER_DOMAIN, LauncherDomain};
pub use manager::{CommandHandler, CommandSpec, DomainManager};
