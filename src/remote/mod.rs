//! Live page runtime.
//!
//! Everything that runs inside the previewed page, plus the editor-side
//! helpers for the page's loose message conventions.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `assets` | Runtime scripts and HTML instrumentation |
//! | `navigation` | `bramble-navigate:` request helpers |

// ============================================================================
// Submodules
// ============================================================================

/// Runtime scripts and HTML instrumentation.
pub mod assets;

/// Navigation request helpers.
pub mod navigation;

// ============================================================================
// Re-exports
// ============================================================================

pub use assets::{RemoteScriptOptions, inject_into_html, remote_script};
pub use navigation::navigation_path;
