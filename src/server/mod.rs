//! Live document servers and the launcher.
//!
//! A [`LiveServer`] maps project paths to the URLs the live page loads them
//! from and resolves a requested URL into something a [`Browser`] can show.
//! The [`Launcher`] ties the two together.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `blob` | `blob:` URL registry, instrumented HTML |
//! | `static_files` | Served-path mapping over an HTTP origin |
//! | `launcher` | Launch and reload flow |
//! | `browser` | Browser that opens URLs through the native launcher domain |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// `blob:` URL server.
pub mod blob;

/// Served-path server.
pub mod static_files;

/// Launch and reload flow.
pub mod launcher;

/// External browser.
pub mod browser;

// ============================================================================
// Re-exports
// ============================================================================

pub use blob::BlobServer;
pub use browser::ExternalBrowser;
pub use launcher::Launcher;
pub use static_files::StaticServer;

// ============================================================================
// LaunchTarget
// ============================================================================

/// What a browser should show for a live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Load this URL.
    Url(String),
    /// Render this instrumented HTML, standing in for `url`.
    Html {
        /// URL the document is known by.
        url: String,
        /// Instrumented document text.
        html: String,
    },
}

impl LaunchTarget {
    /// Returns the URL the document is known by.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Url(url) | Self::Html { url, .. } => url,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Bidirectional project path ↔ URL mapping.
pub trait UrlMapper: Send + Sync {
    /// Returns the URL a project path is served at.
    fn path_to_url(&self, path: &str) -> Option<String>;

    /// Returns the project path behind a served URL.
    fn url_to_path(&self, url: &str) -> Option<String>;
}

/// A server tied to one live development session.
#[async_trait]
pub trait LiveServer: UrlMapper {
    /// Called when the session starts.
    async fn start(&self) -> Result<()>;

    /// Called when the session ends.
    async fn stop(&self);

    /// Resolves a live document URL into a launch target.
    async fn resolve(&self, url: &str) -> Result<LaunchTarget>;
}

/// Shows live documents to the user.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Shows `target`, replacing whatever was shown.
    async fn update(&self, target: &LaunchTarget) -> Result<()>;
}

/// Returns `true` if a project path names an HTML document.
#[must_use]
pub fn is_html_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm") || lower.ends_with(".xhtml")
}

// ============================================================================
// Tests
// ============================================================================
