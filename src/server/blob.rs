//! `blob:` URL server.
//!
//! Every project file the live page may load is registered under a
//! `blob:<origin>/<uuid>` URL. HTML documents resolve to instrumented text
//! that carries the runtime scripts.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, normalize_path};
use crate::remote::{RemoteScriptOptions, inject_into_html, remote_script};

use super::{LaunchTarget, LiveServer, UrlMapper, is_html_path};

// ============================================================================
// BlobServer
// ============================================================================

/// Path ↔ `blob:` URL registry backed by a [`FileSystem`].
pub struct BlobServer {
    origin: String,
    fs: Arc<dyn FileSystem>,
    script: RemoteScriptOptions,
    registry: Mutex<Registry>,
    running: AtomicBool,
}

#[derive(Default)]
struct Registry {
    by_path: FxHashMap<String, String>,
    by_url: FxHashMap<String, String>,
}

impl BlobServer {
    /// Creates a server minting URLs under `origin`
    /// (e.g. `https://editor.example`).
    #[must_use]
    pub fn new(
        origin: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        script: RemoteScriptOptions,
    ) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            fs,
            script,
            registry: Mutex::new(Registry::default()),
            running: AtomicBool::new(false),
        }
    }

    /// Registers `path`, returning its URL. Registering twice returns the
    /// same URL.
    pub fn register(&self, path: &str) -> String {
        let path = normalize_path(path);
        let mut registry = self.registry.lock();
        if let Some(url) = registry.by_path.get(&path) {
            return url.clone();
        }

        let url = format!("blob:{}/{}", self.origin, Uuid::new_v4());
        debug!(path = %path, url = %url, "Registered blob URL");
        registry.by_url.insert(url.clone(), path.clone());
        registry.by_path.insert(path, url.clone());
        url
    }

    /// Forgets `path`. Returns `true` if it was registered.
    pub fn revoke(&self, path: &str) -> bool {
        let path = normalize_path(path);
        let mut registry = self.registry.lock();
        match registry.by_path.remove(&path) {
            Some(url) => {
                registry.by_url.remove(&url);
                true
            }
            None => false,
        }
    }

    /// Returns the number of registered paths.
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.registry.lock().by_path.len()
    }

    /// Returns `true` between `start` and `stop`.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl UrlMapper for BlobServer {
    fn path_to_url(&self, path: &str) -> Option<String> {
        self.registry
            .lock()
            .by_path
            .get(&normalize_path(path))
            .cloned()
    }

    fn url_to_path(&self, url: &str) -> Option<String> {
        self.registry.lock().by_url.get(url).cloned()
    }
}

#[async_trait]
impl LiveServer for BlobServer {
    async fn start(&self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        debug!(origin = %self.origin, "Blob server started");
        Ok(())
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        debug!(origin = %self.origin, "Blob server stopped");
    }

    async fn resolve(&self, url: &str) -> Result<LaunchTarget> {
        let path = self
            .url_to_path(url)
            .ok_or_else(|| Error::url_not_mapped(url))?;

        if !is_html_path(&path) {
            return Ok(LaunchTarget::Url(url.to_string()));
        }

        let text = self.fs.read_file(&path).await?;
        let html = inject_into_html(&text, &remote_script(&self.script));
        Ok(LaunchTarget::Html {
            url: url.to_string(),
            html,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fs::MemoryFileSystem;

    fn server() -> BlobServer {
        let fs = MemoryFileSystem::new()
            .with_file("/index.html", "<html><head></head><body>hi</body></html>")
            .with_file("/main.css", "body {}");
        BlobServer::new(
            "https://editor.example/",
            Arc::new(fs),
            RemoteScriptOptions::post_message(),
        )
    }

    #[test]
    fn test_register_is_stable_and_reversible() {
        let server = server();
        let url = server.register("/css/../main.css");

        assert!(url.starts_with("blob:https://editor.example/"));
        assert_eq!(server.register("/main.css"), url);
        assert_eq!(server.path_to_url("main.css").as_deref(), Some(url.as_str()));
        assert_eq!(server.url_to_path(&url).as_deref(), Some("/main.css"));

        assert!(server.revoke("/main.css"));
        assert!(server.url_to_path(&url).is_none());
        assert_eq!(server.registered_count(), 0);
    }

    #[tokio::test]
    async fn test_resolve_html_is_instrumented() {
        let server = server();
        server.start().await.expect("start");
        let url = server.register("/index.html");

        match server.resolve(&url).await.expect("resolve") {
            LaunchTarget::Html { url: resolved, html } => {
                assert_eq!(resolved, url);
                assert!(html.contains("_LiveDev_Transport"));
                assert!(html.ends_with("<body>hi</body></html>"));
            }
            other => panic!("expected HTML, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_asset_and_unknown_url() {
        let server = server();
        let url = server.register("/main.css");

        assert_eq!(
            server.resolve(&url).await.expect("resolve"),
            LaunchTarget::Url(url.clone())
        );
        assert!(matches!(
            server.resolve("blob:https://editor.example/missing").await,
            Err(Error::UrlNotMapped { .. })
        ));
    }
}
