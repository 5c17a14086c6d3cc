//! Launch and reload flow.
//!
//! [`Launcher::launch`] resolves a live document URL through the server and
//! hands the result to the browser. Resolution failures are logged and
//! returned to the caller.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

use super::{Browser, LiveServer};

// ============================================================================
// Launcher
// ============================================================================

/// Resolves live documents and shows them in a browser.
pub struct Launcher {
    server: Arc<dyn LiveServer>,
    browser: Arc<dyn Browser>,
    auto_update: AtomicBool,
    pending_reload: Mutex<Option<String>>,
    live_document: Mutex<Option<String>>,
}

impl Launcher {
    /// Creates a launcher. Auto-update starts enabled.
    #[must_use]
    pub fn new(server: Arc<dyn LiveServer>, browser: Arc<dyn Browser>) -> Self {
        Self {
            server,
            browser,
            auto_update: AtomicBool::new(true),
            pending_reload: Mutex::new(None),
            live_document: Mutex::new(None),
        }
    }

    /// Sets the initial auto-update flag without reloading.
    #[must_use]
    pub fn with_auto_update(self, enabled: bool) -> Self {
        self.auto_update.store(enabled, Ordering::SeqCst);
        self
    }

    #[inline]
    #[must_use]
    pub fn server(&self) -> &Arc<dyn LiveServer> {
        &self.server
    }

    /// Sets the project path of the document being previewed.
    pub fn set_live_document(&self, path: Option<String>) {
        *self.live_document.lock() = path;
    }

    /// Returns the project path of the document being previewed.
    #[must_use]
    pub fn live_document(&self) -> Option<String> {
        self.live_document.lock().clone()
    }

    /// Returns whether reloads happen without `force`.
    #[inline]
    #[must_use]
    pub fn auto_update(&self) -> bool {
        self.auto_update.load(Ordering::SeqCst)
    }

    /// Returns `true` while a reload is being launched.
    #[must_use]
    pub fn is_reload_pending(&self) -> bool {
        self.pending_reload.lock().is_some()
    }

    /// Resolves `url` and shows it.
    ///
    /// Returns once the browser update completes.
    ///
    /// # Errors
    ///
    /// Returns the server's resolution error or the browser's update error.
    pub async fn launch(&self, url: &str) -> Result<()> {
        let target = match self.server.resolve(url).await {
            Ok(target) => target,
            Err(e) => {
                error!(url, error = %e, "Failed to resolve live document");
                return Err(e);
            }
        };

        self.browser.update(&target).await?;
        info!(url, "Live document launched");
        Ok(())
    }

    /// Reloads the live document.
    ///
    /// Skipped (returns `Ok(false)`) when auto-update is off and `force` is
    /// not set, when no live document is set, or when a reload of the same
    /// URL is already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathNotServed`] if the live document has no URL, or
    /// the launch error.
    pub async fn reload(&self, force: bool) -> Result<bool> {
        if !self.auto_update() && !force {
            debug!("Reload skipped, auto-update disabled");
            return Ok(false);
        }

        let Some(path) = self.live_document() else {
            return Ok(false);
        };
        let url = self
            .server
            .path_to_url(&path)
            .ok_or_else(|| Error::path_not_served(&path))?;

        {
            let mut pending = self.pending_reload.lock();
            if pending.as_deref() == Some(url.as_str()) {
                debug!(url = %url, "Reload already in flight");
                return Ok(false);
            }
            *pending = Some(url.clone());
        }

        let result = self.launch(&url).await;

        {
            let mut pending = self.pending_reload.lock();
            if pending.as_deref() == Some(url.as_str()) {
                *pending = None;
            }
        }

        result.map(|()| true)
    }

    /// Turns auto-update on or off. Turning it on forces a reload.
    ///
    /// # Errors
    ///
    /// Returns the forced reload's error.
    pub async fn set_auto_update(&self, enabled: bool) -> Result<()> {
        self.auto_update.store(enabled, Ordering::SeqCst);
        if enabled {
            self.reload(true).await?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::fs::MemoryFileSystem;
    use crate::remote::RemoteScriptOptions;
    use crate::server::{BlobServer, LaunchTarget, UrlMapper};

    #[derive(Default)]
    struct RecordingBrowser {
        gate: Option<Semaphore>,
        updates: Mutex<Vec<LaunchTarget>>,
    }

    #[async_trait]
    impl Browser for RecordingBrowser {
        async fn update(&self, target: &LaunchTarget) -> Result<()> {
            if let Some(gate) = &self.gate {
                gate.acquire().await.map_err(|_| Error::ConnectionClosed)?.forget();
            }
            self.updates.lock().push(target.clone());
            Ok(())
        }
    }

    fn blob_server() -> Arc<BlobServer> {
        let fs = MemoryFileSystem::new().with_file("/index.html", "<head></head>");
        Arc::new(BlobServer::new(
            "https://editor.example",
            Arc::new(fs),
            RemoteScriptOptions::post_message(),
        ))
    }

    #[tokio::test]
    async fn test_launch_updates_browser() {
        let server = blob_server();
        let url = server.register("/index.html");
        let browser = Arc::new(RecordingBrowser::default());
        let launcher = Launcher::new(server, browser.clone());

        launcher.launch(&url).await.expect("launch");

        let updates = browser.updates.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].url(), url);
    }

    #[tokio::test]
    async fn test_launch_resolution_error_is_returned() {
        let browser = Arc::new(RecordingBrowser::default());
        let launcher = Launcher::new(blob_server(), browser.clone());

        let err = launcher
            .launch("blob:https://editor.example/unknown")
            .await
            .expect_err("should fail");

        assert!(matches!(err, Error::UrlNotMapped { .. }));
        assert!(browser.updates.lock().is_empty());
    }

    #[tokio::test]
    async fn test_reload_respects_auto_update() {
        let server = blob_server();
        server.register("/index.html");
        let browser = Arc::new(RecordingBrowser::default());
        let launcher = Launcher::new(server, browser.clone());
        launcher.set_live_document(Some("/index.html".into()));

        launcher.set_auto_update(false).await.expect("disable");
        assert!(!launcher.reload(false).await.expect("reload"));
        assert!(launcher.reload(true).await.expect("forced reload"));

        launcher.set_auto_update(true).await.expect("enable");
        assert_eq!(browser.updates.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_reload_without_live_document_is_skipped() {
        let launcher = Launcher::new(blob_server(), Arc::new(RecordingBrowser::default()));
        assert!(!launcher.reload(true).await.expect("reload"));
    }

    #[tokio::test]
    async fn test_duplicate_reload_is_suppressed() {
        let server = blob_server();
        server.register("/index.html");
        let browser = Arc::new(RecordingBrowser {
            gate: Some(Semaphore::new(0)),
            updates: Mutex::new(Vec::new()),
        });
        let launcher = Arc::new(Launcher::new(server, browser.clone()));
        launcher.set_live_document(Some("/index.html".into()));

        let first = tokio::spawn({
            let launcher = Arc::clone(&launcher);
            async move { launcher.reload(false).await }
        });
        while !launcher.is_reload_pending() {
            tokio::task::yield_now().await;
        }

        assert!(!launcher.reload(false).await.expect("second reload"));

        if let Some(gate) = &browser.gate {
            gate.add_permits(1);
        }
        assert!(first.await.expect("join").expect("first reload"));
        assert!(!launcher.is_reload_pending());
        assert_eq!(browser.updates.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reload_clears_pending() {
        let server = blob_server();
        let browser = Arc::new(RecordingBrowser::default());
        let launcher = Launcher::new(server.clone(), browser);
        launcher.set_live_document(Some("/index.html".into()));

        assert!(matches!(
            launcher.reload(true).await,
            Err(Error::PathNotServed { .. })
        ));

        let url = server.register("/index.html");
        assert_eq!(server.path_to_url("/index.html"), Some(url));
        assert!(launcher.reload(true).await.expect("reload"));
        assert!(!launcher.is_reload_pending());
    }
}
