//! Served-path server.
//!
//! Maps the project onto an HTTP origin (`http://127.0.0.1:<port>/`). The
//! embedding editor's HTTP layer answers requests with [`StaticServer::read_asset`],
//! which instruments HTML on the way out.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::fs::{FileSystem, normalize_path};
use crate::remote::{RemoteScriptOptions, inject_into_html, remote_script};

use super::{LaunchTarget, LiveServer, UrlMapper, is_html_path};

// ============================================================================
// StaticServer
// ============================================================================

/// Project path ↔ HTTP URL mapping.
pub struct StaticServer {
    base_url: Url,
    fs: Arc<dyn FileSystem>,
    script: RemoteScriptOptions,
}

impl StaticServer {
    /// Creates a server rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base_url` does not parse, or
    /// [`Error::Config`] if it cannot serve paths (e.g. `data:` URLs).
    pub fn new(
        base_url: &str,
        fs: Arc<dyn FileSystem>,
        script: RemoteScriptOptions,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!("{base_url} cannot serve paths")));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            fs,
            script,
        })
    }

    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Reads the file behind `url`, instrumenting HTML documents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UrlNotMapped`] for URLs outside the origin, or the
    /// file system's error.
    pub async fn read_asset(&self, url: &str) -> Result<String> {
        let path = self
            .url_to_path(url)
            .ok_or_else(|| Error::url_not_mapped(url))?;
        let text = self.fs.read_file(&path).await?;
        trace!(path = %path, len = text.len(), "Serving asset");

        if is_html_path(&path) {
            Ok(inject_into_html(&text, &remote_script(&self.script)))
        } else {
            Ok(text)
        }
    }
}

impl UrlMapper for StaticServer {
    fn path_to_url(&self, path: &str) -> Option<String> {
        let normalized = normalize_path(path);
        let encoded: Vec<String> = normalized
            .trim_start_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        self.base_url
            .join(&encoded.join("/"))
            .ok()
            .map(String::from)
    }

    fn url_to_path(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        if parsed.origin() != self.base_url.origin() {
            return None;
        }

        let relative = parsed.path().strip_prefix(self.base_url.path())?;
        let decoded: Vec<String> = relative
            .split('/')
            .map(|segment| {
                urlencoding::decode(segment)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| segment.to_string())
            })
            .collect();
        Some(normalize_path(&decoded.join("/")))
    }
}

#[async_trait]
impl LiveServer for StaticServer {
    async fn start(&self) -> Result<()> {
        debug!(base_url = %self.base_url, "Static server started");
        Ok(())
    }

    async fn stop(&self) {
        debug!(base_url = %self.base_url, "Static server stopped");
    }

    async fn resolve(&self, url: &str) -> Result<LaunchTarget> {
        if self.url_to_path(url).is_none() {
            return Err(Error::url_not_mapped(url));
        }
        Ok(LaunchTarget::Url(url.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================
