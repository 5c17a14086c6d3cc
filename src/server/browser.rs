//! Browser backed by the native `launcher` domain.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;
use tracing::debug;

use crate::domains::{DomainManager, LAUNCH_COMMAND, LAUNCHER_DOMAIN};
use crate::error::{Error, Result};

use super::{Browser, LaunchTarget};

/// Opens live documents through `launcher.launch`.
///
/// Instrumented HTML is handed over as a `data:` URI.
#[derive(Debug, Clone)]
pub struct ExternalBrowser {
    domains: Arc<DomainManager>,
}

impl ExternalBrowser {
    /// Creates a browser that dispatches through `domains`.
    #[must_use]
    pub fn new(domains: Arc<DomainManager>) -> Self {
        Self { domains }
    }
}

#[async_trait]
impl Browser for ExternalBrowser {
    async fn update(&self, target: &LaunchTarget) -> Result<()> {
        if !self.domains.has_domain(LAUNCHER_DOMAIN) {
            return Err(Error::launch_failed("launcher domain is not registered"));
        }

        let url = match target {
            LaunchTarget::Url(url) => url.clone(),
            LaunchTarget::Html { html, .. } => html_data_uri(html),
        };
        debug!(url = %target.url(), "Opening live document");

        self.domains
            .execute_command(LAUNCHER_DOMAIN, LAUNCH_COMMAND, json!({ "url": url }))
            .await?;
        Ok(())
    }
}

/// Encodes `html` as a base64 `data:` URI.
#[must_use]
pub fn html_data_uri(html: &str) -> String {
    format!("data:text/html;base64,{}", STANDARD.encode(html))
}
