//! `launcher` domain: opens URLs in an external browser process.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::manager::{CommandHandler, CommandSpec, DomainManager};

// ============================================================================
// Constants
// ============================================================================

/// Domain name.
pub const LAUNCHER_DOMAIN: &str = "launcher";

/// Command that opens a URL.
pub const LAUNCH_COMMAND: &str = "launch";

/// Event emitted after a browser process exits.
pub const EXITED_EVENT: &str = "browserExited";

// ============================================================================
// LauncherDomain
// ============================================================================

/// Browser binary configuration for the `launcher` domain.
#[derive(Debug, Clone)]
pub struct LauncherDomain {
    binary: PathBuf,
    args: Vec<String>,
}

impl LauncherDomain {
    /// Launches `binary` with the URL as its last argument.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
        }
    }

    /// Adds an argument placed before the URL.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Registers the domain's command and event on `manager`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DomainConflict`] if the domain already exists.
    pub fn register(self, manager: &Arc<DomainManager>) -> Result<()> {
        manager.register_domain(LAUNCHER_DOMAIN, Some("1.0"))?;
        manager.register_event(
            LAUNCHER_DOMAIN,
            EXITED_EVENT,
            json!([{ "name": "url", "type": "string" }, { "name": "code", "type": "number" }]),
        );

        let config = Arc::new(self);
        let events = Arc::downgrade(manager);
        let handler = CommandHandler::asynchronous(move |params: Value| {
            let config = Arc::clone(&config);
            let events = events.clone();
            async move {
                let url = params
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::invalid_argument("launch requires a string url"))?
                    .to_string();
                let mut child = config.spawn(&url)?;
                let pid = child.id();
                info!(pid, url = %url, "Browser launched");

                tokio::spawn(async move {
                    let code = match child.wait().await {
                        Ok(status) => status.code(),
                        Err(e) => {
                            warn!(error = %e, "Failed to wait for browser process");
                            None
                        }
                    };
                    if let Some(manager) = events.upgrade() {
                        let _ = manager.emit_event(
                            LAUNCHER_DOMAIN,
                            EXITED_EVENT,
                            json!({ "url": url, "code": code }),
                        );
                    }
                });

                Ok(json!({ "pid": pid }))
            }
        });

        manager.register_command(
            LAUNCHER_DOMAIN,
            LAUNCH_COMMAND,
            handler,
            CommandSpec::new("Opens a URL in the configured browser")
                .with_parameters(json!([{ "name": "url", "type": "string" }]))
                .with_returns(json!({ "pid": "number" })),
        )
    }

    fn spawn(&self, url: &str) -> Result<tokio::process::Child> {
        debug!(binary = %self.binary.display(), url, "Spawning browser");
        Command::new(&self.binary)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::launch_failed(format!("{}: {e}", self.binary.display())))
    }
}

// ============================================================================
// Tests
// ============================================================================
