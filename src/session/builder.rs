//! Builder pattern for session configuration.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use livedev_bridge::session::LiveSession;
//! use livedev_bridge::transport::MemoryTransport;
//!
//! # fn example() -> livedev_bridge::Result<()> {
//! let (transport, _peer) = MemoryTransport::pair();
//! let session = LiveSession::builder()
//!     .transport(Arc::new(transport))
//!     .highlight(false)
//!     .build()?;
//! # let _ = session;
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::{AgentKind, SourceAccess};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::protocol::HighlightConfig;
use crate::server::{Browser, Launcher, LiveServer, UrlMapper};
use crate::transport::Transport;

use super::core::LiveSession;
use super::options::LiveDevOptions;

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for configuring a [`LiveSession`].
///
/// Use [`LiveSession::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct SessionBuilder {
    /// Connection to the live page.
    transport: Option<Arc<dyn Transport>>,
    /// Timeouts and agent selection.
    options: LiveDevOptions,
    /// Server the live document is resolved through.
    server: Option<Arc<dyn LiveServer>>,
    /// Browser the live document is shown in.
    browser: Option<Arc<dyn Browser>>,
    /// Project file system.
    fs: Option<Arc<dyn FileSystem>>,
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("transport", &self.transport.is_some())
            .field("options", &self.options)
            .field("server", &self.server.is_some())
            .field("browser", &self.browser.is_some())
            .field("fs", &self.fs.is_some())
            .finish()
    }
}

// ============================================================================
// SessionBuilder Implementation
// ============================================================================

impl SessionBuilder {
    /// Creates a builder with default options and no transport.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport to the live page.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces every option at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: LiveDevOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the per-call timeout.
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.options.call_timeout = timeout;
        self
    }

    /// Sets how long `open()` waits for the connection.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the bound on loading every agent.
    #[inline]
    #[must_use]
    pub fn agent_load_timeout(mut self, timeout: Duration) -> Self {
        self.options.agent_load_timeout = timeout;
        self
    }

    /// Replaces the enabled agent set.
    #[must_use]
    pub fn agents(mut self, agents: impl IntoIterator<Item = AgentKind>) -> Self {
        self.options.enabled_agents = agents.into_iter().collect();
        self
    }

    /// Turns the highlight agent on or off.
    #[inline]
    #[must_use]
    pub fn highlight(mut self, enabled: bool) -> Self {
        self.options.highlight = enabled;
        self
    }

    /// Sets the highlight colors.
    #[inline]
    #[must_use]
    pub fn highlight_config(mut self, config: HighlightConfig) -> Self {
        self.options.highlight_config = config;
        self
    }

    /// Sets the initial auto-update flag of the launcher.
    #[inline]
    #[must_use]
    pub fn auto_update(mut self, enabled: bool) -> Self {
        self.options.auto_update = enabled;
        self
    }

    /// Sets the server and browser the session launches through.
    #[inline]
    #[must_use]
    pub fn launcher(mut self, server: Arc<dyn LiveServer>, browser: Arc<dyn Browser>) -> Self {
        self.server = Some(server);
        self.browser = Some(browser);
        self
    }

    /// Sets the project file system.
    ///
    /// Together with a launcher, lets the DOM agent map nodes onto the
    /// served document's source.
    #[inline]
    #[must_use]
    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Builds the session with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no transport is set
    /// - [`Error::Config`] if a timeout or the pending cap is zero
    /// - [`Error::Config`] if the edit or highlight agent is enabled without
    ///   the DOM agent
    pub fn build(self) -> Result<LiveSession> {
        let transport = self.validate_transport()?;
        self.validate_limits()?;
        self.validate_agents()?;

        let launcher = self.server.clone().zip(self.browser.clone()).map(|(server, browser)| {
            Arc::new(Launcher::new(server, browser).with_auto_update(self.options.auto_update))
        });
        let sources = self.server.clone().zip(self.fs.clone()).map(|(server, fs)| {
            let mapper: Arc<dyn UrlMapper> = server;
            SourceAccess::new(mapper, fs)
        });

        Ok(LiveSession::new(transport, self.options, launcher, sources))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl SessionBuilder {
    /// Validates the transport configuration.
    fn validate_transport(&self) -> Result<Arc<dyn Transport>> {
        self.transport.clone().ok_or_else(|| {
            Error::config(
                "Transport is required. Use .transport() to set it.\n\
                 Example: LiveSession::builder().transport(Arc::new(transport))",
            )
        })
    }

    /// Validates timeouts and limits.
    fn validate_limits(&self) -> Result<()> {
        let options = &self.options;
        let timeouts = [
            ("call_timeout", options.call_timeout),
            ("connect_timeout", options.connect_timeout),
            ("agent_load_timeout", options.agent_load_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, timeout)| timeout.is_zero()) {
            return Err(Error::config(format!("{name} must be greater than zero")));
        }

        if options.max_pending_requests == 0 {
            return Err(Error::config(
                "max_pending_requests must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Validates that every enabled agent has what it depends on.
    fn validate_agents(&self) -> Result<()> {
        let agents = self.options.agents_to_load();
        if agents.contains(&AgentKind::Dom) {
            return Ok(());
        }

        match agents
            .iter()
            .find(|kind| matches!(kind, AgentKind::Edit | AgentKind::Highlight))
        {
            Some(kind) => Err(Error::config(format!(
                "The {kind} agent needs the dom agent. Enable it or drop {kind}."
            ))),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::MemoryTransport;

    fn transport() -> Arc<dyn Transport> {
        let (transport, _peer) = MemoryTransport::pair();
        Arc::new(transport)
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = SessionBuilder::new();
        assert!(builder.transport.is_none());
        assert!(builder.server.is_none());
        assert_eq!(builder.options, LiveDevOptions::default());
    }

    #[test]
    fn test_build_fails_without_transport() {
        let err = SessionBuilder::new().build().expect_err("no transport");
        assert!(err.to_string().contains("Transport"));
    }

    #[test]
    fn test_build_fails_with_zero_timeout() {
        let err = SessionBuilder::new()
            .transport(transport())
            .connect_timeout(Duration::ZERO)
            .build()
            .expect_err("zero timeout");
        assert!(err.to_string().contains("connect_timeout"));
    }

    #[test]
    fn test_build_fails_with_zero_pending_cap() {
        let err = SessionBuilder::new()
            .transport(transport())
            .options(LiveDevOptions::new().with_max_pending_requests(0))
            .build()
            .expect_err("zero cap");
        assert!(err.to_string().contains("max_pending_requests"));
    }

    #[test]
    fn test_edit_requires_dom() {
        let err = SessionBuilder::new()
            .transport(transport())
            .agents([AgentKind::Css, AgentKind::Edit])
            .build()
            .expect_err("edit without dom");
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("edit"));
    }

    #[test]
    fn test_highlight_off_does_not_need_dom() {
        let session = SessionBuilder::new()
            .transport(transport())
            .agents([AgentKind::Css, AgentKind::Highlight])
            .highlight(false)
            .build();
        assert!(session.is_ok());
    }

    #[test]
    fn test_build_without_launcher() {
        let session = SessionBuilder::new()
            .transport(transport())
            .build()
            .expect("build");
        assert!(session.launcher().is_none());
    }
}
