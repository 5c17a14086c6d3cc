//! Live-development session options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use livedev_bridge::agents::AgentKind;
//! use livedev_bridge::session::LiveDevOptions;
//!
//! let options = LiveDevOptions::new()
//!     .with_call_timeout(Duration::from_secs(2))
//!     .without_agent(AgentKind::Network)
//!     .with_highlight(false);
//!
//! assert!(!options.agents_to_load().contains(&AgentKind::Highlight));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use crate::agents::AgentKind;
use crate::inspector::{DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_PENDING, InspectorConfig};
use crate::protocol::HighlightConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default bound on waiting for the transport's connect callback.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on loading every agent.
pub const DEFAULT_AGENT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// LiveDevOptions
// ============================================================================

/// Timeouts, limits and agent selection for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveDevOptions {
    /// Per-call protocol timeout.
    pub call_timeout: Duration,

    /// How long `open()` waits for the logical connection.
    pub connect_timeout: Duration,

    /// Bound on loading all agents.
    pub agent_load_timeout: Duration,

    /// Cap on calls awaiting a response.
    pub max_pending_requests: usize,

    /// Agents loaded by the next `load_agents()`.
    pub enabled_agents: BTreeSet<AgentKind>,

    /// Whether the highlight agent is loaded.
    pub highlight: bool,

    /// Highlight overlay colors.
    pub highlight_config: HighlightConfig,

    /// Whether saved documents reload the page automatically.
    pub auto_update: bool,
}

impl Default for LiveDevOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            agent_load_timeout: DEFAULT_AGENT_LOAD_TIMEOUT,
            max_pending_requests: DEFAULT_MAX_PENDING,
            enabled_agents: AgentKind::ALL.into_iter().collect(),
            highlight: true,
            highlight_config: HighlightConfig::default(),
            auto_update: true,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LiveDevOptions {
    /// Creates options with every default.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-call timeout.
    #[inline]
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the agent load timeout.
    #[inline]
    #[must_use]
    pub fn with_agent_load_timeout(mut self, timeout: Duration) -> Self {
        self.agent_load_timeout = timeout;
        self
    }

    /// Sets the pending call cap.
    #[inline]
    #[must_use]
    pub fn with_max_pending_requests(mut self, limit: usize) -> Self {
        self.max_pending_requests = limit;
        self
    }

    /// Replaces the enabled agent set.
    #[must_use]
    pub fn with_agents(mut self, agents: impl IntoIterator<Item = AgentKind>) -> Self {
        self.enabled_agents = agents.into_iter().collect();
        self
    }

    /// Removes one agent from the enabled set.
    #[inline]
    #[must_use]
    pub fn without_agent(mut self, agent: AgentKind) -> Self {
        self.enabled_agents.remove(&agent);
        self
    }

    /// Turns the highlight agent on or off.
    #[inline]
    #[must_use]
    pub fn with_highlight(mut self, enabled: bool) -> Self {
        self.highlight = enabled;
        self
    }

    /// Sets the highlight colors.
    #[inline]
    #[must_use]
    pub fn with_highlight_config(mut self, config: HighlightConfig) -> Self {
        self.highlight_config = config;
        self
    }

    /// Turns automatic reloads on or off.
    #[inline]
    #[must_use]
    pub fn with_auto_update(mut self, enabled: bool) -> Self {
        self.auto_update = enabled;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl LiveDevOptions {
    /// Returns the inspector limits these options imply.
    #[must_use]
    pub fn inspector_config(&self) -> InspectorConfig {
        InspectorConfig {
            call_timeout: self.call_timeout,
            max_pending: self.max_pending_requests,
        }
    }

    /// Returns the agents to load, in load order. The highlight agent is
    /// left out when highlighting is off.
    #[must_use]
    pub fn agents_to_load(&self) -> Vec<AgentKind> {
        self.enabled_agents
            .iter()
            .copied()
            .filter(|kind| self.highlight || *kind != AgentKind::Highlight)
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
