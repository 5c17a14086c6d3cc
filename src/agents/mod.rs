//! Agents: session-scoped mirrors of live page state.
//!
//! Each agent subscribes to a slice of protocol events on `load()`, fetches
//! the current state, and keeps a private cache that `unload()` discards.
//! Agents never touch another agent's cache; where one needs another's
//! data it goes through that agent's public queries.
//!
//! # Modules
//!
//! | Module | Cache | Queries / mutations |
//! |--------|-------|---------------------|
//! | `css` | URL → style sheet header | `style_for_url`, `reload_document` |
//! | `network` | requested URLs | `was_url_requested` |
//! | `console` | last console message | `last_message` |
//! | `dom` | node tree keyed by node id | `node_with_id`, `node_at_location`, `apply_change` |
//! | `highlight` | active highlight target | `node`, `rule`, `hide` |
//! | `edit` | none | applies remote text edits to the document |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::identifiers::SubscriptionId;
use crate::inspector::Inspector;
use crate::protocol::{Event, EventKind, HighlightConfig};
use crate::server::UrlMapper;

// ============================================================================
// Submodules
// ============================================================================

/// Console mirror.
pub mod console;

/// Style sheet tracker.
pub mod css;

/// DOM tree mirror and source mapping.
pub mod dom;

/// Remote text edits.
pub mod edit;

/// Highlight target tracker.
pub mod highlight;

/// Requested URL tracker.
pub mod network;

// ============================================================================
// Re-exports
// ============================================================================

pub use console::ConsoleAgent;
pub use css::CssAgent;
pub use dom::{DomAgent, DomNode};
pub use edit::{EditAgent, TextEdit, compute_diff};
pub use highlight::{HighlightAgent, HighlightTarget};
pub use network::NetworkAgent;

// ============================================================================
// AgentKind
// ============================================================================

/// The six agents a session can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentKind {
    /// [`DomAgent`]
    Dom,
    /// [`CssAgent`]
    Css,
    /// [`NetworkAgent`]
    Network,
    /// [`ConsoleAgent`]
    Console,
    /// [`HighlightAgent`]
    Highlight,
    /// [`EditAgent`]
    Edit,
}

impl AgentKind {
    /// Every kind, in load order.
    pub const ALL: [Self; 6] = [
        Self::Dom,
        Self::Css,
        Self::Network,
        Self::Console,
        Self::Highlight,
        Self::Edit,
    ];

    /// Returns the lowercase agent name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Dom => "dom",
            Self::Css => "css",
            Self::Network => "network",
            Self::Console => "console",
            Self::Highlight => "highlight",
            Self::Edit => "edit",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::config(format!("unknown agent: {s}")))
    }
}

// ============================================================================
// Agent
// ============================================================================

/// A session-scoped state tracker.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Which agent this is.
    fn kind(&self) -> AgentKind;

    /// Subscribes to events and performs the initial state fetch.
    ///
    /// Caches are populated once the returned future resolves.
    async fn load(&self) -> Result<()>;

    /// Unsubscribes and discards cached state.
    fn unload(&self);

    /// Returns `true` between `load()` and `unload()`.
    fn is_loaded(&self) -> bool;
}

// ============================================================================
// AgentContext
// ============================================================================

/// Where agents read the source text of served documents from.
#[derive(Clone)]
pub struct SourceAccess {
    mapper: Arc<dyn UrlMapper>,
    fs: Arc<dyn FileSystem>,
}

impl SourceAccess {
    /// Maps URLs through `mapper` and reads through `fs`.
    #[must_use]
    pub fn new(mapper: Arc<dyn UrlMapper>, fs: Arc<dyn FileSystem>) -> Self {
        Self { mapper, fs }
    }

    /// Reads the source behind `url`. Returns `None` if the URL is not
    /// mapped to a project path.
    ///
    /// # Errors
    ///
    /// Returns the file system's read error.
    pub async fn read(&self, url: &str) -> Result<Option<String>> {
        let path = self
            .mapper
            .url_to_path(url)
            .or_else(|| url.starts_with('/').then(|| url.to_string()));
        match path {
            Some(path) => self.fs.read_file(&path).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Per-session state shared by every agent.
///
/// Replaces process-wide agent state: two sessions never share caches.
#[derive(Clone)]
pub struct AgentContext {
    inspector: Inspector,
    highlight_config: HighlightConfig,
    sources: Option<SourceAccess>,
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("inspector", &self.inspector)
            .field("highlight_config", &self.highlight_config)
            .field("sources", &self.sources.is_some())
            .finish()
    }
}

impl AgentContext {
    /// Creates a context around `inspector`.
    #[must_use]
    pub fn new(inspector: Inspector) -> Self {
        Self {
            inspector,
            highlight_config: HighlightConfig::default(),
            sources: None,
        }
    }

    /// Sets the highlight colors.
    #[must_use]
    pub fn with_highlight_config(mut self, config: HighlightConfig) -> Self {
        self.highlight_config = config;
        self
    }

    /// Lets the DOM agent read document sources.
    #[must_use]
    pub fn with_sources(mut self, sources: SourceAccess) -> Self {
        self.sources = Some(sources);
        self
    }

    #[inline]
    #[must_use]
    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    #[inline]
    #[must_use]
    pub fn highlight_config(&self) -> HighlightConfig {
        self.highlight_config
    }

    /// Reads the source behind `url`, if sources are configured and the
    /// URL maps to a file.
    ///
    /// # Errors
    ///
    /// Returns the file system's read error.
    pub async fn read_source(&self, url: &str) -> Result<Option<String>> {
        match &self.sources {
            Some(sources) => sources.read(url).await,
            None => Ok(None),
        }
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Subscriptions one agent holds, removed together on unload.
#[derive(Default)]
pub(crate) struct Listeners {
    ids: Mutex<Vec<(EventKind, SubscriptionId)>>,
}

impl Listeners {
    pub(crate) fn on(
        &self,
        inspector: &Inspector,
        kind: EventKind,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) {
        let id = inspector.on(kind.clone(), handler);
        self.ids.lock().push((kind, id));
    }

    pub(crate) fn clear(&self, inspector: &Inspector) {
        for (kind, id) in self.ids.lock().drain(..) {
            inspector.off(kind, id);
        }
    }
}

// ============================================================================
// Agents
// ============================================================================

/// One instance of every agent, wired to each other's public queries.
#[derive(Clone)]
pub struct Agents {
    /// DOM mirror.
    pub dom: Arc<DomAgent>,
    /// Style sheets.
    pub css: Arc<CssAgent>,
    /// Requested URLs.
    pub network: Arc<NetworkAgent>,
    /// Console mirror.
    pub console: Arc<ConsoleAgent>,
    /// Highlight target.
    pub highlight: Arc<HighlightAgent>,
    /// Remote edits.
    pub edit: Arc<EditAgent>,
}

impl Agents {
    /// Creates every agent for one session.
    #[must_use]
    pub fn new(ctx: &AgentContext) -> Self {
        let dom = Arc::new(DomAgent::new(ctx.clone()));
        Self {
            css: Arc::new(CssAgent::new(ctx.clone())),
            network: Arc::new(NetworkAgent::new(ctx.clone())),
            console: Arc::new(ConsoleAgent::new(ctx.clone())),
            highlight: Arc::new(HighlightAgent::new(ctx.clone(), Arc::clone(&dom))),
            edit: Arc::new(EditAgent::new(ctx.clone(), Arc::clone(&dom))),
            dom,
        }
    }

    /// Returns the agent of `kind`.
    #[must_use]
    pub fn get(&self, kind: AgentKind) -> Arc<dyn Agent> {
        match kind {
            AgentKind::Dom => self.dom.clone(),
            AgentKind::Css => self.css.clone(),
            AgentKind::Network => self.network.clone(),
            AgentKind::Console => self.console.clone(),
            AgentKind::Highlight => self.highlight.clone(),
            AgentKind::Edit => self.edit.clone(),
        }
    }

    /// Unloads every agent, including ones whose load was abandoned
    /// part way.
    pub fn unload_all(&self) {
        for kind in AgentKind::ALL {
            self.get(kind).unload();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
