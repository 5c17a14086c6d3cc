//! DOM mirror and source mapping.
//!
//! The agent keeps a tree of every node the live page reported, follows
//! insertions and removals, and maps the tree onto the document source so
//! editor offsets can be turned into node ids and back.
//!
//! # Load
//!
//! ```text
//! DOM.getDocument ──► tree from root
//!        │
//!        ├─► DOM.requestChildNodes for each collapsed node
//!        │        └─► DOM.setChildNodes events fill the tree
//!        │
//!        └─► once no requests are outstanding: read source, map tree
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::NodeId;
use crate::protocol::{Command, DomCommand, EventKind, NodePayload, PageCommand, ParsedEvent};

use super::{Agent, AgentContext, AgentKind, Listeners};

// ============================================================================
// Submodules
// ============================================================================

/// Mirror tree.
pub mod node;

/// HTML source scanner.
pub mod source;

pub use node::DomNode;
use node::DomTree;
pub use source::each_node;

// ============================================================================
// Helpers
// ============================================================================

/// Strips the fragment from `url`.
fn clean_url(url: &str) -> String {
    url.split('#').next().unwrap_or(url).to_string()
}

// ============================================================================
// Shared State
// ============================================================================

#[derive(Default)]
struct State {
    tree: DomTree,
    url: Option<String>,
}

struct Shared {
    ctx: AgentContext,
    state: Mutex<State>,
    /// Child requests the current load is still waiting on.
    pending: watch::Sender<usize>,
    loaded: AtomicBool,
    /// Bumped by every refresh and by `unload`; a refresh only commits
    /// while its ticket is current.
    generation: AtomicU64,
}

impl Shared {
    fn ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    /// Asks for the children of `ids`. With `track`, the answers count
    /// towards the initial load.
    fn request_children(self: &Arc<Self>, ids: Vec<NodeId>, track: bool) {
        if ids.is_empty() {
            return;
        }
        if track {
            self.pending.send_modify(|pending| *pending += ids.len());
        }
        let weak = self.ctx.inspector().downgrade();
        let shared = Arc::downgrade(self);
        tokio::spawn(async move {
            for node_id in ids {
                let Some(inspector) = weak.upgrade() else {
                    return;
                };
                let command = Command::Dom(DomCommand::RequestChildNodes { node_id });
                if let Err(e) = inspector.send(&command).await {
                    warn!(node_id = %node_id, error = %e, "Failed to request child nodes");
                    if track {
                        if let Some(shared) = shared.upgrade() {
                            shared.child_request_done();
                        }
                    }
                }
            }
        });
    }

    fn child_request_done(&self) {
        self.pending
            .send_modify(|pending| *pending = pending.saturating_sub(1));
    }

    fn on_event(self: &Arc<Self>, event: ParsedEvent) {
        match event {
            ParsedEvent::PageFrameNavigated { frame } if frame.parent_id.is_none() => {
                self.state.lock().url = Some(clean_url(&frame.url));
            }
            ParsedEvent::PageLoadEventFired { .. } => {
                if !self.loaded.load(Ordering::SeqCst) {
                    return;
                }
                let shared = Arc::clone(self);
                let ticket = self.ticket();
                tokio::spawn(async move {
                    if let Err(e) = shared.refresh(ticket).await {
                        warn!(error = %e, "Failed to refresh document after load");
                    }
                });
            }
            ParsedEvent::DomSetChildNodes { parent_id, nodes } => {
                let requests = self.state.lock().tree.set_children(parent_id, &nodes);
                match requests {
                    Some(requests) => self.request_children(requests, true),
                    None => debug!(parent_id = %parent_id, "Children for unknown node"),
                }
                self.child_request_done();
            }
            ParsedEvent::DomChildNodeCountUpdated { node_id, .. } => {
                let known = self.state.lock().tree.get(node_id).is_some();
                if known {
                    self.request_children(vec![node_id], false);
                }
            }
            ParsedEvent::DomChildNodeInserted {
                parent_node_id,
                previous_node_id,
                node,
            } => {
                if !node.node_id.is_tracked() {
                    return;
                }
                let requests = self
                    .state
                    .lock()
                    .tree
                    .insert_after(parent_node_id, previous_node_id, &node);
                if let Some(requests) = requests {
                    self.request_children(requests, false);
                }
            }
            ParsedEvent::DomChildNodeRemoved { node_id, .. } => {
                if node_id.is_tracked() {
                    self.state.lock().tree.remove(node_id);
                }
            }
            _ => {}
        }
    }

    /// Fetches the document, waits for collapsed children, then maps the
    /// tree onto the source.
    async fn refresh(self: &Arc<Self>, ticket: u64) -> Result<()> {
        let inspector = self.ctx.inspector();
        let result = inspector.send(&Command::Dom(DomCommand::GetDocument)).await?;

        let Some(root) = result.get("root") else {
            debug!("Document has no root");
            let mut state = self.state.lock();
            if self.is_current(ticket) {
                state.tree = DomTree::default();
                self.pending.send_replace(0);
            }
            return Ok(());
        };
        let root: NodePayload = serde_json::from_value(root.clone())?;
        let document_url = result["root"]
            .get("documentURL")
            .and_then(Value::as_str)
            .map(clean_url);

        let (tree, requests) = DomTree::from_root(&root);
        {
            let mut state = self.state.lock();
            if !self.is_current(ticket) {
                debug!("Discarding superseded document");
                return Ok(());
            }
            state.tree = tree;
            if state.url.is_none() {
                state.url = document_url;
            }
        }
        self.pending.send_replace(0);
        self.request_children(requests, true);

        let mut pending = self.pending.subscribe();
        let wait = inspector.config().call_timeout;
        if timeout(wait, pending.wait_for(|count| *count == 0))
            .await
            .is_err()
        {
            warn!(
                pending = *self.pending.borrow(),
                "Timed out waiting for child nodes"
            );
        }

        let url = self.state.lock().url.clone();
        let Some(url) = url else {
            return Ok(());
        };
        if let Some(source) = self.ctx.read_source(&url).await? {
            let mut state = self.state.lock();
            if self.is_current(ticket) {
                state.tree.map_to_source(&source);
            }
        }
        Ok(())
    }
}

// ============================================================================
// DomAgent
// ============================================================================

/// Mirrors the live page's DOM.
pub struct DomAgent {
    shared: Arc<Shared>,
    listeners: Listeners,
}

impl DomAgent {
    /// Creates an unloaded agent.
    #[must_use]
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            shared: Arc::new(Shared {
                ctx,
                state: Mutex::new(State::default()),
                pending: watch::channel(0).0,
                loaded: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
            listeners: Listeners::default(),
        }
    }

    /// Returns the URL of the mirrored document.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.shared.state.lock().url.clone()
    }

    /// Returns the document node.
    #[must_use]
    pub fn root(&self) -> Option<DomNode> {
        self.shared.state.lock().tree.root().cloned()
    }

    /// Returns the node with `node_id`.
    #[must_use]
    pub fn node_with_id(&self, node_id: NodeId) -> Option<DomNode> {
        self.shared.state.lock().tree.get(node_id).cloned()
    }

    /// Returns the number of mirrored nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.shared.state.lock().tree.len()
    }

    /// Returns the innermost node whose own source contains `location`.
    #[must_use]
    pub fn node_at_location(&self, location: usize) -> Option<DomNode> {
        self.shared
            .state
            .lock()
            .tree
            .node_at_location(location)
            .cloned()
    }

    /// Returns every element enclosing `location`, outermost first.
    #[must_use]
    pub fn all_nodes_at_location(&self, location: usize) -> Vec<DomNode> {
        self.shared
            .state
            .lock()
            .tree
            .all_nodes_at_location(location)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Returns the mapped node starting last at or before `location`.
    #[must_use]
    pub fn node_before_location(&self, location: usize) -> Option<DomNode> {
        self.shared
            .state
            .lock()
            .tree
            .node_before_location(location)
            .cloned()
    }

    /// Maps the tree onto `source`.
    pub fn map_to_source(&self, source: &str) {
        self.shared.state.lock().tree.map_to_source(source);
    }

    /// Applies a source edit replacing `[from, to)` with `text` and pushes
    /// the new value of the edited text node to the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotLoaded`] before `load()`, or the
    /// `DOM.setNodeValue` call's error.
    pub async fn apply_change(&self, from: usize, to: usize, text: &str) -> Result<()> {
        if !self.is_loaded() {
            return Err(Error::AgentNotLoaded { agent: "dom" });
        }
        let update = self.shared.state.lock().tree.apply_change(from, to, text);
        let Some((node_id, value)) = update else {
            return Ok(());
        };
        self.shared
            .ctx
            .inspector()
            .send(&Command::Dom(DomCommand::SetNodeValue { node_id, value }))
            .await
            .map(drop)
    }

    /// Records an edit that already happened in the page, without pushing
    /// it back.
    pub(crate) fn record_remote_edit(&self, from: usize, to: usize, text: &str) {
        self.shared.state.lock().tree.apply_change(from, to, text);
    }

    /// Re-fetches the document.
    ///
    /// # Errors
    ///
    /// Returns the `DOM.getDocument` call's error or the source read error.
    pub async fn refresh(&self) -> Result<()> {
        let ticket = self.shared.ticket();
        self.shared.refresh(ticket).await
    }
}

#[async_trait]
impl Agent for DomAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Dom
    }

    async fn load(&self) -> Result<()> {
        let inspector = self.shared.ctx.inspector();
        for kind in [
            EventKind::PageFrameNavigated,
            EventKind::PageLoadEventFired,
            EventKind::DomSetChildNodes,
            EventKind::DomChildNodeCountUpdated,
            EventKind::DomChildNodeInserted,
            EventKind::DomChildNodeRemoved,
        ] {
            let shared: Weak<Shared> = Arc::downgrade(&self.shared);
            self.listeners.on(inspector, kind, move |event| {
                if let Some(shared) = shared.upgrade() {
                    shared.on_event(event.parse());
                }
            });
        }

        let loaded = async {
            inspector.send(&Command::Page(PageCommand::Enable)).await?;
            let ticket = self.shared.ticket();
            self.shared.refresh(ticket).await
        }
        .await;

        if let Err(e) = loaded {
            self.unload();
            return Err(e);
        }
        self.shared.loaded.store(true, Ordering::SeqCst);
        debug!(nodes = self.node_count(), "DOM agent loaded");
        Ok(())
    }

    fn unload(&self) {
        self.listeners.clear(self.shared.ctx.inspector());
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        *self.shared.state.lock() = State::default();
        self.shared.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.shared.loaded.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================
