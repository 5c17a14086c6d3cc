//! Remote text edits.
//!
//! When a text node is edited inside the live page, the agent computes the
//! minimal changed span and applies it to the editor document at the
//! node's mapped source offset.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::document::Document;
use crate::error::Result;
use crate::identifiers::NodeId;
use crate::protocol::{EventKind, ParsedEvent};

use super::{Agent, AgentContext, AgentKind, DomAgent, Listeners};

// ============================================================================
// compute_diff
// ============================================================================

/// Replacement of the characters `[from, to)` with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// First changed character.
    pub from: usize,
    /// End of the replaced span in the old text.
    pub to: usize,
    /// Replacement.
    pub text: String,
}

impl TextEdit {
    /// Applies the edit to `old`.
    #[must_use]
    pub fn apply(&self, old: &str) -> String {
        old.chars()
            .take(self.from)
            .chain(self.text.chars())
            .chain(old.chars().skip(self.to))
            .collect()
    }
}

/// Computes the single span that turns `old` into `new`: the longest
/// common prefix and suffix are kept, the middle is replaced.
///
/// Returns `None` when the strings are equal. Offsets count characters.
///
/// # Example
///
/// ```
/// use livedev_bridge::agents::{TextEdit, compute_diff};
///
/// let edit = compute_diff("hello world", "hello brave world");
/// assert_eq!(edit, Some(TextEdit { from: 6, to: 6, text: "brave ".into() }));
/// ```
#[must_use]
pub fn compute_diff(old: &str, new: &str) -> Option<TextEdit> {
    if old == new {
        return None;
    }
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    Some(TextEdit {
        from: prefix,
        to: old.len() - suffix,
        text: new[prefix..new.len() - suffix].iter().collect(),
    })
}

// ============================================================================
// EditAgent
// ============================================================================

struct Shared {
    dom: Arc<DomAgent>,
    document: Mutex<Option<Arc<dyn Document>>>,
    editing: AtomicBool,
}

impl Shared {
    fn on_character_data(&self, node_id: NodeId, value: &str) {
        let Some(document) = self.document.lock().clone() else {
            return;
        };
        let Some(mut node) = self.dom.node_with_id(node_id) else {
            debug!(node_id = %node_id, "Edit for unknown node");
            return;
        };
        if node.is_element() {
            match node.children.first().and_then(|id| self.dom.node_with_id(*id)) {
                Some(child) if child.is_text() => node = child,
                _ => return,
            }
        }
        let Some(location) = node.location else {
            debug!(node_id = %node.node_id, "Edit for unmapped node");
            return;
        };
        let Some(edit) = compute_diff(&node.value, value) else {
            return;
        };

        let from = location + edit.from;
        let to = location + edit.to;
        trace!(node_id = %node.node_id, from, to, "Applying remote edit");

        self.editing.store(true, Ordering::SeqCst);
        document.replace_range(
            &edit.text,
            document.pos_from_index(from),
            document.pos_from_index(to),
        );
        self.dom.record_remote_edit(from, to, &edit.text);
        self.editing.store(false, Ordering::SeqCst);
    }
}

/// Applies text edits made in the live page to the editor document.
pub struct EditAgent {
    ctx: AgentContext,
    shared: Arc<Shared>,
    listeners: Listeners,
    loaded: AtomicBool,
}

impl EditAgent {
    /// Creates an unloaded agent that maps nodes through `dom`.
    #[must_use]
    pub fn new(ctx: AgentContext, dom: Arc<DomAgent>) -> Self {
        Self {
            ctx,
            shared: Arc::new(Shared {
                dom,
                document: Mutex::new(None),
                editing: AtomicBool::new(false),
            }),
            listeners: Listeners::default(),
            loaded: AtomicBool::new(false),
        }
    }

    /// Sets the document remote edits are applied to.
    pub fn set_document(&self, document: Option<Arc<dyn Document>>) {
        *self.shared.document.lock() = document;
    }

    /// Returns `true` while a remote edit is being written to the
    /// document.
    ///
    /// Change listeners use it to avoid echoing the edit back.
    #[inline]
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.shared.editing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for EditAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Edit
    }

    async fn load(&self) -> Result<()> {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.listeners.on(
            self.ctx.inspector(),
            EventKind::DomCharacterDataModified,
            move |event| {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                if let ParsedEvent::DomCharacterDataModified {
                    node_id,
                    character_data,
                } = event.parse()
                {
                    shared.on_character_data(node_id, &character_data);
                }
            },
        );
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unload(&self) {
        self.listeners.clear(self.ctx.inspector());
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================
