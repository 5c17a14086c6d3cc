//! Event subscriptions and connection notifications.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::identifiers::SubscriptionId;
use crate::protocol::{Event, EventKind};

// ============================================================================
// ConnectionEvent
// ============================================================================

/// Client-level notification about the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The transport reported a logical connection.
    Connected,
    /// The transport closed. Every pending call has been rejected.
    Disconnected(Option<String>),
    /// A message could not be parsed, or a call was answered with an error.
    Error(String),
    /// Raw inbound message, before dispatch.
    Message(String),
}

impl ConnectionEvent {
    /// Returns `true` for [`ConnectionEvent::Disconnected`].
    #[inline]
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

// ============================================================================
// Subscriptions
// ============================================================================

/// Protocol event handler.
pub type EventHandler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handlers keyed by event kind, in subscription order.
#[derive(Default)]
pub(crate) struct Subscriptions {
    handlers: Mutex<FxHashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>>,
}

impl Subscriptions {
    pub(crate) fn add(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.handlers.lock().entry(kind).or_default().push((id, handler));
        id
    }

    pub(crate) fn remove(&self, kind: &EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(kind);
        }
        removed
    }

    pub(crate) fn count(&self, kind: &EventKind) -> usize {
        self.handlers.lock().get(kind).map_or(0, Vec::len)
    }

    /// Handlers registered for `kind` at this instant.
    ///
    /// Dispatch iterates a snapshot: a handler removed while an event is
    /// being dispatched still receives that event, and one added during
    /// dispatch first sees the next event.
    pub(crate) fn snapshot(&self, kind: &EventKind) -> Vec<EventHandler> {
        self.handlers
            .lock()
            .get(kind)
            .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Subscriptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.lock();
        let mut map = f.debug_map();
        for (kind, list) in handlers.iter() {
            map.entry(&kind.method(), &list.len());
        }
        map.finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
