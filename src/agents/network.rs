//! Requested URL tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::Result;
use crate::protocol::{Command, EventKind, NetworkCommand, ParsedEvent};

use super::{Agent, AgentContext, AgentKind, Listeners};

/// Strips the query string from `url`.
fn without_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Records every URL the live page requests, query string removed.
///
/// Used to decide whether a saved file affects the page.
pub struct NetworkAgent {
    ctx: AgentContext,
    requested: Arc<Mutex<FxHashSet<String>>>,
    listeners: Listeners,
    loaded: AtomicBool,
}

impl NetworkAgent {
    /// Creates an unloaded agent.
    #[must_use]
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            requested: Arc::new(Mutex::new(FxHashSet::default())),
            listeners: Listeners::default(),
            loaded: AtomicBool::new(false),
        }
    }

    /// Returns `true` if the page requested exactly `url` (without its
    /// query string).
    #[must_use]
    pub fn was_url_requested(&self, url: &str) -> bool {
        self.requested.lock().contains(url)
    }

    /// Returns how many distinct URLs were requested.
    #[must_use]
    pub fn requested_count(&self) -> usize {
        self.requested.lock().len()
    }
}

#[async_trait]
impl Agent for NetworkAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Network
    }

    async fn load(&self) -> Result<()> {
        let inspector = self.ctx.inspector();
        let requested = Arc::clone(&self.requested);
        self.listeners
            .on(inspector, EventKind::NetworkRequestWillBeSent, move |event| {
                if let ParsedEvent::NetworkRequestWillBeSent { url, .. } = event.parse() {
                    trace!(url = %url, "Request will be sent");
                    requested.lock().insert(without_query(&url).to_string());
                }
            });

        if let Err(e) = inspector.send(&Command::Network(NetworkCommand::Enable)).await {
            self.listeners.clear(inspector);
            return Err(e);
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unload(&self) {
        self.listeners.clear(self.ctx.inspector());
        self.requested.lock().clear();
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}
