//! Console mirror.
//!
//! Re-logs messages from the live page's console through `tracing` under
//! the `livedev::console` target.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::protocol::{Command, ConsoleCommand, ConsoleMessage, EventKind, ParsedEvent};

use super::{Agent, AgentContext, AgentKind, Listeners};

#[derive(Default)]
struct State {
    last: Mutex<Option<ConsoleMessage>>,
    mirrored: AtomicU64,
}

impl State {
    fn log(&self, message: &ConsoleMessage) {
        let (text, url, line) = (&message.text, &message.url, message.line);
        match message.level.as_str() {
            "error" => error!(target: "livedev::console", url = %url, line, "{text}"),
            "warn" => warn!(target: "livedev::console", url = %url, line, "{text}"),
            "debug" => debug!(target: "livedev::console", url = %url, line, "{text}"),
            _ => info!(target: "livedev::console", url = %url, line, "{text}"),
        }
        self.mirrored.fetch_add(1, Ordering::Relaxed);
    }
}

/// Normalizes remote severity names: `warning` becomes `warn`.
fn normalize(mut message: ConsoleMessage) -> ConsoleMessage {
    if message.level == "warning" {
        message.level = "warn".to_string();
    }
    message
}

/// Mirrors the live page's console.
pub struct ConsoleAgent {
    ctx: AgentContext,
    state: Arc<State>,
    listeners: Listeners,
    loaded: AtomicBool,
}

impl ConsoleAgent {
    /// Creates an unloaded agent.
    #[must_use]
    pub fn new(ctx: AgentContext) -> Self {
        Self {
            ctx,
            state: Arc::new(State::default()),
            listeners: Listeners::default(),
            loaded: AtomicBool::new(false),
        }
    }

    /// Returns the most recent message, with its level normalized.
    #[must_use]
    pub fn last_message(&self) -> Option<ConsoleMessage> {
        self.state.last.lock().clone()
    }

    /// Returns how many lines were logged, repeats included.
    #[inline]
    #[must_use]
    pub fn mirrored_count(&self) -> u64 {
        self.state.mirrored.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Agent for ConsoleAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Console
    }

    async fn load(&self) -> Result<()> {
        let inspector = self.ctx.inspector();

        let state = Arc::clone(&self.state);
        self.listeners
            .on(inspector, EventKind::ConsoleMessageAdded, move |event| {
                if let ParsedEvent::ConsoleMessageAdded { message } = event.parse() {
                    let message = normalize(message);
                    state.log(&message);
                    *state.last.lock() = Some(message);
                }
            });

        let state = Arc::clone(&self.state);
        self.listeners.on(
            inspector,
            EventKind::ConsoleMessageRepeatCountUpdated,
            move |_| {
                let last = state.last.lock().clone();
                if let Some(message) = last {
                    state.log(&message);
                }
            },
        );

        let state = Arc::clone(&self.state);
        self.listeners
            .on(inspector, EventKind::ConsoleMessagesCleared, move |_| {
                state.last.lock().take();
            });

        if let Err(e) = inspector.send(&Command::Console(ConsoleCommand::Enable)).await {
            self.listeners.clear(inspector);
            return Err(e);
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unload(&self) {
        self.listeners.clear(self.ctx.inspector());
        self.state.last.lock().take();
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}
