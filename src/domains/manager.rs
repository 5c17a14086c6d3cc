//! Domain registry and dispatch.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Handlers
// ============================================================================

/// Synchronous command handler.
pub type SyncHandler = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Asynchronous command handler.
pub type AsyncHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// A registered command implementation.
#[derive(Clone)]
pub enum CommandHandler {
    /// Runs to completion inside `execute_command`.
    Sync(SyncHandler),
    /// Returns a future that `execute_command` awaits.
    Async(AsyncHandler),
}

impl CommandHandler {
    /// Wraps a synchronous handler.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wraps an asynchronous handler.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |params| Box::pin(f(params))))
    }

    /// Returns `true` for asynchronous handlers.
    #[inline]
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    async fn run(&self, params: Value) -> Result<Value> {
        match self {
            Self::Sync(f) => f(params),
            Self::Async(f) => f(params).await,
        }
    }
}

impl fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_async() { "Async(..)" } else { "Sync(..)" })
    }
}

// ============================================================================
// CommandSpec
// ============================================================================

/// Self-description of a command, reported by
/// [`DomainManager::domain_descriptions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandSpec {
    /// Human readable description.
    pub description: Option<String>,
    /// Parameter descriptions.
    pub parameters: Value,
    /// Result description.
    pub returns: Value,
}

impl CommandSpec {
    /// Creates a spec with a description.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            parameters: Value::Null,
            returns: Value::Null,
        }
    }

    /// Sets the parameter descriptions.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the result description.
    #[must_use]
    pub fn with_returns(mut self, returns: Value) -> Self {
        self.returns = returns;
        self
    }
}

// ============================================================================
// DomainEvent
// ============================================================================

/// An event emitted through a domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    /// Monotonic event number, starting at 1.
    pub id: u64,
    /// Domain name.
    pub domain: String,
    /// Event name.
    pub event: String,
    /// Event parameters.
    pub parameters: Value,
}

// ============================================================================
// DomainManager
// ============================================================================

#[derive(Default)]
struct DomainEntry {
    version: Option<String>,
    commands: BTreeMap<String, CommandEntry>,
    events: BTreeMap<String, Value>,
}

struct CommandEntry {
    handler: CommandHandler,
    spec: CommandSpec,
}

/// Registry of native domains, their commands and events.
pub struct DomainManager {
    domains: Mutex<BTreeMap<String, DomainEntry>>,
    event_count: AtomicU64,
    events: broadcast::Sender<DomainEvent>,
}

impl Default for DomainManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DomainManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let domains: Vec<String> = self.domains.lock().keys().cloned().collect();
        f.debug_struct("DomainManager")
            .field("domains", &domains)
            .finish_non_exhaustive()
    }
}

impl DomainManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            domains: Mutex::new(BTreeMap::new()),
            event_count: AtomicU64::new(1),
            events,
        }
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn has_domain(&self, name: &str) -> bool {
        self.domains.lock().contains_key(name)
    }

    /// Registers a domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DomainConflict`] if `name` is already registered.
    pub fn register_domain(&self, name: &str, version: Option<&str>) -> Result<()> {
        let mut domains = self.domains.lock();
        if domains.contains_key(name) {
            error!(domain = name, "Domain already registered");
            return Err(Error::DomainConflict {
                name: name.to_string(),
            });
        }

        domains.insert(
            name.to_string(),
            DomainEntry {
                version: version.map(str::to_string),
                ..DomainEntry::default()
            },
        );
        debug!(domain = name, version, "Domain registered");
        Ok(())
    }

    /// Registers a command, creating the domain if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandConflict`] if the command already exists.
    pub fn register_command(
        &self,
        domain: &str,
        command: &str,
        handler: CommandHandler,
        spec: CommandSpec,
    ) -> Result<()> {
        let mut domains = self.domains.lock();
        let entry = domains.entry(domain.to_string()).or_default();
        if entry.commands.contains_key(command) {
            return Err(Error::CommandConflict {
                command: format!("{domain}.{command}"),
            });
        }

        entry
            .commands
            .insert(command.to_string(), CommandEntry { handler, spec });
        debug!(domain, command, "Command registered");
        Ok(())
    }

    /// Runs `domain.command` with `params`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] for unregistered commands, or the
    /// handler's error.
    pub async fn execute_command(&self, domain: &str, command: &str, params: Value) -> Result<Value> {
        let handler = {
            let domains = self.domains.lock();
            domains
                .get(domain)
                .and_then(|d| d.commands.get(command))
                .map(|c| c.handler.clone())
        };

        let Some(handler) = handler else {
            warn!(domain, command, "No such command");
            return Err(Error::unknown_command(domain, command));
        };

        trace!(domain, command, "Executing command");
        handler.run(params).await
    }

    /// Declares an event, creating the domain if needed. Returns `false` if
    /// it was already declared.
    pub fn register_event(&self, domain: &str, event: &str, parameters: Value) -> bool {
        let mut domains = self.domains.lock();
        let entry = domains.entry(domain.to_string()).or_default();
        if entry.events.contains_key(event) {
            error!(domain, event, "Event already registered");
            return false;
        }
        entry.events.insert(event.to_string(), parameters);
        true
    }

    /// Broadcasts a declared event to all subscribers, returning its number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCommand`] if the event was never declared.
    pub fn emit_event(&self, domain: &str, event: &str, parameters: Value) -> Result<u64> {
        let declared = self
            .domains
            .lock()
            .get(domain)
            .is_some_and(|d| d.events.contains_key(event));
        if !declared {
            error!(domain, event, "No such event");
            return Err(Error::unknown_command(domain, event));
        }

        let id = self.event_count.fetch_add(1, Ordering::SeqCst);
        // No subscribers is fine.
        let _ = self.events.send(DomainEvent {
            id,
            domain: domain.to_string(),
            event: event.to_string(),
            parameters,
        });
        trace!(id, domain, event, "Event emitted");
        Ok(id)
    }

    /// Subscribes to emitted events.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    /// Describes every domain with its commands and events.
    #[must_use]
    pub fn domain_descriptions(&self) -> Value {
        let domains = self.domains.lock();
        let described: Vec<Value> = domains
            .iter()
            .map(|(name, domain)| {
                let commands: Vec<Value> = domain
                    .commands
                    .iter()
                    .map(|(command, entry)| {
                        json!({
                            "name": command,
                            "description": entry.spec.description,
                            "parameters": entry.spec.parameters,
                            "returns": entry.spec.returns,
                        })
                    })
                    .collect();
                let events: Vec<Value> = domain
                    .events
                    .iter()
                    .map(|(event, parameters)| json!({ "name": event, "parameters": parameters }))
                    .collect();
                json!({
                    "domain": name,
                    "version": domain.version,
                    "commands": commands,
                    "events": events,
                })
            })
            .collect();
        Value::Array(described)
    }
}

// ============================================================================
// Tests
// ============================================================================
