//! Live development session.
//!
//! A [`LiveSession`] owns one [`Inspector`] and one set of [`Agents`]. It
//! drives the connect → load agents → active lifecycle and reacts to the
//! page going away.
//!
//! ```text
//! Inactive ──open()──► Connecting ──► LoadingAgents ──► Active ◄──► OutOfSync
//!    ▲                     │               │               │
//!    │                     └──► Error ◄────┘               ├──► SyncError
//!    └────────── disconnect / close() ◄────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use futures_util::future::try_join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agents::{Agent, AgentContext, AgentKind, Agents, SourceAccess};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::inspector::{ConnectionEvent, DebuggerEndpoint, Inspector};
use crate::server::Launcher;
use crate::transport::Transport;

use super::builder::SessionBuilder;
use super::options::LiveDevOptions;

// ============================================================================
// Constants
// ============================================================================

/// Close reason published when the page disconnects.
pub const REASON_DISCONNECTED: &str = "disconnected";

/// Close reason published by [`LiveSession::close`].
pub const REASON_EXPLICIT_CLOSE: &str = "explicit_close";

// ============================================================================
// SessionStatus
// ============================================================================

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum SessionStatus {
    /// Connecting or loading agents failed.
    Error = -1,
    /// Not connected.
    Inactive = 0,
    /// Waiting for the page to connect.
    Connecting = 1,
    /// Connected, agents loading.
    LoadingAgents = 2,
    /// Agents loaded and in sync with the editor.
    Active = 3,
    /// The edited document cannot be pushed live until it is saved.
    OutOfSync = 4,
    /// A live edit failed.
    SyncError = 5,
}

impl SessionStatus {
    /// Returns the numeric status code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> i8 {
        self as i8
    }

    /// Returns `true` once agents are loaded, in sync or not.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        self.code() >= Self::Active.code()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Inactive => "inactive",
            Self::Connecting => "connecting",
            Self::LoadingAgents => "loading_agents",
            Self::Active => "active",
            Self::OutOfSync => "out_of_sync",
            Self::SyncError => "sync_error",
        };
        f.write_str(name)
    }
}

/// A status change and, for closes, why it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// New status.
    pub status: SessionStatus,
    /// Close reason, set when the session went inactive.
    pub reason: Option<String>,
}

/// What [`LiveSession::document_saved`] did with a saved document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    /// The live style sheet was replaced with the document's text.
    Pushed,
    /// The live page was reloaded.
    Reloaded,
    /// The live page does not use the document.
    Ignored,
}

// ============================================================================
// Inner
// ============================================================================

/// Outcome of an agent load, shared with callers that joined it.
type LoadOutcome = Option<std::result::Result<(), String>>;

struct Inner {
    inspector: Inspector,
    agents: Agents,
    launcher: Option<Arc<Launcher>>,
    options: Mutex<LiveDevOptions>,
    status: watch::Sender<StatusUpdate>,
    loading: Mutex<Option<watch::Receiver<LoadOutcome>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn set_status(&self, status: SessionStatus, reason: Option<&str>) {
        let previous = self.status.send_replace(StatusUpdate {
            status,
            reason: reason.map(str::to_string),
        });
        if previous.status != status {
            info!(from = %previous.status, to = %status, reason, "Session status changed");
        }
    }

    /// Moves `from` → `to` if the current status is one of `from`.
    fn transition(&self, from: &[SessionStatus], to: SessionStatus) -> bool {
        let changed = self.status.send_if_modified(|update| {
            if from.contains(&update.status) {
                update.status = to;
                update.reason = None;
                true
            } else {
                false
            }
        });
        if changed {
            debug!(status = %to, "Session status changed");
        }
        changed
    }

    async fn load_enabled(&self) -> Result<()> {
        self.set_status(SessionStatus::LoadingAgents, None);
        let (kinds, timeout) = {
            let options = self.options.lock();
            (options.agents_to_load(), options.agent_load_timeout)
        };
        debug!(agents = ?kinds, "Loading agents");

        let loads = kinds.iter().map(|kind| {
            let agent = self.agents.get(*kind);
            let kind = *kind;
            async move {
                agent.load().await.inspect_err(|e| {
                    warn!(agent = %kind, error = %e, "Agent failed to load");
                })
            }
        });

        let result = match tokio::time::timeout(timeout, try_join_all(loads)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::connection(format!(
                "agents did not load within {}ms",
                timeout.as_millis()
            ))),
        };

        match result {
            Ok(()) => {
                self.set_status(SessionStatus::Active, None);
                Ok(())
            }
            Err(e) => {
                self.agents.unload_all();
                self.set_status(SessionStatus::Error, None);
                Err(e)
            }
        }
    }

    fn handle_disconnect(&self, reason: Option<String>) {
        info!(reason = reason.as_deref(), "Live page disconnected");
        self.agents.unload_all();
        self.set_status(SessionStatus::Inactive, Some(REASON_DISCONNECTED));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.get_mut().take() {
            watcher.abort();
        }
    }
}

/// Clears the in-flight load slot when the load that owns it ends, even
/// if its future is dropped.
struct LoadGuard<'a>(&'a Inner);

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        self.0.loading.lock().take();
    }
}

// ============================================================================
// LiveSession
// ============================================================================

/// One live development session.
///
/// Cheap to clone; clones share the same connection and agents.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use livedev_bridge::session::LiveSession;
/// use livedev_bridge::transport::WebSocketTransport;
///
/// # async fn example() -> livedev_bridge::Result<()> {
/// let session = LiveSession::builder()
///     .transport(Arc::new(WebSocketTransport::new()))
///     .build()?;
///
/// session.open("ws://127.0.0.1:9222/devtools/page/1").await?;
/// assert!(session.status().is_active());
/// session.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LiveSession {
    inner: Arc<Inner>,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("status", &self.status())
            .field("inspector", &self.inner.inspector)
            .field("launcher", &self.inner.launcher.is_some())
            .finish_non_exhaustive()
    }
}

impl LiveSession {
    /// Creates a configuration builder for a session.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        options: LiveDevOptions,
        launcher: Option<Arc<Launcher>>,
        sources: Option<SourceAccess>,
    ) -> Self {
        let inspector = Inspector::new(transport, options.inspector_config());
        let mut ctx =
            AgentContext::new(inspector.clone()).with_highlight_config(options.highlight_config);
        if let Some(sources) = sources {
            ctx = ctx.with_sources(sources);
        }
        let (status, _) = watch::channel(StatusUpdate {
            status: SessionStatus::Inactive,
            reason: None,
        });

        Self {
            inner: Arc::new(Inner {
                agents: Agents::new(&ctx),
                inspector,
                launcher,
                options: Mutex::new(options),
                status,
                loading: Mutex::new(None),
                watcher: Mutex::new(None),
            }),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn inspector(&self) -> &Inspector {
        &self.inner.inspector
    }

    #[inline]
    #[must_use]
    pub fn agents(&self) -> &Agents {
        &self.inner.agents
    }

    /// Returns the launcher, if the session was built with one.
    #[inline]
    #[must_use]
    pub fn launcher(&self) -> Option<&Arc<Launcher>> {
        self.inner.launcher.as_ref()
    }

    /// Returns a copy of the current options.
    #[must_use]
    pub fn options(&self) -> LiveDevOptions {
        self.inner.options.lock().clone()
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().status
    }

    /// Returns the latest status update, including its reason.
    #[must_use]
    pub fn status_update(&self) -> StatusUpdate {
        self.inner.status.borrow().clone()
    }

    /// Subscribes to status changes.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<StatusUpdate> {
        self.inner.status.subscribe()
    }

    /// Returns `true` while agents are being loaded.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.loading.lock().is_some()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connects to the live page at `url` and loads the enabled agents.
    ///
    /// # Errors
    ///
    /// - the server's start error
    /// - the transport's connection error
    /// - [`Error::ConnectionTimeout`] if the page does not connect within
    ///   `connect_timeout`
    /// - the first agent load error (see [`load_agents`](Self::load_agents))
    pub async fn open(&self, url: &str) -> Result<()> {
        info!(url, "Opening live session");
        self.inner.set_status(SessionStatus::Connecting, None);

        if let Err(e) = self.connect(url).await {
            self.inner.set_status(SessionStatus::Error, None);
            return Err(e);
        }

        self.load_agents().await
    }

    /// Looks up the live page whose URL starts with `page_url` in the
    /// debugger's listing, then [`open`](Self::open)s its socket.
    ///
    /// # Errors
    ///
    /// The lookup errors of [`Inspector::resolve_page`], then those of
    /// [`open`](Self::open).
    pub async fn open_page(&self, debugger: &DebuggerEndpoint, page_url: &str) -> Result<()> {
        self.inner.set_status(SessionStatus::Connecting, None);

        match self.inner.inspector.resolve_page(debugger, page_url).await {
            Ok(ws) => self.open(&ws).await,
            Err(e) => {
                warn!(page_url, error = %e, "Live page lookup failed");
                self.inner.set_status(SessionStatus::Error, None);
                Err(e)
            }
        }
    }

    async fn connect(&self, url: &str) -> Result<()> {
        if let Some(launcher) = &self.inner.launcher {
            launcher.server().start().await?;
        }

        let inspector = &self.inner.inspector;
        let mut events = inspector.subscribe_connection();
        inspector.connect(url).await?;

        if !inspector.is_connected() {
            let timeout = self.inner.options.lock().connect_timeout;
            tokio::time::timeout(timeout, wait_for_connect(&mut events))
                .await
                .map_err(|_| {
                    warn!(url, "Live page did not connect in time");
                    Error::connection_timeout(timeout.as_millis() as u64)
                })??;
        }

        self.spawn_watcher(events);
        Ok(())
    }

    fn spawn_watcher(&self, mut events: broadcast::Receiver<ConnectionEvent>) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let watcher = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(ConnectionEvent::Disconnected(reason)) => {
                        if let Some(inner) = inner.upgrade() {
                            inner.handle_disconnect(reason);
                        }
                        break;
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Some(previous) = self.inner.watcher.lock().replace(watcher) {
            previous.abort();
        }
    }

    /// Loads every enabled agent concurrently.
    ///
    /// A call made while a load is in flight joins it instead of starting
    /// another one. On failure every agent is unloaded and the status
    /// becomes [`SessionStatus::Error`].
    ///
    /// # Errors
    ///
    /// Returns the first agent's load error, or [`Error::Connection`] if
    /// the load exceeds `agent_load_timeout`. Callers that joined a load
    /// get its error as [`Error::Connection`].
    pub async fn load_agents(&self) -> Result<()> {
        let joined = {
            let mut slot = self.inner.loading.lock();
            match slot.as_ref() {
                Some(outcome) => Err(outcome.clone()),
                None => {
                    let (sender, outcome) = watch::channel(None);
                    *slot = Some(outcome);
                    Ok(sender)
                }
            }
        };

        let sender = match joined {
            Ok(sender) => sender,
            Err(mut outcome) => {
                debug!("Joining in-flight agent load");
                let result = outcome
                    .wait_for(Option::is_some)
                    .await
                    .map(|outcome| Option::clone(&outcome))
                    .map_err(|_| Error::connection("agent load was cancelled"))?;
                return match result {
                    Some(Err(message)) => Err(Error::connection(message)),
                    _ => Ok(()),
                };
            }
        };

        let _guard = LoadGuard(&self.inner);
        let result = self.inner.load_enabled().await;
        sender.send_replace(Some(result.as_ref().map(drop).map_err(ToString::to_string)));
        result
    }

    /// Unloads and reloads every agent, e.g. after the page navigated.
    ///
    /// Does nothing while a load is in flight.
    ///
    /// # Errors
    ///
    /// Same as [`load_agents`](Self::load_agents).
    pub async fn reconnect(&self) -> Result<()> {
        if self.is_loading() {
            debug!("Reconnect skipped, agents are loading");
            return Ok(());
        }
        self.inner.agents.unload_all();
        self.load_agents().await
    }

    /// Unloads the agents, closes the transport and stops the server.
    pub async fn close(&self) {
        if let Some(watcher) = self.inner.watcher.lock().take() {
            watcher.abort();
        }
        self.inner.agents.unload_all();
        self.inner.inspector.disconnect().await;
        if let Some(launcher) = &self.inner.launcher {
            launcher.server().stop().await;
        }
        self.inner
            .set_status(SessionStatus::Inactive, Some(REASON_EXPLICIT_CLOSE));
    }

    // ========================================================================
    // Agent Selection
    // ========================================================================

    /// Adds `kind` to the agents loaded by the next load.
    pub fn enable_agent(&self, kind: AgentKind) {
        self.inner.options.lock().enabled_agents.insert(kind);
    }

    /// Removes `kind` from the agents loaded by the next load.
    pub fn disable_agent(&self, kind: AgentKind) {
        self.inner.options.lock().enabled_agents.remove(&kind);
    }

    // ========================================================================
    // Sync Status
    // ========================================================================

    /// Marks the live page as lagging behind the editor.
    ///
    /// Returns `false` unless the session was [`SessionStatus::Active`].
    pub fn mark_out_of_sync(&self) -> bool {
        self.inner
            .transition(&[SessionStatus::Active], SessionStatus::OutOfSync)
    }

    /// Marks the live page as caught up.
    ///
    /// Returns `false` unless the session was out of sync or in sync error.
    pub fn mark_in_sync(&self) -> bool {
        self.inner.transition(
            &[SessionStatus::OutOfSync, SessionStatus::SyncError],
            SessionStatus::Active,
        )
    }

    /// Marks a failed live edit.
    ///
    /// Returns `false` unless the session was active or out of sync.
    pub fn mark_sync_error(&self) -> bool {
        self.inner.transition(
            &[SessionStatus::Active, SessionStatus::OutOfSync],
            SessionStatus::SyncError,
        )
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Sets the editor document remote edits are written to.
    pub fn set_live_document(&self, document: Option<Arc<dyn Document>>) {
        self.inner.agents.edit.set_document(document);
    }

    /// Pushes a saved document to the live page.
    ///
    /// A style sheet the page uses is replaced in place. Any other
    /// document the page requested reloads the page through the launcher.
    ///
    /// # Errors
    ///
    /// Returns the style sheet update error or the reload error.
    pub async fn document_saved(&self, document: &dyn Document) -> Result<SaveAction> {
        let url = document.url();
        let agents = &self.inner.agents;

        if agents.css.is_loaded() && agents.css.style_for_url(&url).is_some() {
            agents.css.reload_document(document).await?;
            self.mark_in_sync();
            return Ok(SaveAction::Pushed);
        }

        if agents.network.is_loaded()
            && agents.network.was_url_requested(&url)
            && let Some(launcher) = &self.inner.launcher
            && launcher.reload(false).await?
        {
            self.mark_in_sync();
            return Ok(SaveAction::Reloaded);
        }

        debug!(url = %url, "Saved document not used by the live page");
        Ok(SaveAction::Ignored)
    }

    /// Pushes an editor change replacing the characters `[from, to)` of
    /// the live HTML document with `text`.
    ///
    /// Changes written by the edit agent itself are not echoed back. A
    /// failed push marks the session [`SessionStatus::SyncError`].
    ///
    /// # Errors
    ///
    /// Returns the DOM agent's error.
    pub async fn document_changed(&self, from: usize, to: usize, text: &str) -> Result<()> {
        let agents = &self.inner.agents;
        if agents.edit.is_editing() || !agents.dom.is_loaded() {
            return Ok(());
        }

        agents
            .dom
            .apply_change(from, to, text)
            .await
            .inspect_err(|e| {
                warn!(error = %e, "Live edit failed");
                self.mark_sync_error();
            })
    }
}

/// Waits for the inspector's connect notification.
async fn wait_for_connect(events: &mut broadcast::Receiver<ConnectionEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::Connected) => return Ok(()),
            Ok(ConnectionEvent::Disconnected(reason)) => {
                return Err(Error::connection(
                    reason.unwrap_or_else(|| "closed while connecting".to_string()),
                ));
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => return Err(Error::ConnectionClosed),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::document::TextDocument;
    use crate::protocol::Request;
    use crate::transport::{ConnectionState, MemoryPeer, MemoryTransport, TransportCallbacks};

    type Log = Arc<Mutex<Vec<String>>>;

    fn page_responder(request: &Request) -> std::result::Result<Value, String> {
        Ok(match request.method.as_str() {
            "DOM.getDocument" => json!({
                "root": {
                    "nodeId": 1, "nodeType": 9, "nodeName": "#document",
                    "documentURL": "https://site/index.html",
                    "children": []
                }
            }),
            "CSS.getAllStyleSheets" => json!({
                "headers": [{ "styleSheetId": "s1", "sourceURL": "https://site/main.css" }]
            }),
            _ => json!({}),
        })
    }

    fn session_with_page(
        builder: SessionBuilder,
        fail: Option<&'static str>,
    ) -> (LiveSession, Arc<MemoryPeer>, Log) {
        let (transport, peer) = MemoryTransport::pair();
        let session = builder
            .transport(Arc::new(transport))
            .build()
            .expect("build");

        let peer = Arc::new(peer);
        let log: Log = Arc::default();
        let seen = Arc::clone(&log);
        peer.spawn_responder(move |request| {
            seen.lock().push(request.method.clone());
            if Some(request.method.as_str()) == fail {
                return Err("not supported".to_string());
            }
            page_responder(request)
        });
        (session, peer, log)
    }

    fn count(log: &Log, method: &str) -> usize {
        log.lock().iter().filter(|m| *m == method).count()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SessionStatus::Error.code(), -1);
        assert_eq!(SessionStatus::SyncError.code(), 5);
        assert!(SessionStatus::OutOfSync.is_active());
        assert!(!SessionStatus::LoadingAgents.is_active());
        assert_eq!(SessionStatus::LoadingAgents.to_string(), "loading_agents");
    }

    #[tokio::test]
    async fn test_open_loads_agents() {
        let (session, _peer, log) = session_with_page(LiveSession::builder(), None);
        assert_eq!(session.status(), SessionStatus::Inactive);

        session.open("memory://page").await.expect("open");

        assert_eq!(session.status(), SessionStatus::Active);
        for kind in AgentKind::ALL {
            assert!(session.agents().get(kind).is_loaded(), "{kind} not loaded");
        }
        assert_eq!(
            session.agents().css.style_sheet_urls(),
            vec!["https://site/main.css"]
        );
        assert_eq!(count(&log, "DOM.getDocument"), 1);
    }

    #[tokio::test]
    async fn test_disabled_agents_are_not_loaded() {
        let (session, _peer, log) = session_with_page(
            LiveSession::builder().agents([AgentKind::Css, AgentKind::Console]),
            None,
        );
        session.open("memory://page").await.expect("open");

        assert!(session.agents().css.is_loaded());
        assert!(!session.agents().dom.is_loaded());
        assert_eq!(count(&log, "DOM.getDocument"), 0);

        session.enable_agent(AgentKind::Network);
        session.disable_agent(AgentKind::Console);
        session.reconnect().await.expect("reconnect");
        assert!(session.agents().network.is_loaded());
        assert!(!session.agents().console.is_loaded());
    }

    #[tokio::test]
    async fn test_refused_connection_sets_error() {
        let (session, peer, _log) = session_with_page(LiveSession::builder(), None);
        peer.refuse_connections(true);

        let err = session.open("memory://page").await.expect_err("refused");
        assert!(err.is_connection_error());
        assert_eq!(session.status(), SessionStatus::Error);
    }

    #[tokio::test]
    async fn test_failed_page_lookup_sets_error() {
        let (session, _peer, log) = session_with_page(LiveSession::builder(), None);
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let debugger = DebuggerEndpoint::new("127.0.0.1", port);

        let err = session
            .open_page(&debugger, "http://127.0.0.1:8000/index.html")
            .await
            .expect_err("no debugger");
        assert!(matches!(err, Error::Http(_)));
        assert_eq!(session.status(), SessionStatus::Error);
        assert!(log.lock().is_empty());
    }

    #[derive(Default)]
    struct SilentTransport {
        state: Mutex<Option<ConnectionState>>,
    }

    #[async_trait]
    impl Transport for SilentTransport {
        async fn connect(&self, _url: &str) -> Result<()> {
            *self.state.lock() = Some(ConnectionState::Connecting);
            Ok(())
        }

        fn send(&self, _message: String) -> Result<()> {
            Err(Error::NotConnected)
        }

        async fn close(&self) {}

        fn set_callbacks(&self, _callbacks: TransportCallbacks) {}

        fn state(&self) -> ConnectionState {
            self.state.lock().unwrap_or(ConnectionState::Disconnected)
        }
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let session = LiveSession::builder()
            .transport(Arc::new(SilentTransport::default()))
            .connect_timeout(Duration::from_millis(50))
            .build()
            .expect("build");

        let err = session.open("memory://page").await.expect_err("timeout");
        assert!(matches!(err, Error::ConnectionTimeout { timeout_ms: 50 }));
        assert_eq!(session.status(), SessionStatus::Error);
    }

    #[tokio::test]
    async fn test_agent_failure_unloads_everything() {
        let (session, _peer, _log) = session_with_page(LiveSession::builder(), Some("CSS.enable"));

        let err = session.open("memory://page").await.expect_err("css fails");
        assert!(err.is_remote());
        assert_eq!(session.status(), SessionStatus::Error);
        for kind in AgentKind::ALL {
            assert!(!session.agents().get(kind).is_loaded(), "{kind} still loaded");
        }
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_concurrent_loads_are_shared() {
        let (session, _peer, log) = session_with_page(LiveSession::builder(), None);
        session.open("memory://page").await.expect("open");
        session.agents().unload_all();

        let (first, second) = tokio::join!(session.load_agents(), session.load_agents());
        first.expect("first");
        second.expect("second");

        assert_eq!(count(&log, "DOM.getDocument"), 2);
        assert_eq!(count(&log, "CSS.enable"), 2);
        assert!(!session.is_loading());
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_page_disconnect_unloads_agents() {
        let (session, peer, _log) = session_with_page(LiveSession::builder(), None);
        session.open("memory://page").await.expect("open");
        let mut status = session.subscribe_status();

        peer.close(Some("tab closed".into()));
        let update = status
            .wait_for(|update| update.status == SessionStatus::Inactive)
            .await
            .expect("status")
            .clone();

        assert_eq!(update.reason.as_deref(), Some(REASON_DISCONNECTED));
        for kind in AgentKind::ALL {
            assert!(!session.agents().get(kind).is_loaded());
        }
    }

    #[tokio::test]
    async fn test_close_is_explicit() {
        let (session, _peer, _log) = session_with_page(LiveSession::builder(), None);
        session.open("memory://page").await.expect("open");

        session.close().await;

        let update = session.status_update();
        assert_eq!(update.status, SessionStatus::Inactive);
        assert_eq!(update.reason.as_deref(), Some(REASON_EXPLICIT_CLOSE));
        assert!(!session.inspector().is_connected());
        assert!(!session.agents().dom.is_loaded());
    }

    #[tokio::test]
    async fn test_sync_transitions() {
        let (session, _peer, _log) = session_with_page(LiveSession::builder(), None);
        assert!(!session.mark_out_of_sync());

        session.open("memory://page").await.expect("open");
        assert!(!session.mark_in_sync());
        assert!(session.mark_out_of_sync());
        assert_eq!(session.status(), SessionStatus::OutOfSync);
        assert!(session.mark_sync_error());
        assert!(session.mark_in_sync());
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_saved_style_sheet_is_pushed() {
        let (session, _peer, log) = session_with_page(LiveSession::builder(), None);
        session.open("memory://page").await.expect("open");
        session.mark_out_of_sync();

        let sheet = TextDocument::new("https://site/main.css", "p { color: red }");
        let action = session.document_saved(&sheet).await.expect("save");
        assert_eq!(action, SaveAction::Pushed);
        assert_eq!(count(&log, "CSS.setStyleSheetText"), 1);
        assert_eq!(session.status(), SessionStatus::Active);

        let other = TextDocument::new("https://site/notes.txt", "");
        assert_eq!(
            session.document_saved(&other).await.expect("save"),
            SaveAction::Ignored
        );
    }

    #[tokio::test]
    async fn test_change_without_dom_is_ignored() {
        let (session, _peer, log) =
            session_with_page(LiveSession::builder().agents([AgentKind::Css]), None);
        session.open("memory://page").await.expect("open");

        session.document_changed(0, 0, "x").await.expect("change");
        assert_eq!(count(&log, "DOM.setNodeValue"), 0);
    }
}
