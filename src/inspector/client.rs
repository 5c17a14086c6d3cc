//! Protocol client over a [`Transport`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SubscriptionId};
use crate::protocol::{Command, Event, EventKind, Message, Request, Response};
use crate::transport::{ConnectionState, Transport, TransportCallbacks};

use super::discovery::{DebuggerEndpoint, find_window};
use super::events::{ConnectionEvent, EventHandler, Subscriptions};

// ============================================================================
// Constants
// ============================================================================

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on in-flight calls.
pub const DEFAULT_MAX_PENDING: usize = 256;

/// Buffered connection notifications per subscriber.
const CONNECTION_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// InspectorConfig
// ============================================================================

/// Call limits for an [`Inspector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InspectorConfig {
    /// How long a call waits for its response.
    pub call_timeout: Duration,
    /// How many calls may be in flight at once.
    pub max_pending: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

// ============================================================================
// Inspector
// ============================================================================

/// Pending call awaiting its response.
struct Pending {
    method: String,
    tx: oneshot::Sender<Result<Value>>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: InspectorConfig,
    next_id: AtomicU64,
    pending: Mutex<FxHashMap<RequestId, Pending>>,
    subscriptions: Subscriptions,
    connection: broadcast::Sender<ConnectionEvent>,
    user_agent: Mutex<Option<String>>,
    connect_attempt: AtomicU64,
}

/// Request/response correlator and event dispatcher.
///
/// Cloning is cheap; clones share the pending map and subscriptions.
///
/// # Example
///
/// ```ignore
/// let inspector = Inspector::new(transport, InspectorConfig::default());
/// inspector.connect("ws://127.0.0.1:9222").await?;
///
/// inspector.on(EventKind::PageLoadEventFired, |event| {
///     println!("loaded at {}", event.params["timestamp"]);
/// });
/// let sheets = inspector.call("CSS", "getAllStyleSheets", json!({})).await?;
/// ```
#[derive(Clone)]
pub struct Inspector {
    inner: Arc<Inner>,
}

/// Non-owning handle to an [`Inspector`], for event handlers that issue
/// calls of their own.
#[derive(Clone)]
pub struct WeakInspector {
    inner: Weak<Inner>,
}

impl WeakInspector {
    /// Returns the inspector if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Inspector> {
        self.inner.upgrade().map(|inner| Inspector { inner })
    }
}

impl fmt::Debug for Inspector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inspector")
            .field("state", &self.inner.transport.state())
            .field("pending", &self.pending_count())
            .field("subscriptions", &self.inner.subscriptions)
            .finish_non_exhaustive()
    }
}

impl Inspector {
    /// Creates a client and takes over the transport's callbacks.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: InspectorConfig) -> Self {
        let (connection, _) = broadcast::channel(CONNECTION_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            transport,
            config,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(FxHashMap::default()),
            subscriptions: Subscriptions::default(),
            connection,
            user_agent: Mutex::new(None),
            connect_attempt: AtomicU64::new(0),
        });

        inner.transport.set_callbacks(Self::callbacks(Arc::downgrade(&inner)));
        Self { inner }
    }

    /// Callbacks hold a weak reference so the transport does not keep the
    /// client alive.
    fn callbacks(inner: Weak<Inner>) -> TransportCallbacks {
        let on_connect = inner.clone();
        let on_message = inner.clone();
        let on_close = inner;

        TransportCallbacks::new()
            .on_connect(move || {
                if let Some(inner) = on_connect.upgrade() {
                    info!("Inspector connected");
                    let _ = inner.connection.send(ConnectionEvent::Connected);
                }
            })
            .on_message(move |text| {
                if let Some(inner) = on_message.upgrade() {
                    inner.handle_message(text);
                }
            })
            .on_close(move |reason| {
                if let Some(inner) = on_close.upgrade() {
                    inner.handle_close(reason);
                }
            })
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Connects the underlying transport.
    ///
    /// [`ConnectionEvent::Connected`] is published once the transport
    /// reports the logical connection.
    ///
    /// # Errors
    ///
    /// Returns the transport's connection error.
    pub async fn connect(&self, url: &str) -> Result<()> {
        debug!(url, "Inspector connecting");
        self.inner.transport.connect(url).await
    }

    /// Finds the debugger socket of the page whose URL starts with `url`.
    ///
    /// Starting another lookup or connect-by-URL cancels this one.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] if the listing cannot be fetched
    /// - [`Error::ConnectCancelled`] if a newer attempt started meanwhile
    /// - [`Error::PageNotFound`] if no attachable page matches
    pub async fn resolve_page(&self, debugger: &DebuggerEndpoint, url: &str) -> Result<String> {
        let attempt = self.inner.connect_attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let windows = debugger.windows().await?;

        if self.inner.connect_attempt.load(Ordering::SeqCst) != attempt {
            debug!(url, attempt, "Page lookup superseded");
            return Err(Error::ConnectCancelled);
        }

        find_window(&windows, url)
            .and_then(|window| window.web_socket_debugger_url.clone())
            .ok_or_else(|| Error::PageNotFound { url: url.to_string() })
    }

    /// Connects to the live page whose URL starts with `url`, returning the
    /// socket URL used.
    ///
    /// # Errors
    ///
    /// Same as [`resolve_page`](Self::resolve_page), plus any transport
    /// connect error.
    pub async fn connect_to_url(&self, debugger: &DebuggerEndpoint, url: &str) -> Result<String> {
        let ws = self.resolve_page(debugger, url).await?;
        info!(url, ws = %ws, "Live page found");
        self.connect(&ws).await?;
        Ok(ws)
    }

    /// Closes the underlying transport, rejecting every pending call.
    pub async fn disconnect(&self) {
        self.inner.transport.close().await;
    }

    /// Returns `true` if the transport is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.transport.state().is_connected()
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.transport.state()
    }

    /// Subscribes to connection notifications.
    #[must_use]
    pub fn subscribe_connection(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.connection.subscribe()
    }

    /// Returns the user agent reported by the live page.
    #[must_use]
    pub fn user_agent(&self) -> Option<String> {
        self.inner.user_agent.lock().clone()
    }

    /// Records the user agent reported by the live page.
    pub fn set_user_agent(&self, user_agent: impl Into<String>) {
        *self.inner.user_agent.lock() = Some(user_agent.into());
    }

    /// Returns a non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakInspector {
        WeakInspector {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Returns the configured call limits.
    #[inline]
    #[must_use]
    pub fn config(&self) -> InspectorConfig {
        self.inner.config
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Calls `domain.command` and waits for its result.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the transport is not connected
    /// - [`Error::TooManyPendingRequests`] if the pending cap is reached
    /// - [`Error::Remote`] if the page answered with an error
    /// - [`Error::RequestTimeout`] if no response arrived in time
    /// - [`Error::ConnectionClosed`] if the transport closed first
    pub async fn call(&self, domain: &str, command: &str, params: Value) -> Result<Value> {
        self.call_method(format!("{domain}.{command}"), params).await
    }

    /// Sends a typed command and waits for its result.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn send(&self, command: &Command) -> Result<Value> {
        let (method, params) = command.to_parts()?;
        self.call_method(method, params).await
    }

    /// Sends `domain.command` with the reserved id `0`; no response is
    /// awaited.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the transport is not connected.
    pub fn notify(&self, domain: &str, command: &str, params: Value) -> Result<()> {
        let request = Request::new(RequestId::NOTIFY, format!("{domain}.{command}"), params);
        let text = serde_json::to_string(&request)?;
        trace!(method = %request.method, "Sending notification");
        self.inner.transport.send(text)
    }

    async fn call_method(&self, method: String, params: Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let id = RequestId::new(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let text = serde_json::to_string(&Request::new(id, method.as_str(), params))?;
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.inner.pending.lock();
            let limit = self.inner.config.max_pending;
            if pending.len() >= limit {
                warn!(pending = pending.len(), max = limit, "Too many pending requests");
                return Err(Error::TooManyPendingRequests { limit });
            }
            pending.insert(
                id,
                Pending {
                    method: method.clone(),
                    tx,
                },
            );
        }
        // Forgets the entry on every exit, including a dropped future.
        let _guard = PendingGuard {
            inner: &self.inner,
            id,
        };

        trace!(request_id = %id, method = %method, "Sending command");
        self.inner.transport.send(text)?;

        let call_timeout = self.inner.config.call_timeout;
        match timeout(call_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                warn!(request_id = %id, method = %method, "Command timed out");
                Err(Error::request_timeout(
                    id,
                    method,
                    call_timeout.as_millis() as u64,
                ))
            }
        }
    }

    /// Returns the number of calls awaiting a response.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Subscribes `handler` to events of `kind`.
    ///
    /// Handlers for one kind run in subscription order, synchronously in
    /// the turn that received the message.
    pub fn on(
        &self,
        kind: impl Into<EventKind>,
        handler: impl Fn(&Event) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let handler: EventHandler = Arc::new(handler);
        self.inner.subscriptions.add(kind.into(), handler)
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    ///
    /// Removing a handler while an event is being dispatched does not stop
    /// it from receiving that event; it stops with the next one.
    pub fn off(&self, kind: impl Into<EventKind>, id: SubscriptionId) -> bool {
        self.inner.subscriptions.remove(&kind.into(), id)
    }

    /// Returns the number of handlers subscribed to `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: impl Into<EventKind>) -> usize {
        self.inner.subscriptions.count(&kind.into())
    }
}

/// Removes a call's pending entry when the call ends or is cancelled.
struct PendingGuard<'a> {
    inner: &'a Inner,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.inner.pending.lock().remove(&self.id).is_some() {
            trace!(request_id = %self.id, "Pending request forgotten");
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

impl Inner {
    fn handle_message(&self, text: String) {
        let message = Message::parse(&text);
        let _ = self.connection.send(ConnectionEvent::Message(text));

        match message {
            Ok(Message::Response(response)) => self.resolve(response),
            Ok(Message::Event(event)) => self.dispatch(&event),
            Ok(Message::Command(request)) => {
                if self.pending.lock().contains_key(&request.id) {
                    self.resolve(Response::Ok {
                        id: request.id,
                        result: Value::Null,
                    });
                } else {
                    debug!(method = %request.method, "Treating inbound command as event");
                    self.dispatch(&Event::new(request.method, request.params));
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse inbound message");
                let _ = self.connection.send(ConnectionEvent::Error(e.to_string()));
            }
        }
    }

    fn resolve(&self, response: Response) {
        let id = response.id();
        if id.is_notify() {
            trace!("Dropping response to notification");
            return;
        }

        let Some(pending) = self.pending.lock().remove(&id) else {
            warn!(request_id = %id, "Response for unknown request");
            return;
        };

        if let Response::Error { error, .. } = &response {
            debug!(request_id = %id, method = %pending.method, error = %error.message, "Command failed");
            let _ = self
                .connection
                .send(ConnectionEvent::Error(format!("{}: {}", pending.method, error.message)));
        } else {
            trace!(request_id = %id, method = %pending.method, "Command succeeded");
        }

        let _ = pending.tx.send(response.into_result(&pending.method));
    }

    fn dispatch(&self, event: &Event) {
        let handlers = self.subscriptions.snapshot(&event.kind());
        trace!(method = %event.method, handlers = handlers.len(), "Dispatching event");
        for handler in handlers {
            handler(event);
        }
    }

    fn handle_close(&self, reason: Option<String>) {
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();
        let rejected = drained.len();
        for pending in drained {
            let _ = pending.tx.send(Err(Error::ConnectionClosed));
        }

        info!(reason = ?reason, rejected, "Inspector disconnected");
        let _ = self.connection.send(ConnectionEvent::Disconnected(reason));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::PageCommand;
    use crate::transport::{MemoryPeer, MemoryTransport};

    async fn connected_with(config: InspectorConfig) -> (Inspector, Arc<MemoryPeer>) {
        let (transport, peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), config);
        inspector.connect("memory://page").await.expect("connect");
        (inspector, Arc::new(peer))
    }

    async fn connected() -> (Inspector, Arc<MemoryPeer>) {
        connected_with(InspectorConfig::default()).await
    }

    #[tokio::test]
    async fn test_call_before_connect_is_rejected() {
        let (transport, _peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), InspectorConfig::default());

        let err = inspector
            .call("Page", "reload", json!({}))
            .await
            .expect_err("not connected");
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(inspector.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_responses_in_reverse_order_resolve_their_own_calls() {
        let (inspector, peer) = connected().await;

        let calls: Vec<_> = (0..3)
            .map(|n| {
                let inspector = inspector.clone();
                tokio::spawn(async move { inspector.call("Test", "echo", json!({ "n": n })).await })
            })
            .collect();

        let mut requests = Vec::new();
        for _ in 0..3 {
            requests.push(peer.next_request().await.expect("request"));
        }

        let mut ids: Vec<u64> = requests.iter().map(|r| r.id.as_u64()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);

        for request in requests.iter().rev() {
            peer.respond(request.id, json!({ "echo": request.params["n"] }));
        }

        for (n, call) in calls.into_iter().enumerate() {
            let result = call.await.expect("join").expect("call");
            assert_eq!(result["echo"], json!(n));
        }
        assert_eq!(inspector.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ids_keep_increasing_after_resolution() {
        let (inspector, peer) = connected().await;

        let first = tokio::spawn({
            let inspector = inspector.clone();
            async move { inspector.send(&Command::Page(PageCommand::Enable)).await }
        });
        let request = peer.next_request().await.expect("request");
        assert_eq!(request.method, "Page.enable");
        peer.respond(request.id, json!({}));
        first.await.expect("join").expect("call");

        let second = tokio::spawn({
            let inspector = inspector.clone();
            async move { inspector.call("Page", "enable", json!({})).await }
        });
        let next = peer.next_request().await.expect("request");
        assert_ne!(next.id, request.id);
        peer.respond(next.id, json!({}));
        second.await.expect("join").expect("call");
    }

    #[tokio::test]
    async fn test_handlers_run_in_order_and_survive_unsubscribe_during_dispatch() {
        let (inspector, peer) = connected().await;
        let order = Arc::new(Mutex::new(Vec::new()));
        let h2_id = Arc::new(Mutex::new(None::<SubscriptionId>));

        let log = Arc::clone(&order);
        let remover = inspector.clone();
        let target = Arc::clone(&h2_id);
        inspector.on(EventKind::PageLoadEventFired, move |_| {
            log.lock().push("h1");
            if let Some(id) = target.lock().take() {
                remover.off(EventKind::PageLoadEventFired, id);
            }
        });
        let log = Arc::clone(&order);
        let id = inspector.on(EventKind::PageLoadEventFired, move |_| log.lock().push("h2"));
        *h2_id.lock() = Some(id);
        let log = Arc::clone(&order);
        inspector.on(EventKind::PageLoadEventFired, move |_| log.lock().push("h3"));

        peer.emit("Page.loadEventFired", json!({ "timestamp": 1 }));
        assert_eq!(*order.lock(), vec!["h1", "h2", "h3"]);

        peer.emit("Page.loadEventFired", json!({ "timestamp": 2 }));
        assert_eq!(*order.lock(), vec!["h1", "h2", "h3", "h1", "h3"]);
        assert_eq!(inspector.handler_count(EventKind::PageLoadEventFired), 2);
    }

    #[tokio::test]
    async fn test_events_only_reach_their_kind() {
        let (inspector, peer) = connected().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        inspector.on("Custom.thing", move |event| sink.lock().push(event.params.clone()));

        peer.emit("Page.loadEventFired", json!({}));
        peer.emit("Custom.thing", json!({ "a": 1 }));

        assert_eq!(*seen.lock(), vec![json!({ "a": 1 })]);
    }

    #[tokio::test]
    async fn test_disconnect_rejects_all_pending() {
        let (inspector, peer) = connected().await;
        let mut connection = inspector.subscribe_connection();

        let calls: Vec<_> = (0..3)
            .map(|_| {
                let inspector = inspector.clone();
                tokio::spawn(async move { inspector.call("DOM", "getDocument", json!({})).await })
            })
            .collect();
        for _ in 0..3 {
            peer.next_request().await.expect("request");
        }
        assert_eq!(inspector.pending_count(), 3);

        peer.close(Some("page unloaded".into()));

        for call in calls {
            let err = call.await.expect("join").expect_err("rejected");
            assert!(matches!(err, Error::ConnectionClosed));
        }
        assert_eq!(inspector.pending_count(), 0);

        loop {
            match connection.recv().await.expect("notification") {
                ConnectionEvent::Disconnected(reason) => {
                    assert_eq!(reason.as_deref(), Some("page unloaded"));
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_call_times_out_and_forgets_request() {
        let (inspector, peer) = connected_with(InspectorConfig {
            call_timeout: Duration::from_millis(50),
            ..InspectorConfig::default()
        })
        .await;

        let err = inspector
            .call("CSS", "getAllStyleSheets", json!({}))
            .await
            .expect_err("timeout");

        assert!(err.is_timeout());
        assert!(matches!(err, Error::RequestTimeout { .. }));
        assert_eq!(inspector.pending_count(), 0);

        // A late response is dropped without effect.
        let late = peer.next_request().await.expect("request");
        peer.respond(late.id, json!({}));
        assert_eq!(inspector.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_calls_release_their_slots() {
        let (inspector, peer) = connected_with(InspectorConfig {
            max_pending: 2,
            ..InspectorConfig::default()
        })
        .await;

        for _ in 0..2 {
            let cancelled = tokio::time::timeout(
                Duration::from_millis(10),
                inspector.call("DOM", "getDocument", json!({})),
            )
            .await;
            assert!(cancelled.is_err());
        }
        assert_eq!(inspector.pending_count(), 0);

        let call = tokio::spawn({
            let inspector = inspector.clone();
            async move { inspector.call("DOM", "getDocument", json!({})).await }
        });
        let mut request = peer.next_request().await.expect("request");
        while request.id.as_u64() < 3 {
            request = peer.next_request().await.expect("request");
        }
        peer.respond(request.id, json!({ "root": null }));
        call.await.expect("join").expect("call after cancellations");
    }

    #[tokio::test]
    async fn test_pending_call_resolved_by_envelope_with_method() {
        let (inspector, peer) = connected().await;

        let call = tokio::spawn({
            let inspector = inspector.clone();
            async move { inspector.call("CSS", "getAllStyleSheets", json!({})).await }
        });
        let request = peer.next_request().await.expect("request");
        peer.deliver(
            &json!({
                "id": request.id,
                "method": "CSS.getAllStyleSheets",
                "result": { "headers": [] }
            })
            .to_string(),
        );

        let result = call.await.expect("join").expect("resolved");
        assert_eq!(result, json!({ "headers": [] }));
        assert_eq!(inspector.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_call_resolved_by_command_echo() {
        let (inspector, peer) = connected().await;
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        inspector.on("Page.reload", move |_| *sink.lock() += 1);

        let call = tokio::spawn({
            let inspector = inspector.clone();
            async move { inspector.call("Page", "reload", json!({})).await }
        });
        let request = peer.next_request().await.expect("request");
        peer.deliver(&json!({ "id": request.id, "method": "Page.reload" }).to_string());

        assert_eq!(call.await.expect("join").expect("resolved"), Value::Null);
        assert_eq!(*seen.lock(), 0);

        peer.deliver(&json!({ "id": 99, "method": "Page.reload", "params": {} }).to_string());
        assert_eq!(*seen.lock(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_rejects_call_and_notifies() {
        let (inspector, peer) = connected().await;
        let mut connection = inspector.subscribe_connection();

        let call = tokio::spawn({
            let inspector = inspector.clone();
            async move { inspector.call("CSS", "getStyleSheetText", json!({})).await }
        });
        let request = peer.next_request().await.expect("request");
        peer.respond_error(request.id, "No style sheet with given id");

        let err = call.await.expect("join").expect_err("remote error");
        match err {
            Error::Remote { method, message, .. } => {
                assert_eq!(method, "CSS.getStyleSheetText");
                assert_eq!(message, "No style sheet with given id");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        loop {
            if let ConnectionEvent::Error(message) = connection.recv().await.expect("notification") {
                assert!(message.starts_with("CSS.getStyleSheetText"));
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_notify_uses_reserved_id() {
        let (inspector, peer) = connected().await;

        inspector
            .notify("Runtime", "evaluate", json!({ "expression": "1" }))
            .expect("notify");

        let sent = peer.next_sent().await.expect("sent");
        let request: Request = serde_json::from_str(&sent).expect("request");
        assert!(request.id.is_notify());
        assert_eq!(inspector.pending_count(), 0);

        peer.respond(RequestId::NOTIFY, json!({}));
        assert_eq!(inspector.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_pending_cap() {
        let (inspector, peer) = connected_with(InspectorConfig {
            max_pending: 1,
            ..InspectorConfig::default()
        })
        .await;

        let first = tokio::spawn({
            let inspector = inspector.clone();
            async move { inspector.call("DOM", "getDocument", json!({})).await }
        });
        let request = peer.next_request().await.expect("request");

        let err = inspector
            .call("DOM", "getDocument", json!({}))
            .await
            .expect_err("cap reached");
        assert!(matches!(err, Error::TooManyPendingRequests { limit: 1 }));

        peer.respond(request.id, json!({ "root": null }));
        first.await.expect("join").expect("first call");
    }

    #[tokio::test]
    async fn test_malformed_message_is_reported() {
        let (inspector, peer) = connected().await;
        let mut connection = inspector.subscribe_connection();

        peer.deliver("{not json");

        assert_eq!(
            connection.recv().await.expect("message"),
            ConnectionEvent::Message("{not json".into())
        );
        assert!(matches!(
            connection.recv().await.expect("error"),
            ConnectionEvent::Error(_)
        ));
    }
}
