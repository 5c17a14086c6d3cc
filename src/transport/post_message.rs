//! postMessage-style transport.
//!
//! Used when the live page is embedded in (or opened by) the editor's own
//! window instead of running in a separate browser. Every payload travels
//! inside an envelope:
//!
//! ```text
//! {"type": "connect", "url": "<page url>"}     handshake, both directions
//! {"type": "message", "message": "<payload>"}  one protocol message
//! ```
//!
//! The transport also rewrites URLs on the way through: inbound `blob:` URLs
//! become project paths and outbound relative paths become the URLs the
//! page loads them from. `Page.reload` and `Page.navigate` never reach the
//! page; they are handed to the reload handler because the editor rebuilds
//! the instrumented document itself.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::fs::{dirname, join_path};
use crate::identifiers::RequestId;
use crate::protocol::{Message, Response};
use crate::remote::navigation_path;
use crate::server::UrlMapper;

use super::{ConnectionState, Transport, TransportCallbacks, TransportCore};

// ============================================================================
// Patterns
// ============================================================================

/// A quoted `blob:` URL inside a JSON payload.
static BLOB_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#""(blob:[^"]+)""#).ok());

/// A link-like attribute followed by its value, with or without escaped
/// quotes: `"href":"a.css"`, `\"src\":\"b.png\"`, `url(c.png)`.
static LINK_VALUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(\\?"?)(href|src|url|value)(\\?"?\s?:?\s?\(?\\?"?)([^\\"\),]+)(\\?"?)"#).ok()
});

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Envelope {
    Connect {
        #[serde(default)]
        url: Option<String>,
    },
    Message {
        #[serde(default)]
        message: Option<String>,
    },
}

// ============================================================================
// Collaborators
// ============================================================================

/// The window the live page lives in.
pub trait MessageTarget: Send + Sync {
    /// Posts one serialized envelope to the page.
    fn post(&self, message: &str) -> Result<()>;
}

/// Receives the project path of a clicked link.
pub type NavigationHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Receives reload requests; the flag is `true` when the reload must happen
/// even with auto-update off.
pub type ReloadHandler = Arc<dyn Fn(bool) + Send + Sync>;

// ============================================================================
// PostMessageTransport
// ============================================================================

/// Transport relaying through an embedding window.
///
/// Inbound envelopes are fed in with [`receive`](Self::receive).
pub struct PostMessageTransport {
    core: TransportCore,
    target: Arc<dyn MessageTarget>,
    mapper: Option<Arc<dyn UrlMapper>>,
    live_document: Mutex<Option<String>>,
    remote_url: Mutex<Option<String>>,
    on_navigate: Mutex<Option<NavigationHandler>>,
    on_reload: Mutex<Option<ReloadHandler>>,
}

impl PostMessageTransport {
    /// Creates a transport posting to `target`.
    #[must_use]
    pub fn new(target: Arc<dyn MessageTarget>) -> Self {
        Self {
            core: TransportCore::default(),
            target,
            mapper: None,
            live_document: Mutex::new(None),
            remote_url: Mutex::new(None),
            on_navigate: Mutex::new(None),
            on_reload: Mutex::new(None),
        }
    }

    /// Rewrites URLs through `mapper`.
    #[must_use]
    pub fn with_url_mapper(mut self, mapper: Arc<dyn UrlMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Sets the project path of the previewed document. Relative paths in
    /// outbound messages resolve against its directory.
    pub fn set_live_document(&self, path: Option<String>) {
        *self.live_document.lock() = path;
    }

    /// Installs the link-click handler.
    pub fn set_navigation_handler(&self, handler: impl Fn(String) + Send + Sync + 'static) {
        *self.on_navigate.lock() = Some(Arc::new(handler));
    }

    /// Installs the reload handler.
    pub fn set_reload_handler(&self, handler: impl Fn(bool) + Send + Sync + 'static) {
        *self.on_reload.lock() = Some(Arc::new(handler));
    }

    /// Returns the URL the page reported in its handshake.
    #[must_use]
    pub fn remote_url(&self) -> Option<String> {
        self.remote_url.lock().clone()
    }

    /// Handles one envelope posted by the page.
    ///
    /// Anything that is not a well-formed envelope is ignored, since the
    /// editor window also receives unrelated messages.
    pub fn receive(&self, data: &str) {
        let envelope = match serde_json::from_str::<Envelope>(data) {
            Ok(envelope) => envelope,
            Err(_) => {
                trace!(len = data.len(), "Ignoring non-envelope message");
                return;
            }
        };

        match envelope {
            Envelope::Connect { url } => {
                debug!(url = ?url, "postMessage handshake received");
                *self.remote_url.lock() = url;
                if self.core.state().is_connected() {
                    return;
                }
                self.core.connected();
            }
            Envelope::Message { message } => {
                let Some(message) = message else {
                    return;
                };

                if let Some(path) = navigation_path(&message) {
                    let handler = self.on_navigate.lock().clone();
                    match handler {
                        Some(handler) => handler(path),
                        None => debug!(path = %path, "Navigation request without handler"),
                    }
                    return;
                }

                self.core.message(self.resolve_links(&message));
            }
        }
    }

    /// Replaces quoted `blob:` URLs with the project paths they map to.
    #[must_use]
    pub fn resolve_links(&self, message: &str) -> String {
        let (Some(mapper), Some(pattern)) = (&self.mapper, BLOB_URL.as_ref()) else {
            return message.to_string();
        };

        pattern
            .replace_all(message, |caps: &Captures<'_>| {
                let url = &caps[1];
                let path = mapper.url_to_path(url).unwrap_or_else(|| url.to_string());
                format!("\"{path}\"")
            })
            .into_owned()
    }

    /// Replaces link values that name a mapped project file with its URL.
    ///
    /// Relative values resolve against the live document's directory.
    /// Values that do not map are left exactly as written.
    #[must_use]
    pub fn resolve_paths(&self, message: &str) -> String {
        let (Some(mapper), Some(pattern)) = (&self.mapper, LINK_VALUE.as_ref()) else {
            return message.to_string();
        };
        let Some(document) = self.live_document.lock().clone() else {
            return message.to_string();
        };
        let dir = dirname(&document);

        pattern
            .replace_all(message, |caps: &Captures<'_>| {
                let value = &caps[4];
                let path = join_path(&dir, value);
                let value = mapper.path_to_url(&path).unwrap_or_else(|| value.to_string());
                format!("{}{}{}{}{}", &caps[1], &caps[2], &caps[3], value, &caps[5])
            })
            .into_owned()
    }

    fn post_envelope(&self, envelope: &Envelope) -> Result<()> {
        let text = serde_json::to_string(envelope)?;
        self.target.post(&text)
    }

    fn answer(&self, id: RequestId) {
        let response = Message::Response(Response::Ok {
            id,
            result: Value::Object(serde_json::Map::new()),
        });
        match response.to_json() {
            Ok(text) => self.core.message(text),
            Err(e) => warn!(error = %e, "Failed to encode reload response"),
        }
    }

    fn reload(&self, force: bool) {
        let handler = self.on_reload.lock().clone();
        match handler {
            Some(handler) => handler(force),
            None => debug!(force, "Reload requested without handler"),
        }
    }
}

#[async_trait]
impl Transport for PostMessageTransport {
    async fn connect(&self, url: &str) -> Result<()> {
        self.core.set_state(ConnectionState::Connecting);
        let handshake = Envelope::Connect {
            url: Some(url.to_string()),
        };
        if let Err(e) = self.post_envelope(&handshake) {
            self.core.set_state(ConnectionState::Disconnected);
            return Err(Error::connection(format!("{url}: {e}")));
        }
        debug!(url, "postMessage handshake sent");
        Ok(())
    }

    fn send(&self, message: String) -> Result<()> {
        if !self.core.state().is_connected() {
            warn!("Dropping message sent while not connected");
            return Err(Error::NotConnected);
        }

        let message = self.resolve_paths(&message);
        if let Ok(Message::Command(request)) = Message::parse(&message) {
            let force = match request.method.as_str() {
                "Page.reload" => Some(false),
                "Page.navigate" => Some(true),
                _ => None,
            };
            if let Some(force) = force {
                self.reload(force);
                // The page never sees the command, so answer it here.
                if !request.id.is_notify() {
                    self.answer(request.id);
                }
                return Ok(());
            }
        }

        self.post_envelope(&Envelope::Message {
            message: Some(message),
        })
    }

    async fn close(&self) {
        if self.core.closed(None) {
            debug!("postMessage transport closed");
        }
    }

    fn set_callbacks(&self, callbacks: TransportCallbacks) {
        self.core.set_callbacks(callbacks);
    }

    fn state(&self) -> ConnectionState {
        self.core.state()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::fs::MemoryFileSystem;
    use crate::inspector::{Inspector, InspectorConfig};
    use crate::protocol::{Command, PageCommand};
    use crate::remote::RemoteScriptOptions;
    use crate::server::BlobServer;

    #[derive(Default)]
    struct RecordingTarget {
        posted: Mutex<Vec<String>>,
    }

    impl MessageTarget for RecordingTarget {
        fn post(&self, message: &str) -> Result<()> {
            self.posted.lock().push(message.to_string());
            Ok(())
        }
    }

    struct ClosedWindow;

    impl MessageTarget for ClosedWindow {
        fn post(&self, _message: &str) -> Result<()> {
            Err(Error::connection("window is gone"))
        }
    }

    fn blob_server() -> Arc<BlobServer> {
        Arc::new(BlobServer::new(
            "https://editor.example",
            Arc::new(MemoryFileSystem::new()),
            RemoteScriptOptions::post_message(),
        ))
    }

    fn connected(target: Arc<RecordingTarget>) -> PostMessageTransport {
        let transport = PostMessageTransport::new(target);
        transport.receive(r#"{"type":"connect","url":"blob:https://editor.example/1"}"#);
        transport
    }

    #[tokio::test]
    async fn test_handshake_fires_connect_once() {
        let target = Arc::new(RecordingTarget::default());
        let transport = PostMessageTransport::new(target.clone());
        let connects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connects);
        transport.set_callbacks(TransportCallbacks::new().on_connect(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        transport.connect("blob:https://editor.example/1").await.expect("connect");
        assert_eq!(transport.state(), ConnectionState::Connecting);
        assert!(target.posted.lock()[0].contains(r#""type":"connect""#));

        transport.receive(r#"{"type":"connect","url":"blob:https://editor.example/1"}"#);
        transport.receive(r#"{"type":"connect","url":"blob:https://editor.example/1"}"#);

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(transport.state().is_connected());
        assert_eq!(
            transport.remote_url().as_deref(),
            Some("blob:https://editor.example/1")
        );
    }

    #[tokio::test]
    async fn test_connect_fails_when_target_is_gone() {
        let transport = PostMessageTransport::new(Arc::new(ClosedWindow));
        assert!(transport.connect("blob:x").await.is_err());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_wraps_payload() {
        let target = Arc::new(RecordingTarget::default());
        let transport = connected(target.clone());

        transport
            .send(r#"{"id":1,"method":"CSS.enable"}"#.to_string())
            .expect("send");

        let posted: Value = serde_json::from_str(&target.posted.lock()[0]).expect("json");
        assert_eq!(posted["type"], "message");
        assert_eq!(posted["message"], r#"{"id":1,"method":"CSS.enable"}"#);
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let target = Arc::new(RecordingTarget::default());
        let transport = PostMessageTransport::new(target.clone());

        assert!(matches!(
            transport.send("{}".to_string()),
            Err(Error::NotConnected)
        ));
        assert!(target.posted.lock().is_empty());
    }

    #[test]
    fn test_reload_and_navigate_are_intercepted() {
        let target = Arc::new(RecordingTarget::default());
        let transport = connected(target.clone());
        let reloads = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&reloads);
        transport.set_reload_handler(move |force| recorded.lock().push(force));

        transport
            .send(r#"{"id":2,"method":"Page.reload","params":{}}"#.to_string())
            .expect("reload");
        transport
            .send(r#"{"id":3,"method":"Page.navigate","params":{"url":"x"}}"#.to_string())
            .expect("navigate");

        assert_eq!(*reloads.lock(), vec![false, true]);
        assert!(target.posted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_intercepted_reload_answers_the_call() {
        let target = Arc::new(RecordingTarget::default());
        let transport = Arc::new(PostMessageTransport::new(target.clone()));
        let reloads = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&reloads);
        transport.set_reload_handler(move |force| recorded.lock().push(force));

        let inspector = Inspector::new(
            transport.clone(),
            InspectorConfig {
                call_timeout: Duration::from_millis(300),
                ..InspectorConfig::default()
            },
        );
        inspector.connect("blob:https://editor.example/1").await.expect("connect");
        transport.receive(r#"{"type":"connect","url":"blob:https://editor.example/1"}"#);

        let result = inspector
            .send(&Command::Page(PageCommand::Reload { ignore_cache: false }))
            .await
            .expect("reload answered");
        assert_eq!(result, serde_json::json!({}));
        inspector
            .call("Page", "navigate", serde_json::json!({ "url": "/about.html" }))
            .await
            .expect("navigate answered");

        assert_eq!(*reloads.lock(), vec![false, true]);
        assert_eq!(inspector.pending_count(), 0);
        assert_eq!(target.posted.lock().len(), 1);
    }

    #[test]
    fn test_inbound_message_resolves_blob_urls() {
        let server = blob_server();
        let url = server.register("/css/main.css");
        let transport = PostMessageTransport::new(Arc::new(RecordingTarget::default()))
            .with_url_mapper(server);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        transport.set_callbacks(TransportCallbacks::new().on_message(move |m| sink.lock().push(m)));
        transport.receive(r#"{"type":"connect"}"#);

        let payload = format!(r#"{{"sheets":["{url}","blob:https://editor.example/unknown"]}}"#);
        let envelope = serde_json::json!({ "type": "message", "message": payload }).to_string();
        transport.receive(&envelope);

        assert_eq!(
            received.lock()[0],
            r#"{"sheets":["/css/main.css","blob:https://editor.example/unknown"]}"#
        );
    }

    #[test]
    fn test_navigation_request_goes_to_handler() {
        let transport = PostMessageTransport::new(Arc::new(RecordingTarget::default()));
        let messages = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&messages);
        transport.set_callbacks(TransportCallbacks::new().on_message(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let navigated = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&navigated);
        transport.set_navigation_handler(move |path| *sink.lock() = Some(path));

        transport.receive(r#"{"type":"message","message":"bramble-navigate:/docs/about%20us.html"}"#);

        assert_eq!(navigated.lock().as_deref(), Some("/docs/about us.html"));
        assert_eq!(messages.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolve_paths_maps_only_known_files() {
        let server = blob_server();
        let css = server.register("/site/style.css");
        let transport = PostMessageTransport::new(Arc::new(RecordingTarget::default()))
            .with_url_mapper(server);

        let message = r#"{"method":"CSS.setStyleSheetText","params":{"url":"style.css"}}"#;
        assert_eq!(transport.resolve_paths(message), message);

        transport.set_live_document(Some("/site/index.html".into()));
        assert_eq!(
            transport.resolve_paths(message),
            format!(r#"{{"method":"CSS.setStyleSheetText","params":{{"url":"{css}"}}}}"#)
        );

        let unknown = r#"{"params":{"href":"missing.css"}}"#;
        assert_eq!(transport.resolve_paths(unknown), unknown);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let transport = PostMessageTransport::new(Arc::new(RecordingTarget::default()));
        transport.receive("not json");
        transport.receive(r#"{"type":"other"}"#);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }
}
