//! In-process transport.
//!
//! [`MemoryTransport`] is the editor end; [`MemoryPeer`] plays the live
//! page. Messages delivered by the peer reach the transport's message
//! callback synchronously, which makes dispatch order deterministic in
//! tests.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Event, Message, RemoteError, Request, Response};

use super::{ConnectionState, Transport, TransportCallbacks, TransportCore};

// ============================================================================
// MemoryTransport
// ============================================================================

/// Editor end of an in-process channel.
pub struct MemoryTransport {
    core: Arc<TransportCore>,
    outbound: mpsc::UnboundedSender<String>,
    refuse: Arc<Mutex<bool>>,
    url: Arc<Mutex<Option<String>>>,
}

impl MemoryTransport {
    /// Creates a connected-on-demand transport and its peer.
    #[must_use]
    pub fn pair() -> (Self, MemoryPeer) {
        let core = Arc::new(TransportCore::default());
        let (outbound, inbound) = mpsc::unbounded_channel();
        let refuse = Arc::new(Mutex::new(false));
        let url = Arc::new(Mutex::new(None));

        let transport = Self {
            core: Arc::clone(&core),
            outbound,
            refuse: Arc::clone(&refuse),
            url: Arc::clone(&url),
        };
        let peer = MemoryPeer {
            core,
            inbound: AsyncMutex::new(inbound),
            refuse,
            url,
        };
        (transport, peer)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, url: &str) -> Result<()> {
        if *self.refuse.lock() {
            return Err(Error::connection(format!("{url}: refused by peer")));
        }
        *self.url.lock() = Some(url.to_string());
        debug!(url, "Memory transport connected");
        self.core.connected();
        Ok(())
    }

    fn send(&self, message: String) -> Result<()> {
        if !self.core.state().is_connected() {
            warn!("Dropping message sent while not connected");
            return Err(Error::NotConnected);
        }
        self.outbound.send(message).map_err(|_| Error::NotConnected)
    }

    async fn close(&self) {
        self.core.closed(None);
    }

    fn set_callbacks(&self, callbacks: TransportCallbacks) {
        self.core.set_callbacks(callbacks);
    }

    fn state(&self) -> ConnectionState {
        self.core.state()
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Live-page end of an in-process channel.
///
/// Share it behind an `Arc` to answer requests from a spawned task while
/// the test body emits events.
pub struct MemoryPeer {
    core: Arc<TransportCore>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<String>>,
    refuse: Arc<Mutex<bool>>,
    url: Arc<Mutex<Option<String>>>,
}

impl MemoryPeer {
    /// Makes future `connect()` calls fail without firing the callback.
    pub fn refuse_connections(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }

    /// Returns the URL of the last successful `connect()`.
    #[must_use]
    pub fn connected_url(&self) -> Option<String> {
        self.url.lock().clone()
    }

    /// Waits for the next message the editor sent.
    pub async fn next_sent(&self) -> Option<String> {
        self.inbound.lock().await.recv().await
    }

    /// Returns the next sent message if one is queued.
    pub fn try_next_sent(&self) -> Option<String> {
        self.inbound.try_lock().ok()?.try_recv().ok()
    }

    /// Waits for the next message and parses it as a command.
    ///
    /// Messages that are not command envelopes are skipped.
    pub async fn next_request(&self) -> Option<Request> {
        loop {
            let text = self.next_sent().await?;
            if let Ok(Message::Command(request)) = Message::parse(&text) {
                return Some(request);
            }
        }
    }

    /// Delivers a raw message to the editor.
    pub fn deliver(&self, text: impl Into<String>) {
        self.core.message(text.into());
    }

    /// Answers a request with a result.
    pub fn respond(&self, id: RequestId, result: Value) {
        self.deliver_message(Message::Response(Response::Ok { id, result }));
    }

    /// Answers a request with an error.
    pub fn respond_error(&self, id: RequestId, message: impl Into<String>) {
        self.deliver_message(Message::Response(Response::Error {
            id,
            error: RemoteError::new(message),
        }));
    }

    /// Emits a protocol event.
    pub fn emit(&self, method: &str, params: Value) {
        self.deliver_message(Message::Event(Event::new(method, params)));
    }

    /// Answers every future request with `responder`'s result, until the
    /// editor end is dropped.
    ///
    /// A responder returning `Err` answers with that error message.
    pub fn spawn_responder<F>(self: &Arc<Self>, responder: F) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&Request) -> std::result::Result<Value, String> + Send + 'static,
    {
        let peer = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(request) = peer.next_request().await {
                match responder(&request) {
                    Ok(result) => peer.respond(request.id, result),
                    Err(message) => peer.respond_error(request.id, message),
                }
            }
        })
    }

    /// Closes the channel from the page side.
    pub fn close(&self, reason: Option<String>) {
        self.core.closed(reason);
    }

    fn deliver_message(&self, message: Message) {
        match message.to_json() {
            Ok(text) => self.deliver(text),
            Err(e) => warn!(error = %e, "Failed to encode peer message"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
