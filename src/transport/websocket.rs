//! WebSocket transport and event loop.
//!
//! The transport spawns a tokio task per connection that handles:
//!
//! - Incoming text frames, delivered to the message callback in order
//! - Outgoing messages queued by [`Transport::send`]
//! - Close frames, stream errors and local shutdown
//!
//! The same loop serves both directions of connection setup: dialing out
//! with [`Transport::connect`] and accepting the live page's connection
//! through a [`TransportListener`](super::TransportListener).

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};

use super::{ConnectionState, Transport, TransportCallbacks, TransportCore};

// ============================================================================
// LoopCommand
// ============================================================================

/// Internal commands for the event loop.
enum LoopCommand {
    /// Write one text frame.
    Send(String),
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// WebSocketTransport
// ============================================================================

/// WebSocket transport to the live page.
///
/// # Thread Safety
///
/// `WebSocketTransport` is `Send + Sync`; share it behind an `Arc`.
#[derive(Default)]
pub struct WebSocketTransport {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    core: TransportCore,
    outbound: Mutex<Option<mpsc::UnboundedSender<LoopCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of an established WebSocket stream.
    ///
    /// Marks the transport connected, fires the connect callback and
    /// spawns the event loop.
    pub(crate) fn attach<S>(&self, ws_stream: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.inner.outbound.lock() = Some(command_tx);

        self.inner.core.connected();

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let reason = run_event_loop(ws_stream, command_rx, &inner.core).await;
            inner.outbound.lock().take();
            inner.core.closed(reason);
            debug!("Event loop terminated");
        });
        *self.inner.task.lock() = Some(handle);
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<()> {
        let has_task = self.inner.task.lock().is_some();
        if has_task {
            self.close().await;
        }

        let target = Url::parse(url)?;
        self.inner.core.set_state(ConnectionState::Connecting);

        match tokio_tungstenite::connect_async(target.as_str()).await {
            Ok((ws_stream, _)) => {
                info!(url = %target, "WebSocket connection established");
                self.attach(ws_stream);
                Ok(())
            }
            Err(e) => {
                self.inner.core.set_state(ConnectionState::Disconnected);
                warn!(url = %target, error = %e, "WebSocket connect failed");
                Err(Error::connection(format!("{target}: {e}")))
            }
        }
    }

    fn send(&self, message: String) -> Result<()> {
        if !self.inner.core.state().is_connected() {
            warn!("Dropping message sent while not connected");
            return Err(Error::NotConnected);
        }

        let outbound = self.inner.outbound.lock().clone();
        outbound
            .ok_or(Error::NotConnected)?
            .send(LoopCommand::Send(message))
            .map_err(|_| Error::NotConnected)
    }

    async fn close(&self) {
        let outbound = self.inner.outbound.lock().take();
        let task = self.inner.task.lock().take();

        if let Some(outbound) = outbound {
            let _ = outbound.send(LoopCommand::Shutdown);
        }

        match task {
            Some(task) => {
                if let Err(e) = task.await {
                    error!(error = %e, "Event loop panicked");
                }
            }
            None => {
                self.inner.core.closed(None);
            }
        }
    }

    fn set_callbacks(&self, callbacks: TransportCallbacks) {
        self.inner.core.set_callbacks(callbacks);
    }

    fn state(&self) -> ConnectionState {
        self.inner.core.state()
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Runs until either side closes. Returns the close reason, `None` for a
/// local shutdown.
async fn run_event_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut command_rx: mpsc::UnboundedReceiver<LoopCommand>,
    core: &TransportCore,
) -> Option<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            // Incoming frames from the live page
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Message received");
                        core.message(text.as_str().to_owned());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!("WebSocket closed by remote");
                        let reason = frame
                            .map(|f| f.reason.as_str().to_owned())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| "closed by remote".to_string());
                        return Some(reason);
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        return Some(e.to_string());
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        return Some("stream ended".to_string());
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Messages from the editor
            command = command_rx.recv() => {
                match command {
                    Some(LoopCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "Failed to send message");
                            return Some(e.to_string());
                        }
                        trace!("Message sent");
                    }

                    Some(LoopCommand::Shutdown) | None => {
                        debug!("Shutdown requested");
                        let _ = ws_write.close().await;
                        return None;
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = WebSocketTransport::new();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let transport = WebSocketTransport::new();
        let result = transport.send("{}".into());
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_refused_leaves_transport_disconnected() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let transport = WebSocketTransport::new();
        let result = transport.connect(&format!("ws://127.0.0.1:{port}")).await;

        assert!(result.is_err());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let transport = WebSocketTransport::new();
        let result = transport.connect("not a url").await;
        assert!(matches!(result, Err(Error::Url(_))));
    }
}
