//! WebSocket listener for the live page.
//!
//! The editor binds a listener, injects its URL into the live document and
//! waits for the page's runtime script to dial back.
//!
//! # Connection Flow
//!
//! 1. Bind to `127.0.0.1:0` (random port)
//! 2. Inject [`TransportListener::ws_url`] into the served HTML
//! 3. The page connects; the socket is upgraded to WebSocket
//! 4. The stream is handed to a [`WebSocketTransport`], which fires its
//!    connect callback

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::WebSocketTransport;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for the live page to connect.
const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// TransportListener
// ============================================================================

/// A bound listener whose live page has not connected yet.
///
/// # Example
///
/// ```ignore
/// use std::net::{IpAddr, Ipv4Addr};
/// use livedev_bridge::transport::{TransportListener, WebSocketTransport};
///
/// let listener = TransportListener::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
/// let ws_url = listener.ws_url();
///
/// // Serve HTML that connects back to ws_url...
///
/// let transport = WebSocketTransport::new();
/// listener.accept(&transport).await?;
/// ```
pub struct TransportListener {
    /// TCP listener for incoming connections.
    listener: TcpListener,
    /// Port the listener is bound to.
    port: u16,
    /// How long `accept` waits.
    accept_timeout: Duration,
}

impl TransportListener {
    /// Binds to the given address and port.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Self> {
        let addr = SocketAddr::new(ip, port);
        let listener = TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        debug!(port = actual_port, "Live page listener bound");

        Ok(Self {
            listener,
            port: actual_port,
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
        })
    }

    /// Overrides how long [`accept`](Self::accept) waits.
    #[inline]
    #[must_use]
    pub fn with_accept_timeout(mut self, accept_timeout: Duration) -> Self {
        self.accept_timeout = accept_timeout;
        self
    }

    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the WebSocket URL the live page should connect to.
    ///
    /// Format: `ws://127.0.0.1:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.port)
    }

    /// Accepts the live page's connection and hands it to `transport`.
    ///
    /// Install callbacks on `transport` first; the connect callback fires
    /// before this returns.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the page doesn't connect in time
    /// - [`Error::Connection`] if the WebSocket upgrade fails
    pub async fn accept(self, transport: &WebSocketTransport) -> Result<()> {
        let timeout_ms = self.accept_timeout.as_millis() as u64;
        let (stream, addr) = timeout(self.accept_timeout, self.listener.accept())
            .await
            .map_err(|_| Error::connection_timeout(timeout_ms))??;

        debug!(?addr, "TCP connection accepted");

        let ws_stream = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        info!(port = self.port, "Live page connected");

        transport.attach(ws_stream);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
