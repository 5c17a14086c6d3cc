//! Transport layer.
//!
//! A transport is a duplex channel carrying opaque strings between the
//! editor and the live page. It knows nothing about the protocol carried
//! over it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Editor (Rust)  │                              │  Live page      │
//! │                 │   WebSocket or postMessage   │                 │
//! │  Inspector      │◄────────────────────────────►│  Remote runtime │
//! │  → Transport    │                              │  script         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Delivery
//!
//! Messages sent while the transport is not connected are dropped and
//! reported with [`Error::NotConnected`](crate::Error::NotConnected).
//! Nothing is queued.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `websocket` | WebSocket transport and event loop |
//! | `listener` | WebSocket listener the live page connects to |
//! | `post_message` | postMessage-style relay through an embedding window |
//! | `memory` | In-process transport for tests and embedders |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket transport and event loop.
pub mod websocket;

/// WebSocket listener the live page connects to.
pub mod listener;

/// postMessage-style transport.
pub mod post_message;

/// In-process transport.
pub mod memory;

// ============================================================================
// Re-exports
// ============================================================================

pub use listener::TransportListener;
pub use memory::{MemoryPeer, MemoryTransport};
pub use post_message::{MessageTarget, PostMessageTransport};
pub use websocket::WebSocketTransport;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Never connected.
    Disconnected,
    /// `connect()` issued, waiting for the channel or handshake.
    Connecting,
    /// Logical connection established.
    Connected,
    /// Closed locally or by the remote end.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if messages can be sent.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Callbacks
// ============================================================================

/// Called once a logical connection is established.
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Called for every inbound message, in arrival order.
pub type MessageCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Called when the channel closes, with an optional reason.
pub type CloseCallback = Arc<dyn Fn(Option<String>) + Send + Sync>;

/// The full callback set owned by one transport user.
///
/// Installing a set replaces the previous one entirely.
#[derive(Clone, Default)]
pub struct TransportCallbacks {
    on_connect: Option<ConnectCallback>,
    on_message: Option<MessageCallback>,
    on_close: Option<CloseCallback>,
}

impl TransportCallbacks {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connect callback.
    #[must_use]
    pub fn on_connect(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(callback));
        self
    }

    /// Sets the message callback.
    #[must_use]
    pub fn on_message(mut self, callback: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(callback));
        self
    }

    /// Sets the close callback.
    #[must_use]
    pub fn on_close(mut self, callback: impl Fn(Option<String>) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for TransportCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportCallbacks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .finish()
    }
}

// ============================================================================
// TransportCore
// ============================================================================

/// State and callback slot shared by every transport implementation.
///
/// Callbacks are cloned out of the lock before they run, so a callback may
/// replace the callback set or query the state without deadlocking.
#[derive(Debug)]
pub(crate) struct TransportCore {
    state: Mutex<ConnectionState>,
    callbacks: Mutex<TransportCallbacks>,
}

impl Default for TransportCore {
    fn default() -> Self {
        Self {
            state: Mutex::new(ConnectionState::Disconnected),
            callbacks: Mutex::new(TransportCallbacks::default()),
        }
    }
}

impl TransportCore {
    #[inline]
    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    #[inline]
    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    #[inline]
    pub(crate) fn set_callbacks(&self, callbacks: TransportCallbacks) {
        *self.callbacks.lock() = callbacks;
    }

    /// Marks the transport connected and fires the connect callback.
    pub(crate) fn connected(&self) {
        self.set_state(ConnectionState::Connected);
        let callback = self.callbacks.lock().on_connect.clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Delivers one inbound message.
    pub(crate) fn message(&self, text: String) {
        let callback = self.callbacks.lock().on_message.clone();
        if let Some(callback) = callback {
            callback(text);
        }
    }

    /// Marks the transport closed and fires the close callback once.
    ///
    /// Returns `false` if the transport was already closed.
    pub(crate) fn closed(&self, reason: Option<String>) -> bool {
        {
            let mut state = self.state.lock();
            if *state == ConnectionState::Closed {
                return false;
            }
            *state = ConnectionState::Closed;
        }
        let callback = self.callbacks.lock().on_close.clone();
        if let Some(callback) = callback {
            callback(reason);
        }
        true
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Duplex string channel between the editor and the live page.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the channel.
    ///
    /// The connect callback fires once the logical connection exists, which
    /// may be later than this call returning if a handshake is required. If
    /// the channel cannot be opened the connect callback never fires.
    async fn connect(&self, url: &str) -> Result<()>;

    /// Sends one opaque message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`](crate::Error::NotConnected) and drops
    /// the message if the transport is not connected.
    fn send(&self, message: String) -> Result<()>;

    /// Closes the channel. The close callback fires once.
    async fn close(&self);

    /// Replaces the whole callback set.
    fn set_callbacks(&self, callbacks: TransportCallbacks);

    /// Returns the current lifecycle state.
    fn state(&self) -> ConnectionState;
}

// ============================================================================
// Tests
// ============================================================================
