//! Remote debugger page discovery.
//!
//! A debugger listening on `host:port` lists its pages as JSON at `/json`.
//! Each entry names the page URL and the WebSocket URL that debugs it, so
//! a session can start from the page's address instead of a socket URL.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Host the remote debugger listens on unless told otherwise.
pub const DEFAULT_DEBUGGER_HOST: &str = "127.0.0.1";

/// Port the remote debugger listens on unless told otherwise.
pub const DEFAULT_DEBUGGER_PORT: u16 = 9222;

/// How long the page listing may take.
const DEFAULT_LIST_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// DebuggableWindow
// ============================================================================

/// One entry of the debugger's page listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggableWindow {
    /// Debugger-assigned target id.
    #[serde(default)]
    pub id: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Page URL.
    #[serde(default)]
    pub url: String,
    /// Target type, e.g. `page` or `background_page`.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Socket to debug the page through; absent while another client is
    /// attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

/// Returns the first attachable window whose URL starts with `url`.
#[must_use]
pub fn find_window<'a>(windows: &'a [DebuggableWindow], url: &str) -> Option<&'a DebuggableWindow> {
    windows
        .iter()
        .find(|window| window.web_socket_debugger_url.is_some() && window.url.starts_with(url))
}

// ============================================================================
// DebuggerEndpoint
// ============================================================================

/// HTTP address of a remote debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerEndpoint {
    /// Host name or IP.
    pub host: String,
    /// Debugger port.
    pub port: u16,
    /// Bound on fetching the listing.
    pub timeout: Duration,
}

impl Default for DebuggerEndpoint {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUGGER_HOST, DEFAULT_DEBUGGER_PORT)
    }
}

impl DebuggerEndpoint {
    /// Creates an endpoint for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_LIST_TIMEOUT,
        }
    }

    /// Sets the listing timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the URL of the page listing.
    #[inline]
    #[must_use]
    pub fn list_url(&self) -> String {
        format!("http://{}:{}/json", self.host, self.port)
    }

    /// Fetches the debuggable windows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`](crate::Error::Http) if the debugger cannot
    /// be reached, answers with a failure status, or sends something that
    /// is not a window list.
    pub async fn windows(&self) -> Result<Vec<DebuggableWindow>> {
        let url = self.list_url();
        debug!(url = %url, "Fetching debuggable windows");

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let windows = client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<DebuggableWindow>>()
            .await?;

        debug!(url = %url, count = windows.len(), "Debuggable windows listed");
        Ok(windows)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use crate::error::Error;
    use crate::inspector::{Inspector, InspectorConfig};
    use crate::transport::MemoryTransport;

    const PAGE_WS: &str = "ws://127.0.0.1:9222/devtools/page/A1";

    fn listing() -> serde_json::Value {
        json!([
            {
                "id": "B2", "type": "page", "title": "busy",
                "url": "http://127.0.0.1:8000/index.html"
            },
            {
                "id": "A1", "type": "page", "title": "Live",
                "url": "http://127.0.0.1:8000/index.html?live=1",
                "webSocketDebuggerUrl": PAGE_WS
            }
        ])
    }

    /// Serves `body` as JSON to every request. The first response waits
    /// `first_delay`.
    async fn debugger(body: serde_json::Value, first_delay: Duration) -> DebuggerEndpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let body = body.to_string();

        tokio::spawn(async move {
            let mut delay = first_delay;
            while let Ok((mut stream, _)) = listener.accept().await {
                let body = body.clone();
                let wait = std::mem::take(&mut delay);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    tokio::time::sleep(wait).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        DebuggerEndpoint::new("127.0.0.1", port)
    }

    #[test]
    fn test_find_window_skips_attached_pages() {
        let windows: Vec<DebuggableWindow> =
            serde_json::from_value(listing()).expect("windows");

        let found = find_window(&windows, "http://127.0.0.1:8000/index.html").expect("found");
        assert_eq!(found.id, "A1");
        assert_eq!(found.kind, "page");
        assert!(find_window(&windows, "http://127.0.0.1:8000/other.html").is_none());
    }

    #[test]
    fn test_default_endpoint() {
        let endpoint = DebuggerEndpoint::default();
        assert_eq!(endpoint.list_url(), "http://127.0.0.1:9222/json");
    }

    #[tokio::test]
    async fn test_windows_lists_debugger_pages() {
        let endpoint = debugger(listing(), Duration::ZERO).await;

        let windows = endpoint.windows().await.expect("windows");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1].web_socket_debugger_url.as_deref(), Some(PAGE_WS));
    }

    #[tokio::test]
    async fn test_unreachable_debugger_is_http_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let endpoint = DebuggerEndpoint::new("127.0.0.1", port);

        let err = endpoint.windows().await.expect_err("nothing listening");
        assert!(matches!(err, Error::Http(_)));
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_connect_to_url_uses_listed_socket() {
        let endpoint = debugger(listing(), Duration::ZERO).await;
        let (transport, peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), InspectorConfig::default());

        let ws = inspector
            .connect_to_url(&endpoint, "http://127.0.0.1:8000/index.html")
            .await
            .expect("connect");

        assert_eq!(ws, PAGE_WS);
        assert!(inspector.is_connected());
        assert_eq!(peer.connected_url().as_deref(), Some(PAGE_WS));
    }

    #[tokio::test]
    async fn test_connect_to_unlisted_url_fails() {
        let endpoint = debugger(listing(), Duration::ZERO).await;
        let (transport, _peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), InspectorConfig::default());

        let err = inspector
            .connect_to_url(&endpoint, "http://127.0.0.1:8000/missing.html")
            .await
            .expect_err("not listed");
        assert!(matches!(err, Error::PageNotFound { url } if url.ends_with("missing.html")));
        assert!(!inspector.is_connected());
    }

    #[tokio::test]
    async fn test_newer_connect_cancels_older() {
        let endpoint = debugger(listing(), Duration::from_millis(200)).await;
        let (transport, peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), InspectorConfig::default());

        let older = tokio::spawn({
            let inspector = inspector.clone();
            let endpoint = endpoint.clone();
            async move {
                inspector
                    .connect_to_url(&endpoint, "http://127.0.0.1:8000/index.html")
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let newer = inspector
            .connect_to_url(&endpoint, "http://127.0.0.1:8000/index.html")
            .await
            .expect("newer attempt");
        assert_eq!(newer, PAGE_WS);

        let err = older.await.expect("join").expect_err("superseded");
        assert!(matches!(err, Error::ConnectCancelled));
        assert_eq!(peer.connected_url().as_deref(), Some(PAGE_WS));
    }
}
