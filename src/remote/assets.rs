//! Runtime scripts injected into the live document.
//!
//! The live page runs a transport shim, the protocol handler, link
//! interception, the highlight hooks and a DOM mirror. [`remote_script`] renders them as
//! `<script>` blocks; [`inject_into_html`] places the blocks at the top of
//! the document head so they run before any page script.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;

use crate::protocol::Rgba;

// ============================================================================
// Types
// ============================================================================

/// Which transport shim the live page uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteTransportKind {
    /// Dial the editor's WebSocket listener.
    WebSocket {
        /// Listener URL (`ws://127.0.0.1:<port>`).
        url: String,
    },
    /// Relay through the opener or parent window.
    PostMessage,
}

/// Settings for the rendered runtime script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScriptOptions {
    /// Transport shim.
    pub transport: RemoteTransportKind,
    /// Base URL for protocol-less relative links, if the document is served
    /// from a URL that does not reflect its project location.
    pub base_href: Option<String>,
    /// Fill color for rule highlights.
    pub highlight_color: Rgba,
}

impl RemoteScriptOptions {
    /// Options for a page that dials `ws_url`.
    #[must_use]
    pub fn websocket(ws_url: impl Into<String>) -> Self {
        Self {
            transport: RemoteTransportKind::WebSocket { url: ws_url.into() },
            base_href: None,
            highlight_color: Rgba::new(111, 168, 220, 168),
        }
    }

    /// Options for a page embedded in the editor window.
    #[must_use]
    pub fn post_message() -> Self {
        Self {
            transport: RemoteTransportKind::PostMessage,
            base_href: None,
            highlight_color: Rgba::new(111, 168, 220, 168),
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_href(mut self, base_href: impl Into<String>) -> Self {
        self.base_href = Some(base_href.into());
        self
    }

    /// Sets the rule highlight color.
    #[must_use]
    pub fn with_highlight_color(mut self, color: Rgba) -> Self {
        self.highlight_color = color;
        self
    }
}

// ============================================================================
// Public Functions
// ============================================================================

/// Renders the runtime script blocks.
#[must_use]
pub fn remote_script(options: &RemoteScriptOptions) -> String {
    let transport = match &options.transport {
        RemoteTransportKind::WebSocket { url } => {
            let quoted = serde_json::Value::from(url.as_str()).to_string();
            WEBSOCKET_TRANSPORT_JS.replace("\"$WS_URL\"", &quoted)
        }
        RemoteTransportKind::PostMessage => POST_MESSAGE_TRANSPORT_JS.to_string(),
    };

    let color = options.highlight_color;
    let remote_functions = REMOTE_FUNCTIONS_JS.replace(
        "$CONTENT_COLOR",
        &format!(
            "rgba({},{},{},{:.2})",
            color.r,
            color.g,
            color.b,
            f64::from(color.a) / 255.0
        ),
    );

    let mut html = String::new();
    if let Some(base_href) = &options.base_href {
        html.push_str(&format!(
            "<base href=\"{}\">\n",
            base_href.replace('"', "&quot;")
        ));
    }
    for script in [
        transport.as_str(),
        PROTOCOL_JS,
        LINKS_JS,
        remote_functions.as_str(),
        DOM_JS,
    ] {
        html.push_str("<script>\n");
        html.push_str(script);
        html.push_str("</script>\n");
    }
    html
}

/// Inserts `script` right after the opening `<head>` tag.
///
/// Falls back to after `<html>`, then to the very start of the document.
#[must_use]
pub fn inject_into_html(html: &str, script: &str) -> String {
    let anchor = [&*HEAD_OPEN, &*HTML_OPEN]
        .into_iter()
        .flatten()
        .find_map(|re| re.find(html))
        .map(|m| m.end())
        .unwrap_or(0);

    let mut out = String::with_capacity(html.len() + script.len() + 1);
    out.push_str(&html[..anchor]);
    if anchor > 0 {
        out.push('\n');
    }
    out.push_str(script);
    out.push_str(&html[anchor..]);
    out
}

// ============================================================================
// Constants
// ============================================================================

/// Opening `<head>` tag.
static HEAD_OPEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<head(\s[^>]*)?>").ok());

/// Opening `<html>` tag.
static HTML_OPEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<html(\s[^>]*)?>").ok());

/// WebSocket transport shim.
const WEBSOCKET_TRANSPORT_JS: &str = include_str!("js/transport_websocket.js");

/// postMessage transport shim.
const POST_MESSAGE_TRANSPORT_JS: &str = include_str!("js/transport_post_message.js");

/// Protocol handler.
const PROTOCOL_JS: &str = include_str!("js/protocol.js");

/// Link click interception.
const LINKS_JS: &str = include_str!("js/links.js");

/// Rule highlight hooks (`_LD.*`).
const REMOTE_FUNCTIONS_JS: &str = include_str!("js/remote_functions.js");

/// DOM and Network domains for pages without a native debugger.
const DOM_JS: &str = include_str!("js/dom.js");

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_script_embeds_url() {
        let script = remote_script(&RemoteScriptOptions::websocket("ws://127.0.0.1:4000"));
        assert!(script.contains("new WebSocket(\"ws://127.0.0.1:4000\")"));
        assert!(!script.contains("$WS_URL"));
        assert!(script.contains("bramble-navigate:"));
        assert_eq!(script.matches("<script>").count(), 5);
        assert!(script.contains("DOM.characterDataModified"));
    }

    #[test]
    fn test_post_message_script_has_base_and_color() {
        let script = remote_script(
            &RemoteScriptOptions::post_message()
                .with_base_href("https://editor.example/")
                .with_highlight_color(Rgba::new(255, 0, 0, 255)),
        );
        assert!(script.starts_with("<base href=\"https://editor.example/\">"));
        assert!(script.contains("rgba(255,0,0,1.00)"));
        assert!(script.contains("type: \"connect\""));
    }

    #[test]
    fn test_inject_after_head() {
        let html = "<!DOCTYPE html><html><HEAD lang=\"en\"><title>x</title></HEAD></html>";
        let out = inject_into_html(html, "<script>1</script>");
        assert!(out.contains("<HEAD lang=\"en\">\n<script>1</script><title>"));
    }

    #[test]
    fn test_inject_without_head_uses_html_then_start() {
        let out = inject_into_html("<html><p>hi</p></html>", "<s/>");
        assert_eq!(out, "<html>\n<s/><p>hi</p></html>");

        let out = inject_into_html("<p>hi</p>", "<s/>");
        assert_eq!(out, "<s/><p>hi</p>");
    }

    #[test]
    fn test_inject_ignores_header_element() {
        let html = "<html><body><header>h</header></body></html>";
        let out = inject_into_html(html, "<s/>");
        assert!(out.starts_with("<html>\n<s/>"));
    }
}
