//! Payload types shared by protocol commands and events.
//!
//! Field names follow the remote debugging protocol's camelCase wire names.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::NodeId;

// ============================================================================
// NodePayload
// ============================================================================

/// A DOM node as reported by `DOM.getDocument` / `DOM.setChildNodes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePayload {
    /// Node id assigned by the remote end.
    pub node_id: NodeId,

    /// DOM node type (1 = element, 3 = text, ...).
    pub node_type: u8,

    /// Upper-case tag name for elements, `#text` for text nodes.
    #[serde(default)]
    pub node_name: String,

    /// Text content for text and comment nodes.
    #[serde(default)]
    pub node_value: String,

    /// Flattened `[name, value, name, value, ...]` attribute list.
    #[serde(default)]
    pub attributes: Vec<String>,

    /// Children, when the remote end sent them inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodePayload>>,

    /// Number of children, when they were not sent inline.
    #[serde(default)]
    pub child_node_count: usize,

    /// Offset of the node in the source document, if the remote end knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_offset: Option<usize>,

    /// Length of the node's source text, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_length: Option<usize>,
}

// ============================================================================
// StyleSheetHeader
// ============================================================================

/// Descriptor of one style sheet loaded in the live page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSheetHeader {
    /// Remote handle used by `CSS.setStyleSheetText`.
    pub style_sheet_id: String,

    /// URL the sheet was loaded from.
    #[serde(rename = "sourceURL", default)]
    pub source_url: String,

    /// Origin (`regular`, `user-agent`, `inspector`, ...).
    #[serde(default)]
    pub origin: String,

    /// Sheet title.
    #[serde(default)]
    pub title: String,

    /// Whether the sheet is disabled.
    #[serde(default)]
    pub disabled: bool,
}

// ============================================================================
// ConsoleMessage
// ============================================================================

/// A console message emitted by the live page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    /// Severity as sent by the remote end (`log`, `warning`, `error`, ...).
    #[serde(default)]
    pub level: String,

    /// Message text.
    #[serde(default)]
    pub text: String,

    /// Message source (`console-api`, `network`, ...).
    #[serde(default)]
    pub source: String,

    /// Script URL the message came from.
    #[serde(default)]
    pub url: String,

    /// Line in `url`.
    #[serde(default)]
    pub line: u32,
}

// ============================================================================
// FrameInfo
// ============================================================================

/// Frame descriptor from `Page.frameNavigated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    /// Frame id.
    #[serde(default)]
    pub id: String,

    /// Parent frame id; absent for the top-level frame.
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Document URL loaded in the frame.
    #[serde(default)]
    pub url: String,
}

// ============================================================================
// HighlightConfig
// ============================================================================

/// RGBA color used by native node highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha, 0-255 (sent as 0.0-1.0).
    #[serde(with = "alpha")]
    pub a: u8,
}

impl Rgba {
    #[inline]
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Alpha is carried as a byte and written as a fraction.
mod alpha {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(f64::from(*value) / 255.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let fraction = f64::deserialize(deserializer)?;
        Ok((fraction.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// Colors for `DOM.highlightNode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightConfig {
    /// Whether the remote end draws an info tooltip.
    pub show_info: bool,
    /// Content box fill.
    pub content_color: Rgba,
    /// Padding box fill.
    pub padding_color: Rgba,
    /// Margin box fill.
    pub margin_color: Rgba,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            show_info: true,
            content_color: Rgba::new(111, 168, 220, 168),
            padding_color: Rgba::new(147, 196, 125, 140),
            margin_color: Rgba::new(246, 178, 107, 168),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
