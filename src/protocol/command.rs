//! Command definitions organized by domain.
//!
//! Commands follow `Domain.command` format.
//!
//! # Command Domains
//!
//! | Domain | Commands |
//! |--------|----------|
//! | `Page` | enable, reload, navigate |
//! | `DOM` | document fetch, child requests, text edits, native highlight |
//! | `CSS` | style sheet enumeration and text replacement |
//! | `Runtime` | expression evaluation in the live page |
//! | `Network` | enable |
//! | `Console` | enable |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::NodeId;

use super::types::HighlightConfig;

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by domain.
///
/// This enum wraps domain-specific command enums for unified serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Page domain commands.
    Page(PageCommand),
    /// DOM domain commands.
    Dom(DomCommand),
    /// CSS domain commands.
    Css(CssCommand),
    /// Runtime domain commands.
    Runtime(RuntimeCommand),
    /// Network domain commands.
    Network(NetworkCommand),
    /// Console domain commands.
    Console(ConsoleCommand),
}

impl Command {
    /// Splits the command into its wire method and params object.
    ///
    /// Commands without params get an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails, or
    /// [`Error::Protocol`] if the serialized form has no method.
    pub fn to_parts(&self) -> Result<(String, Value)> {
        let value = serde_json::to_value(self)?;
        let Value::Object(mut object) = value else {
            return Err(Error::protocol("command did not serialize to an object"));
        };

        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(Error::protocol("command has no method")),
        };
        let params = object
            .remove("params")
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok((method, params))
    }
}

// ============================================================================
// Page Commands
// ============================================================================

/// Page domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PageCommand {
    /// Enable page events.
    #[serde(rename = "Page.enable")]
    Enable,

    /// Reload the live page.
    #[serde(rename = "Page.reload")]
    Reload {
        /// Bypass the cache.
        #[serde(rename = "ignoreCache")]
        ignore_cache: bool,
    },

    /// Navigate the live page.
    #[serde(rename = "Page.navigate")]
    Navigate {
        /// Target URL.
        url: String,
    },
}

// ============================================================================
// DOM Commands
// ============================================================================

/// DOM domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum DomCommand {
    /// Enable DOM events.
    #[serde(rename = "DOM.enable")]
    Enable,

    /// Fetch the document root.
    #[serde(rename = "DOM.getDocument")]
    GetDocument,

    /// Ask for a node's children (answered by `DOM.setChildNodes`).
    #[serde(rename = "DOM.requestChildNodes")]
    RequestChildNodes {
        /// Parent node.
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },

    /// Replace a text node's value.
    #[serde(rename = "DOM.setNodeValue")]
    SetNodeValue {
        /// Text node.
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        /// New value.
        value: String,
    },

    /// Draw the native highlight overlay on a node.
    #[serde(rename = "DOM.highlightNode")]
    HighlightNode {
        /// Highlighted node.
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        /// Overlay colors.
        #[serde(rename = "highlightConfig")]
        highlight_config: HighlightConfig,
    },

    /// Remove the native highlight overlay.
    #[serde(rename = "DOM.hideHighlight")]
    HideHighlight,

    /// Resolve a node to a remote object.
    #[serde(rename = "DOM.resolveNode")]
    ResolveNode {
        /// Node to resolve.
        #[serde(rename = "nodeId")]
        node_id: NodeId,
    },
}

// ============================================================================
// CSS Commands
// ============================================================================

/// CSS domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum CssCommand {
    /// Enable CSS events.
    #[serde(rename = "CSS.enable")]
    Enable,

    /// List every style sheet in the page.
    #[serde(rename = "CSS.getAllStyleSheets")]
    GetAllStyleSheets,

    /// Read a sheet's current text.
    #[serde(rename = "CSS.getStyleSheetText")]
    GetStyleSheetText {
        /// Remote sheet handle.
        #[serde(rename = "styleSheetId")]
        style_sheet_id: String,
    },

    /// Replace a sheet's text.
    #[serde(rename = "CSS.setStyleSheetText")]
    SetStyleSheetText {
        /// Remote sheet handle.
        #[serde(rename = "styleSheetId")]
        style_sheet_id: String,
        /// New sheet text.
        text: String,
    },
}

// ============================================================================
// Runtime Commands
// ============================================================================

/// Runtime domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum RuntimeCommand {
    /// Evaluate an expression in the live page.
    #[serde(rename = "Runtime.evaluate")]
    Evaluate {
        /// JavaScript expression.
        expression: String,
    },
}

// ============================================================================
// Network Commands
// ============================================================================

/// Network domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum NetworkCommand {
    /// Enable network events.
    #[serde(rename = "Network.enable")]
    Enable,
}

// ============================================================================
// Console Commands
// ============================================================================

/// Console domain commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ConsoleCommand {
    /// Enable console events.
    #[serde(rename = "Console.enable")]
    Enable,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_page_navigate_serialization() {
        let command = Command::Page(PageCommand::Navigate {
            url: "http://localhost/index.html".into(),
        });
        let json = serde_json::to_value(&command).expect("serialize");

        assert_eq!(json["method"], "Page.navigate");
        assert_eq!(json["params"]["url"], "http://localhost/index.html");
    }

    #[test]
    fn test_to_parts_unit_command_gets_empty_params() {
        let (method, params) = Command::Css(CssCommand::GetAllStyleSheets)
            .to_parts()
            .expect("parts");

        assert_eq!(method, "CSS.getAllStyleSheets");
        assert_eq!(params, json!({}));
    }

    #[test]
    fn test_to_parts_renames_fields() {
        let (method, params) = Command::Dom(DomCommand::SetNodeValue {
            node_id: NodeId::new(9),
            value: "hello".into(),
        })
        .to_parts()
        .expect("parts");

        assert_eq!(method, "DOM.setNodeValue");
        assert_eq!(params, json!({"nodeId": 9, "value": "hello"}));
    }

    #[test]
    fn test_command_deserialization() {
        let command: Command = serde_json::from_value(json!({
            "method": "CSS.setStyleSheetText",
            "params": {"styleSheetId": "1", "text": "body {}"}
        }))
        .expect("deserialize");

        assert_eq!(
            command,
            Command::Css(CssCommand::SetStyleSheetText {
                style_sheet_id: "1".into(),
                text: "body {}".into(),
            })
        );
    }
}
