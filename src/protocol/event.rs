//! Event message types.
//!
//! Events are unsolicited notifications sent from the live page to the
//! editor. Each event is keyed by an [`EventKind`], a closed set of the
//! events this crate reacts to plus an [`EventKind::Other`] fallback that
//! keeps the `Domain.eventName` namespacing for everything else.
//!
//! # Event Types
//!
//! | Domain | Events |
//! |--------|--------|
//! | `Page` | `loadEventFired`, `frameNavigated` |
//! | `DOM` | `documentUpdated`, `setChildNodes`, `childNodeInserted`, `childNodeRemoved`, `childNodeCountUpdated`, `characterDataModified` |
//! | `CSS` | `styleSheetAdded`, `styleSheetRemoved` |
//! | `Network` | `requestWillBeSent` |
//! | `Console` | `messageAdded`, `messageRepeatCountUpdated`, `messagesCleared` |
//! | `Inspector` | `detached` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::NodeId;

use super::types::{ConsoleMessage, FrameInfo, NodePayload, StyleSheetHeader};

// ============================================================================
// EventKind
// ============================================================================

/// Namespaced event key used by the inspector's dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `Page.loadEventFired`
    PageLoadEventFired,
    /// `Page.frameNavigated`
    PageFrameNavigated,
    /// `DOM.documentUpdated`
    DomDocumentUpdated,
    /// `DOM.setChildNodes`
    DomSetChildNodes,
    /// `DOM.childNodeInserted`
    DomChildNodeInserted,
    /// `DOM.childNodeRemoved`
    DomChildNodeRemoved,
    /// `DOM.childNodeCountUpdated`
    DomChildNodeCountUpdated,
    /// `DOM.characterDataModified`
    DomCharacterDataModified,
    /// `CSS.styleSheetAdded`
    CssStyleSheetAdded,
    /// `CSS.styleSheetRemoved`
    CssStyleSheetRemoved,
    /// `Network.requestWillBeSent`
    NetworkRequestWillBeSent,
    /// `Console.messageAdded`
    ConsoleMessageAdded,
    /// `Console.messageRepeatCountUpdated`
    ConsoleMessageRepeatCountUpdated,
    /// `Console.messagesCleared`
    ConsoleMessagesCleared,
    /// `Inspector.detached`
    InspectorDetached,
    /// Any other `Domain.eventName`.
    Other(String),
}

impl EventKind {
    /// Known kinds and their wire names.
    const KNOWN: [(Self, &'static str); 15] = [
        (Self::PageLoadEventFired, "Page.loadEventFired"),
        (Self::PageFrameNavigated, "Page.frameNavigated"),
        (Self::DomDocumentUpdated, "DOM.documentUpdated"),
        (Self::DomSetChildNodes, "DOM.setChildNodes"),
        (Self::DomChildNodeInserted, "DOM.childNodeInserted"),
        (Self::DomChildNodeRemoved, "DOM.childNodeRemoved"),
        (Self::DomChildNodeCountUpdated, "DOM.childNodeCountUpdated"),
        (Self::DomCharacterDataModified, "DOM.characterDataModified"),
        (Self::CssStyleSheetAdded, "CSS.styleSheetAdded"),
        (Self::CssStyleSheetRemoved, "CSS.styleSheetRemoved"),
        (Self::NetworkRequestWillBeSent, "Network.requestWillBeSent"),
        (Self::ConsoleMessageAdded, "Console.messageAdded"),
        (
            Self::ConsoleMessageRepeatCountUpdated,
            "Console.messageRepeatCountUpdated",
        ),
        (Self::ConsoleMessagesCleared, "Console.messagesCleared"),
        (Self::InspectorDetached, "Inspector.detached"),
    ];

    /// Maps a wire method name to its kind.
    #[must_use]
    pub fn from_method(method: &str) -> Self {
        Self::KNOWN
            .iter()
            .find(|(_, name)| *name == method)
            .map(|(kind, _)| kind.clone())
            .unwrap_or_else(|| Self::Other(method.to_string()))
    }

    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &str {
        if let Self::Other(method) = self {
            return method;
        }
        Self::KNOWN
            .iter()
            .find(|(kind, _)| kind == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    /// Returns the domain part (`Page`, `DOM`, ...).
    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method().split('.').next().unwrap_or_default()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

impl From<&str> for EventKind {
    fn from(method: &str) -> Self {
        Self::from_method(method)
    }
}

// ============================================================================
// Event
// ============================================================================

/// An event notification from the live page.
///
/// # Format
///
/// ```json
/// {
///   "method": "Domain.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Returns the dispatch key for this event.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> EventKind {
        EventKind::from_method(&self.method)
    }

    #[inline]
    #[must_use]
    pub fn domain(&self) -> &str {
        self.method.split('.').next().unwrap_or_default()
    }

    #[inline]
    #[must_use]
    pub fn event_name(&self) -> &str {
        self.method.split('.').nth(1).unwrap_or_default()
    }

    /// Parses the event into a typed variant.
    ///
    /// Events whose params do not match the expected shape parse as
    /// [`ParsedEvent::Unknown`].
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        self.parse_internal().unwrap_or_else(|| ParsedEvent::Unknown {
            method: self.method.clone(),
            params: self.params.clone(),
        })
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// Page finished loading.
    PageLoadEventFired {
        /// Remote timestamp.
        timestamp: f64,
    },

    /// A frame navigated to a new document.
    PageFrameNavigated {
        /// Navigated frame.
        frame: FrameInfo,
    },

    /// The document was replaced; previously reported node ids are stale.
    DomDocumentUpdated,

    /// Children requested with `DOM.requestChildNodes` arrived.
    DomSetChildNodes {
        /// Parent node.
        parent_id: NodeId,
        /// Child payloads.
        nodes: Vec<NodePayload>,
    },

    /// A node was inserted.
    DomChildNodeInserted {
        /// Parent node.
        parent_node_id: NodeId,
        /// Sibling the node was inserted after (`0` for first child).
        previous_node_id: NodeId,
        /// Inserted node.
        node: NodePayload,
    },

    /// A node was removed.
    DomChildNodeRemoved {
        /// Parent node.
        parent_node_id: NodeId,
        /// Removed node.
        node_id: NodeId,
    },

    /// A node's child count changed.
    DomChildNodeCountUpdated {
        /// Node whose children changed.
        node_id: NodeId,
        /// New child count.
        child_node_count: usize,
    },

    /// A text node's value changed in the live page.
    DomCharacterDataModified {
        /// Text node.
        node_id: NodeId,
        /// New value.
        character_data: String,
    },

    /// A style sheet was added.
    CssStyleSheetAdded {
        /// Sheet descriptor.
        header: StyleSheetHeader,
    },

    /// A style sheet was removed.
    CssStyleSheetRemoved {
        /// Remote sheet handle.
        style_sheet_id: String,
    },

    /// A network request is about to be issued.
    NetworkRequestWillBeSent {
        /// Remote request id.
        request_id: String,
        /// Requested URL.
        url: String,
    },

    /// A console message was logged.
    ConsoleMessageAdded {
        /// The message.
        message: ConsoleMessage,
    },

    /// The last console message was repeated.
    ConsoleMessageRepeatCountUpdated {
        /// New repeat count.
        count: u64,
    },

    /// The console was cleared.
    ConsoleMessagesCleared,

    /// The remote end detached the inspector.
    InspectorDetached {
        /// Detach reason.
        reason: String,
    },

    /// Unknown or malformed event.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Event Parsing Implementation
// ============================================================================

/// Wire shape of `DOM.setChildNodes`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetChildNodesParams {
    parent_id: NodeId,
    #[serde(default)]
    nodes: Vec<NodePayload>,
}

/// Wire shape of `DOM.childNodeInserted`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildNodeInsertedParams {
    parent_node_id: NodeId,
    #[serde(default)]
    previous_node_id: NodeId,
    node: NodePayload,
}

impl Event {
    /// Internal parsing implementation.
    fn parse_internal(&self) -> Option<ParsedEvent> {
        let parsed = match self.kind() {
            EventKind::PageLoadEventFired => ParsedEvent::PageLoadEventFired {
                timestamp: self.get_f64("timestamp"),
            },

            EventKind::PageFrameNavigated => ParsedEvent::PageFrameNavigated {
                frame: self.get_typed("frame")?,
            },

            EventKind::DomDocumentUpdated => ParsedEvent::DomDocumentUpdated,

            EventKind::DomSetChildNodes => {
                let params: SetChildNodesParams = self.params_as()?;
                ParsedEvent::DomSetChildNodes {
                    parent_id: params.parent_id,
                    nodes: params.nodes,
                }
            }

            EventKind::DomChildNodeInserted => {
                let params: ChildNodeInsertedParams = self.params_as()?;
                ParsedEvent::DomChildNodeInserted {
                    parent_node_id: params.parent_node_id,
                    previous_node_id: params.previous_node_id,
                    node: params.node,
                }
            }

            EventKind::DomChildNodeRemoved => ParsedEvent::DomChildNodeRemoved {
                parent_node_id: self.get_node_id("parentNodeId"),
                node_id: self.get_node_id("nodeId"),
            },

            EventKind::DomChildNodeCountUpdated => ParsedEvent::DomChildNodeCountUpdated {
                node_id: self.get_node_id("nodeId"),
                child_node_count: self.get_u64("childNodeCount") as usize,
            },

            EventKind::DomCharacterDataModified => ParsedEvent::DomCharacterDataModified {
                node_id: self.get_node_id("nodeId"),
                character_data: self.get_string("characterData"),
            },

            EventKind::CssStyleSheetAdded => ParsedEvent::CssStyleSheetAdded {
                header: self.get_typed("header")?,
            },

            EventKind::CssStyleSheetRemoved => ParsedEvent::CssStyleSheetRemoved {
                style_sheet_id: self.get_string("styleSheetId"),
            },

            EventKind::NetworkRequestWillBeSent => ParsedEvent::NetworkRequestWillBeSent {
                request_id: self.get_string("requestId"),
                url: self
                    .params
                    .get("request")
                    .and_then(|request| request.get("url"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },

            EventKind::ConsoleMessageAdded => ParsedEvent::ConsoleMessageAdded {
                message: self.get_typed("message")?,
            },

            EventKind::ConsoleMessageRepeatCountUpdated => {
                ParsedEvent::ConsoleMessageRepeatCountUpdated {
                    count: self.get_u64("count"),
                }
            }

            EventKind::ConsoleMessagesCleared => ParsedEvent::ConsoleMessagesCleared,

            EventKind::InspectorDetached => ParsedEvent::InspectorDetached {
                reason: self.get_string("reason"),
            },

            EventKind::Other(_) => return None,
        };

        Some(parsed)
    }

    /// Deserializes the whole params object.
    #[inline]
    fn params_as<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.params.clone()).ok()
    }

    /// Deserializes one params member.
    #[inline]
    fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.params
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    #[inline]
    fn get_string(&self, key: &str) -> String {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    #[inline]
    fn get_u64(&self, key: &str) -> u64 {
        self.params
            .get(key)
            .and_then(|v| v.as_u64())
            .unwrap_or_default()
    }

    #[inline]
    fn get_f64(&self, key: &str) -> f64 {
        self.params
            .get(key)
            .and_then(|v| v.as_f64())
            .unwrap_or_default()
    }

    #[inline]
    fn get_node_id(&self, key: &str) -> NodeId {
        NodeId::new(
            self.params
                .get(key)
                .and_then(|v| v.as_i64())
                .unwrap_or_default(),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_event_kind_round_trips_known_names() {
        for (kind, name) in EventKind::KNOWN.iter() {
            assert_eq!(EventKind::from_method(name), *kind);
            assert_eq!(kind.method(), *name);
        }
    }

    #[test]
    fn test_event_kind_other_keeps_namespace() {
        let kind = EventKind::from_method("Timeline.eventRecorded");
        assert_eq!(kind, EventKind::Other("Timeline.eventRecorded".into()));
        assert_eq!(kind.domain(), "Timeline");
        assert_eq!(kind.to_string(), "Timeline.eventRecorded");
    }

    #[test]
    fn test_event_parsing() {
        let event: Event = serde_json::from_str(
            r#"{"method": "Page.loadEventFired", "params": {"timestamp": 12.5}}"#,
        )
        .expect("parse event");

        assert_eq!(event.domain(), "Page");
        assert_eq!(event.event_name(), "loadEventFired");
        assert_eq!(
            event.parse(),
            ParsedEvent::PageLoadEventFired { timestamp: 12.5 }
        );
    }

    #[test]
    fn test_request_will_be_sent_reads_nested_url() {
        let event = Event::new(
            "Network.requestWillBeSent",
            json!({"requestId": "1.2", "request": {"url": "http://localhost/app.js?v=3"}}),
        );

        match event.parse() {
            ParsedEvent::NetworkRequestWillBeSent { url, .. } => {
                assert_eq!(url, "http://localhost/app.js?v=3");
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_set_child_nodes_parsing() {
        let event = Event::new(
            "DOM.setChildNodes",
            json!({
                "parentId": 3,
                "nodes": [{"nodeId": 4, "nodeType": 1, "nodeName": "P"}]
            }),
        );

        match event.parse() {
            ParsedEvent::DomSetChildNodes { parent_id, nodes } => {
                assert_eq!(parent_id, NodeId::new(3));
                assert_eq!(nodes.len(), 1);
                assert_eq!(nodes[0].node_name, "P");
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_known_event_is_unknown() {
        let event = Event::new("CSS.styleSheetAdded", json!({"header": 5}));
        assert!(matches!(event.parse(), ParsedEvent::Unknown { .. }));
    }

    #[test]
    fn test_unknown_event() {
        let event = Event::new("custom.unknownEvent", json!({"foo": "bar"}));

        match event.parse() {
            ParsedEvent::Unknown { method, .. } => {
                assert_eq!(method, "custom.unknownEvent");
            }
            other => panic!("expected Unknown variant, got {other:?}"),
        }
    }
}
