//! Highlight target tracker.
//!
//! Remembers what is highlighted in the live page so repeated requests
//! for the same target do not redraw it. Nodes go through the native
//! `DOM.highlightNode` command; CSS rules go through the helper script
//! injected into the page.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::NodeId;
use crate::protocol::{Command, DomCommand, RuntimeCommand};

use super::dom::DomNode;
use super::{Agent, AgentContext, AgentKind, DomAgent};

/// What the live page currently highlights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HighlightTarget {
    /// An element, by node id.
    Node(NodeId),
    /// Every element matching a CSS selector.
    Rule(String),
}

/// Drives the live page's highlight overlay.
pub struct HighlightAgent {
    ctx: AgentContext,
    dom: Arc<DomAgent>,
    active: Mutex<Option<HighlightTarget>>,
    loaded: AtomicBool,
}

impl HighlightAgent {
    /// Creates an unloaded agent that resolves parents through `dom`.
    #[must_use]
    pub fn new(ctx: AgentContext, dom: Arc<DomAgent>) -> Self {
        Self {
            ctx,
            dom,
            active: Mutex::new(None),
            loaded: AtomicBool::new(false),
        }
    }

    /// Returns the current target.
    #[must_use]
    pub fn active(&self) -> Option<HighlightTarget> {
        self.active.lock().clone()
    }

    /// Highlights `node`.
    ///
    /// A text node highlights its parent element. Anything that is not a
    /// tracked element clears the highlight instead. Highlighting the
    /// active node again does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AgentNotLoaded`] before `load()`, or the call's
    /// error.
    pub async fn node(&self, node: &DomNode) -> Result<()> {
        self.ensure_loaded()?;
        let node = match node.parent {
            Some(parent) if node.is_text() => match self.dom.node_with_id(parent) {
                Some(parent) => parent,
                None => return self.hide().await,
            },
            _ => node.clone(),
        };
        if !node.is_element() || !node.node_id.is_tracked() {
            return self.hide().await;
        }

        let target = HighlightTarget::Node(node.node_id);
        if self.active.lock().as_ref() == Some(&target) {
            return Ok(());
        }
        self.hide().await?;

        trace!(node_id = %node.node_id, "Highlighting node");
        *self.active.lock() = Some(target);
        self.ctx
            .inspector()
            .send(&Command::Dom(DomCommand::HighlightNode {
                node_id: node.node_id,
                highlight_config: self.ctx.highlight_config(),
            }))
            .await
            .map(drop)
    }

    /// Highlights the mirrored node `node_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if the DOM agent does not know the
    /// node, otherwise the same as [`node`](Self::node).
    pub async fn node_by_id(&self, node_id: NodeId) -> Result<()> {
        self.ensure_loaded()?;
        let node = self
            .dom
            .node_with_id(node_id)
            .ok_or(Error::NodeNotFound { node_id })?;
        self.node(&node).await
    }

    /// Highlights every element matching the selector `name`.
    ///
    /// # Errors
    ///
    /// Same as [`node`](Self::node).
    pub async fn rule(&self, name: &str) -> Result<()> {
        self.ensure_loaded()?;
        let target = HighlightTarget::Rule(name.to_string());
        if self.active.lock().as_ref() == Some(&target) {
            return Ok(());
        }
        self.hide().await?;

        trace!(rule = %name, "Highlighting rule");
        *self.active.lock() = Some(target);
        self.evaluate(format!("_LD.highlightRule({})", serde_json::to_string(name)?))
            .await
    }

    /// Redraws rule highlights after the page layout changed.
    ///
    /// # Errors
    ///
    /// Same as [`node`](Self::node).
    pub async fn redraw(&self) -> Result<()> {
        self.ensure_loaded()?;
        let is_rule = matches!(*self.active.lock(), Some(HighlightTarget::Rule(_)));
        if is_rule {
            self.evaluate("_LD.redrawHighlights()".to_string()).await
        } else {
            Ok(())
        }
    }

    /// Clears the highlight, if any.
    ///
    /// # Errors
    ///
    /// Same as [`node`](Self::node).
    pub async fn hide(&self) -> Result<()> {
        self.ensure_loaded()?;
        let previous = self.active.lock().take();
        match previous {
            Some(HighlightTarget::Node(_)) => self
                .ctx
                .inspector()
                .send(&Command::Dom(DomCommand::HideHighlight))
                .await
                .map(drop),
            Some(HighlightTarget::Rule(_)) => {
                self.evaluate("_LD.hideHighlight()".to_string()).await
            }
            None => Ok(()),
        }
    }

    async fn evaluate(&self, expression: String) -> Result<()> {
        self.ctx
            .inspector()
            .send(&Command::Runtime(RuntimeCommand::Evaluate { expression }))
            .await
            .map(drop)
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(Error::AgentNotLoaded { agent: "highlight" })
        }
    }
}

#[async_trait]
impl Agent for HighlightAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Highlight
    }

    async fn load(&self) -> Result<()> {
        self.active.lock().take();
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unload(&self) {
        self.active.lock().take();
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::inspector::{Inspector, InspectorConfig};
    use crate::transport::MemoryTransport;

    async fn agent_with_log() -> (HighlightAgent, Arc<Mutex<Vec<String>>>) {
        let (transport, peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), InspectorConfig::default());
        inspector.connect("memory://page").await.expect("connect");
        let peer = Arc::new(peer);

        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        peer.spawn_responder(move |request| {
            let entry = match request.params.get("expression") {
                Some(expression) => expression.as_str().unwrap_or_default().to_string(),
                None => request.method.clone(),
            };
            seen.lock().push(entry);
            Ok(json!({}))
        });

        let ctx = AgentContext::new(inspector);
        let dom = Arc::new(DomAgent::new(ctx.clone()));
        let agent = HighlightAgent::new(ctx, dom);
        agent.load().await.expect("load");
        (agent, log)
    }

    fn element(id: i64) -> DomNode {
        DomNode {
            node_id: NodeId::new(id),
            node_type: 1,
            name: "DIV".into(),
            ..DomNode::default()
        }
    }

    #[tokio::test]
    async fn test_same_node_is_highlighted_once() {
        let (agent, log) = agent_with_log().await;

        agent.node(&element(4)).await.expect("highlight");
        agent.node(&element(4)).await.expect("again");
        assert_eq!(*log.lock(), vec!["DOM.highlightNode"]);
        assert_eq!(agent.active(), Some(HighlightTarget::Node(NodeId::new(4))));

        agent.node(&element(5)).await.expect("other");
        assert_eq!(
            *log.lock(),
            vec!["DOM.highlightNode", "DOM.hideHighlight", "DOM.highlightNode"]
        );
    }

    #[tokio::test]
    async fn test_non_element_hides() {
        let (agent, log) = agent_with_log().await;
        agent.node(&element(4)).await.expect("highlight");

        let comment = DomNode {
            node_id: NodeId::new(9),
            node_type: 8,
            ..DomNode::default()
        };
        agent.node(&comment).await.expect("hide");
        assert_eq!(agent.active(), None);
        assert_eq!(*log.lock(), vec!["DOM.highlightNode", "DOM.hideHighlight"]);
    }

    #[tokio::test]
    async fn test_rules_use_page_helpers() {
        let (agent, log) = agent_with_log().await;

        agent.rule("div.note").await.expect("rule");
        agent.rule("div.note").await.expect("again");
        agent.redraw().await.expect("redraw");
        agent.hide().await.expect("hide");
        agent.redraw().await.expect("nothing to redraw");

        assert_eq!(
            *log.lock(),
            vec![
                "_LD.highlightRule(\"div.note\")",
                "_LD.redrawHighlights()",
                "_LD.hideHighlight()",
            ]
        );
    }

    /// Loads a DOM of `<html><p>Hi</p></html>` and records every call.
    async fn agent_with_dom() -> (HighlightAgent, Arc<Mutex<Vec<(String, serde_json::Value)>>>) {
        let (transport, peer) = MemoryTransport::pair();
        let inspector = Inspector::new(Arc::new(transport), InspectorConfig::default());
        inspector.connect("memory://page").await.expect("connect");
        let peer = Arc::new(peer);

        let log = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&log);
        peer.spawn_responder(move |request| {
            seen.lock()
                .push((request.method.clone(), request.params.clone()));
            Ok(match request.method.as_str() {
                "DOM.getDocument" => json!({
                    "root": {
                        "nodeId": 1, "nodeType": 9, "nodeName": "#document",
                        "children": [{
                            "nodeId": 2, "nodeType": 1, "nodeName": "HTML",
                            "children": [{
                                "nodeId": 3, "nodeType": 1, "nodeName": "P",
                                "children": [{
                                    "nodeId": 4, "nodeType": 3, "nodeName": "#text",
                                    "nodeValue": "Hi"
                                }]
                            }]
                        }]
                    }
                }),
                _ => json!({}),
            })
        });

        let ctx = AgentContext::new(inspector);
        let dom = Arc::new(DomAgent::new(ctx.clone()));
        dom.load().await.expect("dom load");
        let agent = HighlightAgent::new(ctx, dom);
        agent.load().await.expect("load");
        log.lock().clear();
        (agent, log)
    }

    #[tokio::test]
    async fn test_text_node_highlights_parent() {
        let (agent, log) = agent_with_dom().await;
        let text = agent.dom.node_with_id(NodeId::new(4)).expect("text node");
        assert!(text.is_text());

        agent.node(&text).await.expect("highlight");

        assert_eq!(agent.active(), Some(HighlightTarget::Node(NodeId::new(3))));
        let log = log.lock();
        let (method, params) = log.last().expect("highlight sent");
        assert_eq!(method, "DOM.highlightNode");
        assert_eq!(params["nodeId"], 3);
    }

    #[tokio::test]
    async fn test_text_node_with_unknown_parent_hides() {
        let (agent, log) = agent_with_dom().await;
        agent.node_by_id(NodeId::new(2)).await.expect("highlight");

        let orphan = DomNode {
            node_id: NodeId::new(7),
            node_type: 3,
            name: "#text".into(),
            parent: Some(NodeId::new(99)),
            ..DomNode::default()
        };
        agent.node(&orphan).await.expect("hide");

        assert_eq!(agent.active(), None);
        let methods: Vec<String> = log.lock().iter().map(|(m, _)| m.clone()).collect();
        assert_eq!(methods, vec!["DOM.highlightNode", "DOM.hideHighlight"]);
    }

    #[tokio::test]
    async fn test_unknown_node_id() {
        let (agent, log) = agent_with_log().await;
        let err = agent.node_by_id(NodeId::new(42)).await.expect_err("unknown");
        assert!(matches!(err, Error::NodeNotFound { node_id } if node_id == NodeId::new(42)));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unloaded_agent_rejects() {
        let (agent, _log) = agent_with_log().await;
        agent.unload();
        let err = agent.rule("p").await.expect_err("unloaded");
        assert!(matches!(err, Error::AgentNotLoaded { agent: "highlight" }));
    }
}
