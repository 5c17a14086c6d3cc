//! DOM mirror tree.
//!
//! Nodes live in a map keyed by [`NodeId`]; parent and child links are
//! ids. Every node reported by the remote end is present exactly once.

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::identifiers::NodeId;
use crate::protocol::NodePayload;

use super::source::{ELEMENT_NODE, SourcePayload, TEXT_NODE, each_node};

// ============================================================================
// DomNode
// ============================================================================

/// One node of the live page, with its position in the source text once
/// the document has been mapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomNode {
    /// Remote node id.
    pub node_id: NodeId,
    /// DOM node type.
    pub node_type: u8,
    /// Tag name for elements, `#text` and similar for other nodes.
    pub name: String,
    /// Text for text and comment nodes.
    pub value: String,
    /// Attributes in remote order.
    pub attributes: Vec<(String, String)>,
    /// Parent node, `None` for the root.
    pub parent: Option<NodeId>,
    /// Children in document order.
    pub children: Vec<NodeId>,
    /// Source offset of the node (of its opening tag for elements).
    pub location: Option<usize>,
    /// Source length of the node (of its opening tag for elements).
    pub length: usize,
    /// Source offset of the closing tag.
    pub close_location: Option<usize>,
    /// Source length of the closing tag.
    pub close_length: usize,
    /// Has no closing tag to wait for.
    pub closed: bool,
}

impl DomNode {
    fn from_payload(payload: &NodePayload, parent: Option<NodeId>) -> Self {
        let length = payload.source_length.unwrap_or_else(|| {
            if !payload.node_value.is_empty() {
                payload.node_value.chars().count()
            } else if !payload.node_name.is_empty() {
                payload.node_name.chars().count() + 2
            } else {
                0
            }
        });
        Self {
            node_id: payload.node_id,
            node_type: payload.node_type,
            name: payload.node_name.clone(),
            value: payload.node_value.clone(),
            attributes: payload
                .attributes
                .chunks(2)
                .map(|pair| (pair[0].clone(), pair.get(1).cloned().unwrap_or_default()))
                .collect(),
            parent,
            children: Vec::new(),
            location: payload.source_offset,
            length,
            close_location: None,
            close_length: 0,
            closed: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_element(&self) -> bool {
        self.node_type == ELEMENT_NODE
    }

    #[inline]
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.node_type == TEXT_NODE
    }

    /// Returns the value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns `true` if `location` falls inside this node's source.
    ///
    /// With `include_children`, an element spans through its closing tag.
    /// Text nodes also claim the position right after their last
    /// character, so typing at the end of a text run edits that run.
    #[must_use]
    pub fn is_at_location(&self, location: usize, include_children: bool) -> bool {
        let Some(start) = self.location else {
            return false;
        };
        if location < start {
            return false;
        }
        let mut to = match (include_children, self.close_location) {
            (true, Some(close)) => close + self.close_length,
            _ => start + self.length,
        };
        if self.is_text() {
            to += 1;
        }
        location < to
    }

    fn can_have_children(&self) -> bool {
        self.is_element() && !self.closed && !self.name.eq_ignore_ascii_case("LINK")
    }

    fn matches_payload(&self, payload: &SourcePayload) -> bool {
        if self.node_type != payload.node_type {
            return false;
        }
        !self.is_element() || self.name.eq_ignore_ascii_case(&payload.node_name)
    }
}

// ============================================================================
// DomTree
// ============================================================================

/// Id-indexed mirror of the live DOM.
#[derive(Debug, Default)]
pub struct DomTree {
    nodes: FxHashMap<NodeId, DomNode>,
    root: Option<NodeId>,
}

impl DomTree {
    /// Builds a tree from the `DOM.getDocument` root.
    ///
    /// Also returns the ids of nodes whose children must be requested.
    #[must_use]
    pub fn from_root(root: &NodePayload) -> (Self, Vec<NodeId>) {
        let mut tree = Self::default();
        let mut requests = Vec::new();
        let id = tree.insert(root, None, &mut requests);
        tree.root = Some(id);
        (tree, requests)
    }

    fn insert(
        &mut self,
        payload: &NodePayload,
        parent: Option<NodeId>,
        requests: &mut Vec<NodeId>,
    ) -> NodeId {
        let id = payload.node_id;
        if self.nodes.contains_key(&id) {
            self.remove(id);
        }
        self.nodes.insert(id, DomNode::from_payload(payload, parent));

        match &payload.children {
            Some(children) => {
                let ids: Vec<NodeId> = children
                    .iter()
                    .map(|child| self.insert(child, Some(id), requests))
                    .collect();
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.children = ids;
                }
            }
            None if payload.child_node_count > 0 => requests.push(id),
            None => {}
        }
        id
    }

    /// Replaces the children of `parent`.
    ///
    /// Returns the ids of new nodes whose children must be requested, or
    /// `None` if `parent` is unknown.
    pub fn set_children(&mut self, parent: NodeId, payloads: &[NodePayload]) -> Option<Vec<NodeId>> {
        let old = std::mem::take(&mut self.nodes.get_mut(&parent)?.children);
        for child in old {
            self.remove_subtree(child);
        }

        let mut requests = Vec::new();
        let ids: Vec<NodeId> = payloads
            .iter()
            .map(|payload| self.insert(payload, Some(parent), &mut requests))
            .collect();
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children = ids;
        }
        Some(requests)
    }

    /// Inserts `payload` under `parent` right after `previous`, or as the
    /// first child when `previous` is `0` or not a child of `parent`.
    pub fn insert_after(
        &mut self,
        parent: NodeId,
        previous: NodeId,
        payload: &NodePayload,
    ) -> Option<Vec<NodeId>> {
        if !self.nodes.contains_key(&parent) {
            return None;
        }
        let mut requests = Vec::new();
        let id = self.insert(payload, Some(parent), &mut requests);
        let node = self.nodes.get_mut(&parent)?;
        let index = node
            .children
            .iter()
            .position(|child| *child == previous)
            .map_or(0, |at| at + 1);
        node.children.insert(index, id);
        Some(requests)
    }

    /// Removes `id` and its subtree. Returns `false` if it was unknown.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes.get(&id).map(|node| node.parent) else {
            return false;
        };
        if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(&parent)) {
            parent.children.retain(|child| *child != id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.remove_subtree(id);
        true
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    /// Returns the node with `id`.
    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut DomNode> {
        self.nodes.get_mut(&id)
    }

    /// Returns the document node.
    #[must_use]
    pub fn root(&self) -> Option<&DomNode> {
        self.root.and_then(|id| self.nodes.get(&id))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in document order, root first.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev());
        }
        order
    }

    fn nodes_in_order(&self) -> impl Iterator<Item = &DomNode> {
        self.preorder()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
    }

    fn next_node(&self, id: NodeId) -> Option<NodeId> {
        let node = self.nodes.get(&id)?;
        if let Some(first) = node.children.first() {
            return Some(*first);
        }
        let mut current = node;
        loop {
            let parent = self.nodes.get(&current.parent?)?;
            let index = parent.children.iter().position(|c| *c == current.node_id)?;
            if let Some(sibling) = parent.children.get(index + 1) {
                return Some(*sibling);
            }
            current = parent;
        }
    }

    // ========================================================================
    // Source Mapping
    // ========================================================================

    /// Walks `source` alongside the tree and records where each node's
    /// opening and closing tags are.
    ///
    /// Source nodes the live tree does not have (and live nodes the source
    /// does not have) are skipped.
    pub fn map_to_source(&mut self, source: &str) {
        let Some(mut current) = self.root else {
            return;
        };
        let mut mapped = 0usize;

        each_node(source, |payload| {
            if payload.closing {
                let parent = self.parent_for_closing(current, &payload);
                match parent.and_then(|id| self.nodes.get_mut(&id)) {
                    Some(node) => {
                        node.close_location = Some(payload.offset);
                        node.close_length = payload.length;
                    }
                    None => debug!(
                        offset = payload.offset,
                        name = %payload.node_name,
                        "No open element for closing tag"
                    ),
                }
                return;
            }

            let mut next = self.next_node(current);
            while let Some(id) = next {
                if self.nodes.get(&id).is_some_and(|n| n.matches_payload(&payload)) {
                    break;
                }
                next = self.next_node(id);
            }
            let Some(id) = next else {
                debug!(offset = payload.offset, "Skipping source node");
                return;
            };
            if let Some(node) = self.nodes.get_mut(&id) {
                node.location = Some(payload.offset);
                node.length = payload.length;
                if payload.closed {
                    node.closed = true;
                }
                mapped += 1;
            }
            current = id;
        });

        debug!(mapped, nodes = self.nodes.len(), "Mapped document to source");
    }

    fn parent_for_closing(&self, from: NodeId, payload: &SourcePayload) -> Option<NodeId> {
        let node = self.nodes.get(&from)?;
        let mut candidate = if node.can_have_children() {
            Some(from)
        } else {
            node.parent
        };
        while let Some(id) = candidate {
            let node = self.nodes.get(&id)?;
            if node.matches_payload(payload) {
                return Some(id);
            }
            candidate = node.parent;
        }
        None
    }

    // ========================================================================
    // Location Queries
    // ========================================================================

    /// Returns the first node, in document order, whose own source span
    /// contains `location`.
    #[must_use]
    pub fn node_at_location(&self, location: usize) -> Option<&DomNode> {
        self.nodes_in_order()
            .find(|node| node.is_at_location(location, false))
    }

    /// Returns every element whose span, children included, contains
    /// `location`, outermost first.
    #[must_use]
    pub fn all_nodes_at_location(&self, location: usize) -> Vec<&DomNode> {
        self.nodes_in_order()
            .filter(|node| node.is_element() && node.is_at_location(location, true))
            .collect()
    }

    /// Returns the mapped node that starts last at or before `location`.
    #[must_use]
    pub fn node_before_location(&self, location: usize) -> Option<&DomNode> {
        let mut best: Option<&DomNode> = None;
        for node in self.nodes_in_order() {
            let Some(start) = node.location else {
                continue;
            };
            if location < start {
                continue;
            }
            if best.is_none_or(|b| b.location.is_some_and(|l| l < start)) {
                best = Some(node);
            }
        }
        best
    }

    // ========================================================================
    // Edits
    // ========================================================================

    /// Applies a source edit replacing `[from, to)` with `text`.
    ///
    /// A text node containing `from` takes the new text, and its id and
    /// new value are returned so the caller can push them to the page.
    /// Every mapped position after the edited node shifts by the change
    /// in length.
    pub fn apply_change(&mut self, from: usize, to: usize, text: &str) -> Option<(NodeId, String)> {
        let delta = text.chars().count() as i64 - (to as i64 - from as i64);
        let mut update = None;

        let target = match self.node_at_location(from) {
            Some(node) if node.is_text() => {
                let start = node.location.unwrap_or_default();
                let value: Vec<char> = node.value.chars().collect();
                let head = (from - start).min(value.len());
                let tail = to.saturating_sub(start).clamp(head, value.len());
                let new_value: String = value[..head]
                    .iter()
                    .copied()
                    .chain(text.chars())
                    .chain(value[tail..].iter().copied())
                    .collect();
                update = Some((node.node_id, new_value));
                Some(node.node_id)
            }
            Some(node) => {
                warn!(node_id = %node.node_id, "Changing non-text nodes not supported");
                None
            }
            None if text.trim().is_empty() => None,
            None => {
                warn!(from, "Inserting nodes not supported");
                self.node_before_location(from).map(|node| node.node_id)
            }
        };

        if let Some((id, value)) = &update {
            if let Some(node) = self.nodes.get_mut(id) {
                node.value = value.clone();
            }
        }
        if let Some(id) = target {
            self.shift_after(id, delta);
        }
        update
    }

    fn shift_after(&mut self, id: NodeId, delta: i64) {
        let Some(anchor) = self.nodes.get_mut(&id) else {
            return;
        };
        anchor.length = shift(anchor.length, delta);
        let Some(start) = anchor.location else {
            return;
        };
        for node in self.nodes.values_mut() {
            if let Some(location) = node.location.filter(|l| *l > start) {
                node.location = Some(shift(location, delta));
            }
            if let Some(close) = node.close_location.filter(|l| *l > start) {
                node.close_location = Some(shift(close, delta));
            }
        }
    }
}

fn shift(value: usize, delta: i64) -> usize {
    (value as i64 + delta).max(0) as usize
}

// ============================================================================
// Tests
// ============================================================================
