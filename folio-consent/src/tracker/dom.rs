//! Minimal element tree
//!
//! Just enough of a document model for click attribution: element tags,
//! attributes, text and parent links. Nodes live in an arena and are
//! addressed by `NodeId`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Handle to a node inside one `Document`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached element; tag and attribute names are case-insensitive
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.trim().to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        })
    }

    /// Append a text node under `parent`
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let node = self.push(NodeKind::Text(text.to_string()));
        self.append_child(parent, node);
        node
    }

    /// Attach `child` as the last child of `parent`
    ///
    /// A child that already has a parent is moved. Appending a node under
    /// itself or one of its descendants is ignored.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) {
            return;
        }
        if self.ancestors_inclusive(parent).any(|n| n == child) {
            return;
        }
        if let Some(old_parent) = self.nodes[child.0].parent {
            self.nodes[old_parent.0].children.retain(|c| *c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(node.0)
        {
            attributes.insert(name.trim().to_ascii_lowercase(), value.to_string());
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    /// Lowercase tag name; `None` for text nodes
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attributes, .. } => attributes
                .get(&name.to_ascii_lowercase())
                .map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.tag(node).is_some()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    /// `node` followed by each of its ancestors up to the root
    pub fn ancestors_inclusive(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = self.contains(node).then_some(node);
        std::iter::successors(start, move |n| self.parent(*n))
    }

    /// Closest element (starting at `node` itself) matching `predicate`
    pub fn closest(
        &self,
        node: NodeId,
        predicate: impl Fn(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.ancestors_inclusive(node)
            .filter(|n| self.is_element(*n))
            .find(|n| predicate(self, *n))
    }

    /// Concatenated text of `node` and all its descendants, in document order
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.nodes.get(node.0) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// Build a document from a click path
    ///
    /// `path[0]` is the clicked element and every following entry is the
    /// parent of the one before it. Each element's own text is placed before
    /// its child on the path. Returns the document and the target node, or
    /// `None` for an empty path.
    pub fn from_path(path: &[ElementDescriptor]) -> Option<(Document, NodeId)> {
        let mut doc = Document::new();
        let mut child: Option<NodeId> = None;
        let mut target = None;

        for descriptor in path {
            let node = doc.create_element(&descriptor.tag);
            for (name, value) in &descriptor.attributes {
                doc.set_attribute(node, name, value);
            }
            if let Some(text) = &descriptor.text {
                doc.append_text(node, text);
            }
            if let Some(child) = child {
                doc.append_child(node, child);
            }
            target.get_or_insert(node);
            child = Some(node);
        }

        target.map(|t| (doc, t))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }
}

/// One element on a reported click path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Text directly inside the element (not counting the next path entry)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementDescriptor {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}
