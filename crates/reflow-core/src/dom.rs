//! Document snapshot model.
//!
//! The engine never touches a live DOM directly. The host driver delivers an
//! immutable `DomSnapshot` of the document at a point in time, and resolution
//! runs purely against that snapshot. Nodes live in an arena indexed by
//! `NodeId`; structural links (parent, preceding sibling, children) are
//! maintained by the snapshot as nodes are pushed in document order.

use serde::{Deserialize, Serialize};

pub type NodeId = usize;

/// Tags that render vector graphics rather than interactive controls.
const GRAPHIC_TAGS: &[&str] = &[
    "svg", "path", "g", "use", "circle", "rect", "ellipse", "line", "polygon", "polyline",
];

/// Tags that are directly activatable.
const INTERACTIVE_TAGS: &[&str] = &["button", "a", "input", "select", "textarea", "summary"];

/// ARIA roles that mark an element as an interactive control.
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "menuitem", "tab", "checkbox", "radio", "switch", "option",
];

/// One element in a document snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomNode {
    /// Lowercase tag name.
    pub tag: String,
    /// The `id` attribute, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The `class` attribute as the host read it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_attr: Option<String>,
    /// SVG elements expose their class list through `className.baseVal`
    /// rather than the string attribute; the host records it here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svg_class: Option<String>,
    /// Text owned by this node (not including descendants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Current value, for form fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// The `type` attribute of an input element.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Path geometry (`d` attribute) for `<path>` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_data: Option<String>,
    /// Explicit ARIA role, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parent: Option<NodeId>,
    #[serde(default)]
    pub prev_sibling: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
}

impl DomNode {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            ..Default::default()
        }
    }

    /// The class list relevant for matching. SVG elements must be read
    /// through their SVG-specific class representation.
    pub fn class_string(&self) -> Option<&str> {
        if GRAPHIC_TAGS.contains(&self.tag.as_str()) {
            self.svg_class.as_deref().or(self.class_attr.as_deref())
        } else {
            self.class_attr.as_deref()
        }
    }

    /// Whether the node carries the given class token.
    pub fn has_class(&self, class: &str) -> bool {
        self.class_string()
            .map(|c| c.split_whitespace().any(|t| t == class))
            .unwrap_or(false)
    }

    /// A vector-graphic primitive (or its container), not itself clickable.
    pub fn is_graphic(&self) -> bool {
        GRAPHIC_TAGS.contains(&self.tag.as_str())
    }

    /// Recognized as an interactive control: button-like tag, explicit
    /// interactive role, or a class name suggesting a button.
    pub fn is_interactive(&self) -> bool {
        if INTERACTIVE_TAGS.contains(&self.tag.as_str()) {
            return true;
        }
        if let Some(role) = &self.role
            && INTERACTIVE_ROLES.contains(&role.to_lowercase().as_str())
        {
            return true;
        }
        self.class_string()
            .map(|c| {
                c.split_whitespace()
                    .any(|t| t.to_lowercase().contains("btn") || t.to_lowercase().contains("button"))
            })
            .unwrap_or(false)
    }
}

/// An immutable snapshot of a document, in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub url: String,
    nodes: Vec<DomNode>,
}

impl DomSnapshot {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            nodes: Vec::new(),
        }
    }

    /// Append a node under `parent` (None for a root). Returns its id.
    /// Nodes must be pushed in document order; the previous child of the same
    /// parent becomes the new node's preceding sibling.
    pub fn push(&mut self, mut node: DomNode, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        node.parent = parent;
        node.prev_sibling = match parent {
            Some(p) => self.nodes[p].children.last().copied(),
            None => None,
        };
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&DomNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut DomNode> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in document order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        0..self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.prev_sibling)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Ids of nodes with the given (lowercase) tag, in document order.
    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.ids().filter(move |&id| self.nodes[id].tag == tag)
    }

    /// Node with an exactly matching `id` attribute.
    pub fn by_id(&self, attr_id: &str) -> Option<NodeId> {
        self.ids()
            .find(|&id| self.nodes[id].id.as_deref() == Some(attr_id))
    }

    /// Ids of nodes carrying the given class token, in document order.
    pub fn by_class<'a>(&'a self, class: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.ids().filter(move |&id| self.nodes[id].has_class(class))
    }

    /// Visible text of a node including its descendants, whitespace-collapsed.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts);
        parts
            .join(" ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn collect_text(&self, id: NodeId, out: &mut Vec<String>) {
        if let Some(node) = self.nodes.get(id) {
            if let Some(text) = &node.text {
                out.push(text.clone());
            }
            for &child in &node.children {
                self.collect_text(child, out);
            }
        }
    }

    /// Nearest ancestor (excluding `id` itself) that is an interactive control.
    pub fn interactive_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            if self.nodes[current].is_interactive() {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    /// First descendant `<path>` carrying geometry, in document order.
    pub fn embedded_path(&self, id: NodeId) -> Option<&str> {
        if let Some(node) = self.nodes.get(id)
            && node.tag == "path"
            && node.path_data.is_some()
        {
            return node.path_data.as_deref();
        }
        for &child in self.children(id) {
            if let Some(d) = self.embedded_path(child) {
                return Some(d);
            }
        }
        None
    }
}
