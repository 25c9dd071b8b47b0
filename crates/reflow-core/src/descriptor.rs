//! Element descriptors.
//!
//! A descriptor is not a selector. It is a bundle of independent, optional
//! identification signals captured at record time; at replay time the
//! resolver tries them as a fallback cascade, because the DOM may have
//! shifted between capture and replay.

use crate::dom::{DomSnapshot, NodeId};
use serde::{Deserialize, Serialize};

/// Captured text is trimmed and capped so storage stays bounded.
pub const TEXT_CAP: usize = 50;
/// Captured input values are capped at a longer bound.
pub const VALUE_CAP: usize = 100;

/// Multi-signal description of a DOM element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Normalized class list, space-joined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_classes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Buttons only: text of the element immediately preceding the target,
    /// used to tell apart buttons sharing identical visible text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sibling_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Geometry of an embedded vector path, for icon disambiguation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_path: Option<String>,
}

impl ElementDescriptor {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            id: None,
            css_classes: None,
            text: None,
            sibling_text: None,
            input_type: None,
            vector_path: None,
        }
    }

    /// First token of the class list, the primary class used for matching.
    pub fn primary_class(&self) -> Option<&str> {
        self.css_classes
            .as_deref()
            .and_then(|c| c.split_whitespace().next())
    }
}

/// Truncate to at most `cap` characters (not bytes).
pub(crate) fn truncate(s: &str, cap: usize) -> String {
    s.chars().take(cap).collect()
}

/// Build the descriptor for an interaction target.
///
/// If the pointed-at node is a non-interactive label or icon nested inside a
/// clickable container, the container is described instead, so replay
/// activates the control the user actually meant.
pub fn describe(dom: &DomSnapshot, target: NodeId) -> ElementDescriptor {
    let subject = dom
        .get(target)
        .filter(|n| n.is_interactive())
        .map(|_| target)
        .or_else(|| dom.interactive_ancestor(target))
        .unwrap_or(target);

    let Some(node) = dom.get(subject) else {
        return ElementDescriptor::new("unknown");
    };

    let mut desc = ElementDescriptor::new(&node.tag);
    desc.id = node.id.clone().filter(|s| !s.is_empty());
    desc.css_classes = node
        .class_string()
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|c| !c.is_empty());
    let text = truncate(dom.text_content(subject).trim(), TEXT_CAP);
    desc.text = (!text.is_empty()).then_some(text);
    desc.input_type = node.input_type.clone();
    desc.vector_path = dom.embedded_path(subject).map(str::to_string);

    // Preceding-sibling text disambiguates same-text buttons.
    if node.tag == "button"
        && let Some(prev) = dom.prev_sibling(subject)
    {
        let sibling = truncate(dom.text_content(prev).trim(), TEXT_CAP);
        desc.sibling_text = (!sibling.is_empty()).then_some(sibling);
    }

    desc
}
