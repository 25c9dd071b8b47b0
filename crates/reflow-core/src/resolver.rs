//! Element resolution.
//!
//! Given a descriptor recorded earlier, find the best-matching element in a
//! possibly-changed document. Strategies run in a fixed priority order and
//! the cascade short-circuits on the first strategy that yields exactly one
//! candidate; ties are never guessed at, they fall through to the next
//! strategy. Resolution is pure with respect to the snapshot and never
//! mutates anything.

use crate::descriptor::{truncate, ElementDescriptor, TEXT_CAP};
use crate::dom::{DomSnapshot, NodeId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no element matches descriptor for <{tag}>")]
    NotFound { tag: String },
}

/// One rung of the fallback cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Same-tag, same-text elements disambiguated by the text of the element
    /// immediately preceding them. If exactly one element shares the text,
    /// the sibling check is skipped.
    SiblingText,
    /// Exact `id` attribute match.
    Id,
    /// Primary class plus equal text.
    ClassText,
    /// Primary class plus an embedded vector path with identical geometry.
    ClassPath,
    /// First element carrying the primary class.
    ClassOnly,
    /// First element of the tag with equal text (inputs compare their value).
    TagText,
    /// First element of the tag (inputs additionally honor the recorded
    /// input subtype).
    TagOnly,
}

/// Priority order. Earlier strategies win.
pub const CASCADE: &[Strategy] = &[
    Strategy::SiblingText,
    Strategy::Id,
    Strategy::ClassText,
    Strategy::ClassPath,
    Strategy::ClassOnly,
    Strategy::TagText,
    Strategy::TagOnly,
];

/// Resolve a descriptor against a snapshot.
pub fn resolve(desc: &ElementDescriptor, dom: &DomSnapshot) -> Result<NodeId, ResolveError> {
    for strategy in CASCADE {
        let candidates = strategy.candidates(desc, dom);
        if let [only] = candidates.as_slice() {
            return Ok(promote(dom, *only));
        }
    }
    Err(ResolveError::NotFound {
        tag: desc.tag.clone(),
    })
}

impl Strategy {
    /// Zero, one, or many candidate nodes for this strategy. The cascade only
    /// accepts a result of exactly one.
    pub fn candidates(self, desc: &ElementDescriptor, dom: &DomSnapshot) -> Vec<NodeId> {
        match self {
            Strategy::SiblingText => {
                let (Some(text), Some(sibling_text)) = (&desc.text, &desc.sibling_text) else {
                    return vec![];
                };
                let same_text: Vec<NodeId> = dom
                    .by_tag(&desc.tag)
                    .filter(|&id| text_eq(&dom.text_content(id), text))
                    .collect();
                // A lone match needs no sibling check.
                if same_text.len() == 1 {
                    return same_text;
                }
                same_text
                    .into_iter()
                    .filter(|&id| {
                        dom.prev_sibling(id)
                            .map(|prev| text_eq(&dom.text_content(prev), sibling_text))
                            .unwrap_or(false)
                    })
                    .collect()
            }
            Strategy::Id => {
                let Some(attr_id) = &desc.id else {
                    return vec![];
                };
                dom.by_id(attr_id).into_iter().collect()
            }
            Strategy::ClassText => {
                let (Some(class), Some(text)) = (desc.primary_class(), &desc.text) else {
                    return vec![];
                };
                dom.by_class(class)
                    .filter(|&id| text_eq(&dom.text_content(id), text))
                    .collect()
            }
            Strategy::ClassPath => {
                let (Some(class), Some(path)) = (desc.primary_class(), &desc.vector_path) else {
                    return vec![];
                };
                dom.by_class(class)
                    .filter(|&id| dom.embedded_path(id) == Some(path.as_str()))
                    .collect()
            }
            Strategy::ClassOnly => {
                let Some(class) = desc.primary_class() else {
                    return vec![];
                };
                dom.by_class(class).take(1).collect()
            }
            Strategy::TagText => {
                let Some(text) = &desc.text else {
                    return vec![];
                };
                dom.by_tag(&desc.tag)
                    .filter(|&id| {
                        dom.get(id)
                            .map(|node| {
                                let live = if node.tag == "input" {
                                    node.value.clone().unwrap_or_default()
                                } else {
                                    dom.text_content(id)
                                };
                                text_eq(&live, text)
                            })
                            .unwrap_or(false)
                    })
                    .take(1)
                    .collect()
            }
            Strategy::TagOnly => {
                let mut matches = dom.by_tag(&desc.tag);
                match &desc.input_type {
                    Some(input_type) => matches
                        .find(|&id| {
                            dom.get(id)
                                .and_then(|n| n.input_type.as_ref())
                                .map(|t| t == input_type)
                                .unwrap_or(false)
                        })
                        .into_iter()
                        .collect(),
                    None => matches.next().into_iter().collect(),
                }
            }
        }
    }
}

/// Recorded text was trimmed, whitespace-collapsed, and capped at capture
/// time; live text gets the same treatment before comparing, and comparison
/// is case-insensitive.
fn text_eq(live: &str, recorded: &str) -> bool {
    normalize(&truncate(live.trim(), TEXT_CAP)) == normalize(recorded)
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A matched graphic primitive stands in for the control enclosing it; the
/// intent was to activate that control.
fn promote(dom: &DomSnapshot, id: NodeId) -> NodeId {
    let Some(node) = dom.get(id) else {
        return id;
    };
    if node.is_graphic() && !node.is_interactive() {
        return dom.interactive_ancestor(id).unwrap_or(id);
    }
    id
}
