//! Captured interaction events.

use crate::descriptor::{truncate, ElementDescriptor, VALUE_CAP};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Click,
    Input,
    Unknown,
}

/// One captured user action. Immutable once appended to a sequence, except
/// for the transient `retries` counter used while a replay is in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub kind: EventKind,
    /// Capture time. Informational only; replay never times off it.
    pub timestamp: DateTime<Utc>,
    pub element: ElementDescriptor,
    /// Field value at capture time (Input only), capped at `VALUE_CAP`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// In-flight replay retry counter. Zero in a saved flow's canonical form;
    /// reset whenever a sequence is loaded for a fresh attempt. Serialized
    /// only when non-zero so a mid-replay continuation can carry it.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub retries: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl InteractionEvent {
    pub fn click(element: ElementDescriptor) -> Self {
        Self {
            kind: EventKind::Click,
            timestamp: Utc::now(),
            element,
            value: None,
            retries: 0,
        }
    }

    pub fn input(element: ElementDescriptor, value: &str) -> Self {
        Self {
            kind: EventKind::Input,
            timestamp: Utc::now(),
            element,
            value: Some(truncate(value, VALUE_CAP)),
            retries: 0,
        }
    }
}
