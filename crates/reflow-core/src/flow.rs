//! Recorded sequences and saved flows.

use crate::event::InteractionEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ordered sequence of captured interactions.
///
/// Created empty when capture starts, append-only while capturing, frozen
/// when capture stops. Promoting it to a named flow stores the canonical
/// form; replay only ever mutates a working copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedSequence {
    /// The page location at capture start. Replay must reach this URL before
    /// applying the first event.
    pub anchor_url: String,
    pub events: Vec<InteractionEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RecordedSequence {
    pub fn new(anchor_url: &str) -> Self {
        Self {
            anchor_url: anchor_url.to_string(),
            events: Vec::new(),
            name: None,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Zero every retry counter. Called on every load for a fresh replay
    /// attempt so retries never accumulate across attempts.
    pub fn reset_retries(&mut self) {
        for event in &mut self.events {
            event.retries = 0;
        }
    }

    /// The canonical saved form: named, retry counters zeroed.
    pub fn canonical(&self, name: &str) -> Self {
        let mut flow = self.clone();
        flow.name = Some(name.to_string());
        flow.reset_retries();
        flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ElementDescriptor;

    #[test]
    fn canonical_form_drops_retry_counters() {
        let mut seq = RecordedSequence::new("https://example.com");
        seq.events
            .push(InteractionEvent::click(ElementDescriptor::new("button")));
        seq.events[0].retries = 7;

        let flow = seq.canonical("checkout");
        assert_eq!(flow.name.as_deref(), Some("checkout"));
        assert_eq!(flow.events[0].retries, 0);
        // The original working copy keeps its in-flight counter.
        assert_eq!(seq.events[0].retries, 7);
    }
}
