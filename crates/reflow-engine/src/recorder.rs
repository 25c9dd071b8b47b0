//! Event capture.
//!
//! The host's document listeners deliver raw interactions; the recorder
//! normalizes each into an `InteractionEvent` and appends it to the working
//! sequence. Every append is persisted before the recorder accepts the next
//! interaction, so a crash mid-session loses at most the in-flight one.

use crate::error::EngineError;
use crate::storage::{keys, set_typed, KeyValueStore};
use reflow_core::{describe, DomSnapshot, InteractionEvent, NodeId, RecordedSequence};
use std::sync::Arc;
use tracing::debug;

/// A raw interaction as observed by the host's document-level listeners.
#[derive(Debug, Clone, Copy)]
pub enum ObservedInteraction {
    Click { target: NodeId },
    Input { target: NodeId },
}

pub struct Recorder {
    store: Arc<dyn KeyValueStore>,
    working: Option<RecordedSequence>,
}

impl Recorder {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            working: None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.working.is_some()
    }

    /// Begin a capture session anchored at `anchor_url`. Any prior working
    /// sequence is discarded.
    pub async fn start(&mut self, anchor_url: &str) -> Result<(), EngineError> {
        if self.working.is_some() {
            return Err(EngineError::CaptureInProgress);
        }
        self.store.remove(keys::WORKING_SEQUENCE).await?;
        self.working = Some(RecordedSequence::new(anchor_url));
        debug!(anchor = %anchor_url, "capture started");
        Ok(())
    }

    /// Record one interaction against the given document snapshot and
    /// persist the grown sequence before returning.
    pub async fn observe(
        &mut self,
        dom: &DomSnapshot,
        interaction: ObservedInteraction,
    ) -> Result<(), EngineError> {
        let Some(working) = self.working.as_mut() else {
            return Err(EngineError::NotCapturing);
        };

        let event = match interaction {
            ObservedInteraction::Click { target } => {
                InteractionEvent::click(describe(dom, target))
            }
            ObservedInteraction::Input { target } => {
                let value = dom
                    .get(target)
                    .and_then(|n| n.value.clone())
                    .unwrap_or_default();
                InteractionEvent::input(describe(dom, target), &value)
            }
        };
        debug!(kind = ?event.kind, tag = %event.element.tag, total = working.len() + 1, "captured interaction");
        working.events.push(event);

        set_typed(self.store.as_ref(), keys::WORKING_SEQUENCE, working).await?;
        Ok(())
    }

    /// End observation and return the finalized sequence.
    pub fn stop(&mut self) -> Result<RecordedSequence, EngineError> {
        self.working.take().ok_or(EngineError::NotCapturing)
    }

    /// End observation and discard the working sequence, including its
    /// persisted copy.
    pub async fn cancel(&mut self) -> Result<(), EngineError> {
        if self.working.take().is_none() {
            return Err(EngineError::NotCapturing);
        }
        self.store.remove(keys::WORKING_SEQUENCE).await?;
        debug!("capture cancelled");
        Ok(())
    }
}
