//! Replay state machine.
//!
//! Replay consumes a recorded sequence strictly in order, one fully
//! resolved-and-applied event before the next. The machine is restart-safe:
//! before any action that can tear the process down (navigating to the
//! anchor, applying a click that itself navigates) the continuation —
//! remaining events, cursor, live retry counters, the one-shot request flag —
//! is persisted and acknowledged. A fresh incarnation re-enters through
//! `resume`, which recovers everything from the store.

use crate::driver::PageDriver;
use crate::error::EngineError;
use crate::session::SessionControlState;
use crate::storage::{get_typed, keys, set_typed, KeyValueStore};
use reflow_core::{resolve, EventKind, InteractionEvent, NodeId, RecordedSequence};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// What to do when a non-first event exhausts its retries. Skipping silently
/// produces partial replays; aborting is safer but brittle. The choice is
/// explicit configuration, never implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Poll interval while waiting for the first event's element.
    pub first_event_poll: Duration,
    /// Grace window for the first event, absorbing slow post-navigation
    /// rendering. Exhausting it aborts the whole replay.
    pub first_event_window: Duration,
    /// Retry interval for every subsequent event.
    pub retry_interval: Duration,
    /// Resolution attempts per subsequent event.
    pub max_retries: u32,
    pub on_exhausted: ExhaustionPolicy,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            first_event_poll: Duration::from_millis(200),
            first_event_window: Duration::from_secs(3),
            retry_interval: Duration::from_secs(1),
            max_retries: 10,
            on_exhausted: ExhaustionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The first event's element never appeared within its grace window.
    FirstEventTimeout,
    /// The anchor URL was not reached within the bounded window.
    AnchorUnreachable,
    /// A later event exhausted its retries under the abort policy.
    RetriesExhausted { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every event was applied.
    Completed,
    /// Replay stopped early. `last_applied` is the index of the last event
    /// that was successfully applied, kept for diagnostics.
    Aborted {
        last_applied: Option<usize>,
        reason: AbortReason,
    },
}

/// Result of requesting a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStart {
    /// The replay ran to a final state in this incarnation.
    Finished(ReplayOutcome),
    /// The engine navigated toward the anchor URL; this incarnation is being
    /// torn down and the next one resumes via `resume`.
    NavigationPending,
}

/// Persisted continuation of an in-flight replay: the working sequence (with
/// live retry counters) and the index of the next event to apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReplay {
    pub sequence: RecordedSequence,
    #[serde(default)]
    pub cursor: usize,
}

pub struct Replayer {
    store: Arc<dyn KeyValueStore>,
    config: ReplayConfig,
}

impl Replayer {
    pub fn new(store: Arc<dyn KeyValueStore>, config: ReplayConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Request a replay of `sequence`. If the live location already matches
    /// the anchor, the replay runs here; otherwise the continuation is
    /// persisted and the driver navigates, handing off to the next
    /// incarnation.
    pub async fn begin(
        &self,
        driver: &mut dyn PageDriver,
        sequence: &RecordedSequence,
    ) -> Result<ReplayStart, EngineError> {
        let mut working = sequence.clone();
        working.reset_retries();
        let pending = PendingReplay {
            sequence: working,
            cursor: 0,
        };

        let current = driver.current_url().await?;
        if !same_location(&current, &pending.sequence.anchor_url) {
            let anchor = pending.sequence.anchor_url.clone();
            // Continuity state must be acknowledged before the hop; a failed
            // write means we must not navigate.
            set_typed(self.store.as_ref(), keys::PENDING_REPLAY, &pending).await?;
            SessionControlState {
                is_capturing: false,
                replay_requested: true,
                pending_navigation_target: Some(anchor.clone()),
            }
            .save(self.store.as_ref())
            .await?;
            info!(%anchor, "navigating to anchor before replay");
            driver.navigate(&anchor).await?;
            return Ok(ReplayStart::NavigationPending);
        }

        Ok(ReplayStart::Finished(self.run(driver, pending).await?))
    }

    /// Fresh-startup entry point. Returns `None` when no replay was pending.
    ///
    /// The one-shot request flag is cleared and persisted before any replay
    /// logic executes, so a crash during replay can never re-arm an infinite
    /// refresh loop, and an unrelated later load of the anchor URL never
    /// starts a replay of its own.
    pub async fn resume(
        &self,
        driver: &mut dyn PageDriver,
    ) -> Result<Option<ReplayOutcome>, EngineError> {
        let mut session = SessionControlState::load(self.store.as_ref()).await?;
        if !session.replay_requested {
            return Ok(None);
        }
        session.replay_requested = false;
        let target = session.pending_navigation_target.take();
        session.save(self.store.as_ref()).await?;

        let Some(pending) =
            get_typed::<PendingReplay>(self.store.as_ref(), keys::PENDING_REPLAY).await?
        else {
            return Ok(None);
        };

        if let Some(target) = &target
            && !self.await_location(driver, target).await?
        {
            warn!(%target, "anchor not reached, aborting replay");
            self.clear_continuation().await?;
            return Ok(Some(ReplayOutcome::Aborted {
                last_applied: pending.cursor.checked_sub(1),
                reason: AbortReason::AnchorUnreachable,
            }));
        }

        self.run(driver, pending).await.map(Some)
    }

    async fn run(
        &self,
        driver: &mut dyn PageDriver,
        mut pending: PendingReplay,
    ) -> Result<ReplayOutcome, EngineError> {
        let total = pending.sequence.len();
        let mut last_applied = pending.cursor.checked_sub(1);
        info!(total, cursor = pending.cursor, "replaying");

        while pending.cursor < total {
            let index = pending.cursor;
            if pending.sequence.events[index].kind == EventKind::Unknown {
                pending.cursor += 1;
                continue;
            }

            let located = self
                .locate(driver, &mut pending.sequence.events[index], index == 0)
                .await?;
            let node = match located {
                Some(node) => node,
                // Without the first step anchored there is no point going on.
                None if index == 0 => {
                    warn!("first event never resolved, aborting replay");
                    self.clear_continuation().await?;
                    return Ok(ReplayOutcome::Aborted {
                        last_applied,
                        reason: AbortReason::FirstEventTimeout,
                    });
                }
                None => match self.config.on_exhausted {
                    ExhaustionPolicy::Skip => {
                        warn!(index, "retries exhausted, skipping event");
                        pending.cursor += 1;
                        continue;
                    }
                    ExhaustionPolicy::Abort => {
                        warn!(index, "retries exhausted, aborting replay");
                        self.clear_continuation().await?;
                        return Ok(ReplayOutcome::Aborted {
                            last_applied,
                            reason: AbortReason::RetriesExhausted { index },
                        });
                    }
                },
            };

            // Applying the event may tear this incarnation down (a click can
            // navigate). Persist the continuation first; if the write fails,
            // the risky action must not run.
            pending.cursor = index + 1;
            set_typed(self.store.as_ref(), keys::PENDING_REPLAY, &pending).await?;
            SessionControlState {
                is_capturing: false,
                replay_requested: true,
                pending_navigation_target: None,
            }
            .save(self.store.as_ref())
            .await?;

            let event = &pending.sequence.events[index];
            match event.kind {
                EventKind::Click => driver.click(node).await?,
                EventKind::Input => {
                    driver
                        .set_value(node, event.value.as_deref().unwrap_or_default())
                        .await?
                }
                EventKind::Unknown => {}
            }
            debug!(index, "event applied");
            last_applied = Some(index);
        }

        self.clear_continuation().await?;
        info!(total, "replay completed");
        Ok(ReplayOutcome::Completed)
    }

    /// Drop the persisted continuation and disarm the request flag.
    async fn clear_continuation(&self) -> Result<(), EngineError> {
        self.store.remove(keys::PENDING_REPLAY).await?;
        SessionControlState::default().save(self.store.as_ref()).await?;
        Ok(())
    }

    /// Resolve one event's element under the retry policy. `Ok(None)` means
    /// the policy was exhausted.
    async fn locate(
        &self,
        driver: &mut dyn PageDriver,
        event: &mut InteractionEvent,
        first: bool,
    ) -> Result<Option<NodeId>, EngineError> {
        if first {
            let deadline = Instant::now() + self.config.first_event_window;
            loop {
                let dom = driver.snapshot().await?;
                if let Ok(node) = resolve(&event.element, &dom) {
                    return Ok(Some(node));
                }
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                sleep(self.config.first_event_poll).await;
            }
        }

        loop {
            let dom = driver.snapshot().await?;
            event.retries += 1;
            match resolve(&event.element, &dom) {
                Ok(node) => return Ok(Some(node)),
                Err(_) if event.retries >= self.config.max_retries => return Ok(None),
                Err(_) => {
                    debug!(retries = event.retries, tag = %event.element.tag, "element not found, retrying");
                    sleep(self.config.retry_interval).await;
                }
            }
        }
    }

    async fn await_location(
        &self,
        driver: &dyn PageDriver,
        target: &str,
    ) -> Result<bool, EngineError> {
        let deadline = Instant::now() + self.config.first_event_window;
        loop {
            if same_location(&driver.current_url().await?, target) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(self.config.first_event_poll).await;
        }
    }
}

/// Fragment-insensitive location comparison.
fn same_location(live: &str, anchor: &str) -> bool {
    match (url::Url::parse(live), url::Url::parse(anchor)) {
        (Ok(mut a), Ok(mut b)) => {
            a.set_fragment(None);
            b.set_fragment(None);
            a == b
        }
        _ => live.trim_end_matches('/') == anchor.trim_end_matches('/'),
    }
}
