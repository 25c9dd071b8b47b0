//! Mode arbitration and the fresh-startup entry point.
//!
//! Capturing and replaying are mutually exclusive; the engine is the single
//! place that enforces it. The host constructs a fresh `Engine` in every
//! document incarnation and calls `attach` once; everything the engine needs
//! to pick up where a torn-down incarnation left off comes from the store.

use crate::driver::PageDriver;
use crate::error::EngineError;
use crate::recorder::{ObservedInteraction, Recorder};
use crate::replay::{ReplayConfig, ReplayOutcome, ReplayStart, Replayer};
use crate::session::SessionControlState;
use crate::storage::{keys, KeyValueStore};
use reflow_core::RecordedSequence;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Idle,
    Capturing,
    Replaying,
}

pub struct Engine {
    store: Arc<dyn KeyValueStore>,
    driver: Box<dyn PageDriver>,
    recorder: Recorder,
    replayer: Replayer,
    mode: EngineMode,
}

impl Engine {
    pub fn new(store: Arc<dyn KeyValueStore>, driver: Box<dyn PageDriver>) -> Self {
        Self::with_config(store, driver, ReplayConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn KeyValueStore>,
        driver: Box<dyn PageDriver>,
        config: ReplayConfig,
    ) -> Self {
        Self {
            recorder: Recorder::new(store.clone()),
            replayer: Replayer::new(store.clone(), config),
            store,
            driver,
            mode: EngineMode::Idle,
        }
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    /// Startup hook for a freshly injected incarnation. Resumes a pending
    /// replay if one was requested; otherwise settles into idle. Capture
    /// listeners never survive navigation, so a stale capturing flag is
    /// dropped here.
    pub async fn attach(&mut self) -> Result<Option<ReplayOutcome>, EngineError> {
        let mut session = SessionControlState::load(self.store.as_ref()).await?;
        if session.is_capturing {
            info!("dropping capture flag from a torn-down incarnation");
            session.is_capturing = false;
            session.save(self.store.as_ref()).await?;
        }

        self.mode = EngineMode::Replaying;
        let outcome = self.replayer.resume(&mut *self.driver).await;
        self.mode = EngineMode::Idle;
        outcome
    }

    /// Transition idle → capturing, anchored at the current location.
    pub async fn start_capture(&mut self) -> Result<(), EngineError> {
        match self.mode {
            EngineMode::Capturing => return Err(EngineError::CaptureInProgress),
            EngineMode::Replaying => return Err(EngineError::ReplayInProgress),
            EngineMode::Idle => {}
        }
        let anchor = self.driver.current_url().await?;
        self.recorder.start(&anchor).await?;

        let mut session = SessionControlState::load(self.store.as_ref()).await?;
        session.is_capturing = true;
        session.save(self.store.as_ref()).await?;

        self.mode = EngineMode::Capturing;
        Ok(())
    }

    /// Record one interaction observed by the host's listeners.
    pub async fn observe(&mut self, interaction: ObservedInteraction) -> Result<(), EngineError> {
        if self.mode != EngineMode::Capturing {
            return Err(EngineError::NotCapturing);
        }
        let dom = self.driver.snapshot().await?;
        self.recorder.observe(&dom, interaction).await
    }

    /// End capture and return the finalized sequence.
    pub async fn stop_capture(&mut self) -> Result<RecordedSequence, EngineError> {
        let sequence = self.recorder.stop()?;
        let mut session = SessionControlState::load(self.store.as_ref()).await?;
        session.is_capturing = false;
        session.save(self.store.as_ref()).await?;
        self.mode = EngineMode::Idle;
        Ok(sequence)
    }

    /// End capture and discard everything recorded in this session.
    pub async fn cancel_capture(&mut self) -> Result<(), EngineError> {
        self.recorder.cancel().await?;
        let mut session = SessionControlState::load(self.store.as_ref()).await?;
        session.is_capturing = false;
        session.save(self.store.as_ref()).await?;
        self.mode = EngineMode::Idle;
        Ok(())
    }

    /// Request a replay of `sequence`. Reports the final state, or
    /// `NavigationPending` when the anchor hop tears this incarnation down.
    pub async fn begin_replay(
        &mut self,
        sequence: &RecordedSequence,
    ) -> Result<ReplayStart, EngineError> {
        match self.mode {
            EngineMode::Capturing => return Err(EngineError::CaptureInProgress),
            EngineMode::Replaying => return Err(EngineError::ReplayInProgress),
            EngineMode::Idle => {}
        }
        self.mode = EngineMode::Replaying;
        let result = self.replayer.begin(&mut *self.driver, sequence).await;
        self.mode = EngineMode::Idle;
        result
    }

    /// Withdraw a pending replay request and its continuation.
    pub async fn cancel_replay(&mut self) -> Result<(), EngineError> {
        let session = SessionControlState::load(self.store.as_ref()).await?;
        let has_continuation = self.store.get(keys::PENDING_REPLAY).await?.is_some();
        if !session.replay_requested && !has_continuation {
            return Err(EngineError::NotReplaying);
        }
        self.store.remove(keys::PENDING_REPLAY).await?;
        SessionControlState::default().save(self.store.as_ref()).await?;
        Ok(())
    }

    /// Discard any in-progress or unsaved working sequence together with all
    /// control flags.
    pub async fn clear_working(&mut self) -> Result<(), EngineError> {
        if self.recorder.is_capturing() {
            self.recorder.cancel().await?;
        }
        self.store.remove(keys::WORKING_SEQUENCE).await?;
        self.store.remove(keys::PENDING_REPLAY).await?;
        SessionControlState::clear(self.store.as_ref()).await?;
        self.mode = EngineMode::Idle;
        Ok(())
    }
}
