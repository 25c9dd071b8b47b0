//! Restart safety: replay must survive the teardown of the executing
//! process. Each `Engine` below stands in for one document incarnation; the
//! shared store is the only thing that crosses the boundary.

use async_trait::async_trait;
use reflow_core::{DomNode, DomSnapshot, ElementDescriptor, InteractionEvent, NodeId};
use reflow_core::RecordedSequence;
use reflow_engine::storage::{keys, set_typed, KeyValueStore, StorageError};
use reflow_engine::{
    AbortReason, DriverError, Engine, EngineError, MemoryStore, PageDriver, PendingReplay,
    ReplayConfig, ReplayOutcome, ReplayStart, SessionControlState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    url: String,
    dom: Option<DomSnapshot>,
    clicks: Vec<NodeId>,
    navigations: Vec<String>,
    /// When false, navigation requests are recorded but the location never
    /// changes (a hop that never lands).
    navigation_lands: bool,
}

#[derive(Clone)]
struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    fn new(url: &str, dom: DomSnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                url: url.to_string(),
                dom: Some(dom),
                navigation_lands: true,
                ..Default::default()
            })),
        }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.lock().unwrap().url.clone())
    }
    async fn snapshot(&self) -> Result<DomSnapshot, DriverError> {
        Ok(self.state.lock().unwrap().dom.clone().expect("mock dom"))
    }
    async fn click(&mut self, node: NodeId) -> Result<(), DriverError> {
        self.state.lock().unwrap().clicks.push(node);
        Ok(())
    }
    async fn set_value(&mut self, _node: NodeId, _value: &str) -> Result<(), DriverError> {
        Ok(())
    }
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        if state.navigation_lands {
            state.url = url.to_string();
        }
        Ok(())
    }
}

/// Store wrapper whose writes can be switched off, for exercising the
/// persist-before-navigate ordering.
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_writes: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("store offline")));
        }
        self.inner.set(key, value).await
    }
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.list(prefix).await
    }
}

const ANCHOR: &str = "https://example.com/app";
const ELSEWHERE: &str = "https://example.com/landing";

fn app_dom() -> (DomSnapshot, NodeId, NodeId) {
    let mut dom = DomSnapshot::new(ANCHOR);
    let root = dom.push(DomNode::new("div"), None);
    let first = dom.push(
        DomNode {
            id: Some("open".into()),
            text: Some("Open".into()),
            ..DomNode::new("button")
        },
        Some(root),
    );
    let second = dom.push(
        DomNode {
            id: Some("confirm".into()),
            text: Some("Confirm".into()),
            ..DomNode::new("button")
        },
        Some(root),
    );
    (dom, first, second)
}

fn two_click_sequence() -> RecordedSequence {
    let mut sequence = RecordedSequence::new(ANCHOR);
    sequence
        .events
        .push(InteractionEvent::click(ElementDescriptor {
            id: Some("open".into()),
            ..ElementDescriptor::new("button")
        }));
    sequence
        .events
        .push(InteractionEvent::click(ElementDescriptor {
            id: Some("confirm".into()),
            ..ElementDescriptor::new("button")
        }));
    sequence
}

#[tokio::test]
async fn anchor_navigation_precedes_replay() {
    let (dom, first, second) = app_dom();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    // First incarnation sits on the wrong page; requesting a replay persists
    // the continuation and hops to the anchor.
    let driver = MockDriver::new(ELSEWHERE, dom.clone());
    let mut engine = Engine::new(store.clone(), Box::new(driver.clone()));
    let start = engine.begin_replay(&two_click_sequence()).await.unwrap();
    assert_eq!(start, ReplayStart::NavigationPending);
    {
        let state = driver.state.lock().unwrap();
        assert_eq!(state.navigations, vec![ANCHOR.to_string()]);
        // Nothing was applied before the hop.
        assert!(state.clicks.is_empty());
    }

    // Second incarnation: fresh engine, fresh driver, same store.
    let driver2 = MockDriver::new(ANCHOR, dom);
    let mut engine2 = Engine::new(store.clone(), Box::new(driver2.clone()));
    let outcome = engine2.attach().await.unwrap();
    assert_eq!(outcome, Some(ReplayOutcome::Completed));
    assert_eq!(driver2.state.lock().unwrap().clicks, vec![first, second]);

    // Third incarnation: the one-shot flag is spent, an unrelated load of
    // the anchor URL starts nothing.
    let driver3 = MockDriver::new(ANCHOR, driver2.state.lock().unwrap().dom.clone().unwrap());
    let mut engine3 = Engine::new(store, Box::new(driver3.clone()));
    assert_eq!(engine3.attach().await.unwrap(), None);
    assert!(driver3.state.lock().unwrap().clicks.is_empty());
}

#[tokio::test]
async fn mid_sequence_teardown_resumes_from_cursor() {
    let (dom, _, second) = app_dom();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    // A prior incarnation applied event 0 and persisted its continuation
    // just before the click tore the process down.
    let working = two_click_sequence();
    set_typed(
        store.as_ref(),
        keys::PENDING_REPLAY,
        &PendingReplay {
            sequence: working,
            cursor: 1,
        },
    )
    .await
    .unwrap();
    SessionControlState {
        is_capturing: false,
        replay_requested: true,
        pending_navigation_target: None,
    }
    .save(store.as_ref())
    .await
    .unwrap();

    let driver = MockDriver::new(ANCHOR, dom);
    let mut engine = Engine::new(store.clone(), Box::new(driver.clone()));
    let outcome = engine.attach().await.unwrap();

    assert_eq!(outcome, Some(ReplayOutcome::Completed));
    // Only the remaining event was applied.
    assert_eq!(driver.state.lock().unwrap().clicks, vec![second]);
    // The continuation is gone once the replay completed.
    assert!(store.get(keys::PENDING_REPLAY).await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn unreachable_anchor_aborts() {
    let (dom, _, _) = app_dom();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    let driver = MockDriver::new(ELSEWHERE, dom.clone());
    driver.state.lock().unwrap().navigation_lands = false;
    let config = ReplayConfig {
        first_event_poll: Duration::from_millis(200),
        first_event_window: Duration::from_secs(1),
        ..ReplayConfig::default()
    };
    let mut engine = Engine::with_config(store.clone(), Box::new(driver.clone()), config.clone());
    let start = engine.begin_replay(&two_click_sequence()).await.unwrap();
    assert_eq!(start, ReplayStart::NavigationPending);

    // The next incarnation wakes up still at the wrong location.
    let driver2 = MockDriver::new(ELSEWHERE, dom);
    let mut engine2 = Engine::with_config(store, Box::new(driver2.clone()), config);
    let outcome = engine2.attach().await.unwrap();
    assert_eq!(
        outcome,
        Some(ReplayOutcome::Aborted {
            last_applied: None,
            reason: AbortReason::AnchorUnreachable,
        })
    );
    assert!(driver2.state.lock().unwrap().clicks.is_empty());
}

#[tokio::test]
async fn stale_request_without_continuation_is_dropped() {
    let (dom, _, _) = app_dom();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    SessionControlState {
        is_capturing: false,
        replay_requested: true,
        pending_navigation_target: None,
    }
    .save(store.as_ref())
    .await
    .unwrap();

    let driver = MockDriver::new(ANCHOR, dom);
    let mut engine = Engine::new(store.clone(), Box::new(driver));
    assert_eq!(engine.attach().await.unwrap(), None);

    // The flag was consumed even though nothing ran.
    let session = SessionControlState::load(store.as_ref()).await.unwrap();
    assert!(!session.replay_requested);
}

#[tokio::test]
async fn failed_flag_write_blocks_the_navigation() {
    let (dom, _, _) = app_dom();
    let store = Arc::new(FlakyStore::new());

    let driver = MockDriver::new(ELSEWHERE, dom);
    let mut engine = Engine::new(store.clone(), Box::new(driver.clone()));

    store.fail_writes.store(true, Ordering::SeqCst);
    let result = engine.begin_replay(&two_click_sequence()).await;
    assert!(matches!(result, Err(EngineError::Persistence(_))));
    // Losing continuity would be worse than failing loudly: no hop happened.
    assert!(driver.state.lock().unwrap().navigations.is_empty());
}

#[tokio::test]
async fn cancel_replay_withdraws_a_pending_request() {
    let (dom, _, _) = app_dom();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

    let driver = MockDriver::new(ELSEWHERE, dom.clone());
    let mut engine = Engine::new(store.clone(), Box::new(driver));
    engine.begin_replay(&two_click_sequence()).await.unwrap();

    engine.cancel_replay().await.unwrap();
    assert!(matches!(
        engine.cancel_replay().await,
        Err(EngineError::NotReplaying)
    ));

    // A later incarnation finds nothing to do.
    let driver2 = MockDriver::new(ANCHOR, dom);
    let mut engine2 = Engine::new(store, Box::new(driver2.clone()));
    assert_eq!(engine2.attach().await.unwrap(), None);
    assert!(driver2.state.lock().unwrap().clicks.is_empty());
}

#[tokio::test]
async fn attach_drops_a_stale_capture_flag() {
    let (dom, _, _) = app_dom();
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    SessionControlState {
        is_capturing: true,
        replay_requested: false,
        pending_navigation_target: None,
    }
    .save(store.as_ref())
    .await
    .unwrap();

    let driver = MockDriver::new(ANCHOR, dom);
    let mut engine = Engine::new(store.clone(), Box::new(driver));
    assert_eq!(engine.attach().await.unwrap(), None);

    let session = SessionControlState::load(store.as_ref()).await.unwrap();
    assert!(!session.is_capturing);
}
