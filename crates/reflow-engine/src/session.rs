//! Cross-incarnation control flags.
//!
//! Navigation destroys the executing context; these flags are how the next
//! incarnation knows what it woke up into. They are never held as in-memory
//! globals — every fresh startup loads them through the store, and every
//! mutation is persisted before any action that risks teardown.

use crate::storage::{get_typed, keys, set_typed, KeyValueStore, StorageError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionControlState {
    /// An active recording session is in progress.
    #[serde(default)]
    pub is_capturing: bool,
    /// One-shot: set by the replay trigger, cleared the moment replay logic
    /// begins, so an unrelated later navigation never re-triggers replay.
    #[serde(default)]
    pub replay_requested: bool,
    /// URL the next incarnation must reach before replay proceeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_navigation_target: Option<String>,
}

impl SessionControlState {
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, StorageError> {
        Ok(get_typed(store, keys::SESSION).await?.unwrap_or_default())
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), StorageError> {
        set_typed(store, keys::SESSION, self).await
    }

    pub async fn clear(store: &dyn KeyValueStore) -> Result<(), StorageError> {
        store.remove(keys::SESSION).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn defaults_when_absent() {
        let store = MemoryStore::new();
        let state = SessionControlState::load(&store).await.unwrap();
        assert_eq!(state, SessionControlState::default());
    }

    #[tokio::test]
    async fn survives_a_save_load_cycle() {
        let store = MemoryStore::new();
        let state = SessionControlState {
            is_capturing: false,
            replay_requested: true,
            pending_navigation_target: Some("https://example.com/app".into()),
        };
        state.save(&store).await.unwrap();
        assert_eq!(SessionControlState::load(&store).await.unwrap(), state);

        SessionControlState::clear(&store).await.unwrap();
        assert_eq!(
            SessionControlState::load(&store).await.unwrap(),
            SessionControlState::default()
        );
    }
}
