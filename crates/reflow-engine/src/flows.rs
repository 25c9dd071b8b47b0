//! Named-flow catalog.
//!
//! A flow is a saved, named sequence the user can replay on demand. The
//! catalog stores each flow under its own key; saving writes the canonical
//! form (named, retry counters zeroed), so transient replay state never
//! leaks into a saved flow.

use crate::storage::{get_typed, keys, set_typed, KeyValueStore, StorageError};
use reflow_core::RecordedSequence;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("flow not found: {0}")]
    NotFound(String),
    #[error("flow already exists: {0}")]
    AlreadyExists(String),
    #[error("persistence failure: {0}")]
    Storage(#[from] StorageError),
}

pub struct FlowCatalog {
    store: Arc<dyn KeyValueStore>,
}

impl FlowCatalog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(name: &str) -> String {
        format!("{}{name}", keys::FLOW_PREFIX)
    }

    /// Save a sequence under `name`, replacing any existing flow of that name.
    pub async fn save(&self, name: &str, sequence: &RecordedSequence) -> Result<(), FlowError> {
        let flow = sequence.canonical(name);
        set_typed(self.store.as_ref(), &Self::key(name), &flow).await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Result<RecordedSequence, FlowError> {
        get_typed(self.store.as_ref(), &Self::key(name))
            .await?
            .ok_or_else(|| FlowError::NotFound(name.to_string()))
    }

    /// Names of all saved flows, sorted.
    pub async fn list(&self) -> Result<Vec<String>, FlowError> {
        let mut names: Vec<String> = self
            .store
            .list(keys::FLOW_PREFIX)
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(keys::FLOW_PREFIX).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    pub async fn rename(&self, old: &str, new: &str) -> Result<(), FlowError> {
        if self.store.get(&Self::key(new)).await?.is_some() {
            return Err(FlowError::AlreadyExists(new.to_string()));
        }
        let flow = self.get(old).await?;
        self.save(new, &flow).await?;
        self.store.remove(&Self::key(old)).await?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), FlowError> {
        if self.store.get(&Self::key(name)).await?.is_none() {
            return Err(FlowError::NotFound(name.to_string()));
        }
        self.store.remove(&Self::key(name)).await?;
        Ok(())
    }
}
