//! The host/document boundary.
//!
//! The host controller owns the live document and implements `PageDriver`
//! over it. The engine assumes it is freshly initialized in every document
//! incarnation; anything it needs across a navigation comes from the store,
//! never from the driver.

use async_trait::async_trait;
use reflow_core::{DomSnapshot, NodeId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum DriverError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element {0} is gone from the document")]
    Stale(NodeId),

    #[error("could not install into the target document: {0}")]
    Injection(String),

    #[error("driver IO error: {0}")]
    Io(String),
}

/// Handle to one live document incarnation.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Current page location.
    async fn current_url(&self) -> Result<String, DriverError>;

    /// Snapshot of the document for resolution. Must not mutate the page.
    async fn snapshot(&self) -> Result<DomSnapshot, DriverError>;

    /// Simulate activation (a click) of the element. May navigate, which
    /// tears down this incarnation.
    async fn click(&mut self, node: NodeId) -> Result<(), DriverError>;

    /// Set a field's value and dispatch a change notification so dependent
    /// listeners observe the edit.
    async fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DriverError>;

    /// Navigate to a URL. Tears down this incarnation.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;
}
