//! In-memory reference implementation of the snapshot store.
//!
//! This adapter is deterministic and test-friendly. Production
//! deployments should point the engine at a durable backend such as
//! [`JsonFileStore`](crate::JsonFileStore) or a database-backed
//! implementation of the trait.

use crate::model::EngineSnapshot;
use crate::traits::SnapshotStore;
use crate::{StoreError, StoreResult};
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory snapshot store.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: RwLock<EngineSnapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot contents, for assertions in tests.
    pub fn snapshot(&self) -> StoreResult<EngineSnapshot> {
        self.snapshot
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| StoreError::Backend("snapshot lock poisoned".to_string()))
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> StoreResult<EngineSnapshot> {
        self.snapshot()
    }

    async fn save(&self, snapshot: &EngineSnapshot) -> StoreResult<()> {
        let mut guard = self
            .snapshot
            .write()
            .map_err(|_| StoreError::Backend("snapshot lock poisoned".to_string()))?;
        *guard = snapshot.clone();
        Ok(())
    }
}
