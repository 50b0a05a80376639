use crate::model::EngineSnapshot;
use crate::StoreResult;
use async_trait::async_trait;

/// Storage interface for engine snapshots.
///
/// The engine calls [`load`](SnapshotStore::load) once at startup and
/// [`save`](SnapshotStore::save) after every mutation. Adapters must
/// treat a missing backing store as an empty snapshot, not an error,
/// so a fresh deployment starts clean.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the last saved snapshot, or an empty one if nothing was
    /// ever saved.
    async fn load(&self) -> StoreResult<EngineSnapshot>;

    /// Replace the saved snapshot.
    async fn save(&self, snapshot: &EngineSnapshot) -> StoreResult<()>;
}
