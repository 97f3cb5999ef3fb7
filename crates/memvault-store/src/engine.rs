//! Backend engine contract shared by the durable and in-memory stores.

use crate::error::StoreError;
use crate::model::BlockRecord;
use async_trait::async_trait;

#[async_trait]
/// Storage engine abstraction behind the block store facade.
///
/// Both implementations honor the same read/sort semantics so callers using
/// only this contract cannot tell them apart.
pub trait BlockEngine: Send + Sync {
    /// Upsert a record by id, overwriting any existing record entirely.
    async fn put(&self, record: BlockRecord) -> Result<(), StoreError>;

    /// Fetch a record by id. A missing key resolves to `None`, never an error.
    async fn get(&self, id: &str) -> Result<Option<BlockRecord>, StoreError>;

    /// Fetch all records for a session, sorted by
    /// (start_ordinal, timestamp, id) ascending.
    async fn get_by_session(
        &self,
        session_url: &str,
    ) -> Result<Vec<BlockRecord>, StoreError>;

    /// Delete a record by id, reporting whether anything was removed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Remove the records of one session (returning the removed count) or,
    /// with no session, empty the store (returning the prior total count).
    async fn clear(&self, session_url: Option<&str>) -> Result<usize, StoreError>;

    /// Fetch every record. Unsorted at this layer; ordering is a
    /// session-scoped contract only.
    async fn get_all(&self) -> Result<Vec<BlockRecord>, StoreError>;

    /// Total record count.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Best-effort resource release. Failures are logged, never surfaced.
    async fn close(&self);
}
