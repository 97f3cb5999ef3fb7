//! Scripted engine stub recording the calls it receives.

use async_trait::async_trait;
use memvault_store::{BlockEngine, BlockRecord, InMemoryBlockEngine, StoreError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Engine stub that records call names and delegates to an in-memory engine.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Arc<Mutex<Vec<&'static str>>>,
    inner: InMemoryBlockEngine,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the engine calls received so far, in order.
    pub fn calls(&self) -> Arc<Mutex<Vec<&'static str>>> {
        self.calls.clone()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().push(name);
    }
}

#[async_trait]
impl BlockEngine for RecordingEngine {
    async fn put(&self, record: BlockRecord) -> Result<(), StoreError> {
        self.record("put");
        self.inner.put(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<BlockRecord>, StoreError> {
        self.record("get");
        self.inner.get(id).await
    }

    async fn get_by_session(
        &self,
        session_url: &str,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        self.record("get_by_session");
        self.inner.get_by_session(session_url).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.record("delete");
        self.inner.delete(id).await
    }

    async fn clear(&self, session_url: Option<&str>) -> Result<usize, StoreError> {
        self.record("clear");
        self.inner.clear(session_url).await
    }

    async fn get_all(&self) -> Result<Vec<BlockRecord>, StoreError> {
        self.record("get_all");
        self.inner.get_all().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.record("count");
        self.inner.count().await
    }

    async fn close(&self) {
        self.record("close");
        self.inner.close().await;
    }
}
