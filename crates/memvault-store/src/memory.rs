//! In-memory fallback engine used when no durable backend is available.

use crate::engine::BlockEngine;
use crate::error::StoreError;
use crate::model::{BlockRecord, compare_blocks};
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keyed in-process block store mirroring the durable engine's semantics.
///
/// Records move in by value and leave as clones, so the caller and the map
/// never share a live reference.
#[derive(Default)]
pub struct InMemoryBlockEngine {
    /// Records keyed by block id.
    blocks: RwLock<HashMap<String, BlockRecord>>,
}

impl InMemoryBlockEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockEngine for InMemoryBlockEngine {
    async fn put(&self, record: BlockRecord) -> Result<(), StoreError> {
        debug!(
            "storing block in memory (id={}, session_url={})",
            record.id, record.session_url
        );
        self.blocks.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<BlockRecord>, StoreError> {
        Ok(self.blocks.read().get(id).cloned())
    }

    async fn get_by_session(
        &self,
        session_url: &str,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        let mut records: Vec<BlockRecord> = self
            .blocks
            .read()
            .values()
            .filter(|record| record.session_url == session_url)
            .cloned()
            .collect();
        records.sort_by(compare_blocks);
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.blocks.write().remove(id).is_some())
    }

    async fn clear(&self, session_url: Option<&str>) -> Result<usize, StoreError> {
        let mut blocks = self.blocks.write();
        let removed = match session_url {
            Some(session_url) => {
                let before = blocks.len();
                blocks.retain(|_, record| record.session_url != session_url);
                before - blocks.len()
            }
            None => {
                let total = blocks.len();
                blocks.clear();
                total
            }
        };
        info!("cleared in-memory blocks (removed={removed})");
        Ok(removed)
    }

    async fn get_all(&self) -> Result<Vec<BlockRecord>, StoreError> {
        Ok(self.blocks.read().values().cloned().collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.blocks.read().len())
    }

    async fn close(&self) {
        self.blocks.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryBlockEngine;
    use crate::engine::BlockEngine;
    use memvault_test_utils::record;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn put_then_get_returns_an_independent_copy() {
        let engine = InMemoryBlockEngine::new();
        let mut stored = record("b1", "s1");
        stored.embedding = Some(vec![1, 2, 3]);
        engine.put(stored.clone()).await.expect("put");

        let mut first = engine.get("b1").await.expect("get").expect("record");
        first.embedding.as_mut().expect("embedding")[0] = 9;

        let second = engine.get("b1").await.expect("get").expect("record");
        assert_eq!(second.embedding, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn close_discards_all_entries() {
        let engine = InMemoryBlockEngine::new();
        engine.put(record("b1", "s1")).await.expect("put");
        engine.close().await;
        assert_eq!(engine.count().await.expect("count"), 0);
    }
}
