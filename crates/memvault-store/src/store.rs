//! Block store facade selecting a backend at construction.

use crate::engine::BlockEngine;
use crate::error::StoreError;
use crate::memory::InMemoryBlockEngine;
use crate::model::{BlockDraft, BlockRecord, StoreStats};
use crate::normalize::normalize_block;
use crate::options::StoreOptions;
use crate::probe::{CapabilityProbe, DiskProbe};
use crate::sqlite::SqliteBlockEngine;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Facade over the selected backend engine.
///
/// Construction picks the backend exactly once: the durable engine when the
/// capability probe allows it and initialization succeeds, the in-memory
/// engine otherwise. The selection is never revisited per call.
pub struct BlockStore {
    /// Selected backend.
    engine: Arc<dyn BlockEngine>,
    /// Whether the durable backend was selected.
    durable: bool,
}

impl BlockStore {
    /// Open a store with the default disk probe.
    pub async fn open(options: StoreOptions) -> Self {
        Self::open_with_probe(options, &DiskProbe).await
    }

    /// Open a store, consulting the given capability probe.
    ///
    /// Inability to construct the durable backend is not an error: the store
    /// logs a warning and keeps the public contract available in memory.
    pub async fn open_with_probe(
        options: StoreOptions,
        probe: &dyn CapabilityProbe,
    ) -> Self {
        if probe.durable_available(&options) {
            match Self::open_durable(&options).await {
                Ok(engine) => {
                    info!(
                        "block store using durable backend (path={})",
                        options.db_path().display()
                    );
                    return Self {
                        engine,
                        durable: true,
                    };
                }
                Err(err) => {
                    warn!("durable backend failed, using in-memory store ({err})");
                }
            }
        } else {
            warn!("durable backend unavailable, using in-memory store");
        }
        Self {
            engine: Arc::new(InMemoryBlockEngine::new()),
            durable: false,
        }
    }

    /// Build a store over an already-constructed engine.
    pub fn with_engine(engine: Arc<dyn BlockEngine>, durable: bool) -> Self {
        Self { engine, durable }
    }

    /// Construct and initialize the durable engine.
    async fn open_durable(
        options: &StoreOptions,
    ) -> Result<Arc<dyn BlockEngine>, StoreError> {
        let engine = SqliteBlockEngine::new(options)?;
        engine.init().await?;
        Ok(Arc::new(engine))
    }

    /// Whether the durable backend was selected at construction.
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Normalize a draft and upsert the resulting record.
    pub async fn save(&self, draft: BlockDraft) -> Result<BlockRecord, StoreError> {
        let record = normalize_block(draft)?;
        debug!(
            "saving block (id={}, session_url={}, messages={})",
            record.id, record.session_url, record.message_count
        );
        self.engine.put(record.clone()).await?;
        Ok(record)
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &str) -> Result<Option<BlockRecord>, StoreError> {
        self.engine.get(id).await
    }

    /// Fetch all records of a session in storage order.
    pub async fn get_by_session(
        &self,
        session_url: &str,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        self.engine.get_by_session(session_url).await
    }

    /// Fetch every record, unsorted.
    pub async fn get_all(&self) -> Result<Vec<BlockRecord>, StoreError> {
        self.engine.get_all().await
    }

    /// Delete a record by id.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.engine.delete(id).await
    }

    /// Remove one session's records or, with no session, every record.
    pub async fn clear(&self, session_url: Option<&str>) -> Result<usize, StoreError> {
        self.engine.clear(session_url).await
    }

    /// Total record count.
    pub async fn count(&self) -> Result<usize, StoreError> {
        self.engine.count().await
    }

    /// Aggregate statistics from one full pass over the store.
    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let records = self.engine.get_all().await?;
        let mut sessions = HashSet::new();
        let mut messages = 0usize;
        for record in &records {
            sessions.insert(record.session_url.as_str());
            messages += record.message_count;
        }
        Ok(StoreStats {
            blocks: records.len(),
            messages,
            sessions: sessions.len(),
        })
    }

    /// Best-effort close of the selected backend.
    pub async fn close(&self) {
        self.engine.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::BlockStore;
    use crate::options::StoreOptions;
    use crate::probe::StaticProbe;
    use memvault_test_utils::{RecordingEngine, draft};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    #[tokio::test]
    async fn probe_refusal_selects_the_in_memory_engine() {
        let options = StoreOptions::new("/nonexistent/denied");
        let store = BlockStore::open_with_probe(options, &StaticProbe(false)).await;
        assert!(!store.is_durable());

        let record = store.save(draft("b1", "s1")).await.expect("save");
        assert_eq!(record.id, "b1");
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn save_normalizes_before_reaching_the_engine() {
        let engine = Arc::new(RecordingEngine::new());
        let store = BlockStore::with_engine(engine.clone(), false);

        let mut bad = draft("b1", "s1");
        bad.ordinal_range = None;
        store.save(bad).await.expect_err("invalid draft");
        assert_eq!(engine.calls().lock().len(), 0);

        store.save(draft("b1", "s1")).await.expect("save");
        assert_eq!(engine.calls().lock().clone(), vec!["put"]);
    }

    #[tokio::test]
    async fn stats_aggregate_blocks_messages_and_sessions() {
        let engine = Arc::new(RecordingEngine::new());
        let store = BlockStore::with_engine(engine, false);

        let mut a = draft("a", "s1");
        a.messages.push(serde_json::json!({"speaker": "B", "text": "two"}));
        store.save(a).await.expect("save");
        store.save(draft("b", "s1")).await.expect("save");
        store.save(draft("c", "s2")).await.expect("save");

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.blocks, 3);
        assert_eq!(stats.messages, 4);
        assert_eq!(stats.sessions, 2);
    }
}
