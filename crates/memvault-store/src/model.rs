//! Block record model shared by every engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Persisted memory block record.
///
/// The embedding is excluded from the serialized form; the durable engine
/// keeps it in a dedicated binary column and the in-memory engine holds the
/// record directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockRecord {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// Session url grouping blocks captured together.
    pub session_url: String,
    /// Raw transcript text for the block.
    pub raw: String,
    /// Ordered message items, preserved as-is.
    pub messages: Vec<serde_json::Value>,
    /// Inclusive ordinal range covered by the block.
    pub ordinal_range: (i64, i64),
    /// First ordinal, mirrors `ordinal_range.0`; index key.
    pub start_ordinal: i64,
    /// Last ordinal, mirrors `ordinal_range.1`.
    pub end_ordinal: i64,
    /// Capture timestamp in epoch milliseconds.
    pub timestamp: i64,
    /// Optional binary embedding, always an independently owned copy.
    #[serde(skip)]
    pub embedding: Option<Vec<u8>>,
    /// Derived message count.
    pub message_count: usize,
    /// Opaque metadata passthrough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl BlockRecord {
    /// Session-scoped sort key: start ordinal, then timestamp, then id.
    pub fn sort_key(&self) -> (i64, i64, &str) {
        (self.start_ordinal, self.timestamp, self.id.as_str())
    }
}

/// Total order applied to every session-scoped read.
pub fn compare_blocks(a: &BlockRecord, b: &BlockRecord) -> Ordering {
    a.sort_key().cmp(&b.sort_key())
}

/// Raw block payload supplied by the transcript capture pipeline.
///
/// Scalar numerics arrive as `f64` (JSON numbers) and are validated finite
/// during normalization before integer conversion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockDraft {
    /// Unique block identifier.
    pub id: Option<String>,
    /// Session url for the block.
    pub session_url: Option<String>,
    /// Raw transcript text.
    pub raw: Option<String>,
    /// Ordered message items.
    pub messages: Vec<serde_json::Value>,
    /// Inclusive (start, end) ordinal pair.
    pub ordinal_range: Option<(f64, f64)>,
    /// Capture timestamp in epoch milliseconds.
    pub timestamp: Option<f64>,
    /// Optional embedding payload.
    pub embedding: Option<EmbeddingInput>,
    /// Opaque metadata passthrough.
    pub meta: Option<serde_json::Value>,
}

/// Embedding payload accepted by the normalizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "Vec<u8>")]
pub enum EmbeddingInput {
    /// Owned byte buffer, taken in full.
    Bytes(Vec<u8>),
    /// Window over a shared buffer; only the addressed range is copied.
    View {
        /// Backing buffer shared with the caller.
        buffer: Arc<Vec<u8>>,
        /// Start of the addressed range in bytes.
        offset: usize,
        /// Length of the addressed range in bytes.
        len: usize,
    },
}

impl From<Vec<u8>> for EmbeddingInput {
    fn from(bytes: Vec<u8>) -> Self {
        EmbeddingInput::Bytes(bytes)
    }
}

/// Aggregate statistics over the whole store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoreStats {
    /// Total stored blocks.
    pub blocks: usize,
    /// Sum of every record's message count.
    pub messages: usize,
    /// Number of distinct session urls.
    pub sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::{BlockRecord, compare_blocks};
    use pretty_assertions::assert_eq;

    fn record(id: &str, start_ordinal: i64, timestamp: i64) -> BlockRecord {
        BlockRecord {
            id: id.to_string(),
            session_url: "s1".to_string(),
            raw: String::new(),
            messages: Vec::new(),
            ordinal_range: (start_ordinal, start_ordinal),
            start_ordinal,
            end_ordinal: start_ordinal,
            timestamp,
            embedding: None,
            message_count: 0,
            meta: None,
        }
    }

    #[test]
    fn compare_blocks_orders_by_ordinal_then_timestamp_then_id() {
        let mut records = vec![
            record("b", 5, 1000),
            record("a", 5, 1000),
            record("c", 0, 2000),
            record("d", 5, 500),
        ];
        records.sort_by(compare_blocks);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn record_serialization_skips_embedding() {
        let mut block = record("b1", 0, 1000);
        block.embedding = Some(vec![1, 2, 3]);
        let json = serde_json::to_value(&block).expect("serialize");
        assert_eq!(json.get("embedding"), None);
    }
}
