//! Draft validation and degraded-record repair.

use crate::error::StoreError;
use crate::model::{BlockDraft, BlockRecord, EmbeddingInput};
use chrono::Utc;
use serde::Deserialize;

/// Validate and canonicalize a raw capture payload into a block record.
///
/// Fails when the id or session url is empty after trimming, the ordinal
/// range or timestamp is absent or non-finite, or an embedding view falls
/// outside its backing buffer. Derives `message_count` and mirrors the
/// ordinal range into `start_ordinal`/`end_ordinal`.
pub fn normalize_block(draft: BlockDraft) -> Result<BlockRecord, StoreError> {
    let id = draft.id.as_deref().unwrap_or("").trim().to_string();
    if id.is_empty() {
        return Err(StoreError::MissingId);
    }
    let session_url = draft.session_url.as_deref().unwrap_or("").trim().to_string();
    if session_url.is_empty() {
        return Err(StoreError::MissingSessionUrl);
    }
    let (start, end) = draft.ordinal_range.ok_or(StoreError::InvalidOrdinalRange)?;
    if !start.is_finite() || !end.is_finite() {
        return Err(StoreError::InvalidOrdinalRange);
    }
    let timestamp = draft.timestamp.ok_or(StoreError::InvalidTimestamp)?;
    if !timestamp.is_finite() {
        return Err(StoreError::InvalidTimestamp);
    }
    let embedding = draft.embedding.map(copy_embedding).transpose()?;
    let message_count = draft.messages.len();
    let (start, end) = (start as i64, end as i64);

    Ok(BlockRecord {
        id,
        session_url,
        raw: draft.raw.unwrap_or_default(),
        messages: draft.messages,
        ordinal_range: (start, end),
        start_ordinal: start,
        end_ordinal: end,
        timestamp: timestamp as i64,
        embedding,
        message_count,
        meta: draft.meta,
    })
}

/// Take exactly the addressed byte range of an embedding payload into an
/// independently owned buffer.
fn copy_embedding(input: EmbeddingInput) -> Result<Vec<u8>, StoreError> {
    match input {
        EmbeddingInput::Bytes(bytes) => Ok(bytes),
        EmbeddingInput::View {
            buffer,
            offset,
            len,
        } => {
            let end = offset.checked_add(len).ok_or_else(|| {
                StoreError::InvalidEmbedding(format!("view range {offset}+{len} overflows"))
            })?;
            let slice = buffer.get(offset..end).ok_or_else(|| {
                StoreError::InvalidEmbedding(format!(
                    "view range {offset}..{end} exceeds buffer of {} bytes",
                    buffer.len()
                ))
            })?;
            Ok(slice.to_vec())
        }
    }
}

/// Payload shape read back from a durable backend.
///
/// Records written by an earlier schema version may lack fields, so every
/// field decodes leniently and `sanitize_loaded` repairs the gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoredBlock {
    /// Block identifier.
    pub id: String,
    /// Session url.
    pub session_url: String,
    /// Raw transcript text.
    pub raw: String,
    /// Ordered message items.
    pub messages: Vec<serde_json::Value>,
    /// Inclusive ordinal pair, when present.
    pub ordinal_range: Option<(f64, f64)>,
    /// Mirrored start ordinal, when present.
    pub start_ordinal: Option<f64>,
    /// Mirrored end ordinal, when present.
    pub end_ordinal: Option<f64>,
    /// Capture timestamp in epoch milliseconds, when present.
    pub timestamp: Option<f64>,
    /// Stored message count, when present.
    pub message_count: Option<u64>,
    /// Opaque metadata passthrough.
    pub meta: Option<serde_json::Value>,
}

/// Repair a stored payload into a well-formed record. Never fails.
///
/// Missing ordinals fall back to the ordinal range, then to 0; a missing
/// message count is re-derived; a non-finite timestamp becomes the current
/// time. The embedding arrives from the binary column already owned.
pub fn sanitize_loaded(stored: StoredBlock, embedding: Option<Vec<u8>>) -> BlockRecord {
    let (range_start, range_end) = match stored.ordinal_range {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    };
    let start_ordinal = finite_i64(stored.start_ordinal)
        .or(finite_i64(range_start))
        .unwrap_or(0);
    let end_ordinal = finite_i64(stored.end_ordinal)
        .or(finite_i64(range_end))
        .unwrap_or(0);
    let message_count = stored
        .message_count
        .map(|count| count as usize)
        .unwrap_or(stored.messages.len());
    let timestamp =
        finite_i64(stored.timestamp).unwrap_or_else(|| Utc::now().timestamp_millis());

    BlockRecord {
        id: stored.id,
        session_url: stored.session_url,
        raw: stored.raw,
        messages: stored.messages,
        ordinal_range: (start_ordinal, end_ordinal),
        start_ordinal,
        end_ordinal,
        timestamp,
        embedding,
        message_count,
        meta: stored.meta,
    }
}

/// Convert a possibly-absent float to an integer, rejecting non-finite values.
fn finite_i64(value: Option<f64>) -> Option<i64> {
    value.filter(|value| value.is_finite()).map(|value| value as i64)
}
