//! Builders for drafts and records used in tests.

use memvault_store::{BlockDraft, BlockRecord, normalize_block};
use serde_json::json;

/// One opaque message item with a speaker and text.
pub fn message(speaker: &str, text: &str) -> serde_json::Value {
    json!({ "speaker": speaker, "text": text })
}

/// A valid draft with one message, ordinal range (0, 1), timestamp 1000.
pub fn draft(id: &str, session_url: &str) -> BlockDraft {
    BlockDraft {
        id: Some(id.to_string()),
        session_url: Some(session_url.to_string()),
        raw: Some("hi".to_string()),
        messages: vec![message("A", "hi")],
        ordinal_range: Some((0.0, 1.0)),
        timestamp: Some(1000.0),
        embedding: None,
        meta: None,
    }
}

/// The normalized record for [`draft`].
pub fn record(id: &str, session_url: &str) -> BlockRecord {
    normalize_block(draft(id, session_url)).expect("valid draft")
}
