//! Memory block storage for chat transcript capture.
//!
//! Chunked transcript segments ("memory blocks"), each optionally carrying a
//! binary embedding, are persisted behind a backend abstraction that falls
//! back from a durable SQLite store to an in-memory store when durable
//! storage is unavailable.

pub mod engine;
pub mod error;
pub mod memory;
pub mod model;
pub mod normalize;
pub mod options;
pub mod preview;
pub mod probe;
pub mod sqlite;
pub mod store;

/// Backend engine contract.
pub use engine::BlockEngine;
/// Storage error type.
pub use error::StoreError;
/// In-memory fallback engine.
pub use memory::InMemoryBlockEngine;
/// Block record model, draft input, and aggregate statistics.
pub use model::{BlockDraft, BlockRecord, EmbeddingInput, StoreStats};
/// Draft normalization and degraded-record repair.
pub use normalize::{StoredBlock, normalize_block, sanitize_loaded};
/// Store construction options.
pub use options::StoreOptions;
/// Preview rendering for debug tooling.
pub use preview::block_preview;
/// Backend capability probes.
pub use probe::{CapabilityProbe, DiskProbe, StaticProbe};
/// Durable SQLite engine.
pub use sqlite::SqliteBlockEngine;
/// Block store facade.
pub use store::BlockStore;
