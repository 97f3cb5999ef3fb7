//! Construction options for a block store.

use std::path::PathBuf;

/// Default store name; the database file carries this name.
pub const DEFAULT_STORE_NAME: &str = "memory_blocks";

/// Default table name for block records.
pub const DEFAULT_TABLE: &str = "blocks";

/// Default schema version recorded on first open.
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

/// Options selecting where and how a block store is opened.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Directory holding the database file.
    pub root: PathBuf,
    /// Store name; the database file is `<store_name>.db` under `root`.
    pub store_name: String,
    /// Table name for block records. Must be a plain identifier.
    pub table: String,
    /// Schema version to record; values below 1 are clamped to 1.
    pub schema_version: u32,
}

impl StoreOptions {
    /// Default options under the given root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            store_name: DEFAULT_STORE_NAME.to_string(),
            table: DEFAULT_TABLE.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION,
        }
    }

    /// Override the store name.
    pub fn with_store_name(mut self, store_name: impl Into<String>) -> Self {
        self.store_name = store_name.into();
        self
    }

    /// Override the table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Override the schema version; values below 1 are clamped to 1.
    pub fn with_schema_version(mut self, schema_version: u32) -> Self {
        self.schema_version = schema_version.max(1);
        self
    }

    /// Path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.root.join(format!("{}.db", self.store_name))
    }
}
