//! SQLite-backed durable engine.

use crate::engine::BlockEngine;
use crate::error::StoreError;
use crate::model::BlockRecord;
use crate::normalize::{StoredBlock, sanitize_loaded};
use crate::options::StoreOptions;
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::PathBuf;
use tokio::sync::OnceCell;

/// Durable block engine backed by a SQLite database.
///
/// The connection is opened and the schema applied on first use; concurrent
/// callers during startup share one in-flight open instead of racing to
/// create the schema twice.
pub struct SqliteBlockEngine {
    /// Database file path.
    path: PathBuf,
    /// Table holding block records.
    table: String,
    /// Schema version recorded on first open.
    schema_version: u32,
    /// Memoized connection; `None` inside the cell after close.
    conn: OnceCell<Mutex<Option<Connection>>>,
}

impl SqliteBlockEngine {
    /// Create an engine for the given options without touching the disk.
    pub fn new(options: &StoreOptions) -> Result<Self, StoreError> {
        let table = options.table.clone();
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(StoreError::InvalidTable(table));
        }
        Ok(Self {
            path: options.db_path(),
            table,
            schema_version: options.schema_version.max(1),
            conn: OnceCell::new(),
        })
    }

    /// Open the database and apply the schema. Memoized.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.handle().await.map(|_| ())
    }

    /// Shared handle to the memoized connection.
    async fn handle(&self) -> Result<&Mutex<Option<Connection>>, StoreError> {
        self.conn
            .get_or_try_init(|| async {
                let conn = self.open()?;
                Ok(Mutex::new(Some(conn)))
            })
            .await
    }

    /// Open the database file and bring the schema up.
    fn open(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.path)?;
        self.apply_schema(&conn)?;
        info!(
            "opened durable block store (path={}, table={})",
            self.path.display(),
            self.table
        );
        Ok(conn)
    }

    /// Create the table, its secondary indexes, and the version row.
    ///
    /// A stored version newer than the configured one is an error; there is
    /// no forward-migration path. An older stored version re-applies the
    /// idempotent schema and raises the recorded version.
    fn apply_schema(&self, conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS schema_meta (
                 key TEXT PRIMARY KEY,
                 value INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS {table} (
                 id TEXT PRIMARY KEY,
                 session_url TEXT NOT NULL,
                 start_ordinal INTEGER NOT NULL DEFAULT 0,
                 timestamp INTEGER NOT NULL DEFAULT 0,
                 embedding BLOB,
                 payload TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_{table}_session_url
                 ON {table}(session_url);
             CREATE INDEX IF NOT EXISTS idx_{table}_start_ordinal
                 ON {table}(start_ordinal);
             CREATE INDEX IF NOT EXISTS idx_{table}_timestamp
                 ON {table}(timestamp);",
            table = self.table
        ))?;

        let stored: Option<u32> = conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(version) if version > self.schema_version => {
                Err(StoreError::UnsupportedSchema(version))
            }
            Some(version) if version < self.schema_version => {
                info!(
                    "raising schema version (from={}, to={})",
                    version, self.schema_version
                );
                conn.execute(
                    "UPDATE schema_meta SET value = ?1 WHERE key = 'version'",
                    params![self.schema_version],
                )?;
                Ok(())
            }
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO schema_meta (key, value) VALUES ('version', ?1)",
                    params![self.schema_version],
                )?;
                Ok(())
            }
        }
    }

    /// Run a closure against the open connection, failing after close.
    async fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let handle = self.handle().await?;
        let mut guard = handle.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Run a closure inside its own transaction.
    ///
    /// On error the transaction is rolled back (a rollback failure is only
    /// logged) and the original error is re-raised.
    fn in_transaction<T>(
        conn: &mut Connection,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = conn.transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("transaction rollback failed ({rollback_err})");
                }
                Err(err)
            }
        }
    }
}

/// Rebuild a record from its row parts, repairing legacy payloads.
fn record_from_parts(
    id: String,
    session_url: String,
    embedding: Option<Vec<u8>>,
    payload: &str,
) -> BlockRecord {
    let mut stored: StoredBlock = serde_json::from_str(payload).unwrap_or_default();
    // The key columns are authoritative; the payload may predate them.
    stored.id = id;
    stored.session_url = session_url;
    sanitize_loaded(stored, embedding)
}

/// Row tuple selected by every read query.
type RowParts = (String, String, Option<Vec<u8>>, String);

/// Map a result row onto [`RowParts`].
fn row_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowParts> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

#[async_trait]
impl BlockEngine for SqliteBlockEngine {
    async fn put(&self, record: BlockRecord) -> Result<(), StoreError> {
        debug!(
            "storing block (id={}, session_url={})",
            record.id, record.session_url
        );
        let payload = serde_json::to_string(&record)?;
        self.with_conn(move |conn| {
            Self::in_transaction(conn, |tx| {
                tx.execute(
                    &format!(
                        "INSERT INTO {table}
                             (id, session_url, start_ordinal, timestamp, embedding, payload)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(id) DO UPDATE SET
                             session_url = excluded.session_url,
                             start_ordinal = excluded.start_ordinal,
                             timestamp = excluded.timestamp,
                             embedding = excluded.embedding,
                             payload = excluded.payload",
                        table = self.table
                    ),
                    params![
                        record.id,
                        record.session_url,
                        record.start_ordinal,
                        record.timestamp,
                        record.embedding,
                        payload
                    ],
                )?;
                Ok(())
            })
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<BlockRecord>, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let parts = conn
                .query_row(
                    &format!(
                        "SELECT id, session_url, embedding, payload
                         FROM {table} WHERE id = ?1",
                        table = self.table
                    ),
                    params![id],
                    row_parts,
                )
                .optional()?;
            Ok(parts.map(|(id, session_url, embedding, payload)| {
                record_from_parts(id, session_url, embedding, &payload)
            }))
        })
        .await
    }

    async fn get_by_session(
        &self,
        session_url: &str,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        let session_url = session_url.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, session_url, embedding, payload
                 FROM {table} WHERE session_url = ?1
                 ORDER BY start_ordinal ASC, timestamp ASC, id ASC",
                table = self.table
            ))?;
            let rows = stmt.query_map(params![session_url], row_parts)?;
            let mut records = Vec::new();
            for row in rows {
                let (id, session_url, embedding, payload) = row?;
                records.push(record_from_parts(id, session_url, embedding, &payload));
            }
            Ok(records)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            Self::in_transaction(conn, |tx| {
                let removed = tx.execute(
                    &format!("DELETE FROM {table} WHERE id = ?1", table = self.table),
                    params![id],
                )?;
                Ok(removed > 0)
            })
        })
        .await
    }

    async fn clear(&self, session_url: Option<&str>) -> Result<usize, StoreError> {
        let session_url = session_url.map(str::to_string);
        self.with_conn(move |conn| {
            Self::in_transaction(conn, |tx| match &session_url {
                Some(session_url) => {
                    let mut stmt = tx.prepare(&format!(
                        "SELECT id FROM {table} WHERE session_url = ?1",
                        table = self.table
                    ))?;
                    let ids = stmt
                        .query_map(params![session_url], |row| row.get::<_, String>(0))?
                        .collect::<rusqlite::Result<Vec<String>>>()?;
                    drop(stmt);
                    let mut removed = 0;
                    for id in &ids {
                        removed += tx.execute(
                            &format!(
                                "DELETE FROM {table} WHERE id = ?1",
                                table = self.table
                            ),
                            params![id],
                        )?;
                    }
                    info!(
                        "cleared session blocks (session_url={session_url}, removed={removed})"
                    );
                    Ok(removed)
                }
                None => {
                    let total: i64 = tx.query_row(
                        &format!("SELECT COUNT(*) FROM {table}", table = self.table),
                        [],
                        |row| row.get(0),
                    )?;
                    tx.execute(&format!("DELETE FROM {table}", table = self.table), [])?;
                    info!("cleared all blocks (removed={total})");
                    Ok(total as usize)
                }
            })
        })
        .await
    }

    async fn get_all(&self) -> Result<Vec<BlockRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, session_url, embedding, payload FROM {table}",
                table = self.table
            ))?;
            let rows = stmt.query_map([], row_parts)?;
            let mut records = Vec::new();
            for row in rows {
                let (id, session_url, embedding, payload) = row?;
                records.push(record_from_parts(id, session_url, embedding, &payload));
            }
            Ok(records)
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {table}", table = self.table),
                [],
                |row| row.get(0),
            )?;
            Ok(total as usize)
        })
        .await
    }

    async fn close(&self) {
        let Some(handle) = self.conn.get() else {
            // Never opened; nothing to release.
            return;
        };
        let conn = handle.lock().take();
        if let Some(conn) = conn {
            if let Err((_conn, err)) = conn.close() {
                warn!("failed to close durable block store ({err})");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteBlockEngine;
    use crate::engine::BlockEngine;
    use crate::error::StoreError;
    use crate::options::StoreOptions;
    use memvault_test_utils::record;
    use pretty_assertions::assert_eq;
    use rusqlite::{Connection, params};
    use tempfile::tempdir;

    #[tokio::test]
    async fn rejects_a_newer_stored_schema_version() {
        let temp = tempdir().expect("tempdir");
        let newer = SqliteBlockEngine::new(
            &StoreOptions::new(temp.path()).with_schema_version(3),
        )
        .expect("engine");
        newer.init().await.expect("init");
        newer.close().await;

        let older =
            SqliteBlockEngine::new(&StoreOptions::new(temp.path())).expect("engine");
        let err = older.init().await.expect_err("newer schema");
        match err {
            StoreError::UnsupportedSchema(version) => assert_eq!(version, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn raises_an_older_stored_schema_version() {
        let temp = tempdir().expect("tempdir");
        let original =
            SqliteBlockEngine::new(&StoreOptions::new(temp.path())).expect("engine");
        original.init().await.expect("init");
        original.put(record("b1", "s1")).await.expect("put");
        original.close().await;

        let upgraded = SqliteBlockEngine::new(
            &StoreOptions::new(temp.path()).with_schema_version(2),
        )
        .expect("engine");
        let loaded = upgraded.get("b1").await.expect("get").expect("record");
        assert_eq!(loaded.id, "b1");
    }

    #[tokio::test]
    async fn repairs_a_legacy_payload_on_read() {
        let temp = tempdir().expect("tempdir");
        let options = StoreOptions::new(temp.path());
        let engine = SqliteBlockEngine::new(&options).expect("engine");
        engine.init().await.expect("init");

        // A row written by an earlier version: no ordinal mirrors, no
        // message count, no timestamp in the payload.
        let conn = Connection::open(options.db_path()).expect("open");
        conn.execute(
            "INSERT INTO blocks (id, session_url, start_ordinal, timestamp, payload)
             VALUES (?1, ?2, 0, 0, ?3)",
            params![
                "legacy",
                "s1",
                r#"{"raw":"old","messages":[{"text":"a"},{"text":"b"}],"ordinal_range":[4,6]}"#
            ],
        )
        .expect("insert");

        let loaded = engine.get("legacy").await.expect("get").expect("record");
        assert_eq!(loaded.start_ordinal, 4);
        assert_eq!(loaded.end_ordinal, 6);
        assert_eq!(loaded.message_count, 2);
        assert!(loaded.timestamp > 0);
        assert_eq!(loaded.session_url, "s1");
    }

    #[tokio::test]
    async fn operations_after_close_report_closed() {
        let temp = tempdir().expect("tempdir");
        let engine =
            SqliteBlockEngine::new(&StoreOptions::new(temp.path())).expect("engine");
        engine.init().await.expect("init");
        engine.close().await;
        assert!(matches!(
            engine.count().await,
            Err(StoreError::Closed)
        ));
    }

    #[tokio::test]
    async fn rejects_an_invalid_table_name() {
        let options = StoreOptions::new("/tmp").with_table("blocks; drop");
        assert!(matches!(
            SqliteBlockEngine::new(&options),
            Err(StoreError::InvalidTable(_))
        ));
    }
}
