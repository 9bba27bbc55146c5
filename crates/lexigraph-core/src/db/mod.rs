//! SQLite persistence for the relation graph.
//!
//! Runtime defaults mirror what a single-writer, many-reader workload needs:
//! - `journal_mode = WAL` so connectivity readers are not blocked by a phase
//! - `busy_timeout = 5s` to ride out short lock contention
//! - `foreign_keys = ON` so edges can only reference existing synsets

pub mod migrations;
pub mod schema;
pub mod store;

pub use store::SqliteStore;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use std::{path::Path, time::Duration};

use crate::error::GraphError;

/// Busy timeout used for graph DB connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the graph database, apply runtime pragmas, migrate the
/// schema to the latest version and validate it.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails or
/// the resulting schema is not the expected one.
pub fn open_store(path: &Path) -> Result<SqliteStore> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create graph db directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open graph database {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply graph migrations")?;

    SqliteStore::new(conn).with_context(|| format!("validate graph database {}", path.display()))
}

pub(crate) fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Check that `conn` has every table, index and the status row the engine
/// relies on, at the schema version this binary understands.
///
/// # Errors
///
/// `SchemaInvalid` naming the first missing piece.
pub fn validate_schema(conn: &Connection) -> crate::error::Result<()> {
    let version = migrations::current_schema_version(conn)?;
    if version != migrations::LATEST_SCHEMA_VERSION {
        return Err(GraphError::SchemaInvalid(format!(
            "schema version {version} does not match expected {}",
            migrations::LATEST_SCHEMA_VERSION
        )));
    }

    for (kind, names) in [("table", schema::REQUIRED_TABLES), ("index", schema::REQUIRED_INDEXES)] {
        for name in names {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2)",
                params![kind, name],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(GraphError::SchemaInvalid(format!("missing {kind} '{name}'")));
            }
        }
    }

    let status_rows: i64 =
        conn.query_row("SELECT COUNT(*) FROM graph_status WHERE id = 1", [], |row| {
            row.get(0)
        })?;
    if status_rows != 1 {
        return Err(GraphError::SchemaInvalid(
            "graph_status row is missing".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, open_store, validate_schema};
    use crate::error::GraphError;
    use rusqlite::Connection;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested/lexigraph.sqlite3");
        (dir, path)
    }

    #[test]
    fn open_store_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let store = open_store(&path).expect("open graph db");
        let conn = store.connection();

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn reopening_keeps_data() {
        let (_dir, path) = temp_db_path();
        {
            let store = open_store(&path).expect("open graph db");
            store
                .connection()
                .execute("INSERT INTO synsets (id) VALUES ('s1')", [])
                .expect("insert synset");
        }

        let store = open_store(&path).expect("reopen graph db");
        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM synsets", [], |row| row.get(0))
            .expect("count synsets");
        assert_eq!(count, 1);
    }

    #[test]
    fn unmigrated_database_is_schema_invalid() {
        let conn = Connection::open_in_memory().expect("open");
        let err = validate_schema(&conn).expect_err("empty db");
        assert!(matches!(err, GraphError::SchemaInvalid(_)), "{err}");
    }

    #[test]
    fn missing_index_is_schema_invalid() {
        let mut conn = Connection::open_in_memory().expect("open");
        super::migrations::migrate(&mut conn).expect("migrate");
        conn.execute_batch("DROP INDEX idx_synset_relations_level")
            .expect("drop index");

        let err = validate_schema(&conn).expect_err("missing index");
        assert!(err.to_string().contains("idx_synset_relations_level"), "{err}");
    }
}
