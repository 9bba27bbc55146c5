//! [`GraphStore`] over a SQLite connection.
//!
//! Inserted edges are buffered and written on [`GraphStore::flush`] through
//! a cached prepared statement; `find_edge` consults the buffer first, so a
//! phase never inserts a key twice between flushes. `update_edge` rewrites a
//! pending edge in the buffer and a flushed one in place. Transactions are plain
//! `BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK` on the connection.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};

use super::{configure_connection, migrations, validate_schema};
use crate::error::{GraphError, Result};
use crate::model::{DepthFilter, Edge, EdgeKey, GraphStatus, ImportJob, NewImportJob, Node};
use crate::store::GraphStore;

const EDGE_COLUMNS: &str = "source_id, target_id, rel_name, depth, provenance";

pub struct SqliteStore {
    conn: Connection,
    pending: Vec<Edge>,
    pending_keys: HashMap<EdgeKey, usize>,
    in_transaction: bool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("pending", &self.pending.len())
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Wrap an already-migrated connection.
    ///
    /// # Errors
    ///
    /// `SchemaInvalid` if the connection lacks the graph schema.
    pub fn new(conn: Connection) -> Result<Self> {
        validate_schema(&conn)?;
        Ok(Self {
            conn,
            pending: Vec::new(),
            pending_keys: HashMap::new(),
            in_transaction: false,
        })
    }

    /// A private, migrated in-memory database.
    ///
    /// # Errors
    ///
    /// Propagates SQLite failures.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        configure_connection(&conn)?;
        migrations::migrate(&mut conn)?;
        Self::new(conn)
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of edges waiting for the next flush.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total number of stored edges (flushed only).
    ///
    /// # Errors
    ///
    /// Propagates SQLite failures.
    pub fn edge_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM synset_relations", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Every stored edge ordered by `(source, target, relation)`.
    ///
    /// # Errors
    ///
    /// Propagates SQLite failures.
    pub fn all_edges(&self) -> Result<Vec<Edge>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM synset_relations ORDER BY source_id, target_id, rel_name"
        ))?;
        let rows = stmt.query_map([], edge_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn query_edges(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Edge>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, edge_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_status(&self, column: &str, value: bool) -> Result<()> {
        let updated = self.conn.execute(
            &format!("UPDATE graph_status SET {column} = ?1 WHERE id = 1"),
            params![value],
        )?;
        if updated == 0 {
            return Err(GraphError::NotFound("graph_status row is missing".to_string()));
        }
        Ok(())
    }
}

impl GraphStore for SqliteStore {
    fn begin(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(GraphError::InvalidArgument(
                "a transaction is already open".to_string(),
            ));
        }
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(GraphError::InvalidArgument(
                "commit without an open transaction".to_string(),
            ));
        }
        self.flush()?;
        self.conn.execute_batch("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        self.pending_keys.clear();
        if self.in_transaction {
            self.in_transaction = false;
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn node_page(&self, after: Option<&str>, limit: usize) -> Result<Vec<Node>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM synsets WHERE id > ?1 ORDER BY id LIMIT ?2")?;
        let rows = stmt.query_map(params![after.unwrap_or(""), sql_limit(limit)], |row| {
            Ok(Node::new(row.get::<_, String>(0)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_node(&mut self, node: &Node) -> Result<bool> {
        if node.id.trim().is_empty() {
            return Err(GraphError::InvalidArgument(
                "node id must not be empty".to_string(),
            ));
        }
        let inserted = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO synsets (id) VALUES (?1)")?
            .execute(params![node.id])?;
        Ok(inserted > 0)
    }

    fn edges_from(&self, source: &str, depth: DepthFilter) -> Result<Vec<Edge>> {
        let (lo, hi) = depth_bounds(depth);
        self.query_edges(
            &format!(
                "SELECT {EDGE_COLUMNS} FROM synset_relations \
                 WHERE source_id = ?1 AND depth BETWEEN ?2 AND ?3 \
                 ORDER BY rel_name, target_id"
            ),
            params![source, lo, hi],
        )
    }

    fn find_edge(&self, source: &str, target: &str, relation: &str) -> Result<Option<Edge>> {
        let key = EdgeKey::new(source, target, relation);
        if let Some(&idx) = self.pending_keys.get(&key) {
            return Ok(Some(self.pending[idx].clone()));
        }
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {EDGE_COLUMNS} FROM synset_relations \
             WHERE source_id = ?1 AND target_id = ?2 AND rel_name = ?3"
        ))?;
        Ok(stmt
            .query_row(params![source, target, relation], edge_from_row)
            .optional()?)
    }

    fn outgoing(&self, source: &str, relation: &str, depth: DepthFilter) -> Result<Vec<Edge>> {
        let (lo, hi) = depth_bounds(depth);
        self.query_edges(
            &format!(
                "SELECT {EDGE_COLUMNS} FROM synset_relations \
                 WHERE source_id = ?1 AND rel_name = ?2 AND depth BETWEEN ?3 AND ?4 \
                 ORDER BY target_id"
            ),
            params![source, relation, lo, hi],
        )
    }

    fn incoming(&self, target: &str, relation: &str, depth: DepthFilter) -> Result<Vec<Edge>> {
        let (lo, hi) = depth_bounds(depth);
        self.query_edges(
            &format!(
                "SELECT {EDGE_COLUMNS} FROM synset_relations \
                 WHERE target_id = ?1 AND rel_name = ?2 AND depth BETWEEN ?3 AND ?4 \
                 ORDER BY source_id"
            ),
            params![target, relation, lo, hi],
        )
    }

    fn edges_at_depth(
        &self,
        relation: &str,
        depth: u32,
        after: Option<&EdgeKey>,
        limit: usize,
    ) -> Result<Vec<Edge>> {
        // Ids are never empty, so ('', '') sorts before every stored pair.
        let (after_source, after_target) = after
            .map_or(("", ""), |key| (key.source.as_str(), key.target.as_str()));
        self.query_edges(
            &format!(
                "SELECT {EDGE_COLUMNS} FROM synset_relations \
                 WHERE rel_name = ?1 AND depth = ?2 AND (source_id, target_id) > (?3, ?4) \
                 ORDER BY source_id, target_id \
                 LIMIT ?5"
            ),
            params![
                relation,
                i64::from(depth),
                after_source,
                after_target,
                sql_limit(limit)
            ],
        )
    }

    fn insert_edge(&mut self, edge: Edge) -> Result<()> {
        let key = edge.key();
        if self.pending_keys.contains_key(&key) {
            return Err(GraphError::InvalidArgument(format!(
                "duplicate edge {} -[{}]-> {}",
                key.source, key.relation, key.target
            )));
        }
        self.pending_keys.insert(key, self.pending.len());
        self.pending.push(edge);
        Ok(())
    }

    fn update_edge(&mut self, edge: Edge) -> Result<()> {
        if let Some(&idx) = self.pending_keys.get(&edge.key()) {
            self.pending[idx] = edge;
            return Ok(());
        }
        let updated = self
            .conn
            .prepare_cached(
                "UPDATE synset_relations SET depth = ?4, provenance = ?5 \
                 WHERE source_id = ?1 AND target_id = ?2 AND rel_name = ?3",
            )?
            .execute(params![
                edge.source,
                edge.target,
                edge.relation,
                i64::from(edge.depth),
                edge.provenance
            ])?;
        if updated == 0 {
            return Err(GraphError::NotFound(format!(
                "edge {} -[{}]-> {} does not exist",
                edge.source, edge.relation, edge.target
            )));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        {
            let mut stmt = self.conn.prepare_cached(&format!(
                "INSERT INTO synset_relations ({EDGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"
            ))?;
            for edge in &self.pending {
                stmt.execute(params![
                    edge.source,
                    edge.target,
                    edge.relation,
                    i64::from(edge.depth),
                    edge.provenance
                ])?;
            }
        }
        tracing::trace!(written = self.pending.len(), "flushed pending edges");
        self.pending.clear();
        self.pending_keys.clear();
        Ok(())
    }

    fn status(&self) -> Result<GraphStatus> {
        self.conn
            .query_row(
                "SELECT needs_normalize, needs_augment, schema_version, current_import_job \
                 FROM graph_status WHERE id = 1",
                [],
                |row| {
                    let version: i64 = row.get(2)?;
                    Ok(GraphStatus {
                        needs_normalize: row.get(0)?,
                        needs_augment: row.get(1)?,
                        schema_version: u32::try_from(version).map_err(|error| {
                            rusqlite::Error::FromSqlConversionFailure(
                                2,
                                Type::Integer,
                                Box::new(error),
                            )
                        })?,
                        current_import_job: row.get(3)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| GraphError::NotFound("graph_status row is missing".to_string()))
    }

    fn set_needs_normalize(&mut self, value: bool) -> Result<()> {
        self.update_status("needs_normalize", value)
    }

    fn set_needs_augment(&mut self, value: bool) -> Result<()> {
        self.update_status("needs_augment", value)
    }

    fn set_current_import_job(&mut self, job: Option<i64>) -> Result<()> {
        if let Some(id) = job {
            // Fail with NotFound rather than a foreign key violation.
            self.import_job(id)?;
        }
        let updated = self.conn.execute(
            "UPDATE graph_status SET current_import_job = ?1 WHERE id = 1",
            params![job],
        )?;
        if updated == 0 {
            return Err(GraphError::NotFound("graph_status row is missing".to_string()));
        }
        Ok(())
    }

    fn create_import_job(&mut self, job: &NewImportJob) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO import_jobs (author, description, source_url, resource_name, started_at_us) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                job.author,
                job.description,
                job.source_url,
                job.resource_name,
                job.started_at.timestamp_micros()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_import_job(&mut self, id: i64, ended_at: DateTime<Utc>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE import_jobs SET ended_at_us = ?1 WHERE id = ?2",
            params![ended_at.timestamp_micros(), id],
        )?;
        if updated == 0 {
            return Err(GraphError::NotFound(format!("import job {id} does not exist")));
        }
        Ok(())
    }

    fn import_job(&self, id: i64) -> Result<ImportJob> {
        self.conn
            .query_row(
                "SELECT id, author, description, source_url, resource_name, started_at_us, ended_at_us \
                 FROM import_jobs WHERE id = ?1",
                params![id],
                job_from_row,
            )
            .optional()?
            .ok_or_else(|| GraphError::NotFound(format!("import job {id} does not exist")))
    }

    fn import_jobs(&self) -> Result<Vec<ImportJob>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, author, description, source_url, resource_name, started_at_us, ended_at_us \
             FROM import_jobs ORDER BY started_at_us DESC, id DESC",
        )?;
        let rows = stmt.query_map([], job_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    let depth: i64 = row.get(3)?;
    Ok(Edge {
        source: row.get(0)?,
        target: row.get(1)?,
        relation: row.get(2)?,
        depth: u32::try_from(depth).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Integer, Box::new(error))
        })?,
        provenance: row.get(4)?,
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<ImportJob> {
    let ended_at: Option<i64> = row.get(6)?;
    Ok(ImportJob {
        id: row.get(0)?,
        author: row.get(1)?,
        description: row.get(2)?,
        source_url: row.get(3)?,
        resource_name: row.get(4)?,
        started_at: timestamp(5, row.get(5)?)?,
        ended_at: ended_at.map(|us| timestamp(6, us)).transpose()?,
    })
}

fn timestamp(column: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            format!("timestamp {micros}us out of range").into(),
        )
    })
}

fn depth_bounds(filter: DepthFilter) -> (i64, i64) {
    match filter {
        DepthFilter::Exactly(d) => (i64::from(d), i64::from(d)),
        DepthFilter::AtMost(d) => (0, i64::from(d)),
        DepthFilter::Any => (0, i64::MAX),
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
