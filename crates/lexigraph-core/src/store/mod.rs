//! Persistence seam between the graph phases and a concrete store.
//!
//! Normalization and closure only talk to a [`GraphStore`]: a paged node
//! cursor, indexed edge lookups, buffered inserts with an explicit
//! [`GraphStore::flush`], in-place depth updates, and transaction boundaries. The SQLite
//! implementation lives in [`crate::db`]; [`MemoryStore`] keeps everything in
//! ordered maps and is what the algorithm tests run against.
//!
//! ## Buffering contract
//!
//! [`GraphStore::insert_edge`] may hold the edge in a pending buffer until the
//! next flush. Point lookups ([`GraphStore::find_edge`]) must see pending
//! edges; range lookups only need to see flushed ones. A flush never commits:
//! only [`GraphStore::commit`] does, and [`GraphStore::rollback`] discards
//! both flushed and pending writes made since [`GraphStore::begin`].

pub mod cursor;
pub mod memory;

pub use cursor::{EdgeCursor, NodeCursor};
pub use memory::MemoryStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{DepthFilter, Edge, EdgeKey, GraphStatus, ImportJob, NewImportJob, Node};

pub trait GraphStore {
    // -- transactions --------------------------------------------------------

    /// Open the unit of work a phase runs in.
    ///
    /// # Errors
    ///
    /// Fails if a transaction is already open or the store refuses it.
    fn begin(&mut self) -> Result<()>;

    /// Flush pending writes and make the unit of work durable.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is open or the commit is rejected.
    fn commit(&mut self) -> Result<()>;

    /// Discard every write since [`GraphStore::begin`].
    ///
    /// # Errors
    ///
    /// Fails if the store cannot roll back.
    fn rollback(&mut self) -> Result<()>;

    // -- nodes ---------------------------------------------------------------

    /// Up to `limit` nodes with ids strictly greater than `after`, ascending.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn node_page(&self, after: Option<&str>, limit: usize) -> Result<Vec<Node>>;

    /// Insert a node; returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn insert_node(&mut self, node: &Node) -> Result<bool>;

    // -- edges ---------------------------------------------------------------

    /// Every outgoing edge of `source` whose depth passes `depth`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn edges_from(&self, source: &str, depth: DepthFilter) -> Result<Vec<Edge>>;

    /// The edge for `(source, target, relation)`, pending or flushed.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn find_edge(&self, source: &str, target: &str, relation: &str) -> Result<Option<Edge>>;

    /// Indexed lookup by `(source, relation, depth)`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn outgoing(&self, source: &str, relation: &str, depth: DepthFilter) -> Result<Vec<Edge>>;

    /// Indexed lookup by `(target, relation, depth)`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn incoming(&self, target: &str, relation: &str, depth: DepthFilter) -> Result<Vec<Edge>>;

    /// Up to `limit` edges with exactly `relation` and `depth`, ordered by
    /// `(source, target)` and starting strictly after `after`.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn edges_at_depth(
        &self,
        relation: &str,
        depth: u32,
        after: Option<&EdgeKey>,
        limit: usize,
    ) -> Result<Vec<Edge>>;

    /// Buffer `edge` for insertion.
    ///
    /// # Errors
    ///
    /// Fails if an edge with the same key is already pending or stored.
    fn insert_edge(&mut self, edge: Edge) -> Result<()>;

    /// Replace the depth and provenance of the stored edge with `edge`'s key.
    ///
    /// # Errors
    ///
    /// `NotFound` if no edge with that key is pending or stored.
    fn update_edge(&mut self, edge: Edge) -> Result<()>;

    /// Write pending edges and release the working set.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn flush(&mut self) -> Result<()>;

    // -- status --------------------------------------------------------------

    /// # Errors
    ///
    /// `NotFound` if the status row is missing.
    fn status(&self) -> Result<GraphStatus>;

    /// # Errors
    ///
    /// Propagates store failures.
    fn set_needs_normalize(&mut self, value: bool) -> Result<()>;

    /// # Errors
    ///
    /// Propagates store failures.
    fn set_needs_augment(&mut self, value: bool) -> Result<()>;

    /// # Errors
    ///
    /// Propagates store failures.
    fn set_current_import_job(&mut self, job: Option<i64>) -> Result<()>;

    // -- import jobs ---------------------------------------------------------

    /// Persist a new job and return its id.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn create_import_job(&mut self, job: &NewImportJob) -> Result<i64>;

    /// # Errors
    ///
    /// `NotFound` for an unknown job id.
    fn finish_import_job(&mut self, id: i64, ended_at: DateTime<Utc>) -> Result<()>;

    /// # Errors
    ///
    /// `NotFound` for an unknown job id.
    fn import_job(&self, id: i64) -> Result<ImportJob>;

    /// All jobs, most recently started first.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    fn import_jobs(&self) -> Result<Vec<ImportJob>>;
}
