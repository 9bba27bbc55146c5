//! In-memory [`GraphStore`] backed by ordered maps.
//!
//! Transactions snapshot the whole state on `begin` and restore it on
//! `rollback`, which is fine for the graph sizes tests use. Inserts are
//! applied immediately; `flush` only counts how often it was asked to.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::GraphStore;
use crate::db::migrations::LATEST_SCHEMA_VERSION;
use crate::error::{GraphError, Result};
use crate::model::{DepthFilter, Edge, EdgeKey, GraphStatus, ImportJob, NewImportJob, Node};

#[derive(Debug, Clone)]
struct State {
    nodes: BTreeSet<String>,
    edges: BTreeMap<EdgeKey, Edge>,
    status: GraphStatus,
    jobs: BTreeMap<i64, ImportJob>,
    next_job_id: i64,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: State,
    snapshot: Option<State>,
    flushes: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: State {
                nodes: BTreeSet::new(),
                edges: BTreeMap::new(),
                status: GraphStatus {
                    needs_normalize: false,
                    needs_augment: false,
                    schema_version: LATEST_SCHEMA_VERSION,
                    current_import_job: None,
                },
                jobs: BTreeMap::new(),
                next_job_id: 1,
            },
            snapshot: None,
            flushes: 0,
        }
    }

    /// Every stored edge, ordered by `(source, target, relation)`.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.state.edges.values()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.state.edges.len()
    }

    /// How many times `flush` has been called.
    #[must_use]
    pub const fn flush_count(&self) -> usize {
        self.flushes
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn outgoing_range<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        let start = EdgeKey::new(source, "", "");
        self.state
            .edges
            .range(start..)
            .take_while(move |(key, _)| key.source == source)
            .map(|(_, edge)| edge)
    }
}

impl GraphStore for MemoryStore {
    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(GraphError::InvalidArgument(
                "a transaction is already open".to_string(),
            ));
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.flush()?;
        if self.snapshot.take().is_none() {
            return Err(GraphError::InvalidArgument(
                "commit without an open transaction".to_string(),
            ));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.state = snapshot;
        }
        Ok(())
    }

    fn node_page(&self, after: Option<&str>, limit: usize) -> Result<Vec<Node>> {
        let nodes = self.state.nodes.iter();
        let page = match after {
            Some(after) => nodes
                .filter(|id| id.as_str() > after)
                .take(limit)
                .map(Node::new)
                .collect(),
            None => nodes.take(limit).map(Node::new).collect(),
        };
        Ok(page)
    }

    fn insert_node(&mut self, node: &Node) -> Result<bool> {
        if node.id.trim().is_empty() {
            return Err(GraphError::InvalidArgument(
                "node id must not be empty".to_string(),
            ));
        }
        Ok(self.state.nodes.insert(node.id.clone()))
    }

    fn edges_from(&self, source: &str, depth: DepthFilter) -> Result<Vec<Edge>> {
        Ok(self
            .outgoing_range(source)
            .filter(|edge| depth.matches(edge.depth))
            .cloned()
            .collect())
    }

    fn find_edge(&self, source: &str, target: &str, relation: &str) -> Result<Option<Edge>> {
        Ok(self
            .state
            .edges
            .get(&EdgeKey::new(source, target, relation))
            .cloned())
    }

    fn outgoing(&self, source: &str, relation: &str, depth: DepthFilter) -> Result<Vec<Edge>> {
        Ok(self
            .outgoing_range(source)
            .filter(|edge| edge.relation == relation && depth.matches(edge.depth))
            .cloned()
            .collect())
    }

    fn incoming(&self, target: &str, relation: &str, depth: DepthFilter) -> Result<Vec<Edge>> {
        Ok(self
            .state
            .edges
            .values()
            .filter(|edge| {
                edge.target == target && edge.relation == relation && depth.matches(edge.depth)
            })
            .cloned()
            .collect())
    }

    fn edges_at_depth(
        &self,
        relation: &str,
        depth: u32,
        after: Option<&EdgeKey>,
        limit: usize,
    ) -> Result<Vec<Edge>> {
        Ok(self
            .state
            .edges
            .values()
            .filter(|edge| edge.relation == relation && edge.depth == depth)
            .filter(|edge| {
                after.is_none_or(|after| {
                    (edge.source.as_str(), edge.target.as_str())
                        > (after.source.as_str(), after.target.as_str())
                })
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn insert_edge(&mut self, edge: Edge) -> Result<()> {
        for id in [&edge.source, &edge.target] {
            if !self.state.nodes.contains(id.as_str()) {
                return Err(GraphError::NotFound(format!("synset '{id}' does not exist")));
            }
        }
        let key = edge.key();
        if self.state.edges.contains_key(&key) {
            return Err(GraphError::InvalidArgument(format!(
                "duplicate edge {} -[{}]-> {}",
                key.source, key.relation, key.target
            )));
        }
        self.state.edges.insert(key, edge);
        Ok(())
    }

    fn update_edge(&mut self, edge: Edge) -> Result<()> {
        let stored = self.state.edges.get_mut(&edge.key()).ok_or_else(|| {
            GraphError::NotFound(format!(
                "edge {} -[{}]-> {} does not exist",
                edge.source, edge.relation, edge.target
            ))
        })?;
        stored.depth = edge.depth;
        stored.provenance = edge.provenance;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn status(&self) -> Result<GraphStatus> {
        Ok(self.state.status.clone())
    }

    fn set_needs_normalize(&mut self, value: bool) -> Result<()> {
        self.state.status.needs_normalize = value;
        Ok(())
    }

    fn set_needs_augment(&mut self, value: bool) -> Result<()> {
        self.state.status.needs_augment = value;
        Ok(())
    }

    fn set_current_import_job(&mut self, job: Option<i64>) -> Result<()> {
        if let Some(id) = job {
            if !self.state.jobs.contains_key(&id) {
                return Err(GraphError::NotFound(format!("import job {id} does not exist")));
            }
        }
        self.state.status.current_import_job = job;
        Ok(())
    }

    fn create_import_job(&mut self, job: &NewImportJob) -> Result<i64> {
        let id = self.state.next_job_id;
        self.state.next_job_id += 1;
        self.state.jobs.insert(
            id,
            ImportJob {
                id,
                author: job.author.clone(),
                description: job.description.clone(),
                source_url: job.source_url.clone(),
                resource_name: job.resource_name.clone(),
                started_at: job.started_at,
                ended_at: None,
            },
        );
        Ok(id)
    }

    fn finish_import_job(&mut self, id: i64, ended_at: DateTime<Utc>) -> Result<()> {
        let job = self
            .state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| GraphError::NotFound(format!("import job {id} does not exist")))?;
        job.ended_at = Some(ended_at);
        Ok(())
    }

    fn import_job(&self, id: i64) -> Result<ImportJob> {
        self.state
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(format!("import job {id} does not exist")))
    }

    fn import_jobs(&self) -> Result<Vec<ImportJob>> {
        let mut jobs: Vec<ImportJob> = self.state.jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::error::GraphError;
    use crate::model::{DepthFilter, Edge, Node};
    use crate::store::GraphStore;

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.insert_node(&Node::new(id)).expect("insert node");
        }
        store
    }

    #[test]
    fn rollback_restores_state_from_begin() {
        let mut store = seeded();
        store
            .insert_edge(Edge::direct("a", "b", "hypernym", "test"))
            .expect("insert");

        store.begin().expect("begin");
        store
            .insert_edge(Edge::direct("b", "c", "hypernym", "test"))
            .expect("insert");
        store.set_needs_augment(true).expect("flag");
        store.rollback().expect("rollback");

        assert_eq!(store.edge_count(), 1);
        assert!(!store.status().expect("status").needs_augment);
        assert!(!store.in_transaction());
    }

    #[test]
    fn duplicate_edges_are_rejected() {
        let mut store = seeded();
        store
            .insert_edge(Edge::direct("a", "b", "hypernym", "test"))
            .expect("insert");
        let err = store
            .insert_edge(Edge::direct("a", "b", "hypernym", "other"))
            .expect_err("duplicate");
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }

    #[test]
    fn edges_need_existing_nodes() {
        let mut store = seeded();
        let err = store
            .insert_edge(Edge::direct("a", "zz", "hypernym", "test"))
            .expect_err("unknown target");
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[test]
    fn update_edge_replaces_depth_and_provenance() {
        let mut store = seeded();
        let mut derived = Edge::direct("a", "c", "hypernym", "engine");
        derived.depth = 3;
        store.insert_edge(derived).expect("insert");

        store
            .update_edge(Edge::direct("a", "c", "hypernym", "wn31"))
            .expect("update");

        let stored = store.find_edge("a", "c", "hypernym").expect("lookup");
        assert_eq!(stored, Some(Edge::direct("a", "c", "hypernym", "wn31")));
        assert_eq!(store.edge_count(), 1);
    }

    #[test]
    fn update_of_a_missing_edge_is_not_found() {
        let mut store = seeded();
        let err = store
            .update_edge(Edge::direct("a", "b", "hypernym", "test"))
            .expect_err("missing edge");
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[test]
    fn incoming_and_outgoing_respect_depth_filters() {
        let mut store = seeded();
        store
            .insert_edge(Edge::direct("a", "b", "hypernym", "test"))
            .expect("insert");
        let mut derived = Edge::direct("a", "c", "hypernym", "test");
        derived.depth = 2;
        store.insert_edge(derived).expect("insert");

        assert_eq!(
            store
                .outgoing("a", "hypernym", DepthFilter::Any)
                .expect("outgoing")
                .len(),
            2
        );
        assert_eq!(
            store
                .outgoing("a", "hypernym", DepthFilter::AtMost(1))
                .expect("outgoing")
                .len(),
            1
        );
        assert_eq!(
            store
                .incoming("c", "hypernym", DepthFilter::Exactly(2))
                .expect("incoming")
                .len(),
            1
        );
        assert!(store
            .incoming("c", "hypernym", DepthFilter::Exactly(1))
            .expect("incoming")
            .is_empty());
    }
}
