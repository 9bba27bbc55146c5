//! Read-only connectivity over stored edges.
//!
//! A relation is looked up directly when it is canonical or has no inverse.
//! Otherwise the query runs against its canonical inverse with source and
//! target swapped, which is where closure put the derived edges. Relation
//! names the catalog does not know are looked up directly.
//!
//! Results are only complete once both phases have run; check
//! [`GraphStatus::needs_processing`](crate::model::GraphStatus::needs_processing).

use std::collections::HashSet;

use crate::catalog::RelationCatalog;
use crate::error::{GraphError, Result};
use crate::model::{DepthFilter, MaxDepth, Node};
use crate::store::GraphStore;

/// How one requested relation maps onto stored edges.
enum Lookup<'a> {
    Outgoing(&'a str),
    Incoming(&'a str),
}

fn lookup_for<'a>(catalog: &'a RelationCatalog, relation: &'a str) -> Lookup<'a> {
    if catalog.is_canonical(relation) {
        return Lookup::Outgoing(relation);
    }
    catalog
        .inverse(relation)
        .map_or(Lookup::Outgoing(relation), Lookup::Incoming)
}

fn check_id(what: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(GraphError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(())
}

fn check_relations<R: AsRef<str>>(relations: &[R]) -> Result<()> {
    if relations.iter().any(|r| r.as_ref().trim().is_empty()) {
        return Err(GraphError::InvalidArgument(
            "relation names must not be empty".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Connectivity
// ---------------------------------------------------------------------------

/// Connectivity queries bound to a catalog and a store.
#[derive(Debug)]
pub struct Connectivity<'a, S: GraphStore + ?Sized> {
    catalog: &'a RelationCatalog,
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> Connectivity<'a, S> {
    #[must_use]
    pub const fn new(catalog: &'a RelationCatalog, store: &'a S) -> Self {
        Self { catalog, store }
    }

    /// Nodes reachable from `node_id` in one stored edge of any of
    /// `relations`, with depth at most `max_depth` (`-1` for no bound).
    ///
    /// Arguments are validated here; the store is not touched until the
    /// result is iterated.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or relation name, or `max_depth < -1`.
    pub fn connected_nodes<R: AsRef<str>>(
        &self,
        node_id: &str,
        max_depth: i64,
        relations: &[R],
    ) -> Result<ConnectedNodes<'a, S>> {
        check_id("node id", node_id)?;
        check_relations(relations)?;
        let max_depth = MaxDepth::from_signed(max_depth)?;

        Ok(ConnectedNodes {
            catalog: self.catalog,
            store: self.store,
            node_id: node_id.to_string(),
            filter: max_depth.filter(),
            relations: if max_depth.is_zero() {
                Vec::new()
            } else {
                relations.iter().map(|r| r.as_ref().to_string()).collect()
            },
        })
    }

    /// Whether one stored edge of any of `relations` links `source_id` to
    /// `target_id` within `max_depth`. A node is always connected to itself.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty id or relation name, or `max_depth < -1`.
    pub fn are_connected<R: AsRef<str>>(
        &self,
        source_id: &str,
        target_id: &str,
        max_depth: i64,
        relations: &[R],
    ) -> Result<bool> {
        check_id("source id", source_id)?;
        check_id("target id", target_id)?;
        check_relations(relations)?;
        let max_depth = MaxDepth::from_signed(max_depth)?;

        if source_id == target_id {
            return Ok(true);
        }
        if relations.is_empty() || max_depth.is_zero() {
            return Ok(false);
        }

        let filter = max_depth.filter();
        for relation in relations {
            let found = match lookup_for(self.catalog, relation.as_ref()) {
                Lookup::Outgoing(name) => self.store.find_edge(source_id, target_id, name)?,
                Lookup::Incoming(name) => self.store.find_edge(target_id, source_id, name)?,
            };
            if found.is_some_and(|edge| filter.matches(edge.depth)) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// ConnectedNodes
// ---------------------------------------------------------------------------

/// Lazy, restartable result of [`Connectivity::connected_nodes`].
///
/// Every call to [`ConnectedNodes::iter`] re-runs the lookups, so the
/// sequence can be consumed more than once. Each node is yielded once.
#[derive(Debug)]
pub struct ConnectedNodes<'a, S: GraphStore + ?Sized> {
    catalog: &'a RelationCatalog,
    store: &'a S,
    node_id: String,
    filter: DepthFilter,
    relations: Vec<String>,
}

impl<'a, S: GraphStore + ?Sized> ConnectedNodes<'a, S> {
    #[must_use]
    pub fn iter(&self) -> ConnectedIter<'_, S> {
        ConnectedIter {
            nodes: self,
            next_relation: 0,
            batch: Vec::new().into_iter(),
            seen: HashSet::new(),
            failed: false,
        }
    }

    /// Collect every node, stopping at the first store error.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub fn to_vec(&self) -> Result<Vec<Node>> {
        self.iter().collect()
    }

    fn lookup(&self, relation: &str) -> Result<Vec<String>> {
        let ids = match lookup_for(self.catalog, relation) {
            Lookup::Outgoing(name) => self
                .store
                .outgoing(&self.node_id, name, self.filter)?
                .into_iter()
                .map(|edge| edge.target)
                .collect(),
            Lookup::Incoming(name) => self
                .store
                .incoming(&self.node_id, name, self.filter)?
                .into_iter()
                .map(|edge| edge.source)
                .collect(),
        };
        Ok(ids)
    }
}

impl<'s, 'a, S: GraphStore + ?Sized> IntoIterator for &'s ConnectedNodes<'a, S> {
    type Item = Result<Node>;
    type IntoIter = ConnectedIter<'s, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`ConnectedNodes`], relation by relation.
pub struct ConnectedIter<'s, S: GraphStore + ?Sized> {
    nodes: &'s ConnectedNodes<'s, S>,
    next_relation: usize,
    batch: std::vec::IntoIter<String>,
    seen: HashSet<String>,
    failed: bool,
}

impl<S: GraphStore + ?Sized> Iterator for ConnectedIter<'_, S> {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            for id in self.batch.by_ref() {
                if self.seen.insert(id.clone()) {
                    return Some(Ok(Node::new(id)));
                }
            }
            let relation = self.nodes.relations.get(self.next_relation)?;
            self.next_relation += 1;
            match self.nodes.lookup(relation) {
                Ok(ids) => self.batch = ids.into_iter(),
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Connectivity;
    use crate::catalog::RelationCatalog;
    use crate::error::GraphError;
    use crate::model::{Edge, Node};
    use crate::store::{GraphStore, MemoryStore};

    const NONE: [&str; 0] = [];

    /// s1 -hypernym-> s2 -hypernym-> s3 with its hyponyms and the derived
    /// s1 -> s3 edge, as `process` leaves it.
    fn processed() -> MemoryStore {
        let mut store = MemoryStore::new();
        for id in ["s1", "s2", "s3", "s4"] {
            store.insert_node(&Node::new(id)).expect("insert node");
        }
        for (s, t, r) in [
            ("s1", "s2", "hypernym"),
            ("s2", "s3", "hypernym"),
            ("s2", "s1", "hyponym"),
            ("s3", "s2", "hyponym"),
            ("s1", "s4", "synonym"),
        ] {
            store
                .insert_edge(Edge::direct(s, t, r, "wn31"))
                .expect("insert edge");
        }
        let mut derived = Edge::direct("s1", "s3", "hypernym", "lexigraph");
        derived.depth = 2;
        store.insert_edge(derived).expect("insert edge");
        store
    }

    fn ids(nodes: Vec<Node>) -> Vec<String> {
        let mut ids: Vec<String> = nodes.into_iter().map(|node| node.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn canonical_relation_follows_outgoing_edges() {
        let store = processed();
        let query = Connectivity::new(RelationCatalog::standard(), &store);

        let all = query
            .connected_nodes("s1", -1, &["hypernym"])
            .expect("query");
        assert_eq!(ids(all.to_vec().expect("nodes")), ["s2", "s3"]);

        let direct = query
            .connected_nodes("s1", 1, &["hypernym"])
            .expect("query");
        assert_eq!(ids(direct.to_vec().expect("nodes")), ["s2"]);
    }

    #[test]
    fn inverse_relation_reads_incoming_canonical_edges() {
        let store = processed();
        let query = Connectivity::new(RelationCatalog::standard(), &store);

        let hyponyms = query
            .connected_nodes("s3", -1, &["hyponym"])
            .expect("query");
        assert_eq!(ids(hyponyms.to_vec().expect("nodes")), ["s1", "s2"]);

        assert!(query
            .are_connected("s3", "s1", -1, &["hyponym"])
            .expect("query"));
        assert!(!query
            .are_connected("s3", "s1", 1, &["hyponym"])
            .expect("query"));
    }

    #[test]
    fn results_are_deduplicated_and_restartable() {
        let store = processed();
        let query = Connectivity::new(RelationCatalog::standard(), &store);
        let nodes = query
            .connected_nodes("s1", -1, &["hypernym", "hypernym", "synonym"])
            .expect("query");

        let first = ids(nodes.to_vec().expect("first pass"));
        let second = ids((&nodes).into_iter().collect::<Result<_, _>>().expect("second pass"));
        assert_eq!(first, ["s2", "s3", "s4"]);
        assert_eq!(first, second);
    }

    #[test]
    fn depth_zero_and_empty_relations_yield_nothing() {
        let store = processed();
        let query = Connectivity::new(RelationCatalog::standard(), &store);

        assert_eq!(
            query
                .connected_nodes("s1", -1, &NONE)
                .expect("query")
                .iter()
                .count(),
            0
        );
        assert_eq!(
            query
                .connected_nodes("s1", 0, &["hypernym"])
                .expect("query")
                .iter()
                .count(),
            0
        );
    }

    #[test]
    fn are_connected_bounds() {
        let store = processed();
        let query = Connectivity::new(RelationCatalog::standard(), &store);

        assert!(query.are_connected("s1", "s1", 0, &NONE).expect("query"));
        assert!(!query
            .are_connected("s1", "s2", 0, &["hypernym"])
            .expect("query"));
        assert!(!query.are_connected("s1", "s2", -1, &NONE).expect("query"));
        assert!(query
            .are_connected("s1", "s3", -1, &["hypernym"])
            .expect("query"));
        assert!(!query
            .are_connected("s3", "s1", -1, &["hypernym"])
            .expect("query"));
    }

    #[test]
    fn unknown_relations_are_looked_up_directly() {
        let mut store = processed();
        store
            .insert_edge(Edge::direct("s2", "s4", "seeAlso", "wn31"))
            .expect("insert edge");
        let query = Connectivity::new(RelationCatalog::standard(), &store);

        assert!(query
            .are_connected("s2", "s4", -1, &["seeAlso"])
            .expect("query"));
        assert!(!query
            .are_connected("s4", "s2", -1, &["seeAlso"])
            .expect("query"));
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let store = processed();
        let query = Connectivity::new(RelationCatalog::standard(), &store);

        assert!(matches!(
            query.connected_nodes("s1", -2, &["hypernym"]),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            query.connected_nodes("", -1, &["hypernym"]),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            query.are_connected("s1", "s2", -1, &[""]),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            query.are_connected("s1", " ", -1, &["hypernym"]),
            Err(GraphError::InvalidArgument(_))
        ));
    }
}
