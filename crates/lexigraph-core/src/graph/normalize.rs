//! Inverse-edge normalization.
//!
//! For every direct edge `(s, t, r)` where `r` has an inverse `r'` that is
//! transitive, the direct edge `(t, s, r')` is added unless it already exists
//! at depth 1. An existing derived `(t, s, r')` is promoted to depth 1 in
//! place and counted like an insert. Nodes
//! are streamed page by page and pending inserts are flushed after each page
//! of `batch_size` nodes, so the working set never holds the whole graph.
//!
//! Only depth-1 edges are considered: derived edges never spawn inverses,
//! which makes a second run over an augmented graph a no-op.

use std::time::Instant;

use crate::catalog::RelationCatalog;
use crate::config::EngineConfig;
use crate::error::{Phase, Result};
use crate::model::{DepthFilter, Edge, InsertionStats};
use crate::store::{GraphStore, NodeCursor};

use super::run_phase;

#[derive(Debug, Clone)]
pub struct Normalizer<'c> {
    catalog: &'c RelationCatalog,
    batch_size: usize,
    provenance: String,
}

impl<'c> Normalizer<'c> {
    #[must_use]
    pub fn new(catalog: &'c RelationCatalog, config: &EngineConfig) -> Self {
        Self {
            catalog,
            batch_size: config.batch_size.max(1),
            provenance: config.provenance.clone(),
        }
    }

    /// Normalize the whole graph as one transaction and clear the
    /// `needs_normalize` flag.
    ///
    /// # Errors
    ///
    /// `TransactionFailure` for [`Phase::Normalize`]; nothing is kept.
    pub fn run<S: GraphStore + ?Sized>(&self, store: &mut S) -> Result<InsertionStats> {
        let start = Instant::now();
        tracing::info!(batch_size = self.batch_size, "normalizing graph");

        let stats = run_phase(store, Phase::Normalize, |store| {
            let stats = self.pass(store)?;
            store.set_needs_normalize(false)?;
            Ok(stats)
        })?;

        tracing::info!(
            inserted = stats.total(),
            counts = %stats,
            elapsed_ms = start.elapsed().as_millis(),
            "normalization complete"
        );
        Ok(stats)
    }

    /// The inverse relation to add for `edge`, if any.
    fn inverse_for<'a>(&'a self, edge: &Edge) -> Option<&'a str> {
        if edge.is_self_loop() {
            return None;
        }
        let inverse = self.catalog.inverse(&edge.relation).ok()?;
        self.catalog.is_transitive(inverse).then_some(inverse)
    }

    fn pass<S: GraphStore + ?Sized>(&self, store: &mut S) -> Result<InsertionStats> {
        let mut stats = InsertionStats::default();
        let mut cursor = NodeCursor::new(self.batch_size);
        let mut visited = 0usize;

        while let Some(page) = cursor.next_page(store)? {
            for node in &page {
                for edge in store.edges_from(&node.id, DepthFilter::Exactly(1))? {
                    let Some(inverse) = self.inverse_for(&edge) else {
                        continue;
                    };
                    let candidate =
                        Edge::direct(&edge.target, &edge.source, inverse, &self.provenance);
                    match store.find_edge(&edge.target, &edge.source, inverse)? {
                        Some(existing) if existing.is_derived() => {
                            store.update_edge(candidate)?;
                        }
                        Some(_) => continue,
                        None => store.insert_edge(candidate)?,
                    }
                    stats.inc(inverse);
                }
            }
            visited += page.len();
            store.flush()?;
            tracing::debug!(visited, inserted = stats.total(), "normalize batch flushed");
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::Normalizer;
    use crate::catalog::RelationCatalog;
    use crate::config::EngineConfig;
    use crate::model::{Edge, Node};
    use crate::store::{GraphStore, MemoryStore};

    fn store_with(nodes: &[&str], edges: &[(&str, &str, &str)]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for id in nodes {
            store.insert_node(&Node::new(*id)).expect("insert node");
        }
        for (s, t, r) in edges {
            store
                .insert_edge(Edge::direct(*s, *t, *r, "wn31"))
                .expect("insert edge");
        }
        store
    }

    fn normalize(store: &mut MemoryStore) -> crate::model::InsertionStats {
        Normalizer::new(RelationCatalog::standard(), &EngineConfig::default())
            .run(store)
            .expect("normalize")
    }

    #[test]
    fn adds_inverse_for_both_directions() {
        let mut store = store_with(
            &["dog", "animal", "cat"],
            &[("dog", "animal", "hypernym"), ("animal", "cat", "hyponym")],
        );
        store.set_needs_normalize(true).expect("flag");

        let stats = normalize(&mut store);

        assert_eq!(stats.count("hyponym"), 1);
        assert_eq!(stats.count("hypernym"), 1);
        assert!(store.find_edge("animal", "dog", "hyponym").expect("lookup").is_some());
        assert!(store.find_edge("cat", "animal", "hypernym").expect("lookup").is_some());
        assert!(!store.status().expect("status").needs_normalize);

        let added = store
            .find_edge("animal", "dog", "hyponym")
            .expect("lookup")
            .expect("edge");
        assert_eq!(added.depth, 1);
        assert_eq!(added.provenance, "lexigraph");
    }

    #[test]
    fn skips_non_transitive_self_loops_and_unknown_relations() {
        let mut store = store_with(
            &["a", "b"],
            &[
                ("a", "b", "holonymMember"),
                ("a", "b", "synonym"),
                ("a", "a", "hypernym"),
                ("a", "b", "seeAlso"),
            ],
        );

        let stats = normalize(&mut store);

        assert!(stats.is_empty());
        assert_eq!(store.edge_count(), 4);
    }

    #[test]
    fn existing_inverse_is_not_duplicated() {
        let mut store = store_with(
            &["a", "b"],
            &[("a", "b", "holonym"), ("b", "a", "meronym")],
        );

        assert!(normalize(&mut store).is_empty());
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let mut store = store_with(
            &["a", "b", "c"],
            &[("a", "b", "holonymPart"), ("b", "c", "holonymPart")],
        );

        assert_eq!(normalize(&mut store).count("meronymPart"), 2);
        let edges: Vec<Edge> = store.edges().cloned().collect();

        assert!(normalize(&mut store).is_empty());
        assert_eq!(store.edges().cloned().collect::<Vec<_>>(), edges);
    }

    #[test]
    fn derived_edges_are_ignored() {
        let mut store = store_with(&["a", "b", "c"], &[]);
        let mut derived = Edge::direct("a", "c", "hypernym", "lexigraph");
        derived.depth = 2;
        store.insert_edge(derived).expect("insert");

        assert!(normalize(&mut store).is_empty());
        assert!(store.find_edge("c", "a", "hyponym").expect("lookup").is_none());
    }

    #[test]
    fn derived_inverse_is_promoted_to_a_direct_edge() {
        let mut store = store_with(&["a", "b", "c", "d"], &[("d", "a", "hyponym")]);
        let mut derived = Edge::direct("a", "d", "hypernym", "lexigraph");
        derived.depth = 3;
        store.insert_edge(derived).expect("insert");

        let stats = normalize(&mut store);

        assert_eq!(stats.count("hypernym"), 1);
        assert_eq!(
            store.find_edge("a", "d", "hypernym").expect("lookup"),
            Some(Edge::direct("a", "d", "hypernym", "lexigraph"))
        );
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn flushes_once_per_node_page() {
        let nodes: Vec<String> = (0..5).map(|i| format!("n{i}")).collect();
        let ids: Vec<&str> = nodes.iter().map(String::as_str).collect();
        let mut store = store_with(&ids, &[("n0", "n1", "hypernym")]);

        Normalizer::new(
            RelationCatalog::standard(),
            &EngineConfig::default().with_batch_size(2),
        )
        .run(&mut store)
        .expect("normalize");

        // three node pages, plus the flush commit performs
        assert_eq!(store.flush_count(), 4);
    }
}
