//! Semi-naive transitive closure.
//!
//! Level `d` joins every stored edge of relation `r` at depth exactly `d`
//! with the direct (depth-1) edges of `r` leaving its target. Each pair not
//! yet connected is inserted at depth `d + 1`; a pair already stored deeper
//! than `d + 1` is lowered to it. Because levels are processed in increasing
//! order, every pair ends at its minimum hop count, including pairs derived
//! by an earlier run that a later import gave a shorter path. Only canonical
//! transitive relations are closed; inverse-direction queries are answered
//! through them.
//!
//! A cycle `s -> .. -> s` yields the derived self edge `(s, s, r)`.

use std::time::Instant;

use crate::catalog::RelationCatalog;
use crate::config::EngineConfig;
use crate::error::{Phase, Result};
use crate::model::{DepthFilter, Edge, InsertionStats};
use crate::store::{EdgeCursor, GraphStore};

use super::run_phase;

/// Result of one closure run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClosureOutcome {
    pub stats: InsertionStats,
    /// Edges that already existed and were moved to a smaller depth.
    pub lowered: InsertionStats,
    /// Highest depth inserted by this run; 0 when nothing was derived.
    pub depth_reached: u32,
}

#[derive(Debug, Default, Clone, Copy)]
struct LevelChanges {
    inserted: usize,
    lowered: usize,
}

#[derive(Debug, Clone)]
pub struct ClosureComputer<'c> {
    catalog: &'c RelationCatalog,
    batch_size: usize,
    provenance: String,
}

impl<'c> ClosureComputer<'c> {
    #[must_use]
    pub fn new(catalog: &'c RelationCatalog, config: &EngineConfig) -> Self {
        Self {
            catalog,
            batch_size: config.batch_size.max(1),
            provenance: config.provenance.clone(),
        }
    }

    /// Compute the closure as one transaction and clear `needs_augment`.
    ///
    /// # Errors
    ///
    /// `TransactionFailure` for [`Phase::Augment`]; nothing is kept.
    pub fn run<S: GraphStore + ?Sized>(&self, store: &mut S) -> Result<ClosureOutcome> {
        let start = Instant::now();
        tracing::info!(
            relations = self.catalog.canonical_transitive_relations().len(),
            batch_size = self.batch_size,
            "augmenting graph"
        );

        let outcome = run_phase(store, Phase::Augment, |store| {
            let outcome = self.pass(store)?;
            store.set_needs_augment(false)?;
            Ok(outcome)
        })?;

        tracing::info!(
            inserted = outcome.stats.total(),
            lowered = outcome.lowered.total(),
            counts = %outcome.stats,
            depth = outcome.depth_reached,
            elapsed_ms = start.elapsed().as_millis(),
            "augmentation complete"
        );
        Ok(outcome)
    }

    fn pass<S: GraphStore + ?Sized>(&self, store: &mut S) -> Result<ClosureOutcome> {
        let mut outcome = ClosureOutcome::default();
        let mut unflushed = 0usize;
        let mut depth = 1u32;

        loop {
            let mut level = LevelChanges::default();
            for relation in self.catalog.canonical_transitive_relations() {
                let changes = self.expand_level(store, relation, depth, &mut unflushed)?;
                outcome.stats.add(relation, changes.inserted);
                outcome.lowered.add(relation, changes.lowered);
                level.inserted += changes.inserted;
                level.lowered += changes.lowered;
            }
            store.flush()?;
            unflushed = 0;
            tracing::debug!(
                depth,
                inserted = level.inserted,
                lowered = level.lowered,
                "closure level complete"
            );

            if level.inserted > 0 {
                outcome.depth_reached = depth + 1;
            } else if !self.has_edges_at(store, depth + 1)? {
                break;
            }
            // Edges at the next depth can exist without being inserted now,
            // either derived by an earlier run or lowered by this level; they
            // still need joining against the current direct edges.
            depth += 1;
        }

        Ok(outcome)
    }

    fn expand_level<S: GraphStore + ?Sized>(
        &self,
        store: &mut S,
        relation: &str,
        depth: u32,
        unflushed: &mut usize,
    ) -> Result<LevelChanges> {
        let mut changes = LevelChanges::default();
        let mut cursor = EdgeCursor::new(relation, depth, self.batch_size);

        while let Some(page) = cursor.next_page(store)? {
            for head in page {
                for step in store.outgoing(&head.target, relation, DepthFilter::Exactly(1))? {
                    match store.find_edge(&head.source, &step.target, relation)? {
                        Some(existing) if existing.depth > depth + 1 => {
                            store.update_edge(Edge {
                                depth: depth + 1,
                                ..existing
                            })?;
                            changes.lowered += 1;
                            continue;
                        }
                        Some(_) => continue,
                        None => {}
                    }
                    store.insert_edge(Edge {
                        source: head.source.clone(),
                        target: step.target,
                        relation: relation.to_string(),
                        depth: depth + 1,
                        provenance: self.provenance.clone(),
                    })?;
                    changes.inserted += 1;
                    *unflushed += 1;
                    if *unflushed >= self.batch_size {
                        store.flush()?;
                        *unflushed = 0;
                        tracing::trace!(relation, depth, "closure batch flushed");
                    }
                }
            }
        }

        Ok(changes)
    }

    fn has_edges_at<S: GraphStore + ?Sized>(&self, store: &S, depth: u32) -> Result<bool> {
        for relation in self.catalog.canonical_transitive_relations() {
            if !store.edges_at_depth(relation, depth, None, 1)?.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{ClosureComputer, ClosureOutcome};
    use crate::catalog::RelationCatalog;
    use crate::config::EngineConfig;
    use crate::model::{Edge, Node};
    use crate::store::{GraphStore, MemoryStore};

    fn store_with(edges: &[(&str, &str, &str)]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (s, t, _) in edges {
            store.insert_node(&Node::new(*s)).expect("insert node");
            store.insert_node(&Node::new(*t)).expect("insert node");
        }
        for (s, t, r) in edges {
            store
                .insert_edge(Edge::direct(*s, *t, *r, "wn31"))
                .expect("insert edge");
        }
        store
    }

    fn augment(store: &mut MemoryStore) -> ClosureOutcome {
        ClosureComputer::new(RelationCatalog::standard(), &EngineConfig::default())
            .run(store)
            .expect("augment")
    }

    fn depth_of(store: &MemoryStore, s: &str, t: &str, r: &str) -> Option<u32> {
        store
            .find_edge(s, t, r)
            .expect("lookup")
            .map(|edge| edge.depth)
    }

    #[test]
    fn chain_derives_each_pair_at_its_hop_count() {
        let mut store = store_with(&[
            ("s1", "s2", "hypernym"),
            ("s2", "s3", "hypernym"),
            ("s3", "s4", "hypernym"),
        ]);
        store.set_needs_augment(true).expect("flag");

        let outcome = augment(&mut store);

        assert_eq!(outcome.stats.count("hypernym"), 3);
        assert_eq!(outcome.depth_reached, 3);
        assert_eq!(depth_of(&store, "s1", "s3", "hypernym"), Some(2));
        assert_eq!(depth_of(&store, "s2", "s4", "hypernym"), Some(2));
        assert_eq!(depth_of(&store, "s1", "s4", "hypernym"), Some(3));
        assert!(!store.status().expect("status").needs_augment);
    }

    #[test]
    fn diamond_keeps_the_shortest_derivation_once() {
        let mut store = store_with(&[
            ("a", "b", "holonym"),
            ("b", "d", "holonym"),
            ("a", "c", "holonym"),
            ("c", "e", "holonym"),
            ("e", "d", "holonym"),
        ]);

        let outcome = augment(&mut store);

        assert_eq!(depth_of(&store, "a", "d", "holonym"), Some(2));
        assert_eq!(depth_of(&store, "a", "e", "holonym"), Some(2));
        assert_eq!(depth_of(&store, "c", "d", "holonym"), Some(2));
        assert_eq!(outcome.stats.count("holonym"), 3);
    }

    #[test]
    fn cycle_closes_with_self_edges() {
        let mut store = store_with(&[("a", "b", "hypernym"), ("b", "a", "hypernym")]);

        augment(&mut store);

        assert_eq!(depth_of(&store, "a", "a", "hypernym"), Some(2));
        assert_eq!(depth_of(&store, "b", "b", "hypernym"), Some(2));
        assert_eq!(store.edge_count(), 4);
    }

    #[test]
    fn only_canonical_transitive_relations_are_closed() {
        let mut store = store_with(&[
            ("a", "b", "hyponym"),
            ("b", "c", "hyponym"),
            ("a", "b", "holonymMember"),
            ("b", "c", "holonymMember"),
        ]);

        let outcome = augment(&mut store);

        assert!(outcome.stats.is_empty());
        assert_eq!(outcome.depth_reached, 0);
        assert_eq!(store.edge_count(), 4);
    }

    #[test]
    fn relations_do_not_mix() {
        let mut store = store_with(&[("a", "b", "hypernym"), ("b", "c", "holonymPart")]);

        assert!(augment(&mut store).stats.is_empty());
    }

    #[test]
    fn fixed_point_run_inserts_nothing() {
        let mut store = store_with(&[
            ("a", "b", "holonymPart"),
            ("b", "c", "holonymPart"),
            ("c", "d", "holonymPart"),
        ]);
        augment(&mut store);
        let before = store.edge_count();

        let again = augment(&mut store);
        assert!(again.stats.is_empty());
        assert_eq!(store.edge_count(), before);
    }

    #[test]
    fn new_direct_edge_extends_an_augmented_chain() {
        let mut store = store_with(&[
            ("a", "b", "hypernym"),
            ("b", "c", "hypernym"),
            ("c", "d", "hypernym"),
        ]);
        augment(&mut store);

        store.insert_node(&Node::new("e")).expect("insert node");
        store
            .insert_edge(Edge::direct("d", "e", "hypernym", "wn31"))
            .expect("insert edge");
        let outcome = augment(&mut store);

        assert_eq!(outcome.stats.count("hypernym"), 3);
        assert_eq!(depth_of(&store, "a", "e", "hypernym"), Some(4));
    }

    #[test]
    fn shorter_path_from_a_later_import_lowers_derived_depths() {
        let mut store = store_with(&[
            ("a", "b", "hypernym"),
            ("b", "c", "hypernym"),
            ("c", "d", "hypernym"),
            ("d", "e", "hypernym"),
        ]);
        augment(&mut store);
        assert_eq!(depth_of(&store, "a", "e", "hypernym"), Some(4));

        store.insert_node(&Node::new("x")).expect("insert node");
        for (s, t) in [("a", "x"), ("x", "e")] {
            store
                .insert_edge(Edge::direct(s, t, "hypernym", "wn31"))
                .expect("insert edge");
        }
        let outcome = augment(&mut store);

        assert_eq!(depth_of(&store, "a", "e", "hypernym"), Some(2));
        assert_eq!(outcome.lowered.count("hypernym"), 1);
        assert_eq!(depth_of(&store, "x", "e", "hypernym"), Some(1));
        assert_eq!(outcome.stats.count("hypernym"), 0);
    }

    #[test]
    fn lowering_a_pair_lowers_the_pairs_derived_through_it() {
        let mut store = store_with(&[
            ("a", "b", "holonym"),
            ("b", "c", "holonym"),
            ("c", "d", "holonym"),
            ("d", "e", "holonym"),
        ]);
        augment(&mut store);

        // a->d drops from 3 to 1, so a->e drops from 4 to 2.
        store
            .update_edge(Edge::direct("a", "d", "holonym", "wn31"))
            .expect("promote");
        let outcome = augment(&mut store);

        assert_eq!(depth_of(&store, "a", "d", "holonym"), Some(1));
        assert_eq!(depth_of(&store, "a", "e", "holonym"), Some(2));
        assert_eq!(depth_of(&store, "a", "c", "holonym"), Some(2));
        assert_eq!(outcome.lowered.count("holonym"), 1);
        assert!(outcome.stats.is_empty());
    }

    #[test]
    fn small_batches_flush_during_a_level() {
        let mut store = store_with(&[
            ("a", "b", "hypernym"),
            ("b", "c", "hypernym"),
            ("c", "d", "hypernym"),
            ("d", "e", "hypernym"),
        ]);

        let outcome = ClosureComputer::new(
            RelationCatalog::standard(),
            &EngineConfig::default().with_batch_size(1),
        )
        .run(&mut store)
        .expect("augment");

        assert_eq!(outcome.stats.count("hypernym"), 6);
        assert!(store.flush_count() > 6);
    }
}
