//! Loading raw relation triples from a lexical resource.
//!
//! An import marks the graph dirty, records an [`ImportJob`], writes the
//! nodes and direct edges in one transaction, closes the job and, unless
//! told otherwise, runs [`process`] so the graph is queryable again.
//!
//! [`ImportJob`]: crate::model::ImportJob

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::catalog::RelationCatalog;
use crate::config::EngineConfig;
use crate::error::{GraphError, Phase, Result};
use crate::graph::{ProcessReport, process, run_phase};
use crate::model::{Edge, EdgeKey, NewImportJob, Node};
use crate::store::GraphStore;

/// Describes where an import comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportConfig {
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub source_url: String,
    /// Provenance tag written on every imported edge.
    pub resource_name: String,
    /// Leave normalization and closure for a later `process` call.
    #[serde(default)]
    pub skip_augment: bool,
}

impl ImportConfig {
    /// # Errors
    ///
    /// `InvalidArgument` when the author, source URL or resource name is
    /// empty.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("author", &self.author),
            ("source_url", &self.source_url),
            ("resource_name", &self.resource_name),
        ] {
            if value.trim().is_empty() {
                return Err(GraphError::InvalidArgument(format!(
                    "import {field} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of one import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub job_id: i64,
    /// Nodes that did not exist before, listed or implied by a triple.
    pub nodes_created: usize,
    pub edges_inserted: usize,
    /// Triples whose edge had been derived by an earlier closure. The stored
    /// edge becomes a direct edge of this resource.
    pub edges_promoted: usize,
    /// Triples skipped because the direct edge already existed.
    pub duplicates: usize,
    /// `None` when `skip_augment` was set.
    pub process: Option<ProcessReport>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct Importer<'c> {
    catalog: &'c RelationCatalog,
    config: EngineConfig,
}

#[derive(Debug, Default)]
struct Loaded {
    nodes_created: usize,
    edges_inserted: usize,
    edges_promoted: usize,
    duplicates: usize,
}

impl<'c> Importer<'c> {
    #[must_use]
    pub const fn new(catalog: &'c RelationCatalog, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// Import `nodes` and the direct edges `triples` into `store`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a bad [`ImportConfig`] or an empty id in a
    /// triple; `TransactionFailure` if writing the graph or processing it
    /// fails. A failed load leaves the job open and the graph flagged for
    /// processing.
    pub fn import<S, N, T>(
        &self,
        store: &mut S,
        import: &ImportConfig,
        nodes: N,
        triples: T,
    ) -> Result<ImportReport>
    where
        S: GraphStore + ?Sized,
        N: IntoIterator<Item = Node>,
        T: IntoIterator<Item = EdgeKey>,
    {
        import.validate()?;
        self.config.validate()?;
        let start = Instant::now();

        let job_id = run_phase(store, Phase::Import, |store| {
            store.set_needs_normalize(true)?;
            store.set_needs_augment(true)?;
            let id = store.create_import_job(&NewImportJob {
                author: import.author.clone(),
                description: import.description.clone(),
                source_url: import.source_url.clone(),
                resource_name: import.resource_name.clone(),
                started_at: Utc::now(),
            })?;
            store.set_current_import_job(Some(id))?;
            Ok(id)
        })?;
        tracing::info!(
            job_id,
            resource = %import.resource_name,
            source_url = %import.source_url,
            "import started"
        );

        let loaded = run_phase(store, Phase::Import, |store| {
            self.load(store, &import.resource_name, nodes, triples)
        })?;

        run_phase(store, Phase::Import, |store| {
            store.finish_import_job(job_id, Utc::now())?;
            store.set_current_import_job(None)
        })?;
        tracing::info!(
            job_id,
            nodes_created = loaded.nodes_created,
            edges_inserted = loaded.edges_inserted,
            edges_promoted = loaded.edges_promoted,
            duplicates = loaded.duplicates,
            "import finished"
        );

        let processed = if import.skip_augment {
            tracing::info!(job_id, "skipping graph processing after import");
            None
        } else {
            Some(process(store, self.catalog, &self.config)?)
        };

        Ok(ImportReport {
            job_id,
            nodes_created: loaded.nodes_created,
            edges_inserted: loaded.edges_inserted,
            edges_promoted: loaded.edges_promoted,
            duplicates: loaded.duplicates,
            process: processed,
            elapsed: start.elapsed(),
        })
    }

    fn load<S, N, T>(&self, store: &mut S, provenance: &str, nodes: N, triples: T) -> Result<Loaded>
    where
        S: GraphStore + ?Sized,
        N: IntoIterator<Item = Node>,
        T: IntoIterator<Item = EdgeKey>,
    {
        let mut loaded = Loaded::default();

        for node in nodes {
            if store.insert_node(&node)? {
                loaded.nodes_created += 1;
            }
        }

        let mut unflushed = 0usize;
        for triple in triples {
            if triple.relation.trim().is_empty() {
                return Err(GraphError::InvalidArgument(format!(
                    "relation name missing for {} -> {}",
                    triple.source, triple.target
                )));
            }
            for id in [&triple.source, &triple.target] {
                if store.insert_node(&Node::new(id.as_str()))? {
                    loaded.nodes_created += 1;
                }
            }
            let edge = Edge::direct(triple.source, triple.target, triple.relation, provenance);
            match store.find_edge(&edge.source, &edge.target, &edge.relation)? {
                Some(existing) if existing.is_derived() => {
                    store.update_edge(edge)?;
                    loaded.edges_promoted += 1;
                    continue;
                }
                Some(_) => {
                    loaded.duplicates += 1;
                    continue;
                }
                None => {}
            }
            store.insert_edge(edge)?;
            loaded.edges_inserted += 1;
            unflushed += 1;
            if unflushed >= self.config.batch_size {
                store.flush()?;
                unflushed = 0;
                tracing::debug!(inserted = loaded.edges_inserted, "import batch flushed");
            }
        }

        Ok(loaded)
    }
}
