//! One handle over a store, a relation catalog and the engine config.

use std::time::Instant;

use crate::catalog::RelationCatalog;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::graph::{
    ClosureComputer, ConnectedNodes, Connectivity, Normalizer, ProcessReport, process_into,
};
use crate::import::{ImportConfig, ImportReport, Importer};
use crate::model::{EdgeKey, GraphStatus, InsertionStats, Node};
use crate::store::GraphStore;

/// Owns a [`GraphStore`] and runs the phases and queries against it.
///
/// ```no_run
/// use lexigraph_core::{Engine, EngineConfig, RelationCatalog, db};
///
/// # fn main() -> anyhow::Result<()> {
/// let store = db::open_store(std::path::Path::new("lexigraph.sqlite3"))?;
/// let mut engine = Engine::new(store, RelationCatalog::standard(), EngineConfig::default())?;
/// engine.process()?;
/// let connected = engine.are_connected("dog", "animal", -1, &["hypernym"])?;
/// # let _ = connected;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine<'c, S: GraphStore> {
    store: S,
    catalog: &'c RelationCatalog,
    config: EngineConfig,
    last_run: Option<ProcessReport>,
}

impl<'c, S: GraphStore> Engine<'c, S> {
    /// # Errors
    ///
    /// `InvalidArgument` if `config` does not validate.
    pub fn new(store: S, catalog: &'c RelationCatalog, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            catalog,
            config,
            last_run: None,
        })
    }

    #[must_use]
    pub const fn catalog(&self) -> &'c RelationCatalog {
        self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Report of the most recent normalize, augment or process call.
    #[must_use]
    pub const fn last_run(&self) -> Option<&ProcessReport> {
        self.last_run.as_ref()
    }

    /// # Errors
    ///
    /// Propagates store failures.
    pub fn status(&self) -> Result<GraphStatus> {
        self.store.status()
    }

    /// Add missing inverse edges.
    ///
    /// # Errors
    ///
    /// `TransactionFailure` for the normalize phase.
    pub fn normalize(&mut self) -> Result<InsertionStats> {
        let start = Instant::now();
        let stats = Normalizer::new(self.catalog, &self.config).run(&mut self.store)?;
        self.last_run = Some(ProcessReport {
            normalize: Some(stats.clone()),
            elapsed: start.elapsed(),
            ..ProcessReport::default()
        });
        Ok(stats)
    }

    /// Compute the transitive closure.
    ///
    /// # Errors
    ///
    /// `TransactionFailure` for the augment phase.
    pub fn augment(&mut self) -> Result<InsertionStats> {
        let start = Instant::now();
        let outcome = ClosureComputer::new(self.catalog, &self.config).run(&mut self.store)?;
        self.last_run = Some(ProcessReport {
            augment: Some(outcome.stats.clone()),
            lowered: outcome.lowered,
            closure_depth: outcome.depth_reached,
            elapsed: start.elapsed(),
            ..ProcessReport::default()
        });
        Ok(outcome.stats)
    }

    /// Normalize, then augment.
    ///
    /// If closure fails after normalization committed, [`Engine::last_run`]
    /// reports the normalization alone.
    ///
    /// # Errors
    ///
    /// `TransactionFailure` naming the failed phase.
    pub fn process(&mut self) -> Result<ProcessReport> {
        let mut report = ProcessReport::default();
        let outcome = process_into(&mut self.store, self.catalog, &self.config, &mut report);
        if report.normalize.is_some() {
            self.last_run = Some(report.clone());
        }
        outcome.map(|()| report)
    }

    /// Load a resource and, unless `import.skip_augment`, process the graph.
    ///
    /// # Errors
    ///
    /// See [`Importer::import`].
    pub fn import<N, T>(
        &mut self,
        import: &ImportConfig,
        nodes: N,
        triples: T,
    ) -> Result<ImportReport>
    where
        N: IntoIterator<Item = Node>,
        T: IntoIterator<Item = EdgeKey>,
    {
        let report = Importer::new(self.catalog, self.config.clone()).import(
            &mut self.store,
            import,
            nodes,
            triples,
        )?;
        if let Some(processed) = &report.process {
            self.last_run = Some(processed.clone());
        }
        Ok(report)
    }

    /// See [`Connectivity::connected_nodes`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for malformed arguments.
    pub fn connected_nodes<R: AsRef<str>>(
        &self,
        node_id: &str,
        max_depth: i64,
        relations: &[R],
    ) -> Result<ConnectedNodes<'_, S>> {
        Connectivity::new(self.catalog, &self.store).connected_nodes(node_id, max_depth, relations)
    }

    /// See [`Connectivity::are_connected`].
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for malformed arguments; store failures.
    pub fn are_connected<R: AsRef<str>>(
        &self,
        source_id: &str,
        target_id: &str,
        max_depth: i64,
        relations: &[R],
    ) -> Result<bool> {
        Connectivity::new(self.catalog, &self.store).are_connected(
            source_id,
            target_id,
            max_depth,
            relations,
        )
    }
}
