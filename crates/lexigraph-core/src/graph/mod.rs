//! Graph augmentation phases and read-side connectivity.
//!
//! ## Submodules
//!
//! - [`normalize`]: adds the missing inverse edge for every direct edge of a
//!   transitive relation pair.
//! - [`closure`]: level-by-level transitive closure of canonical transitive
//!   relations, recording the minimum hop count as edge depth.
//! - [`connectivity`]: `connected_nodes` / `are_connected` over stored edges.
//!
//! Each write phase runs inside one store transaction via [`run_phase`]: any
//! failure rolls the whole phase back and surfaces as
//! [`GraphError::TransactionFailure`].

pub mod closure;
pub mod connectivity;
pub mod normalize;

pub use closure::{ClosureComputer, ClosureOutcome};
pub use connectivity::{ConnectedIter, ConnectedNodes, Connectivity};
pub use normalize::Normalizer;

use std::time::{Duration, Instant};

use crate::catalog::RelationCatalog;
use crate::config::EngineConfig;
use crate::error::{GraphError, Phase, Result};
use crate::model::InsertionStats;
use crate::store::GraphStore;

// ---------------------------------------------------------------------------
// ProcessReport
// ---------------------------------------------------------------------------

/// What the last phase run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Inverse edges added by normalization, if it ran.
    pub normalize: Option<InsertionStats>,
    /// Derived edges added by closure, if it ran.
    pub augment: Option<InsertionStats>,
    /// Derived edges the closure moved to a smaller depth.
    pub lowered: InsertionStats,
    /// Highest edge depth the closure inserted (0 when nothing was derived).
    pub closure_depth: u32,
    /// Elapsed wall time.
    pub elapsed: Duration,
}

impl ProcessReport {
    /// Total edges inserted across both phases.
    #[must_use]
    pub fn total_inserted(&self) -> usize {
        self.normalize.as_ref().map_or(0, InsertionStats::total)
            + self.augment.as_ref().map_or(0, InsertionStats::total)
    }
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Run normalization then closure, each in its own transaction.
///
/// Both phases always run; they are idempotent, so a graph that is already
/// processed only costs a scan.
///
/// # Errors
///
/// `TransactionFailure` naming the phase that failed. A closure failure
/// leaves the committed normalization in place.
pub fn process<S: GraphStore + ?Sized>(
    store: &mut S,
    catalog: &RelationCatalog,
    config: &EngineConfig,
) -> Result<ProcessReport> {
    let mut report = ProcessReport::default();
    process_into(store, catalog, config, &mut report)?;
    Ok(report)
}

/// [`process`], filling `report` as each phase commits.
///
/// When closure fails, `report` still holds the committed normalization.
///
/// # Errors
///
/// Same as [`process`].
pub fn process_into<S: GraphStore + ?Sized>(
    store: &mut S,
    catalog: &RelationCatalog,
    config: &EngineConfig,
    report: &mut ProcessReport,
) -> Result<()> {
    config.validate()?;
    let start = Instant::now();

    let normalized = Normalizer::new(catalog, config).run(store);
    report.elapsed = start.elapsed();
    report.normalize = Some(normalized?);

    let closure = ClosureComputer::new(catalog, config).run(store);
    report.elapsed = start.elapsed();
    let closure = closure?;
    report.augment = Some(closure.stats);
    report.lowered = closure.lowered;
    report.closure_depth = closure.depth_reached;

    tracing::info!(
        inserted = report.total_inserted(),
        closure_depth = report.closure_depth,
        elapsed_ms = report.elapsed.as_millis(),
        "graph processed"
    );
    Ok(())
}

/// Run `body` inside one store transaction.
///
/// Commits when `body` succeeds; otherwise rolls back and wraps the cause in
/// [`GraphError::TransactionFailure`] for `phase`.
///
/// # Errors
///
/// `TransactionFailure` if beginning, running or committing fails.
pub fn run_phase<S, T, F>(store: &mut S, phase: Phase, body: F) -> Result<T>
where
    S: GraphStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    store
        .begin()
        .map_err(|error| GraphError::transaction(phase, error))?;

    let outcome = body(store).and_then(|value| {
        store.commit()?;
        Ok(value)
    });

    outcome.map_err(|error| {
        if let Err(rollback_error) = store.rollback() {
            tracing::warn!(
                phase = %phase,
                error = %rollback_error,
                "rollback after failed phase also failed"
            );
        }
        tracing::error!(phase = %phase, error = %error, "phase rolled back");
        GraphError::transaction(phase, error)
    })
}
