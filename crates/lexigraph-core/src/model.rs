//! Graph records: synsets, relation edges, status row and run counters.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Provenance tag written on every edge the engine creates itself.
pub const ENGINE_PROVENANCE: &str = "lexigraph";

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A concept entry ("synset") of the relation graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
}

impl Node {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Identity of an edge: at most one edge exists per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl EdgeKey {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }
}

/// A typed, directed relation instance between two synsets.
///
/// `depth` is 1 for edges loaded from a resource or added by normalization,
/// and the length of the shortest same-relation chain for edges derived by
/// closure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relation: String,
    pub depth: u32,
    pub provenance: String,
}

impl Edge {
    /// A depth-1 edge.
    #[must_use]
    pub fn direct(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
        provenance: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            depth: 1,
            provenance: provenance.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.source, &self.target, &self.relation)
    }

    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    #[must_use]
    pub fn is_derived(&self) -> bool {
        self.depth > 1
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -[{}@{}]-> {} ({})",
            self.source, self.relation, self.depth, self.target, self.provenance
        )
    }
}

// ---------------------------------------------------------------------------
// Depth filters
// ---------------------------------------------------------------------------

/// Depth constraint for indexed edge lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthFilter {
    Exactly(u32),
    AtMost(u32),
    Any,
}

impl DepthFilter {
    #[must_use]
    pub const fn matches(self, depth: u32) -> bool {
        match self {
            Self::Exactly(d) => depth == d,
            Self::AtMost(d) => depth <= d,
            Self::Any => true,
        }
    }
}

/// Upper bound on stored depth for connectivity queries.
///
/// Callers pass `-1` for "no limit"; anything below that is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxDepth {
    Unbounded,
    AtMost(u32),
}

impl MaxDepth {
    /// # Errors
    ///
    /// `InvalidArgument` when `depth < -1` or too large for a stored depth.
    pub fn from_signed(depth: i64) -> Result<Self> {
        match depth {
            -1 => Ok(Self::Unbounded),
            d if d < -1 => Err(GraphError::InvalidArgument(format!(
                "depth must be >= -1, found instead: {d}"
            ))),
            d => u32::try_from(d).map(Self::AtMost).map_err(|_| {
                GraphError::InvalidArgument(format!("depth {d} exceeds the maximum edge depth"))
            }),
        }
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        matches!(self, Self::AtMost(0))
    }

    #[must_use]
    pub const fn filter(self) -> DepthFilter {
        match self {
            Self::Unbounded => DepthFilter::Any,
            Self::AtMost(d) => DepthFilter::AtMost(d),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// The single status row describing what processing the graph still needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatus {
    pub needs_normalize: bool,
    pub needs_augment: bool,
    pub schema_version: u32,
    pub current_import_job: Option<i64>,
}

impl GraphStatus {
    /// `true` when either phase is pending; query results may be incomplete.
    #[must_use]
    pub const fn needs_processing(&self) -> bool {
        self.needs_normalize || self.needs_augment
    }
}

// ---------------------------------------------------------------------------
// Import jobs
// ---------------------------------------------------------------------------

/// Audit record for one import of a lexical resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportJob {
    pub id: i64,
    pub author: String,
    pub description: String,
    pub source_url: String,
    pub resource_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Fields of an import job before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImportJob {
    pub author: String,
    pub description: String,
    pub source_url: String,
    pub resource_name: String,
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// InsertionStats
// ---------------------------------------------------------------------------

/// Per-relation count of edges inserted by one phase run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionStats {
    counts: BTreeMap<String, usize>,
}

impl InsertionStats {
    pub fn inc(&mut self, relation: &str) {
        self.add(relation, 1);
    }

    /// Add `n` insertions for `relation`. Adding zero records nothing.
    pub fn add(&mut self, relation: &str, n: usize) {
        if n > 0 {
            *self.counts.entry(relation.to_string()).or_insert(0) += n;
        }
    }

    #[must_use]
    pub fn count(&self, relation: &str) -> usize {
        self.counts.get(relation).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

impl fmt::Display for InsertionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("no edges inserted");
        }
        write!(f, "inserted {} edges:", self.total())?;
        for (name, count) in &self.counts {
            write!(f, " {name}={count}")?;
        }
        Ok(())
    }
}
