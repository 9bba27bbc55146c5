//! lexigraph-core: augmentation engine for lexical relation graphs.
//!
//! Synsets are linked by typed relation edges (hypernym, holonym, ...).
//! After an import the engine normalizes the graph by adding missing inverse
//! edges, then derives the transitive closure of the canonical transitive
//! relations, recording each derived edge's minimum hop count as its depth.
//! Connectivity queries then answer "is X a kind of / part of Y" with a
//! single indexed lookup.
//!
//! # Conventions
//!
//! - **Errors**: [`GraphError`] inside the engine; `anyhow::Result` only where
//!   files are opened (stores, config).
//! - **Logging**: `tracing` macros; the library never installs a subscriber.

pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod graph;
pub mod import;
pub mod model;
pub mod store;

pub use catalog::{RelationCatalog, RelationCatalogBuilder, RelationInfo, RelationType};
pub use config::EngineConfig;
pub use db::SqliteStore;
pub use engine::Engine;
pub use error::{ErrorCode, GraphError, Phase, Result};
pub use graph::{ConnectedNodes, Connectivity, ProcessReport, process, process_into};
pub use import::{ImportConfig, ImportReport, Importer};
pub use model::{
    ENGINE_PROVENANCE, Edge, EdgeKey, GraphStatus, ImportJob, InsertionStats, MaxDepth, Node,
};
pub use store::{GraphStore, MemoryStore};
