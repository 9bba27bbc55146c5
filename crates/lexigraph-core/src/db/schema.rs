//! SQLite schema for the relation graph.
//!
//! - `synsets` holds node identity only; the import side owns everything else
//! - `synset_relations` holds direct and derived edges, one row per
//!   `(source_id, target_id, rel_name)`
//! - `import_jobs` is the audit trail of imports
//! - `graph_status` is the single row of processing flags

/// Migration v1: graph tables, lookup indexes and the status row.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS synsets (
    id TEXT PRIMARY KEY CHECK (length(trim(id)) > 0)
);

CREATE TABLE IF NOT EXISTS synset_relations (
    source_id TEXT NOT NULL REFERENCES synsets(id),
    target_id TEXT NOT NULL REFERENCES synsets(id),
    rel_name TEXT NOT NULL CHECK (length(trim(rel_name)) > 0),
    depth INTEGER NOT NULL CHECK (depth >= 1),
    provenance TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id, rel_name)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_synset_relations_source
    ON synset_relations(source_id, rel_name, depth);

CREATE INDEX IF NOT EXISTS idx_synset_relations_target
    ON synset_relations(target_id, rel_name, depth);

CREATE INDEX IF NOT EXISTS idx_synset_relations_level
    ON synset_relations(rel_name, depth, source_id, target_id);

CREATE TABLE IF NOT EXISTS import_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    author TEXT NOT NULL CHECK (length(trim(author)) > 0),
    description TEXT NOT NULL DEFAULT '',
    source_url TEXT NOT NULL,
    resource_name TEXT NOT NULL,
    started_at_us INTEGER NOT NULL,
    ended_at_us INTEGER
);

CREATE TABLE IF NOT EXISTS graph_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    needs_normalize INTEGER NOT NULL DEFAULT 0 CHECK (needs_normalize IN (0, 1)),
    needs_augment INTEGER NOT NULL DEFAULT 0 CHECK (needs_augment IN (0, 1)),
    schema_version INTEGER NOT NULL,
    current_import_job INTEGER REFERENCES import_jobs(id) ON DELETE SET NULL
);

INSERT OR IGNORE INTO graph_status (
    id,
    needs_normalize,
    needs_augment,
    schema_version,
    current_import_job
) VALUES (1, 0, 0, 1, NULL);
";

/// Tables a store must have before any phase runs.
pub const REQUIRED_TABLES: &[&str] = &["synsets", "synset_relations", "import_jobs", "graph_status"];

/// Indexes backing the closure join and connectivity lookups.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_synset_relations_source",
    "idx_synset_relations_target",
    "idx_synset_relations_level",
];
