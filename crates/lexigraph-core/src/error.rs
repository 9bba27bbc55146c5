//! Error types shared by the catalog, stores and graph phases.

use std::fmt;

/// Result alias used throughout the engine.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// The unit of work a [`GraphError::TransactionFailure`] happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Normalize,
    Augment,
    Import,
}

impl Phase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Augment => "augment",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the engine and its stores.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The store does not have the expected shape. Raised before any phase
    /// touches the graph.
    #[error("invalid schema: {0}")]
    SchemaInvalid(String),

    /// A write or commit failed mid-phase. Everything the phase wrote has
    /// been rolled back.
    #[error("{phase} phase failed and was rolled back: {source}")]
    TransactionFailure {
        phase: Phase,
        #[source]
        source: Box<GraphError>,
    },

    /// Lookup of an unregistered relation, or of a missing status/job row.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed caller input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl GraphError {
    /// Wrap `source` as the failure of `phase`.
    #[must_use]
    pub fn transaction(phase: Phase, source: Self) -> Self {
        Self::TransactionFailure {
            phase,
            source: Box::new(source),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::SchemaInvalid(_) => ErrorCode::SchemaInvalid,
            Self::TransactionFailure { .. } => ErrorCode::TransactionFailure,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Sqlite(_) => ErrorCode::StoreUnavailable,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Machine-readable error codes for tooling that reports on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SchemaInvalid,
    TransactionFailure,
    NotFound,
    InvalidArgument,
    StoreUnavailable,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SchemaInvalid => "E1001",
            Self::TransactionFailure => "E2001",
            Self::NotFound => "E3001",
            Self::InvalidArgument => "E3002",
            Self::StoreUnavailable => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SchemaInvalid => "Store schema does not match the expected shape",
            Self::TransactionFailure => "Graph phase failed and was rolled back",
            Self::NotFound => "Record or relation not found",
            Self::InvalidArgument => "Invalid argument",
            Self::StoreUnavailable => "Store operation failed",
        }
    }

    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::SchemaInvalid => {
                Some("Recreate the database so migrations can install the graph schema.")
            }
            Self::TransactionFailure => {
                Some("Re-run the failed phase; phases never insert the same edge twice.")
            }
            Self::NotFound | Self::InvalidArgument => None,
            Self::StoreUnavailable => Some("Check that the database file is readable and not locked."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
