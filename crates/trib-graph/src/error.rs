//! Error types for trib-graph

use thiserror::Error;
use trib_core::CoreError;
use trib_sql::SqlError;

/// Graph assembly errors
///
/// Resolution gaps (a missing column record, an ambiguous wildcard) are not
/// errors: they are reported as skipped edges. These variants are the
/// failures that abort a run.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Resource lookup collaborator failed (G001)
    #[error("[G001] Resource lookup failed: {0}")]
    Lookup(String),

    /// SQL parsing collaborator failed (G002)
    #[error("[G002] {0}")]
    Parser(#[from] SqlError),

    /// Record construction rejected its input (G003)
    #[error("[G003] Invalid record: {0}")]
    Record(#[from] CoreError),

    /// BI signature failed to compile (G004)
    #[error("[G004] Invalid BI signature: {0}")]
    Signature(#[from] regex::Error),
}

/// Result type alias for GraphError
pub type GraphResult<T> = Result<T, GraphError>;
