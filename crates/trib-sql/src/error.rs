//! Error types for trib-sql
//!
//! Every variant except `ParserService` is a parse-contract violation: fatal
//! for the statement being analysed, harmless for every other statement.

use thiserror::Error;

/// Reference extraction errors
#[derive(Error, Debug)]
pub enum SqlError {
    /// Tree node has an unexpected shape (S001)
    #[error("[S001] Malformed parse tree at '{path}': {message}")]
    MalformedTree { path: String, message: String },

    /// Wildcard node without a recognised identifier shape (S002)
    #[error("[S002] Unhandled wildcard shape at '{path}': keys {keys:?}")]
    UnhandledWildcard { path: String, keys: Vec<String> },

    /// Alias could be claimed by more than one reference (S003)
    #[error("[S003] Ambiguous target for alias '{alias}': {reason}")]
    AmbiguousAlias { alias: String, reason: String },

    /// Alias reached the end of its scope without a unique target (S004)
    #[error("[S004] Unmatched alias '{alias}' in scope '{scope}': {reason}")]
    UnmatchedAlias {
        alias: String,
        scope: String,
        reason: String,
    },

    /// More than one materialization qualifies as the statement's own (S005)
    #[error("[S005] Multiple self materializations: {names:?}")]
    MultipleSelfMaterializations { names: Vec<String> },

    /// A CTE stands in for more than one materialization (S006)
    #[error("[S006] CTE '{transient}' represents more than one materialization: {candidates:?}")]
    MultipleTransientRepresentations {
        transient: String,
        candidates: Vec<String>,
    },

    /// No materialization a column could be bound to (S007)
    #[error("[S007] No materialization match for column '{column}' at '{location}'")]
    NoMaterializationMatch { column: String, location: String },

    /// Tree nests deeper than the configured limit (S008)
    #[error("[S008] Parse tree exceeds maximum depth of {max_depth}")]
    MaxDepthExceeded { max_depth: usize },

    /// Parser result holds no statement (S009)
    #[error("[S009] Parse tree contains no statement")]
    NoStatement,

    /// The SQL parsing collaborator failed (S010)
    #[error("[S010] SQL parser service failed: {0}")]
    ParserService(String),
}

/// Result type alias for SqlError
pub type SqlResult<T> = Result<T, SqlError>;
