//! trib-sql - Reference extraction for Tributary
//!
//! This crate walks the grammar trees produced by the SQL parsing service
//! and classifies every table, CTE, column and wildcard a statement touches.
//! Extraction ([`RefExtractor`]) collects raw references with their grammar
//! paths; [`StatementRefsBuilder`] resolves them against each other and the
//! catalog into [`Refs`].

pub mod builder;
pub mod error;
pub mod extractor;
pub mod grammar;
pub mod path;
pub mod refs;
pub mod service;
pub mod tree;

pub use builder::StatementRefsBuilder;
pub use error::{SqlError, SqlResult};
pub use extractor::{RefExtractor, DEFAULT_MAX_DEPTH};
pub use grammar::GrammarTag;
pub use path::RefContext;
pub use refs::{
    ColumnPrototype, ColumnRef, DependencyType, MaterializationKind, MaterializationPrototype,
    MaterializationRef, Refs, RefsPrototype,
};
pub use service::SqlParserService;

use serde_json::Value;
use trib_core::Catalog;

/// Classify the refs of one statement node
pub fn analyze_statement(
    statement: &Value,
    relation_name: &str,
    catalog: &Catalog,
    max_depth: usize,
) -> SqlResult<Refs> {
    let prototype = RefExtractor::new(max_depth).extract(statement)?;
    StatementRefsBuilder::new(catalog, relation_name).build(prototype)
}

/// Classify every statement of a parser result.
///
/// A tree without statements is an error; a statement that breaks the parse
/// contract only fails its own entry.
pub fn analyze_tree(
    tree: &Value,
    relation_name: &str,
    catalog: &Catalog,
    max_depth: usize,
) -> SqlResult<Vec<SqlResult<Refs>>> {
    let statements = tree::statements(tree)?;
    Ok(statements
        .into_iter()
        .map(|statement| analyze_statement(statement, relation_name, catalog, max_depth))
        .collect())
}
