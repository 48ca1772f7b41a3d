//! The SQL parsing collaborator
//!
//! Parsing SQL text into a grammar tree is done by an external service. Its
//! failures are not parse-contract violations and surface as
//! [`crate::SqlError::ParserService`].

use crate::error::SqlResult;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait SqlParserService: Send + Sync {
    /// Parse SQL text into a tree rooted at `file`
    async fn parse(&self, sql: &str) -> SqlResult<Value>;
}
