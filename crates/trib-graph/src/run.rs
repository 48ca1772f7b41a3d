//! Lineage run orchestration
//!
//! A run takes the models of one lineage, parses those given as SQL text,
//! classifies every statement and builds the dependency graph. A statement
//! that breaks the parse contract only loses its own edges; the report
//! counts what succeeded and what was skipped, with a reason for each.

use crate::bi::QueryHistoryEntry;
use crate::builder::{BuildResult, BuildSettings, DependenciesBuilder, SkippedEdge, StatementLineage};
use crate::error::GraphResult;
use crate::resolver::ResourceLookup;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use trib_core::{BiTool, Catalog, Config};
use trib_sql::{analyze_tree, SqlParserService};

impl From<&Config> for BuildSettings {
    fn from(config: &Config) -> Self {
        Self {
            lineage_id: config.lineage_id.clone(),
            organization_id: config.organization_id.clone(),
            max_concurrency: config.max_concurrency,
        }
    }
}

/// How a model's SQL is supplied
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// Raw SQL, parsed through the run's parser service
    Sql(String),
    /// An already parsed tree
    Tree(Value),
}

/// One model of the run
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub relation_name: String,
    pub source: ModelSource,
}

/// A statement that produced no refs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementFailure {
    pub relation_name: String,
    /// Position of the statement in its model; absent when the whole model failed
    pub statement_index: Option<usize>,
    pub reason: String,
}

/// Outcome counts of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub statements_succeeded: usize,
    pub statements_failed: Vec<StatementFailure>,
    pub edges_created: usize,
    pub edges_skipped: Vec<SkippedEdge>,
    pub dashboards_created: usize,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.statements_failed.is_empty()
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub statements: Vec<StatementLineage>,
    pub result: BuildResult,
    pub report: RunReport,
}

pub struct LineageRun<'a> {
    lookup: &'a dyn ResourceLookup,
    catalog: &'a Catalog,
    settings: BuildSettings,
    max_depth: usize,
    parser: Option<&'a dyn SqlParserService>,
    history: Option<(BiTool, Vec<QueryHistoryEntry>)>,
}

impl<'a> LineageRun<'a> {
    pub fn new(
        lookup: &'a dyn ResourceLookup,
        catalog: &'a Catalog,
        settings: BuildSettings,
        max_depth: usize,
    ) -> Self {
        Self {
            lookup,
            catalog,
            settings,
            max_depth,
            parser: None,
            history: None,
        }
    }

    /// Settings and limits taken from `tributary.yml`
    pub fn from_config(lookup: &'a dyn ResourceLookup, catalog: &'a Catalog, config: &Config) -> Self {
        Self::new(lookup, catalog, BuildSettings::from(config), config.max_depth)
    }

    pub fn with_parser(mut self, parser: &'a dyn SqlParserService) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn with_query_history(mut self, tool: BiTool, entries: Vec<QueryHistoryEntry>) -> Self {
        self.history = Some((tool, entries));
        self
    }

    /// Classify every statement of `models` and build their dependencies.
    ///
    /// Parser and lookup failures abort the run.
    pub async fn execute(&self, models: &[ModelInput]) -> GraphResult<RunOutput> {
        let width = self.settings.max_concurrency.max(1);
        let analyzed: Vec<GraphResult<ModelOutcome>> =
            stream::iter(models.iter().map(|model| self.analyze(model)))
                .buffered(width)
                .collect()
                .await;

        let mut report = RunReport::default();
        let mut statements = Vec::new();
        for outcome in analyzed {
            let outcome = outcome?;
            report.statements_succeeded += outcome.statements.len();
            report.statements_failed.extend(outcome.failures);
            statements.extend(outcome.statements);
        }

        let mut builder = DependenciesBuilder::new(self.lookup, self.catalog, self.settings.clone());
        if let Some((tool, entries)) = &self.history {
            builder = builder.with_query_history(*tool, entries.clone())?;
        }
        let result = builder.build(&statements).await?;

        report.edges_created = result.dependencies.len();
        report.edges_skipped = result.skipped.clone();
        report.dashboards_created = result.dashboards.len();
        log::debug!(
            "Run finished: {} statements ok, {} failed, {} edges, {} skipped",
            report.statements_succeeded,
            report.statements_failed.len(),
            report.edges_created,
            report.edges_skipped.len()
        );

        Ok(RunOutput {
            statements,
            result,
            report,
        })
    }

    async fn analyze(&self, model: &ModelInput) -> GraphResult<ModelOutcome> {
        let relation_name = model.relation_name.as_str();
        let parsed;
        let tree = match &model.source {
            ModelSource::Tree(tree) => tree,
            ModelSource::Sql(sql) => match self.parser {
                Some(parser) => {
                    parsed = parser.parse(sql).await?;
                    &parsed
                }
                None => {
                    return Ok(ModelOutcome::failed(
                        relation_name,
                        None,
                        "no SQL parser configured".to_string(),
                    ))
                }
            },
        };

        let results = match analyze_tree(tree, relation_name, self.catalog, self.max_depth) {
            Ok(results) => results,
            Err(err) => return Ok(ModelOutcome::failed(relation_name, None, err.to_string())),
        };

        let mut outcome = ModelOutcome::default();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(refs) => outcome.statements.push(StatementLineage {
                    relation_name: relation_name.to_string(),
                    refs,
                }),
                Err(err) => outcome.push_failure(relation_name, Some(index), err.to_string()),
            }
        }
        Ok(outcome)
    }
}

#[derive(Default)]
struct ModelOutcome {
    statements: Vec<StatementLineage>,
    failures: Vec<StatementFailure>,
}

impl ModelOutcome {
    fn failed(relation_name: &str, statement_index: Option<usize>, reason: String) -> Self {
        let mut outcome = Self::default();
        outcome.push_failure(relation_name, statement_index, reason);
        outcome
    }

    fn push_failure(&mut self, relation_name: &str, statement_index: Option<usize>, reason: String) {
        log::warn!("Statement of {} failed: {}", relation_name, reason);
        self.failures.push(StatementFailure {
            relation_name: relation_name.to_string(),
            statement_index,
            reason,
        });
    }
}
