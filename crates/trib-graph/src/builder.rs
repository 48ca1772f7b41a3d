//! Dependency graph builder
//!
//! Turns the classified refs of every statement in a run into column-level
//! `Data` edges and, when query history is supplied, into dashboard records
//! with their `External` edges. Statements are independent of each other and
//! are processed concurrently; the columns of one statement fan out again.
//! Resolution gaps never fail the run: they become [`SkippedEdge`] entries.

use crate::bi::{
    dashboard_refs, dedup_dashboard_refs, BiSignatures, DashboardRef, QueryHistoryEntry,
};
use crate::error::GraphResult;
use crate::resolver::ResourceLookup;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use trib_core::{
    BiTool, Catalog, Dashboard, Dependency, DependencyKind, LineageId, MaterializationRecord,
    OrganizationId, QualifiedName, ResourceId,
};
use trib_sql::{ColumnRef, DependencyType, GrammarTag, Refs};

/// Classified refs of one statement and the relation it populates
#[derive(Debug, Clone, Serialize)]
pub struct StatementLineage {
    pub relation_name: String,
    pub refs: Refs,
}

/// Per-run settings of the builder
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub lineage_id: LineageId,
    pub organization_id: OrganizationId,
    /// Width of the statement and column fan-out
    pub max_concurrency: usize,
}

/// An edge that could not be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEdge {
    pub relation_name: String,
    pub reference: String,
    pub reason: String,
}

/// Everything a build produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildResult {
    pub dependencies: Vec<Dependency>,
    pub dashboards: Vec<Dashboard>,
    pub skipped: Vec<SkippedEdge>,
}

struct QueryHistory {
    tool: BiTool,
    signatures: BiSignatures,
    entries: Vec<QueryHistoryEntry>,
}

enum EdgeOutcome {
    Created(Dependency),
    Skipped(String),
}

#[derive(Default)]
struct StatementEdges {
    dependencies: Vec<Dependency>,
    skipped: Vec<SkippedEdge>,
    dashboards: Vec<(String, DashboardRef)>,
}

impl StatementEdges {
    fn skip(&mut self, relation_name: &str, reference: String, reason: String) {
        log::warn!("Skipping edge {} -> {}: {}", relation_name, reference, reason);
        self.skipped.push(SkippedEdge {
            relation_name: relation_name.to_string(),
            reference,
            reason,
        });
    }
}

pub struct DependenciesBuilder<'a> {
    lookup: &'a dyn ResourceLookup,
    catalog: &'a Catalog,
    settings: BuildSettings,
    history: Option<QueryHistory>,
}

impl<'a> DependenciesBuilder<'a> {
    pub fn new(lookup: &'a dyn ResourceLookup, catalog: &'a Catalog, settings: BuildSettings) -> Self {
        Self {
            lookup,
            catalog,
            settings,
            history: None,
        }
    }

    /// Mine `entries` for dashboards of `tool`
    pub fn with_query_history(
        mut self,
        tool: BiTool,
        entries: Vec<QueryHistoryEntry>,
    ) -> GraphResult<Self> {
        self.history = Some(QueryHistory {
            tool,
            signatures: BiSignatures::compile()?,
            entries,
        });
        Ok(self)
    }

    fn width(&self) -> usize {
        self.settings.max_concurrency.max(1)
    }

    /// Build the edges of every statement.
    ///
    /// A lookup failure aborts the build; statements still in flight run to
    /// completion but their results are dropped.
    pub async fn build(&self, statements: &[StatementLineage]) -> GraphResult<BuildResult> {
        let outcomes: Vec<GraphResult<StatementEdges>> = stream::iter(
            statements
                .iter()
                .map(|statement| self.statement_edges(statement)),
        )
        .buffered(self.width())
        .collect()
        .await;

        let mut result = BuildResult::default();
        let mut seen: HashSet<(ResourceId, ResourceId, DependencyKind)> = HashSet::new();
        let mut dashboard_candidates = Vec::new();
        for outcome in outcomes {
            let edges = outcome?;
            for dependency in edges.dependencies {
                push_unique(&mut result.dependencies, &mut seen, dependency);
            }
            result.skipped.extend(edges.skipped);
            dashboard_candidates.extend(edges.dashboards);
        }

        if !dashboard_candidates.is_empty() {
            self.build_dashboards(dashboard_candidates, &mut result, &mut seen)
                .await?;
        }

        log::debug!(
            "Built {} dependencies and {} dashboards, skipped {} edges",
            result.dependencies.len(),
            result.dashboards.len(),
            result.skipped.len()
        );
        Ok(result)
    }

    async fn statement_edges(&self, statement: &StatementLineage) -> GraphResult<StatementEdges> {
        let mut edges = StatementEdges::default();
        let relation_name = statement.relation_name.as_str();
        let relation = match QualifiedName::relation(relation_name) {
            Ok(relation) => relation,
            Err(err) => {
                edges.skip(relation_name, relation_name.to_string(), err.to_string());
                return Ok(edges);
            }
        };

        if let Some(history) = &self.history {
            edges.dashboards = dashboard_refs(
                &history.signatures,
                history.tool,
                &statement.refs.columns,
                &history.entries,
            )
            .into_iter()
            .map(|dashboard| (relation_name.to_string(), dashboard))
            .collect();
        }

        let mut columns = data_columns(&statement.refs);
        for wildcard in statement
            .refs
            .wildcards
            .iter()
            .filter(|w| w.dependency_type == DependencyType::Data)
        {
            match expand_wildcard(wildcard, self.catalog) {
                Ok(expanded) => columns.extend(expanded),
                Err(reason) => edges.skip(relation_name, describe(wildcard), reason),
            }
        }
        if columns.is_empty() {
            return Ok(edges);
        }

        let Some(own) = self.lookup.find_materialization(&relation).await? else {
            for column in &columns {
                edges.skip(
                    relation_name,
                    describe(column),
                    format!("no materialization record for {}", relation),
                );
            }
            return Ok(edges);
        };

        let outcomes: Vec<GraphResult<EdgeOutcome>> =
            stream::iter(columns.iter().map(|column| self.data_edge(&own, column)))
                .buffered(self.width())
                .collect()
                .await;
        for (column, outcome) in columns.iter().zip(outcomes) {
            match outcome? {
                EdgeOutcome::Created(dependency) => edges.dependencies.push(dependency),
                EdgeOutcome::Skipped(reason) => edges.skip(relation_name, describe(column), reason),
            }
        }
        Ok(edges)
    }

    /// Edge from the statement's own column (head) to the column it reads (tail)
    async fn data_edge(
        &self,
        own: &MaterializationRecord,
        column: &ColumnRef,
    ) -> GraphResult<EdgeOutcome> {
        let head_name = column.alias_or_name();
        let Some(head) = self.lookup.find_column(head_name, &own.id).await? else {
            return Ok(EdgeOutcome::Skipped(format!(
                "no column '{}' on {}",
                head_name, own.relation_name
            )));
        };

        let upstream_name = column.materialization();
        let Some(upstream) = self.lookup.find_materialization(&upstream_name).await? else {
            return Ok(EdgeOutcome::Skipped(format!(
                "no materialization record for {}",
                upstream_name
            )));
        };
        let Some(tail) = self.lookup.find_column(&column.name, &upstream.id).await? else {
            return Ok(EdgeOutcome::Skipped(format!(
                "no column '{}' on {}",
                column.name, upstream.relation_name
            )));
        };

        if head.id == tail.id {
            return Ok(EdgeOutcome::Skipped("column reads itself".to_string()));
        }
        Ok(EdgeOutcome::Created(Dependency::create(
            DependencyKind::Data,
            head.id,
            tail.id,
            self.settings.lineage_id.clone(),
            self.settings.organization_id.clone(),
        )))
    }

    async fn build_dashboards(
        &self,
        candidates: Vec<(String, DashboardRef)>,
        result: &mut BuildResult,
        seen: &mut HashSet<(ResourceId, ResourceId, DependencyKind)>,
    ) -> GraphResult<()> {
        let (relations, refs): (Vec<String>, Vec<DashboardRef>) = candidates.into_iter().unzip();
        let unique = dedup_dashboard_refs(refs.clone());
        log::debug!(
            "{} dashboard candidates, {} unique",
            refs.len(),
            unique.len()
        );

        let outcomes: Vec<GraphResult<Result<(Dashboard, Dependency), String>>> =
            stream::iter(unique.iter().map(|dashboard| self.dashboard_edge(dashboard)))
                .buffered(self.width())
                .collect()
                .await;
        for (dashboard_ref, outcome) in unique.iter().zip(outcomes) {
            match outcome? {
                Ok((dashboard, dependency)) => {
                    result.dashboards.push(dashboard);
                    push_unique(&mut result.dependencies, seen, dependency);
                }
                Err(reason) => {
                    let relation_name = refs
                        .iter()
                        .position(|r| r == dashboard_ref)
                        .and_then(|i| relations.get(i))
                        .cloned()
                        .unwrap_or_default();
                    log::warn!("Skipping dashboard {}: {}", dashboard_ref.url, reason);
                    result.skipped.push(SkippedEdge {
                        relation_name,
                        reference: dashboard_ref.url.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }

    async fn dashboard_edge(
        &self,
        dashboard_ref: &DashboardRef,
    ) -> GraphResult<Result<(Dashboard, Dependency), String>> {
        let name = QualifiedName {
            name: dashboard_ref.materialization_name.clone(),
            schema: dashboard_ref.schema_name.clone(),
            database: dashboard_ref.database_name.clone(),
            warehouse: None,
        };
        let Some(materialization) = self.lookup.find_materialization(&name).await? else {
            return Ok(Err(format!("no materialization record for {}", name)));
        };
        let Some(column) = self
            .lookup
            .find_column(&dashboard_ref.column_name, &materialization.id)
            .await?
        else {
            return Ok(Err(format!(
                "no column '{}' on {}",
                dashboard_ref.column_name, materialization.relation_name
            )));
        };

        let dashboard = Dashboard::create(
            Some(dashboard_ref.url.clone()),
            dashboard_ref.name.clone(),
            &materialization.name,
            materialization.id.clone(),
            &column.name,
            column.id.clone(),
            self.settings.lineage_id.clone(),
            self.settings.organization_id.clone(),
        )?;
        let dependency = Dependency::create(
            DependencyKind::External,
            dashboard.id.clone(),
            column.id,
            self.settings.lineage_id.clone(),
            self.settings.organization_id.clone(),
        );
        Ok(Ok((dashboard, dependency)))
    }
}

fn push_unique(
    dependencies: &mut Vec<Dependency>,
    seen: &mut HashSet<(ResourceId, ResourceId, DependencyKind)>,
    dependency: Dependency,
) {
    let (head, tail, kind) = dependency.natural_key();
    if seen.insert((head.clone(), tail.clone(), kind)) {
        dependencies.push(dependency);
    }
}

fn describe(column: &ColumnRef) -> String {
    format!("{}.{}", column.materialization(), column.name)
}

/// `Data` column refs that produce edges.
///
/// Compound value refs are skipped. Refs below a `set_expression` are
/// re-emitted per assignment and are kept once per name, path and
/// materialization.
pub fn data_columns(refs: &Refs) -> Vec<ColumnRef> {
    let mut seen = HashSet::new();
    refs.columns_of_type(DependencyType::Data)
        .filter(|column| !column.is_compound_value_ref)
        .filter(|column| {
            !column.context.has_tag(&GrammarTag::SetExpression)
                || seen.insert((
                    column.name.clone(),
                    column.context.grammar_path.clone(),
                    column.materialization_name.clone(),
                ))
        })
        .cloned()
        .collect()
}

/// One column ref per catalog column of the wildcard's materialization.
///
/// The materialization must match exactly one catalog entry; otherwise the
/// reason is returned.
pub fn expand_wildcard(wildcard: &ColumnRef, catalog: &Catalog) -> Result<Vec<ColumnRef>, String> {
    let matches = catalog.matching(
        &wildcard.materialization_name,
        wildcard.schema_name.as_deref(),
        wildcard.database_name.as_deref(),
    );
    match matches.as_slice() {
        [entry] => Ok(entry
            .column_names
            .iter()
            .map(|column| ColumnRef {
                name: column.clone(),
                ..wildcard.clone()
            })
            .collect()),
        [] => Err(format!(
            "no catalog entry for wildcard on {}",
            wildcard.materialization()
        )),
        many => Err(format!(
            "{} catalog entries match wildcard on {}",
            many.len(),
            wildcard.materialization()
        )),
    }
}

#[cfg(test)]
#[path = "builder_test.rs"]
mod tests;
