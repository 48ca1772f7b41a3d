//! Lineage runs from parser output to dependency records

use async_trait::async_trait;
use serde_json::Value;
use trib_core::{Catalog, LineageId, ModelRepresentation, OrganizationId, QualifiedName};
use trib_graph::{
    BuildSettings, CatalogResources, GraphError, LineageGraph, LineageRun, ModelInput,
    ModelSource, ResourceLookup,
};
use trib_sql::{SqlError, SqlParserService, SqlResult, DEFAULT_MAX_DEPTH};

fn fixture(name: &str) -> Value {
    let text = match name {
        "create_table_as_select" => include_str!("fixtures/create_table_as_select.json"),
        "select_star" => include_str!("fixtures/select_star.json"),
        "orders_rollup" => include_str!("fixtures/orders_rollup.json"),
        other => panic!("unknown fixture {}", other),
    };
    serde_json::from_str(text).unwrap()
}

fn entry(relation: &str, columns: &[&str]) -> ModelRepresentation {
    let parts: Vec<&str> = relation.split('.').collect();
    ModelRepresentation {
        relation_name: relation.to_string(),
        materialization_name: parts[2].to_string(),
        schema_name: parts[1].to_string(),
        database_name: parts[0].to_string(),
        column_names: columns.iter().map(|c| c.to_string()).collect(),
    }
}

fn catalog() -> Catalog {
    Catalog::new(vec![
        entry("DB.S.U", &["X"]),
        entry("DB.S.T", &["Y"]),
        entry("DB.S.W", &["COL1", "COL2"]),
        entry("DB.S.OUT", &["COL1", "COL2"]),
        entry("ANALYTICS.STAGING.ORDERS", &["CUSTOMER_ID", "AMOUNT", "STATUS"]),
        entry("ANALYTICS.MARTS.CUSTOMER_TOTALS", &["CUSTOMER_ID", "TOTAL_AMOUNT"]),
    ])
}

fn settings() -> BuildSettings {
    BuildSettings {
        lineage_id: LineageId::try_new("run-1").unwrap(),
        organization_id: OrganizationId::try_new("org-1").unwrap(),
        max_concurrency: 2,
    }
}

fn tree_model(relation: &str, fixture_name: &str) -> ModelInput {
    ModelInput {
        relation_name: relation.to_string(),
        source: ModelSource::Tree(fixture(fixture_name)),
    }
}

fn sql_model(relation: &str, sql: &str) -> ModelInput {
    ModelInput {
        relation_name: relation.to_string(),
        source: ModelSource::Sql(sql.to_string()),
    }
}

struct FixtureParser;

#[async_trait]
impl SqlParserService for FixtureParser {
    async fn parse(&self, sql: &str) -> SqlResult<Value> {
        if sql.contains("orders") {
            Ok(fixture("orders_rollup"))
        } else {
            Err(SqlError::ParserService("parser unavailable".to_string()))
        }
    }
}

// ── Full run ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_reports_statements_and_edges() {
    let catalog = catalog();
    let resources = CatalogResources::from_catalog(&catalog);
    let parser = FixtureParser;
    let run = LineageRun::new(&resources, &catalog, settings(), DEFAULT_MAX_DEPTH).with_parser(&parser);

    let models = vec![
        tree_model("DB.S.T", "create_table_as_select"),
        tree_model("DB.S.OUT", "select_star"),
        sql_model("ANALYTICS.MARTS.CUSTOMER_TOTALS", "select ... from orders"),
    ];
    let output = run.execute(&models).await.unwrap();
    let report = &output.report;

    assert_eq!(report.statements_succeeded, 3);
    assert_eq!(report.statements_failed.len(), 1);
    let failure = &report.statements_failed[0];
    assert_eq!(failure.relation_name, "ANALYTICS.MARTS.CUSTOMER_TOTALS");
    assert_eq!(failure.statement_index, Some(1));
    assert!(failure.reason.starts_with("[S002]"));

    assert_eq!(report.edges_created, 5);
    assert!(report.edges_skipped.is_empty());
    assert_eq!(report.dashboards_created, 0);
    assert_eq!(output.statements.len(), 3);
}

#[tokio::test]
async fn test_run_output_forms_a_lineage_graph() {
    let catalog = catalog();
    let resources = CatalogResources::from_catalog(&catalog);
    let run = LineageRun::new(&resources, &catalog, settings(), DEFAULT_MAX_DEPTH);

    let output = run
        .execute(&[tree_model("DB.S.T", "create_table_as_select")])
        .await
        .unwrap();
    let graph = LineageGraph::from_dependencies(&output.result.dependencies);
    assert_eq!(graph.edge_count(), 1);

    let t = resources
        .find_materialization(&QualifiedName::parse("DB.S.T"))
        .await
        .unwrap()
        .unwrap();
    let y = resources.find_column("Y", &t.id).await.unwrap().unwrap();
    let upstream = graph.upstream(&y.id);
    assert_eq!(upstream.len(), 1);

    let dot = graph.to_dot(&resources.labels());
    assert!(dot.contains("[label=\"DB.S.U.X\"]"));
    assert!(dot.contains("[label=\"DB.S.T.Y\"]"));
}

// ── Failures ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sql_without_parser_fails_the_model_only() {
    let catalog = catalog();
    let resources = CatalogResources::from_catalog(&catalog);
    let run = LineageRun::new(&resources, &catalog, settings(), DEFAULT_MAX_DEPTH);

    let models = vec![
        sql_model("ANALYTICS.MARTS.CUSTOMER_TOTALS", "select ... from orders"),
        tree_model("DB.S.OUT", "select_star"),
    ];
    let output = run.execute(&models).await.unwrap();
    assert_eq!(output.report.statements_succeeded, 1);
    assert_eq!(output.report.statements_failed[0].statement_index, None);
    assert_eq!(output.report.edges_created, 2);
}

#[tokio::test]
async fn test_parser_failure_aborts_the_run() {
    let catalog = catalog();
    let resources = CatalogResources::from_catalog(&catalog);
    let parser = FixtureParser;
    let run = LineageRun::new(&resources, &catalog, settings(), DEFAULT_MAX_DEPTH).with_parser(&parser);

    let models = vec![
        tree_model("DB.S.T", "create_table_as_select"),
        sql_model("DB.S.OUT", "select * from w"),
    ];
    let err = run.execute(&models).await.unwrap_err();
    assert!(matches!(err, GraphError::Parser(SqlError::ParserService(_))));
}

#[tokio::test]
async fn test_model_without_statements_is_reported() {
    let catalog = catalog();
    let resources = CatalogResources::from_catalog(&catalog);
    let run = LineageRun::new(&resources, &catalog, settings(), DEFAULT_MAX_DEPTH);

    let models = vec![ModelInput {
        relation_name: "DB.S.T".to_string(),
        source: ModelSource::Tree(serde_json::json!({"file": [{"newline": "\n"}]})),
    }];
    let output = run.execute(&models).await.unwrap();
    assert_eq!(output.report.statements_succeeded, 0);
    assert!(output.report.has_failures());
    assert_eq!(output.report.edges_created, 0);
}
