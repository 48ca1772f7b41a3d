use super::*;
use crate::error::GraphError;
use crate::resolver::CatalogResources;
use async_trait::async_trait;
use trib_core::{ColumnRecord, ModelRepresentation};
use trib_sql::{MaterializationKind, MaterializationRef, RefContext};

fn entry(name: &str, columns: &[&str]) -> ModelRepresentation {
    ModelRepresentation {
        relation_name: format!("DB.S.{}", name),
        materialization_name: name.to_string(),
        schema_name: "S".to_string(),
        database_name: "DB".to_string(),
        column_names: columns.iter().map(|c| c.to_string()).collect(),
    }
}

fn catalog() -> Catalog {
    Catalog::new(vec![
        entry("U", &["X", "Z"]),
        entry("T", &["Y", "Z"]),
        entry("W", &["COL1", "COL2"]),
        entry("OUT", &["COL1", "COL2"]),
        entry("ORDERS", &["AMOUNT", "STATUS"]),
    ])
}

fn settings() -> BuildSettings {
    BuildSettings {
        lineage_id: LineageId::try_new("run-1").unwrap(),
        organization_id: OrganizationId::try_new("org-1").unwrap(),
        max_concurrency: 4,
    }
}

fn context(grammar_path: &str) -> RefContext {
    RefContext {
        grammar_path: grammar_path.to_string(),
        location: "0.0.1.0".to_string(),
    }
}

fn column(name: &str, alias: Option<&str>, materialization: &str, dt: DependencyType) -> ColumnRef {
    ColumnRef {
        name: name.to_string(),
        alias: alias.map(str::to_string),
        materialization_name: materialization.to_string(),
        schema_name: Some("S".to_string()),
        database_name: Some("DB".to_string()),
        warehouse_name: None,
        dependency_type: dt,
        is_wildcard_ref: false,
        is_compound_value_ref: false,
        context: context("select_clause.select_clause_element.column_reference.identifier"),
    }
}

fn wildcard(materialization: &str, schema: Option<&str>) -> ColumnRef {
    ColumnRef {
        is_wildcard_ref: true,
        schema_name: schema.map(str::to_string),
        database_name: None,
        context: context("select_clause.select_clause_element.wildcard_expression.wildcard_identifier"),
        ..column("*", None, materialization, DependencyType::Data)
    }
}

fn own(name: &str) -> MaterializationRef {
    MaterializationRef {
        name: name.to_string(),
        alias: None,
        schema_name: Some("S".to_string()),
        database_name: Some("DB".to_string()),
        warehouse_name: None,
        kind: MaterializationKind::SelfRef,
        contexts: Vec::new(),
    }
}

fn statement(relation: &str, columns: Vec<ColumnRef>, wildcards: Vec<ColumnRef>) -> StatementLineage {
    let name = relation.rsplit('.').next().unwrap_or(relation);
    StatementLineage {
        relation_name: relation.to_string(),
        refs: Refs {
            materializations: vec![own(name)],
            columns,
            wildcards,
        },
    }
}

async fn column_id(res: &CatalogResources, relation: &str, column: &str) -> ResourceId {
    let materialization = res
        .find_materialization(&QualifiedName::parse(relation))
        .await
        .unwrap()
        .unwrap();
    res.find_column(column, &materialization.id)
        .await
        .unwrap()
        .unwrap()
        .id
}

// ── Data edges ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_data_edge_runs_from_own_column_to_upstream_column() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let builder = DependenciesBuilder::new(&res, &catalog, settings());

    let statements = vec![statement(
        "DB.S.T",
        vec![column("X", Some("Y"), "U", DependencyType::Data)],
        vec![],
    )];
    let result = builder.build(&statements).await.unwrap();

    assert!(result.skipped.is_empty());
    assert_eq!(result.dependencies.len(), 1);
    let dep = &result.dependencies[0];
    assert_eq!(dep.kind(), DependencyKind::Data);
    assert_eq!(dep.head_id(), &column_id(&res, "DB.S.T", "Y").await);
    assert_eq!(dep.tail_id(), &column_id(&res, "DB.S.U", "X").await);
    assert_eq!(dep.lineage_ids()[0].as_str(), "run-1");
}

#[tokio::test]
async fn test_non_data_and_compound_refs_produce_no_edges() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let builder = DependenciesBuilder::new(&res, &catalog, settings());

    let compound = ColumnRef {
        is_compound_value_ref: true,
        ..column("Z", None, "U", DependencyType::Data)
    };
    let statements = vec![statement(
        "DB.S.T",
        vec![
            column("Z", None, "U", DependencyType::Query),
            column("Y", None, "T", DependencyType::Definition),
            compound,
        ],
        vec![],
    )];
    let result = builder.build(&statements).await.unwrap();
    assert!(result.dependencies.is_empty());
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn test_duplicate_edges_are_kept_once() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let builder = DependenciesBuilder::new(&res, &catalog, settings());

    let statements = vec![
        statement("DB.S.T", vec![column("Z", None, "U", DependencyType::Data)], vec![]),
        statement("DB.S.T", vec![column("Z", None, "U", DependencyType::Data)], vec![]),
    ];
    let result = builder.build(&statements).await.unwrap();
    assert_eq!(result.dependencies.len(), 1);
}

// ── Skipped edges ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_records_skip_the_edge_only() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let builder = DependenciesBuilder::new(&res, &catalog, settings());

    let statements = vec![statement(
        "DB.S.T",
        vec![
            column("NOPE", None, "U", DependencyType::Data),
            column("X", None, "GHOST", DependencyType::Data),
            column("Z", None, "U", DependencyType::Data),
        ],
        vec![],
    )];
    let result = builder.build(&statements).await.unwrap();

    assert_eq!(result.dependencies.len(), 1);
    let reasons: Vec<&str> = result.skipped.iter().map(|s| s.reason.as_str()).collect();
    assert_eq!(
        reasons,
        vec!["no column 'NOPE' on DB.S.T", "no column 'X' on DB.S.T"]
    );
    assert_eq!(result.skipped[0].reference, "DB.S.U.NOPE");
}

#[tokio::test]
async fn test_unknown_upstream_materialization_is_skipped() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let builder = DependenciesBuilder::new(&res, &catalog, settings());

    let statements = vec![statement(
        "DB.S.T",
        vec![column("X", Some("Y"), "GHOST", DependencyType::Data)],
        vec![],
    )];
    let result = builder.build(&statements).await.unwrap();
    assert!(result.dependencies.is_empty());
    assert_eq!(result.skipped[0].reason, "no materialization record for DB.S.GHOST");
}

#[tokio::test]
async fn test_invalid_relation_name_skips_statement() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let builder = DependenciesBuilder::new(&res, &catalog, settings());

    let statements = vec![statement(
        "T",
        vec![column("X", Some("Y"), "U", DependencyType::Data)],
        vec![],
    )];
    let result = builder.build(&statements).await.unwrap();
    assert!(result.dependencies.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert!(result.skipped[0].reason.contains("E005"));
}

// ── Wildcards ───────────────────────────────────────────────────────────

#[test]
fn test_expand_wildcard_yields_one_ref_per_catalog_column() {
    let expanded = expand_wildcard(&wildcard("W", Some("S")), &catalog()).unwrap();
    let names: Vec<&str> = expanded.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["COL1", "COL2"]);
    assert!(expanded.iter().all(|c| c.materialization_name == "W"));
}

#[test]
fn test_expand_wildcard_needs_exactly_one_entry() {
    let mut entries = catalog().entries().to_vec();
    entries.push(ModelRepresentation {
        schema_name: "OTHER".to_string(),
        relation_name: "DB.OTHER.W".to_string(),
        ..entry("W", &["COL9"])
    });
    let ambiguous = Catalog::new(entries);

    let err = expand_wildcard(&wildcard("W", None), &ambiguous).unwrap_err();
    assert_eq!(err, "2 catalog entries match wildcard on W");
    assert!(expand_wildcard(&wildcard("W", Some("OTHER")), &ambiguous).is_ok());
    assert!(expand_wildcard(&wildcard("MISSING", None), &ambiguous).is_err());
}

#[tokio::test]
async fn test_wildcard_edges() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let builder = DependenciesBuilder::new(&res, &catalog, settings());

    let statements = vec![statement(
        "DB.S.OUT",
        vec![],
        vec![
            wildcard("W", Some("S")),
            wildcard("MISSING", None),
            ColumnRef {
                dependency_type: DependencyType::Query,
                ..wildcard("U", Some("S"))
            },
        ],
    )];
    let result = builder.build(&statements).await.unwrap();
    assert_eq!(result.dependencies.len(), 2);
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].reference, "MISSING.*");
}

// ── Set expressions ─────────────────────────────────────────────────────

#[test]
fn test_data_columns_dedup_set_expression_refs() {
    let in_set = ColumnRef {
        context: context("set_expression.select_statement.select_clause_element.column_reference.identifier"),
        ..column("Z", None, "U", DependencyType::Data)
    };
    let refs = Refs {
        materializations: vec![own("T")],
        columns: vec![
            in_set.clone(),
            in_set,
            column("X", None, "U", DependencyType::Data),
            column("X", None, "U", DependencyType::Data),
        ],
        wildcards: vec![],
    };
    let names: Vec<String> = data_columns(&refs).into_iter().map(|c| c.name).collect();
    assert_eq!(names, vec!["Z", "X", "X"]);
}

// ── Dashboards ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dashboard_with_external_edge() {
    let catalog = catalog();
    let res = CatalogResources::from_catalog(&catalog);
    let history = vec![
        QueryHistoryEntry::new(
            r#"-- {"url": "https://modeanalytics.com/acme/reports/1", "x": 1}
SELECT AMOUNT FROM DB.S.ORDERS"#,
        ),
        QueryHistoryEntry::new(
            r#"-- {"url": "https://modeanalytics.com/acme/reports/2", "x": 1}
SELECT SUM(AMOUNT) FROM ORDERS"#,
        ),
    ];
    let builder = DependenciesBuilder::new(&res, &catalog, settings())
        .with_query_history(BiTool::Mode, history)
        .unwrap();

    let statements = vec![statement(
        "DB.S.T",
        vec![column("AMOUNT", None, "ORDERS", DependencyType::Query)],
        vec![],
    )];
    let result = builder.build(&statements).await.unwrap();

    assert_eq!(result.dashboards.len(), 1);
    let dashboard = &result.dashboards[0];
    assert_eq!(
        dashboard.url.as_deref(),
        Some("https://modeanalytics.com/acme/reports/1\"")
    );
    assert_eq!(dashboard.column_name, "AMOUNT");

    let external: Vec<&Dependency> = result
        .dependencies
        .iter()
        .filter(|d| d.kind() == DependencyKind::External)
        .collect();
    assert_eq!(external.len(), 1);
    assert_eq!(external[0].head_id(), &dashboard.id);
    assert_eq!(external[0].tail_id(), &column_id(&res, "DB.S.ORDERS", "AMOUNT").await);
}

// ── Collaborator failures ───────────────────────────────────────────────

struct BrokenLookup;

#[async_trait]
impl ResourceLookup for BrokenLookup {
    async fn find_materialization(
        &self,
        _name: &QualifiedName,
    ) -> GraphResult<Option<MaterializationRecord>> {
        Err(GraphError::Lookup("connection reset".to_string()))
    }

    async fn find_column(
        &self,
        _name: &str,
        _materialization_id: &ResourceId,
    ) -> GraphResult<Option<ColumnRecord>> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_lookup_failure_aborts_build() {
    let catalog = catalog();
    let builder = DependenciesBuilder::new(&BrokenLookup, &catalog, settings());
    let statements = vec![statement(
        "DB.S.T",
        vec![column("X", Some("Y"), "U", DependencyType::Data)],
        vec![],
    )];
    let err = builder.build(&statements).await.unwrap_err();
    assert!(matches!(err, GraphError::Lookup(_)));
}
