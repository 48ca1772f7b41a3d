use super::*;
use trib_sql::{DependencyType, RefContext};

fn signatures() -> BiSignatures {
    BiSignatures::compile().unwrap()
}

fn column(name: &str, alias: Option<&str>, materialization: &str) -> ColumnRef {
    ColumnRef {
        name: name.to_string(),
        alias: alias.map(str::to_string),
        materialization_name: materialization.to_string(),
        schema_name: Some("S".to_string()),
        database_name: Some("DB".to_string()),
        warehouse_name: None,
        dependency_type: DependencyType::Data,
        is_wildcard_ref: false,
        is_compound_value_ref: false,
        context: RefContext {
            grammar_path: "select_clause_element.column_reference.identifier".to_string(),
            location: "0.0.0".to_string(),
        },
    }
}

const MODE_QUERY: &str = r#"-- {"url": "https://modeanalytics.com/acme/reports/4f2a", "user": "ana"}
SELECT AMOUNT FROM DB.S.ORDERS"#;

const METABASE_QUERY: &str =
    r#"SELECT "PUBLIC"."ORDERS"."AMOUNT" AS "AMOUNT" FROM "DB"."PUBLIC"."ORDERS""#;

// ── Tool signatures ─────────────────────────────────────────────────────

#[test]
fn test_mode_signature() {
    let sig = signatures();
    assert!(sig.matches(BiTool::Mode, &QueryHistoryEntry::new(MODE_QUERY)));
    assert!(!sig.matches(BiTool::Mode, &QueryHistoryEntry::new("SELECT 1")));
}

#[test]
fn test_tableau_signature_by_text_or_tag() {
    let sig = signatures();
    let by_text = QueryHistoryEntry::new(r#"SELECT 1 /* "TableauSQL" */"#);
    assert!(sig.matches(BiTool::Tableau, &by_text));

    let by_tag = QueryHistoryEntry {
        query_text: "SELECT 1".to_string(),
        query_tag: Some("Tableau Desktop".to_string()),
    };
    assert!(sig.matches(BiTool::Tableau, &by_tag));
    assert!(!sig.matches(BiTool::Tableau, &QueryHistoryEntry::new("SELECT 1")));
}

#[test]
fn test_metabase_signature() {
    let sig = signatures();
    assert!(sig.matches(BiTool::Metabase, &QueryHistoryEntry::new(METABASE_QUERY)));

    let probe = format!("{} WHERE 1 <> 1 LIMIT 0", METABASE_QUERY);
    assert!(!sig.matches(BiTool::Metabase, &QueryHistoryEntry::new(probe)));

    let sourced = METABASE_QUERY.replace("AS \"AMOUNT\"", "AS \"source\"");
    assert!(!sig.matches(BiTool::Metabase, &QueryHistoryEntry::new(sourced)));
}

#[test]
fn test_history_entry_accepts_warehouse_column_names() {
    let entry: QueryHistoryEntry =
        serde_json::from_str(r#"{"QUERY_TEXT": "SELECT 1", "QUERY_TAG": "tableau"}"#).unwrap();
    assert_eq!(entry.query_text, "SELECT 1");
    assert_eq!(entry.query_tag.as_deref(), Some("tableau"));
}

// ── Dashboard urls ──────────────────────────────────────────────────────

#[test]
fn test_dashboard_url_from_quoted_link() {
    let sig = signatures();
    assert_eq!(
        sig.dashboard_url(BiTool::Mode, MODE_QUERY),
        "https://modeanalytics.com/acme/reports/4f2a\""
    );
}

#[test]
fn test_dashboard_url_placeholder() {
    let url = signatures().dashboard_url(BiTool::Metabase, METABASE_QUERY);
    let id = url.strip_prefix("Metabase dashboard: ").unwrap();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
}

// ── Column matching ─────────────────────────────────────────────────────

#[test]
fn test_dashboard_refs_match_upper_cased_names() {
    let sig = signatures();
    let history = vec![
        QueryHistoryEntry::new(MODE_QUERY),
        QueryHistoryEntry::new("SELECT AMOUNT FROM DB.S.ORDERS"),
    ];
    let columns = vec![
        column("amount", None, "orders"),
        column("status", None, "orders"),
    ];

    let refs = dashboard_refs(&sig, BiTool::Mode, &columns, &history);
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].materialization_name, "ORDERS");
    assert_eq!(refs[0].column_name, "AMOUNT");
    assert_eq!(refs[0].schema_name.as_deref(), Some("S"));
    assert!(refs[0].name.is_none());
}

#[test]
fn test_dashboard_refs_use_alias() {
    let sig = signatures();
    let history = vec![QueryHistoryEntry::new(MODE_QUERY)];
    let columns = vec![column("raw_amount", Some("amount"), "orders")];
    assert_eq!(dashboard_refs(&sig, BiTool::Mode, &columns, &history).len(), 1);
}

// Bare substring matching: a column named ID also hits any text containing ID.
#[test]
fn test_dashboard_refs_substring_match_is_approximate() {
    let sig = signatures();
    let history = vec![QueryHistoryEntry::new(
        r#"-- "https://modeanalytics.com/r/1", SELECT ORDER_ID FROM ORDERS"#,
    )];
    let columns = vec![column("id", None, "orders")];
    assert_eq!(dashboard_refs(&sig, BiTool::Mode, &columns, &history).len(), 1);
}

// ── Dedup ───────────────────────────────────────────────────────────────

fn dashboard(url: &str, name: Option<&str>, column: &str) -> DashboardRef {
    DashboardRef {
        url: url.to_string(),
        name: name.map(str::to_string),
        materialization_name: "ORDERS".to_string(),
        schema_name: None,
        database_name: None,
        column_name: column.to_string(),
    }
}

#[test]
fn test_dedup_unnamed_by_column() {
    let unique = dedup_dashboard_refs(vec![
        dashboard("a", None, "AMOUNT"),
        dashboard("b", None, "AMOUNT"),
        dashboard("c", None, "STATUS"),
    ]);
    let urls: Vec<&str> = unique.iter().map(|d| d.url.as_str()).collect();
    assert_eq!(urls, vec!["a", "c"]);
}

#[test]
fn test_dedup_named_by_name() {
    let unique = dedup_dashboard_refs(vec![
        dashboard("a", Some("Revenue"), "AMOUNT"),
        dashboard("b", Some("revenue"), "STATUS"),
        dashboard("c", None, "STATUS"),
    ]);
    assert_eq!(unique.len(), 2);
}
