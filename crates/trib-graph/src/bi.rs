//! BI query-history mining
//!
//! Each supported tool leaves a recognisable signature in the warehouse
//! query history. Entries matching the configured tool are scanned for the
//! upper-cased materialization and column names of a statement's refs; every
//! hit is a candidate dashboard reading that column. The scan is a bare
//! substring match and over- and under-matches by nature.

use crate::error::GraphResult;
use regex::Regex;
use serde::{Deserialize, Serialize};
use trib_core::{insensitive_eq, BiTool};
use trib_sql::ColumnRef;

const MODE_SIGNATURE: &str = r#"https://modeanalytics.com[^s"]+"#;
const TABLEAU_SIGNATURE: &str = r#""TableauSQL""#;
const TABLEAU_TAG: &str = "tableau";
const METABASE_RELATION: &str = r#"("[A-Za-z0-9_$]+".){2}("[A-Za-z0-9_$]+")"#;
const METABASE_EXCLUSIONS: [&str; 2] = ["WHERE 1 <> 1 LIMIT 0", "source"];
const DASHBOARD_URL: &str = r#""(https?:[^\s]+),"#;

/// One query-history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryHistoryEntry {
    #[serde(alias = "QUERY_TEXT")]
    pub query_text: String,
    #[serde(default, alias = "QUERY_TAG")]
    pub query_tag: Option<String>,
}

impl QueryHistoryEntry {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            query_tag: None,
        }
    }
}

/// Compiled signatures of every supported tool
#[derive(Debug, Clone)]
pub struct BiSignatures {
    mode: Regex,
    metabase_from: Regex,
    metabase_as: Regex,
    dashboard_url: Regex,
}

impl BiSignatures {
    pub fn compile() -> GraphResult<Self> {
        Ok(Self {
            mode: Regex::new(MODE_SIGNATURE)?,
            metabase_from: Regex::new(&format!("FROM {}", METABASE_RELATION))?,
            metabase_as: Regex::new(&format!("{} AS", METABASE_RELATION))?,
            dashboard_url: Regex::new(DASHBOARD_URL)?,
        })
    }

    /// Whether a history entry was issued by `tool`
    pub fn matches(&self, tool: BiTool, entry: &QueryHistoryEntry) -> bool {
        let text = entry.query_text.as_str();
        match tool {
            BiTool::Mode => self.mode.is_match(text),
            BiTool::Tableau => {
                text.contains(TABLEAU_SIGNATURE)
                    || entry
                        .query_tag
                        .as_deref()
                        .is_some_and(|tag| tag.to_lowercase().contains(TABLEAU_TAG))
            }
            BiTool::Metabase => {
                self.metabase_from.is_match(text)
                    && self.metabase_as.is_match(text)
                    && !METABASE_EXCLUSIONS.iter().any(|ex| text.contains(ex))
            }
        }
    }

    /// First quoted link followed by a comma, else a placeholder naming the tool
    pub fn dashboard_url(&self, tool: BiTool, text: &str) -> String {
        match self.dashboard_url.captures(text).and_then(|c| c.get(1)) {
            Some(url) => url.as_str().to_string(),
            None => format!("{} dashboard: {}", tool, uuid::Uuid::new_v4().simple()),
        }
    }
}

/// A dashboard that reads a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardRef {
    pub url: String,
    pub name: Option<String>,
    pub materialization_name: String,
    pub schema_name: Option<String>,
    pub database_name: Option<String>,
    pub column_name: String,
}

impl DashboardRef {
    /// Same dashboard: by name when both are named, otherwise by the column read
    fn same_as(&self, other: &DashboardRef) -> bool {
        match (&self.name, &other.name) {
            (Some(a), Some(b)) => insensitive_eq(a, b),
            (a, b) => {
                a == b
                    && insensitive_eq(&self.column_name, &other.column_name)
                    && insensitive_eq(&self.materialization_name, &other.materialization_name)
            }
        }
    }
}

/// Scan history entries of `tool` for the columns a statement references
pub fn dashboard_refs(
    signatures: &BiSignatures,
    tool: BiTool,
    columns: &[ColumnRef],
    history: &[QueryHistoryEntry],
) -> Vec<DashboardRef> {
    let entries: Vec<&QueryHistoryEntry> = history
        .iter()
        .filter(|entry| signatures.matches(tool, entry))
        .collect();

    let mut found = Vec::new();
    for column in columns {
        let materialization = column.materialization_name.to_uppercase();
        let name = column.alias_or_name().to_uppercase();
        for entry in &entries {
            let text = entry.query_text.as_str();
            if text.contains(&materialization) && text.contains(&name) {
                found.push(DashboardRef {
                    url: signatures.dashboard_url(tool, text),
                    name: None,
                    materialization_name: materialization.clone(),
                    schema_name: column.schema_name.clone(),
                    database_name: column.database_name.clone(),
                    column_name: name.clone(),
                });
            }
        }
    }
    found
}

/// Keep the first of every group of refs to the same dashboard
pub fn dedup_dashboard_refs(refs: Vec<DashboardRef>) -> Vec<DashboardRef> {
    let mut unique: Vec<DashboardRef> = Vec::with_capacity(refs.len());
    for candidate in refs {
        if !unique.iter().any(|kept| kept.same_as(&candidate)) {
            unique.push(candidate);
        }
    }
    unique
}

#[cfg(test)]
#[path = "bi_test.rs"]
mod tests;
