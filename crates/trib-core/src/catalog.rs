//! Read-only catalog of known warehouse objects and their columns
//!
//! Supplied once per lineage run. Used for wildcard expansion, positional
//! (`$n`) column resolution and as a tie-break source when a column could be
//! bound to more than one materialization.

use crate::error::{CoreError, CoreResult};
use crate::name::{equal_or_either_unknown, insensitive_eq};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRepresentation {
    /// Fully qualified `database.schema.name` relation
    pub relation_name: String,
    /// Object name
    pub materialization_name: String,
    /// Schema name
    pub schema_name: String,
    /// Database name
    pub database_name: String,
    /// Column names in ordinal order
    #[serde(default)]
    pub column_names: Vec<String>,
}

impl ModelRepresentation {
    /// Whether the entry lists `column` (case-insensitive)
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| insensitive_eq(c, column))
    }
}

/// The catalog for one lineage run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: Vec<ModelRepresentation>,
}

impl Catalog {
    /// Create a catalog from its entries
    pub fn new(entries: Vec<ModelRepresentation>) -> Self {
        Self { entries }
    }

    /// Load a catalog from a YAML or JSON file (a list of entries)
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        // YAML is a superset of JSON, one parser covers both
        let entries: Vec<ModelRepresentation> =
            serde_yaml::from_str(&content).map_err(|e| CoreError::CatalogParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::new(entries))
    }

    /// All entries
    pub fn entries(&self) -> &[ModelRepresentation] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose object name equals `materialization`
    pub fn by_materialization(&self, materialization: &str) -> Vec<&ModelRepresentation> {
        self.entries
            .iter()
            .filter(|e| insensitive_eq(&e.materialization_name, materialization))
            .collect()
    }

    /// Entries matching a materialization name plus schema/database where known
    pub fn matching(
        &self,
        materialization: &str,
        schema: Option<&str>,
        database: Option<&str>,
    ) -> Vec<&ModelRepresentation> {
        self.by_materialization(materialization)
            .into_iter()
            .filter(|e| {
                equal_or_either_unknown(schema, Some(&e.schema_name))
                    && equal_or_either_unknown(database, Some(&e.database_name))
            })
            .collect()
    }

    /// Whether any entry for `materialization` lists `column`
    pub fn lists_column(&self, materialization: &str, column: &str) -> bool {
        self.by_materialization(materialization)
            .into_iter()
            .any(|e| e.has_column(column))
    }

    /// Column name at 1-based `position` of `materialization`
    pub fn column_at(&self, materialization: &str, position: usize) -> Option<&str> {
        let index = position.checked_sub(1)?;
        self.by_materialization(materialization)
            .into_iter()
            .find_map(|e| e.column_names.get(index).map(String::as_str))
    }
}

impl From<Vec<ModelRepresentation>> for Catalog {
    fn from(entries: Vec<ModelRepresentation>) -> Self {
        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_matching_uses_known_qualifiers() {
        let catalog = Catalog::new(vec![
            entry("DB.S1.T", &["A"]),
            entry("DB.S2.T", &["B"]),
        ]);

        assert_eq!(catalog.matching("t", None, None).len(), 2);
        assert_eq!(catalog.matching("T", Some("s1"), None).len(), 1);
        assert_eq!(catalog.matching("T", Some("S3"), None).len(), 0);
        assert_eq!(catalog.matching("T", None, Some("DB")).len(), 2);
    }

    #[test]
    fn test_lists_column_case_insensitive() {
        let catalog = Catalog::new(vec![entry("DB.S.T", &["Amount"])]);
        assert!(catalog.lists_column("t", "AMOUNT"));
        assert!(!catalog.lists_column("t", "OTHER"));
        assert!(!catalog.lists_column("u", "AMOUNT"));
    }

    #[test]
    fn test_column_at_is_one_based() {
        let catalog = Catalog::new(vec![entry("DB.S.T", &["A", "B", "C"])]);
        assert_eq!(catalog.column_at("T", 1), Some("A"));
        assert_eq!(catalog.column_at("T", 3), Some("C"));
        assert_eq!(catalog.column_at("T", 0), None);
        assert_eq!(catalog.column_at("T", 4), None);
    }

    #[test]
    fn test_lookups_outlive_the_name_argument() {
        let catalog = Catalog::new(vec![entry("DB.S.T", &["A", "B"])]);
        let (column, entries) = {
            let name = String::from("t");
            (catalog.column_at(&name, 2), catalog.matching(&name, None, None))
        };
        assert_eq!(column, Some("B"));
        assert_eq!(entries[0].relation_name, "DB.S.T");
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yml");
        std::fs::write(
            &path,
            r#"
- relationName: DB.S.W
  materializationName: W
  schemaName: S
  databaseName: DB
  columnNames: [COL1, COL2]
"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].column_names, vec!["COL1", "COL2"]);
    }

    #[test]
    fn test_load_invalid_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yml");
        std::fs::write(&path, "not: [a, list").unwrap();
        assert!(matches!(
            Catalog::load(&path),
            Err(CoreError::CatalogParseError { .. })
        ));
    }
}
