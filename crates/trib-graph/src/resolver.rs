//! Resource lookup collaborator
//!
//! The graph builder never mints warehouse object ids itself. It asks a
//! [`ResourceLookup`] for the records of the materializations and columns a
//! statement references; persistence-backed lookups live outside this crate.

use crate::error::GraphResult;
use async_trait::async_trait;
use std::collections::HashMap;
use trib_core::{
    insensitive_eq, Catalog, ColumnRecord, MaterializationRecord, QualifiedName, ResourceId,
};

/// Resolves warehouse object records by name
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// The one materialization compatible with `name`, if exactly one exists
    async fn find_materialization(
        &self,
        name: &QualifiedName,
    ) -> GraphResult<Option<MaterializationRecord>>;

    /// Column `name` of the materialization `materialization_id`
    async fn find_column(
        &self,
        name: &str,
        materialization_id: &ResourceId,
    ) -> GraphResult<Option<ColumnRecord>>;
}

/// In-memory lookup over the records derived from a catalog
#[derive(Debug, Clone, Default)]
pub struct CatalogResources {
    materializations: Vec<MaterializationRecord>,
    columns: Vec<ColumnRecord>,
}

impl CatalogResources {
    /// Mint one materialization record per catalog entry and one column record per listed column
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let mut resources = Self::default();
        for entry in catalog.entries() {
            let materialization = MaterializationRecord {
                id: ResourceId::generate(),
                relation_name: entry.relation_name.clone(),
                name: entry.materialization_name.clone(),
                schema_name: entry.schema_name.clone(),
                database_name: entry.database_name.clone(),
            };
            for column in &entry.column_names {
                resources.columns.push(ColumnRecord {
                    id: ResourceId::generate(),
                    name: column.clone(),
                    relation_name: entry.relation_name.clone(),
                    materialization_id: materialization.id.clone(),
                });
            }
            resources.materializations.push(materialization);
        }
        log::debug!(
            "Catalog resources: {} materializations, {} columns",
            resources.materializations.len(),
            resources.columns.len()
        );
        resources
    }

    pub fn materializations(&self) -> &[MaterializationRecord] {
        &self.materializations
    }

    pub fn columns(&self) -> &[ColumnRecord] {
        &self.columns
    }

    /// Display names keyed by id, for DOT output
    pub fn labels(&self) -> HashMap<ResourceId, String> {
        let mut labels: HashMap<ResourceId, String> = self
            .materializations
            .iter()
            .map(|m| (m.id.clone(), m.relation_name.clone()))
            .collect();
        for column in &self.columns {
            labels.insert(
                column.id.clone(),
                format!("{}.{}", column.relation_name, column.name),
            );
        }
        labels
    }

    fn record_name(record: &MaterializationRecord) -> QualifiedName {
        QualifiedName {
            name: record.name.clone(),
            schema: Some(record.schema_name.clone()),
            database: Some(record.database_name.clone()),
            warehouse: None,
        }
    }
}

#[async_trait]
impl ResourceLookup for CatalogResources {
    async fn find_materialization(
        &self,
        name: &QualifiedName,
    ) -> GraphResult<Option<MaterializationRecord>> {
        let mut matches = self
            .materializations
            .iter()
            .filter(|m| Self::record_name(m).is_compatible(name));
        let first = matches.next();
        if matches.next().is_some() {
            log::debug!("Materialization '{}' is ambiguous", name);
            return Ok(None);
        }
        Ok(first.cloned())
    }

    async fn find_column(
        &self,
        name: &str,
        materialization_id: &ResourceId,
    ) -> GraphResult<Option<ColumnRecord>> {
        Ok(self
            .columns
            .iter()
            .find(|c| &c.materialization_id == materialization_id && insensitive_eq(&c.name, name))
            .cloned())
    }
}
