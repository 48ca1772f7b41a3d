//! Warehouse object records and the dependency edges between them
//!
//! Records are immutable once built. A lineage re-run that needs to merge
//! with an earlier run produces a replacement copy that reuses the id.

use crate::error::{CoreError, CoreResult};
use crate::id::{LineageId, OrganizationId, ResourceId};
use serde::{Deserialize, Serialize};

/// Kind of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// True data flow from tail into head
    Data,
    /// Head only queries tail (filters, joins, CASE selectors)
    Query,
    /// Head defines tail
    Definition,
    /// Head is an object outside the warehouse (a BI dashboard)
    External,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyKind::Data => write!(f, "data"),
            DependencyKind::Query => write!(f, "query"),
            DependencyKind::Definition => write!(f, "definition"),
            DependencyKind::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for DependencyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "data" => Ok(DependencyKind::Data),
            "query" => Ok(DependencyKind::Query),
            "definition" => Ok(DependencyKind::Definition),
            "external" => Ok(DependencyKind::External),
            _ => Err(CoreError::InvalidVariant {
                kind: "dependency kind",
                value: s.to_string(),
            }),
        }
    }
}

/// A dependency edge between two warehouse (or external) objects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    id: ResourceId,
    kind: DependencyKind,
    head_id: ResourceId,
    tail_id: ResourceId,
    lineage_ids: Vec<LineageId>,
    organization_id: OrganizationId,
}

impl Dependency {
    /// Create a new edge with a freshly minted id
    pub fn create(
        kind: DependencyKind,
        head_id: ResourceId,
        tail_id: ResourceId,
        lineage_id: LineageId,
        organization_id: OrganizationId,
    ) -> Self {
        Self {
            id: ResourceId::generate(),
            kind,
            head_id,
            tail_id,
            lineage_ids: vec![lineage_id],
            organization_id,
        }
    }

    /// Rebuild an edge from stored properties
    pub fn build(
        id: ResourceId,
        kind: DependencyKind,
        head_id: ResourceId,
        tail_id: ResourceId,
        lineage_ids: Vec<LineageId>,
        organization_id: OrganizationId,
    ) -> CoreResult<Self> {
        if lineage_ids.is_empty() {
            return Err(CoreError::MissingField {
                record: "Dependency",
                field: "lineageIds",
            });
        }
        Ok(Self {
            id,
            kind,
            head_id,
            tail_id,
            lineage_ids,
            organization_id,
        })
    }

    /// Replacement copy that also belongs to `lineage_id`, keeping the id
    pub fn merged_into(&self, lineage_id: LineageId) -> Self {
        let mut lineage_ids = self.lineage_ids.clone();
        if !lineage_ids.contains(&lineage_id) {
            lineage_ids.push(lineage_id);
        }
        Self {
            lineage_ids,
            ..self.clone()
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    pub fn head_id(&self) -> &ResourceId {
        &self.head_id
    }

    pub fn tail_id(&self) -> &ResourceId {
        &self.tail_id
    }

    pub fn lineage_ids(&self) -> &[LineageId] {
        &self.lineage_ids
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    /// Natural key used by collaborators to match edges across runs
    pub fn natural_key(&self) -> (&ResourceId, &ResourceId, DependencyKind) {
        (&self.head_id, &self.tail_id, self.kind)
    }
}

/// A materialization (table or view) known to the warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializationRecord {
    pub id: ResourceId,
    pub relation_name: String,
    pub name: String,
    pub schema_name: String,
    pub database_name: String,
}

/// A column of a known materialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRecord {
    pub id: ResourceId,
    pub name: String,
    pub relation_name: String,
    pub materialization_id: ResourceId,
}

/// A BI dashboard found to read a warehouse column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: ResourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub materialization_name: String,
    pub materialization_id: ResourceId,
    pub column_name: String,
    pub column_id: ResourceId,
    pub lineage_ids: Vec<LineageId>,
    pub organization_id: OrganizationId,
}

impl Dashboard {
    /// Create a dashboard record, rejecting empty names
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        url: Option<String>,
        name: Option<String>,
        materialization_name: &str,
        materialization_id: ResourceId,
        column_name: &str,
        column_id: ResourceId,
        lineage_id: LineageId,
        organization_id: OrganizationId,
    ) -> CoreResult<Self> {
        if materialization_name.is_empty() {
            return Err(CoreError::MissingField {
                record: "Dashboard",
                field: "materialization",
            });
        }
        if column_name.is_empty() {
            return Err(CoreError::MissingField {
                record: "Dashboard",
                field: "column",
            });
        }
        Ok(Self {
            id: ResourceId::generate(),
            url,
            name,
            materialization_name: materialization_name.to_string(),
            materialization_id,
            column_name: column_name.to_string(),
            column_id,
            lineage_ids: vec![lineage_id],
            organization_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (LineageId, OrganizationId) {
        (
            LineageId::try_new("run-1").unwrap(),
            OrganizationId::try_new("org-1").unwrap(),
        )
    }

    #[test]
    fn test_dependency_kind_parse() {
        assert_eq!("DATA".parse::<DependencyKind>().unwrap(), DependencyKind::Data);
        assert_eq!(
            "external".parse::<DependencyKind>().unwrap(),
            DependencyKind::External
        );
        assert!("lineage".parse::<DependencyKind>().is_err());
    }

    #[test]
    fn test_merged_copy_keeps_id() {
        let (lineage, org) = ids();
        let dep = Dependency::create(
            DependencyKind::Data,
            ResourceId::generate(),
            ResourceId::generate(),
            lineage.clone(),
            org,
        );
        let next = LineageId::try_new("run-2").unwrap();
        let merged = dep.merged_into(next.clone());

        assert_eq!(merged.id(), dep.id());
        assert_eq!(merged.lineage_ids(), &[lineage, next.clone()]);
        assert_eq!(dep.lineage_ids().len(), 1);
        assert_eq!(merged.merged_into(next).lineage_ids().len(), 2);
    }

    #[test]
    fn test_build_requires_lineage() {
        let (_, org) = ids();
        let result = Dependency::build(
            ResourceId::generate(),
            DependencyKind::Query,
            ResourceId::generate(),
            ResourceId::generate(),
            vec![],
            org,
        );
        assert!(matches!(result, Err(CoreError::MissingField { .. })));
    }

    #[test]
    fn test_dashboard_requires_column() {
        let (lineage, org) = ids();
        let result = Dashboard::create(
            None,
            None,
            "T",
            ResourceId::generate(),
            "",
            ResourceId::generate(),
            lineage,
            org,
        );
        assert!(result.is_err());
    }
}
