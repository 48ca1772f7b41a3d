//! Reference records produced by extraction and classification
//!
//! Extraction yields *prototypes*: raw references with their grammar
//! contexts. The statement refs builder turns prototypes into classified
//! [`Refs`] where every materialization has a kind and every column is bound
//! to a materialization.

use crate::path::RefContext;
use serde::{Deserialize, Serialize};
use trib_core::{equal_or_either_unknown, insensitive_eq, DependencyKind, QualifiedName};

/// How a column reference relates to the statement's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Names an output column (alias or DDL column)
    Definition,
    /// Value flows into an output column
    Data,
    /// Only filters, joins, groups or orders rows
    Query,
}

impl From<DependencyType> for DependencyKind {
    fn from(value: DependencyType) -> Self {
        match value {
            DependencyType::Definition => DependencyKind::Definition,
            DependencyType::Data => DependencyKind::Data,
            DependencyType::Query => DependencyKind::Query,
        }
    }
}

/// Role of a materialization within one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterializationKind {
    /// The object the statement produces
    #[serde(rename = "self")]
    SelfRef,
    /// A CTE
    Transient,
    /// An upstream table or view
    Dependency,
}

/// A materialization reference before classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializationPrototype {
    pub name: String,
    pub alias: Option<String>,
    pub schema_name: Option<String>,
    pub database_name: Option<String>,
    pub warehouse_name: Option<String>,
    pub contexts: Vec<RefContext>,
}

impl MaterializationPrototype {
    pub fn from_name(name: QualifiedName, context: RefContext) -> Self {
        Self {
            name: name.name,
            alias: None,
            schema_name: name.schema,
            database_name: name.database,
            warehouse_name: name.warehouse,
            contexts: vec![context],
        }
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName {
            name: self.name.clone(),
            schema: self.schema_name.clone(),
            database: self.database_name.clone(),
            warehouse: self.warehouse_name.clone(),
        }
    }

    /// Two prototypes denote the same object when names match and no known
    /// qualifier or alias conflicts
    pub fn same_object(&self, other: &MaterializationPrototype) -> bool {
        insensitive_eq(&self.name, &other.name)
            && equal_or_either_unknown(self.alias.as_deref(), other.alias.as_deref())
            && self.qualified_name().is_compatible(&other.qualified_name())
    }

    /// Fold another sighting of the same object into this one
    pub fn absorb(&mut self, other: MaterializationPrototype) {
        self.alias = self.alias.take().or(other.alias);
        self.schema_name = self.schema_name.take().or(other.schema_name);
        self.database_name = self.database_name.take().or(other.database_name);
        self.warehouse_name = self.warehouse_name.take().or(other.warehouse_name);
        for context in other.contexts {
            if !self.contexts.contains(&context) {
                self.contexts.push(context);
            }
        }
    }

    /// The sighting that came last in the statement
    pub fn latest_context(&self) -> Option<&RefContext> {
        self.contexts
            .iter()
            .max_by(|a, b| crate::path::compare_locations(&a.location, &b.location))
    }
}

/// A column or wildcard reference before binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPrototype {
    pub name: String,
    pub alias: Option<String>,
    /// Qualifier as written
    pub materialization_name: Option<String>,
    pub schema_name: Option<String>,
    pub database_name: Option<String>,
    pub warehouse_name: Option<String>,
    pub dependency_type: DependencyType,
    pub is_wildcard_ref: bool,
    pub is_compound_value_ref: bool,
    pub context: RefContext,
}

impl ColumnPrototype {
    /// Qualifier parsed into a name, when one was written
    pub fn qualifier(&self) -> Option<QualifiedName> {
        self.materialization_name.as_ref().map(|name| QualifiedName {
            name: name.clone(),
            schema: self.schema_name.clone(),
            database: self.database_name.clone(),
            warehouse: self.warehouse_name.clone(),
        })
    }

    /// The name the column is exposed under
    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Everything extraction found in one statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefsPrototype {
    pub materializations: Vec<MaterializationPrototype>,
    pub columns: Vec<ColumnPrototype>,
    pub wildcards: Vec<ColumnPrototype>,
}

impl RefsPrototype {
    /// Add a materialization, merging with an existing sighting of the same object
    pub fn push_materialization(&mut self, prototype: MaterializationPrototype) {
        match self
            .materializations
            .iter_mut()
            .find(|m| m.same_object(&prototype))
        {
            Some(existing) => existing.absorb(prototype),
            None => self.materializations.push(prototype),
        }
    }

    /// Union of two prototypes: materializations deduplicated, columns and
    /// wildcards concatenated
    pub fn merge(&mut self, other: RefsPrototype) {
        for materialization in other.materializations {
            self.push_materialization(materialization);
        }
        self.columns.extend(other.columns);
        self.wildcards.extend(other.wildcards);
    }
}

/// A classified materialization reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializationRef {
    pub name: String,
    pub alias: Option<String>,
    pub schema_name: Option<String>,
    pub database_name: Option<String>,
    pub warehouse_name: Option<String>,
    pub kind: MaterializationKind,
    pub contexts: Vec<RefContext>,
}

impl MaterializationRef {
    pub fn from_prototype(prototype: MaterializationPrototype, kind: MaterializationKind) -> Self {
        Self {
            name: prototype.name,
            alias: prototype.alias,
            schema_name: prototype.schema_name,
            database_name: prototype.database_name,
            warehouse_name: prototype.warehouse_name,
            kind,
            contexts: prototype.contexts,
        }
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName {
            name: self.name.clone(),
            schema: self.schema_name.clone(),
            database: self.database_name.clone(),
            warehouse: self.warehouse_name.clone(),
        }
    }

    /// Whether a written qualifier names this materialization by alias
    pub fn answers_to_alias(&self, qualifier: &str) -> bool {
        self.alias
            .as_deref()
            .is_some_and(|alias| insensitive_eq(alias, qualifier))
    }
}

/// A column or wildcard reference bound to a materialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnRef {
    pub name: String,
    pub alias: Option<String>,
    pub materialization_name: String,
    pub schema_name: Option<String>,
    pub database_name: Option<String>,
    pub warehouse_name: Option<String>,
    pub dependency_type: DependencyType,
    pub is_wildcard_ref: bool,
    pub is_compound_value_ref: bool,
    pub context: RefContext,
}

impl ColumnRef {
    /// Name of the owning materialization as a qualified name
    pub fn materialization(&self) -> QualifiedName {
        QualifiedName {
            name: self.materialization_name.clone(),
            schema: self.schema_name.clone(),
            database: self.database_name.clone(),
            warehouse: self.warehouse_name.clone(),
        }
    }

    pub fn alias_or_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// Classified references of one statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refs {
    pub materializations: Vec<MaterializationRef>,
    pub columns: Vec<ColumnRef>,
    pub wildcards: Vec<ColumnRef>,
}

impl Refs {
    /// The statement's own materialization
    pub fn self_materialization(&self) -> Option<&MaterializationRef> {
        self.materializations
            .iter()
            .find(|m| m.kind == MaterializationKind::SelfRef)
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &MaterializationRef> {
        self.materializations
            .iter()
            .filter(|m| m.kind == MaterializationKind::Dependency)
    }

    pub fn columns_of_type(&self, dependency_type: DependencyType) -> impl Iterator<Item = &ColumnRef> {
        self.columns
            .iter()
            .filter(move |c| c.dependency_type == dependency_type)
    }
}
