//! trib-core - Core library for Tributary
//!
//! This crate provides the value types shared by every Tributary component:
//! dotted warehouse names and their tolerant comparison, the read-only
//! catalog, warehouse object and dependency records, typed ids and the
//! `tributary.yml` configuration.

pub mod bi_tool;
pub mod catalog;
pub mod config;
pub mod error;
mod id;
pub mod name;
pub mod record;

pub use bi_tool::BiTool;
pub use catalog::{Catalog, ModelRepresentation};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use id::{LineageId, OrganizationId, ResourceId};
pub use name::{equal_or_either_unknown, insensitive_eq, QualifiedName};
pub use record::{ColumnRecord, Dashboard, Dependency, DependencyKind, MaterializationRecord};
