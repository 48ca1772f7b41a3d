//! trib-graph - Dependency graph assembly for Tributary
//!
//! Consumes the classified refs produced by `trib-sql` and turns them into
//! column-level dependency records: `Data` edges between warehouse columns,
//! wildcard expansion against the catalog, and dashboards mined from BI
//! query history. [`LineageRun`] drives a whole run from SQL or parsed trees
//! to a [`RunReport`].

pub mod bi;
pub mod builder;
pub mod error;
pub mod graph;
pub mod resolver;
pub mod run;

pub use bi::{BiSignatures, DashboardRef, QueryHistoryEntry};
pub use builder::{BuildResult, BuildSettings, DependenciesBuilder, SkippedEdge, StatementLineage};
pub use error::{GraphError, GraphResult};
pub use graph::LineageGraph;
pub use resolver::{CatalogResources, ResourceLookup};
pub use run::{LineageRun, ModelInput, ModelSource, RunOutput, RunReport, StatementFailure};
