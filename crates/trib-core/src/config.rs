//! Configuration types and parsing for tributary.yml

use crate::bi_tool::BiTool;
use crate::error::{CoreError, CoreResult};
use crate::id::{LineageId, OrganizationId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lineage run configuration from tributary.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Organization owning every record produced by the run
    pub organization_id: OrganizationId,

    /// Id of the lineage run the records belong to
    pub lineage_id: LineageId,

    /// Maximum nesting depth of a parsed statement tree
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Number of statements (and columns per statement) processed concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// BI tool whose query history is mined for dashboards
    #[serde(default)]
    pub bi_tool: Option<BiTool>,

    /// Catalog file (list of model representations)
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Manifest listing the statements of the run
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Query history export for the configured BI tool
    #[serde(default)]
    pub query_history_path: Option<String>,
}

fn default_max_depth() -> usize {
    256
}

fn default_max_concurrency() -> usize {
    8
}

fn default_catalog_path() -> String {
    "catalog.yml".to_string()
}

fn default_manifest_path() -> String {
    "manifest.yml".to_string()
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project directory
    /// Looks for tributary.yml or tributary.yaml
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        let yml_path = dir.join("tributary.yml");
        let yaml_path = dir.join("tributary.yaml");

        if yml_path.exists() {
            Self::load(&yml_path)
        } else if yaml_path.exists() {
            Self::load(&yaml_path)
        } else {
            Err(CoreError::ConfigNotFound {
                path: yml_path.display().to_string(),
            })
        }
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.max_depth == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "max_depth must be greater than zero".to_string(),
            });
        }

        if self.max_concurrency == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "max_concurrency must be greater than zero".to_string(),
            });
        }

        if self.query_history_path.is_some() && self.bi_tool.is_none() {
            return Err(CoreError::ConfigInvalid {
                message: "query_history_path requires bi_tool to be set".to_string(),
            });
        }

        Ok(())
    }

    /// Catalog path resolved against the project root
    pub fn catalog_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.catalog_path)
    }

    /// Manifest path resolved against the project root
    pub fn manifest_path_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.manifest_path)
    }

    /// Query history path resolved against the project root
    pub fn query_history_path_absolute(&self, root: &Path) -> Option<PathBuf> {
        self.query_history_path.as_ref().map(|p| root.join(p))
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
