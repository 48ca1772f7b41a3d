//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use trib_core::{Catalog, Config};
use trib_graph::{ModelInput, ModelSource, QueryHistoryEntry};

use crate::cli::GlobalArgs;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that destructors run before the process exits.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// One manifest entry: a relation and the parsed tree of its SQL
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ManifestModel {
    pub(crate) relation_name: String,
    /// Parser output (JSON), relative to the project root
    pub(crate) tree: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Manifest {
    #[serde(default)]
    pub(crate) models: Vec<ManifestModel>,
}

impl Manifest {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }
}

/// Everything a command needs from the project directory
pub(crate) struct ProjectContext {
    pub(crate) root: PathBuf,
    pub(crate) config: Config,
    pub(crate) catalog: Catalog,
    pub(crate) manifest: Manifest,
}

impl ProjectContext {
    pub(crate) fn load(global: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&global.project_dir);
        let config = match &global.config {
            Some(path) => Config::load(Path::new(path)),
            None => Config::load_from_dir(&root),
        }
        .context("Failed to load config")?;

        let catalog_path = config.catalog_path_absolute(&root);
        let catalog = Catalog::load(&catalog_path).context("Failed to load catalog")?;
        let manifest = Manifest::load(&config.manifest_path_absolute(&root))?;

        if global.verbose {
            eprintln!(
                "[verbose] Loaded {} catalog entries and {} manifest models",
                catalog.len(),
                manifest.models.len()
            );
        }

        Ok(Self {
            root,
            config,
            catalog,
            manifest,
        })
    }

    /// Manifest models selected by a comma-separated filter, trees loaded
    pub(crate) fn models(&self, filter: Option<&str>) -> Result<Vec<ModelInput>> {
        let selected = parse_filter(filter);
        self.manifest
            .models
            .iter()
            .filter(|m| {
                selected.is_empty()
                    || selected
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case(&m.relation_name))
            })
            .map(|m| {
                Ok(ModelInput {
                    relation_name: m.relation_name.clone(),
                    source: ModelSource::Tree(load_tree(&self.root.join(&m.tree))?),
                })
            })
            .collect()
    }

    /// History entries of the configured export, if any
    pub(crate) fn query_history(&self) -> Result<Option<Vec<QueryHistoryEntry>>> {
        let Some(path) = self.config.query_history_path_absolute(&self.root) else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read query history {}", path.display()))?;
        let entries = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse query history {}", path.display()))?;
        Ok(Some(entries))
    }
}

pub(crate) fn load_tree(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parse tree {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse parse tree {}", path.display()))
}

pub(crate) fn parse_filter(filter: Option<&str>) -> Vec<String> {
    filter
        .map(|f| {
            f.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Calculate column widths for table output
pub(crate) fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }
    widths
}

/// Print a left-aligned table with a dashed separator under the header
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = calculate_column_widths(headers, rows);

    let header_parts: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!("{:<width$}", h, width = w))
        .collect();
    println!("{}", header_parts.join("  "));

    let sep_parts: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep_parts.join("  "));

    for row in rows {
        let row_parts: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect();
        println!("{}", row_parts.join("  "));
    }
}
