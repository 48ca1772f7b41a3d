//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Tributary - column-level lineage from parsed SQL trees
#[derive(Parser, Debug)]
#[command(name = "trib")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: String,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify the refs of every statement in the manifest
    Refs(RefsArgs),

    /// Build column-level dependencies for the manifest
    Build(BuildArgs),
}

/// Arguments for the refs command
#[derive(Args, Debug)]
pub struct RefsArgs {
    /// Relation names to analyze (comma-separated, default: all)
    #[arg(short, long)]
    pub models: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: RefsOutput,
}

/// Refs output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefsOutput {
    /// Classified refs as JSON
    Json,
    /// One row per column ref
    Table,
}

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Relation names to build (comma-separated, default: all)
    #[arg(short, long)]
    pub models: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: BuildOutput,

    /// Override the configured BI tool
    #[arg(long)]
    pub bi_tool: Option<String>,

    /// Exit with a non-zero code when any statement failed
    #[arg(long)]
    pub strict: bool,
}

/// Build output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutput {
    /// Dependencies, dashboards and report as JSON
    Json,
    /// Run report as a table
    Table,
    /// Lineage graph as Graphviz DOT
    Dot,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
