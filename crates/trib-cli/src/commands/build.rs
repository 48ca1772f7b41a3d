//! Build command implementation - column-level dependencies for the manifest

use anyhow::{Context, Result};
use serde::Serialize;
use trib_core::BiTool;
use trib_graph::{BuildResult, CatalogResources, LineageGraph, LineageRun, RunReport};

use crate::cli::{BuildArgs, BuildOutput, GlobalArgs};
use crate::commands::common::{print_table, ExitCode, ProjectContext};

#[derive(Serialize)]
struct BuildOutputJson<'a> {
    #[serde(flatten)]
    result: &'a BuildResult,
    report: &'a RunReport,
}

/// Execute the build command
pub async fn execute(args: &BuildArgs, global: &GlobalArgs) -> Result<()> {
    let project = ProjectContext::load(global)?;
    let models = project.models(args.models.as_deref())?;

    let bi_tool = match &args.bi_tool {
        Some(tool) => Some(tool.parse::<BiTool>().context("Invalid --bi-tool")?),
        None => project.config.bi_tool,
    };

    let resources = CatalogResources::from_catalog(&project.catalog);
    let mut run = LineageRun::from_config(&resources, &project.catalog, &project.config);
    if let Some(tool) = bi_tool {
        if let Some(entries) = project.query_history()? {
            if global.verbose {
                eprintln!("[verbose] Mining {} history entries for {}", entries.len(), tool);
            }
            run = run.with_query_history(tool, entries);
        }
    }

    let output = run.execute(&models).await.context("Lineage run failed")?;
    let report = &output.report;

    match args.output {
        BuildOutput::Json => {
            let json = BuildOutputJson {
                result: &output.result,
                report,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        BuildOutput::Dot => {
            let graph = LineageGraph::from_dependencies(&output.result.dependencies);
            let mut labels = resources.labels();
            for dashboard in &output.result.dashboards {
                let label = dashboard
                    .url
                    .clone()
                    .unwrap_or_else(|| dashboard.id.to_string());
                labels.insert(dashboard.id.clone(), label);
            }
            print!("{}", graph.to_dot(&labels));
        }
        BuildOutput::Table => print_report(report),
    }

    if global.verbose {
        for skipped in &report.edges_skipped {
            eprintln!(
                "[verbose] Skipped {} -> {}: {}",
                skipped.relation_name, skipped.reference, skipped.reason
            );
        }
    }
    for failure in &report.statements_failed {
        eprintln!("Statement of {} failed: {}", failure.relation_name, failure.reason);
    }

    if args.strict && report.has_failures() {
        return Err(ExitCode(1).into());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    let rows = vec![
        vec![
            "statements succeeded".to_string(),
            report.statements_succeeded.to_string(),
        ],
        vec![
            "statements failed".to_string(),
            report.statements_failed.len().to_string(),
        ],
        vec!["edges created".to_string(), report.edges_created.to_string()],
        vec![
            "edges skipped".to_string(),
            report.edges_skipped.len().to_string(),
        ],
        vec![
            "dashboards created".to_string(),
            report.dashboards_created.to_string(),
        ],
    ];
    print_table(&["METRIC", "COUNT"], &rows);
}
