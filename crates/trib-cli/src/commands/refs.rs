//! Refs command implementation - classify the refs of every statement

use anyhow::{bail, Result};
use serde::Serialize;
use trib_graph::ModelSource;
use trib_sql::{analyze_tree, Refs};

use crate::cli::{GlobalArgs, RefsArgs, RefsOutput};
use crate::commands::common::{print_table, ExitCode, ProjectContext};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatementRefs {
    relation_name: String,
    statement_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    refs: Option<Refs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Execute the refs command
pub async fn execute(args: &RefsArgs, global: &GlobalArgs) -> Result<()> {
    let project = ProjectContext::load(global)?;
    let models = project.models(args.models.as_deref())?;

    let mut statements = Vec::new();
    for model in &models {
        let ModelSource::Tree(tree) = &model.source else {
            bail!("Model '{}' has no parse tree", model.relation_name);
        };
        let results = match analyze_tree(
            tree,
            &model.relation_name,
            &project.catalog,
            project.config.max_depth,
        ) {
            Ok(results) => results,
            Err(e) => {
                eprintln!("Skipping '{}': {}", model.relation_name, e);
                continue;
            }
        };
        for (statement_index, result) in results.into_iter().enumerate() {
            let (refs, error) = match result {
                Ok(refs) => (Some(refs), None),
                Err(e) => (None, Some(e.to_string())),
            };
            statements.push(StatementRefs {
                relation_name: model.relation_name.clone(),
                statement_index,
                refs,
                error,
            });
        }
    }

    match args.output {
        RefsOutput::Json => println!("{}", serde_json::to_string_pretty(&statements)?),
        RefsOutput::Table => print_refs_table(&statements, global.verbose),
    }

    let failed = statements.iter().filter(|s| s.error.is_some()).count();
    if failed > 0 {
        eprintln!("{} of {} statements failed", failed, statements.len());
        return Err(ExitCode(1).into());
    }
    Ok(())
}

fn print_refs_table(statements: &[StatementRefs], verbose: bool) {
    if statements.is_empty() {
        println!("No statements found.");
        return;
    }

    let mut rows = Vec::new();
    for statement in statements {
        if let Some(error) = &statement.error {
            eprintln!(
                "{} #{}: {}",
                statement.relation_name, statement.statement_index, error
            );
            continue;
        }
        let Some(refs) = &statement.refs else {
            continue;
        };
        if verbose {
            for materialization in &refs.materializations {
                eprintln!(
                    "[verbose] {} #{}: {:?} {}",
                    statement.relation_name,
                    statement.statement_index,
                    materialization.kind,
                    materialization.qualified_name()
                );
            }
        }
        for column in refs.columns.iter().chain(&refs.wildcards) {
            rows.push(vec![
                statement.relation_name.clone(),
                statement.statement_index.to_string(),
                column.name.clone(),
                column.alias.clone().unwrap_or_default(),
                column.materialization().to_string(),
                format!("{:?}", column.dependency_type).to_lowercase(),
            ]);
        }
    }

    print_table(
        &["RELATION", "STMT", "COLUMN", "ALIAS", "MATERIALIZATION", "TYPE"],
        &rows,
    );
}
