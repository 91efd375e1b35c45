//! Vocabulary registry command line.
//!
//! # Responsibility
//! - Expose the vocabulary service entry points over a registry file.
//! - Keep stdout machine-readable: JSON for trees and outcomes, one line
//!   per row or task otherwise.
//!
//! # Invariants
//! - No workflow providers are registered; scheduled tasks are persisted
//!   and reported as failed outcomes for an external runner to pick up.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use log::warn;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vocab_core::{
    init_logging, open_db, LoggingConfig, ProviderRegistry, ReconcileContext, TreeProjection,
    VocabularyService, VocabularyTree, WorkflowOutcome,
};

const DB_PATH_ENV: &str = "VOCAB_DB_PATH";
const DB_FILE_NAME: &str = "vocab_registry.sqlite3";

fn main() -> ExitCode {
    let cli = Cli::parse();

    match LoggingConfig::from_env() {
        Ok(Some(config)) => {
            if let Err(err) = init_logging(&config) {
                eprintln!("logging disabled: {err}");
            }
        }
        Ok(None) => {}
        Err(err) => eprintln!("logging disabled: {err}"),
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    if let Commands::Ping = cli.command {
        println!("vocab_core ping={}", vocab_core::ping());
        println!("vocab_core version={}", vocab_core::core_version());
        return Ok(());
    }

    let db_path = resolve_db_path(cli.db);
    let conn = open_db(&db_path)
        .map_err(|err| format!("failed to open `{}`: {err}", db_path.display()))?;
    let providers = ProviderRegistry::new();
    let service = VocabularyService::new(&conn, &providers);
    let ctx = ReconcileContext::at_system_time(cli.actor);

    match cli.command {
        Commands::Ping => Ok(()),
        Commands::Create { file } => {
            let tree = read_tree(&file)?;
            let (id, outcome) = service
                .create_vocabulary(&ctx, &tree)
                .map_err(|err| err.to_string())?;
            println!("vocabulary_id={id}");
            print_outcome(outcome.as_ref())
        }
        Commands::Apply { id, file } => {
            let tree = read_tree(&file)?;
            let outcome = service
                .apply_changes(&ctx, id, &tree)
                .map_err(|err| err.to_string())?;
            print_outcome(outcome.as_ref())
        }
        Commands::Show {
            id,
            draft,
            root_only,
        } => {
            let projection = if root_only {
                TreeProjection::root_only()
            } else {
                TreeProjection::full()
            };
            let tree = if draft {
                service.get_draft(id, &projection)
            } else {
                service.get_current(id, &projection)
            }
            .map_err(|err| err.to_string())?;
            match tree {
                Some(tree) => print_json(&tree),
                None => Err(format!(
                    "vocabulary {id} has no {} instance",
                    if draft { "draft" } else { "current" }
                )),
            }
        }
        Commands::Describe { id } => {
            for line in service.describe_model(id).map_err(|err| err.to_string())? {
                println!("{line}");
            }
            Ok(())
        }
        Commands::DeleteCurrent { id, preserve_draft } => {
            let outcome = service
                .delete_only_current(&ctx, id, preserve_draft)
                .map_err(|err| err.to_string())?;
            print_outcome(outcome.as_ref())
        }
        Commands::DeleteDraft { id } => service
            .delete_only_draft(id)
            .map_err(|err| err.to_string()),
        Commands::PromoteDraft { id } => {
            let outcome = service
                .promote_current_to_draft(&ctx, id)
                .map_err(|err| err.to_string())?;
            print_outcome(outcome.as_ref())
        }
        Commands::Tasks { id } => {
            for task in service.list_tasks(id).map_err(|err| err.to_string())? {
                let subtasks: Vec<String> =
                    task.subtasks.iter().map(ToString::to_string).collect();
                println!(
                    "task_id={} version_id={} status={} subtasks={}",
                    task.task_id.unwrap_or_default(),
                    task.version_id,
                    task.status.as_db_str(),
                    subtasks.join(",")
                );
            }
            Ok(())
        }
    }
}

fn resolve_db_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Ok(raw) = std::env::var(DB_PATH_ENV) {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::temp_dir().join(DB_FILE_NAME)
}

fn read_tree(path: &Path) -> Result<VocabularyTree, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read `{}`: {err}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|err| format!("`{}` is not a vocabulary tree: {err}", path.display()))
}

fn print_outcome(outcome: Option<&WorkflowOutcome>) -> Result<(), String> {
    let Some(outcome) = outcome else {
        return Ok(());
    };
    warn!(
        "event=cli_workflow module=cli status=error vocabulary_id={} failed_tasks={}",
        outcome.vocabulary_id,
        outcome.failed_tasks.len()
    );
    print_json(outcome)
}

fn print_json(value: &impl Serialize) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize output: {err}"))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::resolve_db_path;
    use std::path::PathBuf;

    #[test]
    fn explicit_db_path_wins() {
        let path = PathBuf::from("/tmp/explicit.db");
        assert_eq!(resolve_db_path(Some(path.clone())), path);
    }
}
