//! # tg - task and subtask tracker
//!
//! A small task tracker with one level of subtasks, driven from an
//! interactive terminal UI or from plain CLI commands.
//!
//! ## Key Features
//!
//! - **Two-level hierarchy**: tasks own an ordered list of subtasks; deleting a task deletes its subtasks
//! - **Validated writes**: titles are required and unique among siblings (case-insensitive);
//!   deadlines may not be in the past and must be at least an hour after creation
//! - **Expiry**: an open entry whose deadline has passed is marked expired, recomputed on every draw
//! - **Local file storage**: the whole list is one JSON file, rewritten atomically after every change
//!
//! ## Quick Start
//!
//! ```bash
//! # Launch the TUI
//! tg
//!
//! # Add a task and a subtask from the shell
//! tg add "Pay bills" --deadline "in 2h"
//! tg add-sub "Pay bills" "Find invoice"
//!
//! # Print the tree with details
//! tg list --details
//! ```
//!
//! Data lives in `<data_dir>/taskgrid/tasks.json` unless `--db` or the config
//! file says otherwise. Logs go to `$TMPDIR/taskgrid.log`.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

pub mod cli;
pub mod cmd;
pub mod config;
pub mod db;
pub mod fields;
pub mod storage;
pub mod store;
pub mod task;
pub mod validate;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod render;
    pub mod run;
    pub mod task_form;
    pub mod utils;
    pub mod view;
}

use cli::Cli;
use cmd::*;
use config::Config;
use storage::JsonFile;
use store::Store;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let config = match Config::load_or_defaults(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(db = %config.db_path.display(), "tg starting");

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let mut store = Store::open(Box::new(JsonFile::new(config.db_path.clone())));
    let settings = config.ui;

    match cli.command.unwrap_or(Commands::Ui) {
        Commands::Ui => cmd_ui(store, settings)?,

        Commands::Add { title, desc, deadline } => {
            cmd_add(&mut store, title, desc, deadline)?;
        }

        Commands::AddSub { task, title, desc, deadline } => {
            cmd_add_sub(&mut store, &task, title, desc, deadline)?;
        }

        Commands::List { open, details } => cmd_list(&store, &settings, open, details),

        Commands::View { task, sub } => cmd_view(&store, &settings, &task, sub.as_deref())?,

        Commands::Edit { task, sub, title, desc, deadline, clear_deadline } => {
            let args = EditArgs { title, desc, deadline, clear_deadline };
            cmd_edit(&mut store, &task, sub.as_deref(), args)?;
        }

        Commands::Done { task, sub } => {
            cmd_done(&mut store, &task, sub.as_deref())?;
        }

        Commands::Delete { task, sub, yes } => {
            cmd_delete(&mut store, &settings, &task, sub.as_deref(), yes)?;
        }

        Commands::Completions { shell } => cmd_completions(shell),
    }
    Ok(())
}

/// Initialize file-based logging.
///
/// Logs never go to stdout, since the TUI owns the terminal. The returned
/// guard must be held until exit so buffered entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("taskgrid.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(log_filter(level))
        .with_ansi(false)
        .init();

    Some(guard)
}

/// `--log-level` / `TASKGRID_LOG` only; `RUST_LOG` is not consulted.
fn log_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::new(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_ignores_rust_log() {
        std::env::set_var("RUST_LOG", "error");
        assert_eq!(log_filter("debug").to_string(), "debug");
        std::env::remove_var("RUST_LOG");
    }
}
