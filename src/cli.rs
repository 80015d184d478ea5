use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Commands;

/// File-backed task tracker with one level of subtasks.
/// Runs the TUI when no subcommand is given.
#[derive(Parser, Debug)]
#[command(name = "tg", version, about = "Task and subtask tracker")]
pub struct Cli {
    /// Path to the JSON snapshot file (overrides the configured data directory).
    #[arg(long, global = true, env = "TASKGRID_DB")]
    pub db: Option<PathBuf>,

    /// Path to config file (default: `<config_dir>/taskgrid/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Timestamp display format (chrono format string).
    #[arg(long, global = true)]
    pub timestamp_format: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info", env = "TASKGRID_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/taskgrid.log`).
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
