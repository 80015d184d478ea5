//! Command implementations for the CLI interface.
//!
//! Every command goes through the same `Store` operations as the TUI, so
//! validation and persistence behave identically on both surfaces.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::config::UiSettings;
use crate::db::{format_local, truncate, Database};
use crate::fields::EntryId;
use crate::store::Store;
use crate::task::{Draft, Entry};
use crate::tui::render::info_line;
use crate::tui::run::run_tui;
use crate::validate::parse_deadline_input;

const TITLE_WIDTH: usize = 60;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive terminal UI (the default).
    Ui,

    /// Add a new task.
    Add {
        /// Task title.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        /// Deadline: "YYYY-MM-DD HH:MM", "YYYY-MM-DD", "tomorrow", "in 3h", or RFC 3339.
        #[arg(long)]
        deadline: Option<String>,
    },

    /// Add a subtask to an existing task.
    AddSub {
        /// Parent task id or title.
        task: String,
        /// Subtask title.
        title: String,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
    },

    /// Print the task tree.
    List {
        /// Hide completed tasks and subtasks.
        #[arg(long)]
        open: bool,
        /// Include descriptions and created/deadline lines.
        #[arg(long, short)]
        details: bool,
    },

    /// Show one task or subtask in full.
    View {
        /// Task id or title.
        task: String,
        /// Subtask id or title within the task.
        #[arg(long)]
        sub: Option<String>,
    },

    /// Change the title, description or deadline of a task or subtask.
    Edit {
        /// Task id or title.
        task: String,
        /// Subtask id or title within the task.
        #[arg(long)]
        sub: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, conflicts_with = "clear_deadline")]
        deadline: Option<String>,
        /// Remove the deadline.
        #[arg(long)]
        clear_deadline: bool,
    },

    /// Toggle completion of a task or subtask.
    Done {
        /// Task id or title.
        task: String,
        /// Subtask id or title within the task.
        #[arg(long)]
        sub: Option<String>,
    },

    /// Delete a task (with its subtasks) or a single subtask.
    Delete {
        /// Task id or title.
        task: String,
        /// Subtask id or title within the task.
        #[arg(long)]
        sub: Option<String>,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Resolve a task identifier and optional subtask identifier to an entry.
fn resolve(db: &Database, task: &str, sub: Option<&str>) -> Result<EntryId> {
    let task_id = db.resolve_task(task).map_err(|e| anyhow!(e))?;
    Ok(match sub {
        Some(sub) => EntryId::Subtask {
            task: task_id,
            subtask: db.resolve_subtask(task_id, sub).map_err(|e| anyhow!(e))?,
        },
        None => EntryId::Task(task_id),
    })
}

fn parse_deadline(text: Option<&str>, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    match text {
        Some(text) => Ok(parse_deadline_input(text, now)?),
        None => Ok(None),
    }
}

/// Launch the TUI.
pub fn cmd_ui(store: Store, settings: UiSettings) -> Result<()> {
    run_tui(store, settings).context("terminal UI failed")
}

/// Add a top-level task.
pub fn cmd_add(
    store: &mut Store,
    title: String,
    desc: Option<String>,
    deadline: Option<String>,
) -> Result<u64> {
    let deadline = parse_deadline(deadline.as_deref(), store.now())?;
    let draft = Draft::new(title)
        .description(desc.unwrap_or_default())
        .deadline(deadline);
    let id = store.add_task(draft)?;
    println!("Added task {id}");
    Ok(id)
}

/// Add a subtask under an existing task.
pub fn cmd_add_sub(
    store: &mut Store,
    task: &str,
    title: String,
    desc: Option<String>,
    deadline: Option<String>,
) -> Result<u64> {
    let task_id = store.database().resolve_task(task).map_err(|e| anyhow!(e))?;
    let deadline = parse_deadline(deadline.as_deref(), store.now())?;
    let draft = Draft::new(title)
        .description(desc.unwrap_or_default())
        .deadline(deadline);
    let id = store.add_subtask(task_id, draft)?;
    println!("Added subtask {id} to task {task_id}");
    Ok(id)
}

fn checkbox(entry: &dyn Entry) -> &'static str {
    if entry.completed() {
        "[x]"
    } else {
        "[ ]"
    }
}

fn push_entry(
    out: &mut String,
    entry: &impl Entry,
    indent: &str,
    suffix: &str,
    details: bool,
    now: DateTime<Utc>,
    fmt: &str,
) {
    let expired = if entry.is_expired(now) { "  ❌" } else { "" };
    out.push_str(&format!(
        "{indent}{} #{} {}{suffix}{expired}\n",
        checkbox(entry),
        entry.id(),
        truncate(entry.title(), TITLE_WIDTH)
    ));
    if details {
        for line in entry.description().lines() {
            out.push_str(&format!("{indent}      {line}\n"));
        }
        out.push_str(&format!("{indent}      {}\n", info_line(entry, now, fmt)));
    }
}

/// Render the task tree as plain text.
pub fn format_tree(db: &Database, now: DateTime<Utc>, fmt: &str, open: bool, details: bool) -> String {
    let mut out = String::new();
    for task in db.tasks.iter().filter(|t| !open || !t.completed) {
        let progress = if task.subtasks.is_empty() {
            String::new()
        } else {
            let done = task.subtasks.iter().filter(|s| s.completed).count();
            format!(" ({done}/{})", task.subtasks.len())
        };
        push_entry(&mut out, task, "", &progress, details, now, fmt);
        for sub in task.subtasks.iter().filter(|s| !open || !s.completed) {
            push_entry(&mut out, sub, "    ", "", details, now, fmt);
        }
    }
    out
}

/// Print the task tree.
pub fn cmd_list(store: &Store, settings: &UiSettings, open: bool, details: bool) {
    if store.tasks().is_empty() {
        println!("No tasks.");
        return;
    }
    print!(
        "{}",
        format_tree(store.database(), store.now(), &settings.timestamp_format, open, details)
    );
}

fn status(entry: &dyn Entry, now: DateTime<Utc>) -> &'static str {
    if entry.completed() {
        "done"
    } else if entry.is_expired(now) {
        "expired"
    } else {
        "open"
    }
}

/// Render one entry in full.
pub fn format_entry(db: &Database, id: EntryId, now: DateTime<Utc>, fmt: &str) -> Option<String> {
    let entry: &dyn Entry = match id {
        EntryId::Task(t) => db.get(t)?,
        EntryId::Subtask { task, subtask } => db.get_subtask(task, subtask)?,
    };
    let mut out = format!("{} {id}: {}\n", id.level(), entry.title());
    out.push_str(&format!("Status:   {}\n", status(entry, now)));
    out.push_str(&format!("Created:  {}\n", format_local(entry.created(), fmt)));
    if let Some(deadline) = entry.deadline() {
        out.push_str(&format!("Deadline: {}\n", format_local(deadline, fmt)));
    }
    if !entry.description().is_empty() {
        out.push('\n');
        for line in entry.description().lines() {
            out.push_str(&format!("  {line}\n"));
        }
    }
    if let EntryId::Task(t) = id {
        let task = db.get(t)?;
        if !task.subtasks.is_empty() {
            out.push_str("\nSubtasks:\n");
            for sub in &task.subtasks {
                out.push_str(&format!("  {} #{} {}\n", checkbox(sub), sub.id, sub.title));
            }
        }
    }
    Some(out)
}

/// Show one task or subtask.
pub fn cmd_view(store: &Store, settings: &UiSettings, task: &str, sub: Option<&str>) -> Result<()> {
    let id = resolve(store.database(), task, sub)?;
    let text = format_entry(store.database(), id, store.now(), &settings.timestamp_format)
        .ok_or_else(|| anyhow!("{id} not found"))?;
    print!("{text}");
    Ok(())
}

/// Fields to change on edit; `None` keeps the current value.
#[derive(Debug, Default)]
pub struct EditArgs {
    pub title: Option<String>,
    pub desc: Option<String>,
    pub deadline: Option<String>,
    pub clear_deadline: bool,
}

/// Edit a task or subtask. Unchanged fields keep their values, and the
/// result is validated like a save from the edit form.
pub fn cmd_edit(store: &mut Store, task: &str, sub: Option<&str>, args: EditArgs) -> Result<()> {
    let id = resolve(store.database(), task, sub)?;
    let db = store.database();
    let mut draft = match id {
        EntryId::Task(t) => db.get(t).map(Draft::from_entry),
        EntryId::Subtask { task, subtask } => db.get_subtask(task, subtask).map(Draft::from_entry),
    }
    .ok_or_else(|| anyhow!("{id} not found"))?;

    if let Some(title) = args.title {
        draft.title = title;
    }
    if let Some(desc) = args.desc {
        draft.description = desc;
    }
    if args.clear_deadline {
        draft.deadline = None;
    } else if let Some(text) = args.deadline.as_deref() {
        draft.deadline = parse_deadline(Some(text), store.now())?;
    }

    match id {
        EntryId::Task(t) => store.update_task(t, draft)?,
        EntryId::Subtask { task, subtask } => store.update_subtask(task, subtask, draft)?,
    }
    println!("Updated {} {id}", id.level().to_string().to_lowercase());
    Ok(())
}

/// Toggle completion. Returns the new state.
pub fn cmd_done(store: &mut Store, task: &str, sub: Option<&str>) -> Result<bool> {
    let id = resolve(store.database(), task, sub)?;
    let done = match id {
        EntryId::Task(t) => store.toggle_task_completed(t)?,
        EntryId::Subtask { task, subtask } => store.toggle_subtask_completed(task, subtask)?,
    };
    println!("{} {id}", if done { "Completed" } else { "Reopened" });
    Ok(done)
}

/// Ask a yes/no question. Anything but `y`/`yes` means no.
fn confirm(prompt: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<bool> {
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Delete a task with its subtasks, or a single subtask.
pub fn cmd_delete(
    store: &mut Store,
    settings: &UiSettings,
    task: &str,
    sub: Option<&str>,
    yes: bool,
) -> Result<()> {
    let id = resolve(store.database(), task, sub)?;
    if !yes && settings.confirm_delete {
        let db = store.database();
        let prompt = match id {
            EntryId::Task(t) => {
                let task = db.get(t).ok_or_else(|| anyhow!("{id} not found"))?;
                format!(
                    "Delete task '{}' and its {} subtask(s)?",
                    task.title,
                    task.subtasks.len()
                )
            }
            EntryId::Subtask { task, subtask } => {
                let sub = db
                    .get_subtask(task, subtask)
                    .ok_or_else(|| anyhow!("{id} not found"))?;
                format!("Delete subtask '{}'?", sub.title)
            }
        };
        let proceed = confirm(&prompt, &mut io::stdin().lock(), &mut io::stdout())
            .context("failed to read confirmation")?;
        if !proceed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let title = match id {
        EntryId::Task(t) => store.delete_task(t)?.title,
        EntryId::Subtask { task, subtask } => store.delete_subtask(task, subtask)?.title,
    };
    println!("Deleted '{title}'");
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut io::stdout());
}
