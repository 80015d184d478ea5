//! Task tree rendering.
//!
//! `build_cards` turns the current task list into one card per visible entry.
//! The app calls it on every draw and throws the result away afterwards; there
//! is no diffing, the whole tree is rebuilt from state each time.

use chrono::{DateTime, Utc};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::db::{format_local, Database};
use crate::fields::EntryId;
use crate::task::Entry;
use crate::tui::colors::{DARK_GREEN, GOLD};
use crate::tui::task_form::EntryForm;
use crate::tui::view::ViewState;

const SUBTASK_INDENT: &str = "    ";
const DETAIL_INDENT: &str = "    ";

/// Everything a render pass needs besides the task list itself.
pub struct RenderContext<'a> {
    pub now: DateTime<Utc>,
    pub timestamp_format: &'a str,
    pub view: &'a ViewState,
    /// Entry in edit mode and its form.
    pub editing: Option<(EntryId, &'a EntryForm)>,
}

/// One rendered task or subtask.
#[derive(Debug, Clone)]
pub struct Card {
    pub id: EntryId,
    pub lines: Vec<Line<'static>>,
    pub expired: bool,
}

/// `Created: … | Deadline: … | ❌ Expired`, with the deadline and expiry parts only when they apply.
pub fn info_line(entry: &impl Entry, now: DateTime<Utc>, fmt: &str) -> String {
    let mut text = format!("Created: {}", format_local(entry.created(), fmt));
    if let Some(deadline) = entry.deadline() {
        text.push_str(&format!(" | Deadline: {}", format_local(deadline, fmt)));
    }
    if entry.is_expired(now) {
        text.push_str(" | ❌ Expired");
    }
    text
}

/// Build the cards for every visible entry, in display order.
pub fn build_cards(db: &Database, ctx: &RenderContext<'_>) -> Vec<Card> {
    let editing = ctx.editing.map(|(id, _)| id);
    ctx.view
        .visible_entries(db, editing)
        .into_iter()
        .filter_map(|id| match id {
            EntryId::Task(t) => {
                let task = db.get(t)?;
                let progress = (!task.subtasks.is_empty()).then(|| {
                    let done = task.subtasks.iter().filter(|s| s.completed).count();
                    format!(" ({done}/{})", task.subtasks.len())
                });
                Some(entry_card(task, id, ctx, progress))
            }
            EntryId::Subtask { task, subtask } => {
                let sub = db.get_subtask(task, subtask)?;
                Some(entry_card(sub, id, ctx, None))
            }
        })
        .collect()
}

fn entry_card(
    entry: &impl Entry,
    id: EntryId,
    ctx: &RenderContext<'_>,
    progress: Option<String>,
) -> Card {
    let is_task = matches!(id, EntryId::Task(_));
    let indent = if is_task { "" } else { SUBTASK_INDENT };
    let expired = entry.is_expired(ctx.now);
    let shown = ctx.view.details_shown(id);

    let checkbox = if entry.completed() { "[x] " } else { "[ ] " };
    let title_style = if entry.completed() {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else if expired {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else if is_task {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Green)
    };
    let marker = if shown { " ▾" } else { " ▸" };

    let mut title_spans = vec![
        Span::raw(indent.to_string()),
        Span::raw(checkbox),
        Span::styled(entry.title().to_string(), title_style),
    ];
    if let Some(progress) = progress {
        title_spans.push(Span::styled(progress, Style::default().fg(Color::DarkGray)));
    }
    title_spans.push(Span::styled(marker, Style::default().fg(Color::DarkGray)));
    let mut lines = vec![Line::from(title_spans)];

    let pad = format!("{indent}{DETAIL_INDENT}");

    if let Some((_, form)) = ctx.editing.filter(|(editing, _)| *editing == id) {
        lines.extend(form_lines(form, &pad));
        return Card { id, lines, expired };
    }

    if shown {
        for desc_line in entry.description().lines() {
            lines.push(Line::from(format!("{pad}{desc_line}")));
        }
        let info_style = if expired {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        lines.push(Line::from(Span::styled(
            format!("{pad}{}", info_line(entry, ctx.now, ctx.timestamp_format)),
            info_style,
        )));

        let key = Style::default().fg(if is_task { GOLD } else { DARK_GREEN });
        let mut actions = vec![
            Span::raw(pad.clone()),
            Span::styled("[e]", key),
            Span::raw(" Edit  "),
            Span::styled("[d]", key),
            Span::raw(" Delete"),
        ];
        if is_task {
            actions.push(Span::raw("  "));
            actions.push(Span::styled("[n]", key));
            actions.push(Span::raw(" Add subtask"));
        }
        lines.push(Line::from(actions));
    }

    Card { id, lines, expired }
}

/// Inline edit form: one line per field, the focused one highlighted with a cursor.
pub fn form_lines(form: &EntryForm, pad: &str) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = form
        .fields()
        .iter()
        .map(|(label, field)| {
            let label_style = if field.active {
                Style::default().fg(GOLD).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let value = if field.active {
                let (before, after) = field.split_at_cursor();
                format!("{before}▏{after}")
            } else {
                field.value.clone()
            };
            Line::from(vec![
                Span::raw(pad.to_string()),
                Span::styled(format!("{label}: "), label_style),
                Span::raw(value.replace('\n', " ⏎ ")),
            ])
        })
        .collect();
    lines.push(Line::from(Span::styled(
        format!("{pad}[Enter/Ctrl+S] Save  [Esc] Cancel  [Tab] Next field"),
        Style::default().fg(Color::DarkGray),
    )));
    lines
}
