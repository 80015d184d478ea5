//! Main application logic for the terminal user interface.
//!
//! `App` owns the store and all view state, turns key presses into store
//! operations, and redraws the whole screen from state on every loop.

use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use tracing::{debug, warn};

use crate::config::UiSettings;
use crate::fields::EntryId;
use crate::store::{Store, StoreError};
use crate::task::Entry;
use crate::tui::{
    colors::{DARK_RED, GOLD, INK},
    enums::AppState,
    render::{build_cards, form_lines, RenderContext},
    task_form::{EntryForm, DESCRIPTION_FIELD},
    utils::centered_rect,
    view::ViewState,
};

/// Main application state for the terminal user interface.
pub struct App {
    state: AppState,
    store: Store,
    view: ViewState,
    list_state: ListState,
    selected: Option<EntryId>,
    form: EntryForm,
    status_message: String,
    alert: Option<String>,
    /// State to go back to once the alert is dismissed.
    alert_return: AppState,
    settings: UiSettings,
}

impl App {
    pub fn new(store: Store, settings: UiSettings) -> Self {
        let mut app = App {
            state: AppState::TaskList,
            store,
            view: ViewState::default(),
            list_state: ListState::default(),
            selected: None,
            form: EntryForm::new(),
            status_message: String::new(),
            alert: None,
            alert_return: AppState::TaskList,
            settings,
        };
        app.selected = app.selected_entry();
        app
    }

    /// The state whose screen is drawn underneath any alert.
    fn base_state(&self) -> AppState {
        match self.state {
            AppState::Alert => self.alert_return,
            state => state,
        }
    }

    fn editing(&self) -> Option<EntryId> {
        match self.base_state() {
            AppState::Editing(id) => Some(id),
            _ => None,
        }
    }

    fn visible(&self) -> Vec<EntryId> {
        self.view.visible_entries(self.store.database(), self.editing())
    }

    /// The highlighted entry. A hidden subtask falls back to its parent,
    /// anything else missing falls back to the first entry.
    fn selected_entry(&self) -> Option<EntryId> {
        let visible = self.visible();
        if let Some(selected) = self.selected {
            if visible.contains(&selected) {
                return Some(selected);
            }
            let parent = EntryId::Task(selected.task_id());
            if visible.contains(&parent) {
                return Some(parent);
            }
        }
        visible.first().copied()
    }

    fn move_selection(&mut self, delta: isize) {
        let visible = self.visible();
        if visible.is_empty() {
            self.selected = None;
            return;
        }
        let current = self
            .selected_entry()
            .and_then(|id| visible.iter().position(|v| *v == id))
            .unwrap_or(0);
        let next = (current as isize + delta).clamp(0, visible.len() as isize - 1) as usize;
        self.selected = Some(visible[next]);
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    /// Show a blocking alert on top of the current screen.
    fn show_alert(&mut self, msg: impl Into<String>) {
        self.alert = Some(msg.into());
        self.alert_return = self.state;
        self.state = AppState::Alert;
    }

    /// Alert for a failed store call. Validation failures are expected input
    /// errors and are not logged.
    fn report(&mut self, error: StoreError) {
        if error.as_validation().is_none() {
            warn!(error = %error, "store operation failed");
        }
        self.show_alert(error.to_string());
    }

    fn title_of(&self, id: EntryId) -> String {
        let db = self.store.database();
        match id {
            EntryId::Task(t) => db.get(t).map(|t| t.title.clone()),
            EntryId::Subtask { task, subtask } => {
                db.get_subtask(task, subtask).map(|s| s.title.clone())
            }
        }
        .unwrap_or_default()
    }

    /// Handle one key press. Returns true if the application should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        match self.state {
            AppState::TaskList => self.handle_task_list_input(key),
            AppState::AddTask | AppState::AddSubtask(_) | AppState::Editing(_) => {
                self.handle_form_input(key);
                false
            }
            AppState::Confirm(id) => {
                self.handle_confirm_input(key, id);
                false
            }
            AppState::Alert => {
                self.alert = None;
                self.state = self.alert_return;
                false
            }
            AppState::Help => {
                self.state = AppState::TaskList;
                false
            }
        }
    }

    /// Handle keyboard input when browsing the task tree.
    ///
    /// Returns true if the application should quit.
    fn handle_task_list_input(&mut self, key: KeyEvent) -> bool {
        self.status_message.clear();
        let selected = self.selected_entry();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Char(' ') | KeyCode::Char('x') => {
                if let Some(id) = selected {
                    self.toggle_completed(id);
                }
            }
            KeyCode::Enter | KeyCode::Char('v') => {
                if let Some(id) = selected {
                    self.view.toggle_details(id);
                    self.selected = Some(id);
                }
            }
            KeyCode::Char('a') => {
                self.form = EntryForm::new();
                self.state = AppState::AddTask;
            }
            KeyCode::Char('n') => match selected {
                Some(id) => {
                    self.form = EntryForm::new();
                    self.state = AppState::AddSubtask(id.task_id());
                }
                None => self.set_status_message("Add a task first"),
            },
            KeyCode::Char('e') => {
                if let Some(id) = selected {
                    self.start_edit(id);
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = selected {
                    if self.settings.confirm_delete {
                        self.state = AppState::Confirm(id);
                    } else {
                        self.delete_entry(id);
                    }
                }
            }
            KeyCode::Char('h') | KeyCode::Char('?') | KeyCode::F(1) => {
                self.state = AppState::Help;
            }
            KeyCode::Char('r') => {
                self.store.reload();
                self.view.retain_existing(self.store.database());
                debug!(location = %self.store.location(), "reloaded");
                self.set_status_message(format!("Reloaded from {}", self.store.location()));
            }
            _ => {}
        }
        false
    }

    fn toggle_completed(&mut self, id: EntryId) {
        let result = match id {
            EntryId::Task(t) => self.store.toggle_task_completed(t),
            EntryId::Subtask { task, subtask } => self.store.toggle_subtask_completed(task, subtask),
        };
        match result {
            Ok(done) => {
                let verb = if done { "Completed" } else { "Reopened" };
                let msg = format!("{verb} '{}'", self.title_of(id));
                self.set_status_message(msg);
            }
            Err(e) => self.report(e),
        }
    }

    /// Put an entry into edit mode with its current values.
    fn start_edit(&mut self, id: EntryId) {
        let db = self.store.database();
        let form = match id {
            EntryId::Task(t) => db.get(t).map(EntryForm::from_entry),
            EntryId::Subtask { task, subtask } => {
                db.get_subtask(task, subtask).map(EntryForm::from_entry)
            }
        };
        if let Some(form) = form {
            self.form = form;
            self.selected = Some(id);
            self.state = AppState::Editing(id);
        }
    }

    /// Handle keyboard input for the add popups and the inline edit form.
    fn handle_form_input(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.state = AppState::TaskList;
                self.set_status_message("Cancelled");
            }
            KeyCode::Char('s') if ctrl => self.submit_form(),
            KeyCode::Enter if self.form.current_field == DESCRIPTION_FIELD => {
                self.form.active_mut().handle_char('\n');
            }
            KeyCode::Enter => self.submit_form(),
            KeyCode::Tab | KeyCode::Down => self.form.next_field(),
            KeyCode::BackTab | KeyCode::Up => self.form.prev_field(),
            KeyCode::Left => self.form.active_mut().move_cursor_left(),
            KeyCode::Right => self.form.active_mut().move_cursor_right(),
            KeyCode::Home => self.form.active_mut().move_home(),
            KeyCode::End => self.form.active_mut().move_end(),
            KeyCode::Backspace => self.form.active_mut().handle_backspace(),
            KeyCode::Delete => self.form.active_mut().handle_delete(),
            KeyCode::Char(c) if !ctrl => self.form.active_mut().handle_char(c),
            _ => {}
        }
    }

    /// Validate and apply the open form. On failure the form stays open
    /// behind an alert so the input can be corrected.
    fn submit_form(&mut self) {
        let draft = match self.form.to_draft(self.store.now()) {
            Ok(draft) => draft,
            Err(e) => return self.show_alert(e.to_string()),
        };

        let result = match self.state {
            AppState::AddTask => self.store.add_task(draft).map(EntryId::Task),
            AppState::AddSubtask(task) => self
                .store
                .add_subtask(task, draft)
                .map(|subtask| EntryId::Subtask { task, subtask }),
            AppState::Editing(id @ EntryId::Task(t)) => self.store.update_task(t, draft).map(|()| id),
            AppState::Editing(id @ EntryId::Subtask { task, subtask }) => {
                self.store.update_subtask(task, subtask, draft).map(|()| id)
            }
            _ => return,
        };

        match result {
            Ok(id) => {
                let msg = match self.state {
                    AppState::Editing(_) => format!("Updated '{}'", self.title_of(id)),
                    _ => format!("Added {} '{}'", id.level().to_string().to_lowercase(), self.title_of(id)),
                };
                if let AppState::AddSubtask(task) = self.state {
                    self.view.show_details(EntryId::Task(task));
                }
                self.state = AppState::TaskList;
                self.selected = Some(id);
                self.set_status_message(msg);
            }
            Err(e) => self.report(e),
        }
    }

    fn handle_confirm_input(&mut self, key: KeyEvent, id: EntryId) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.state = AppState::TaskList;
                self.delete_entry(id);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.state = AppState::TaskList;
                self.set_status_message("Delete cancelled");
            }
            _ => {}
        }
    }

    /// Delete an entry and move the highlight to its neighbour.
    fn delete_entry(&mut self, id: EntryId) {
        let position = self.visible().iter().position(|v| *v == id);
        let result = match id {
            EntryId::Task(t) => self.store.delete_task(t).map(|t| t.title),
            EntryId::Subtask { task, subtask } => {
                self.store.delete_subtask(task, subtask).map(|s| s.title)
            }
        };
        match result {
            Ok(title) => {
                self.view.retain_existing(self.store.database());
                let visible = self.visible();
                self.selected = position
                    .and_then(|p| visible.get(p.min(visible.len().saturating_sub(1))))
                    .copied();
                self.set_status_message(format!("Deleted '{title}'"));
            }
            Err(e) => self.report(e),
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let now = self.store.now();
        let tasks = self.store.tasks();
        let done = tasks.iter().filter(|t| t.completed).count();
        let expired = tasks
            .iter()
            .map(|t| {
                usize::from(t.is_expired(now))
                    + t.subtasks.iter().filter(|s| s.is_expired(now)).count()
            })
            .sum::<usize>();
        let text = format!(
            " Task Grid | {} tasks, {done} done, {expired} expired",
            tasks.len()
        );
        let header = Paragraph::new(text)
            .style(Style::default().bg(GOLD).fg(INK).add_modifier(Modifier::BOLD));
        f.render_widget(header, area);
    }

    fn render_task_list(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Tasks");
        let ctx = RenderContext {
            now: self.store.now(),
            timestamp_format: &self.settings.timestamp_format,
            view: &self.view,
            editing: self.editing().map(|id| (id, &self.form)),
        };
        let cards = build_cards(self.store.database(), &ctx);

        if cards.is_empty() {
            let empty = Paragraph::new("No tasks yet. Press 'a' to add one.")
                .block(block)
                .style(Style::default().fg(Color::DarkGray));
            f.render_widget(empty, area);
            return;
        }

        let selected = self.selected_entry().or(Some(cards[0].id));
        self.list_state
            .select(selected.and_then(|id| cards.iter().position(|c| c.id == id)));

        let items: Vec<ListItem> = cards
            .into_iter()
            .map(|card| {
                let style = if card.expired {
                    Style::default().fg(Color::Red)
                } else {
                    Style::default()
                };
                ListItem::new(card.lines).style(style)
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::Rgb(40, 40, 40)))
            .highlight_symbol("▶ ");
        f.render_stateful_widget(list, area, &mut self.list_state);
    }

    /// Popup for the add task and add subtask forms.
    fn render_add_form(&self, f: &mut Frame, area: Rect, parent: Option<u64>) {
        let title = match parent {
            Some(task) => format!("New subtask of '{}'", self.title_of(EntryId::Task(task))),
            None => "New task".to_string(),
        };
        let area = centered_rect(60, 40, area);
        f.render_widget(Clear, area);
        let form = Paragraph::new(form_lines(&self.form, " "))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(GOLD)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(form, area);
    }

    /// Render the help screen with keyboard shortcuts and deadline formats.
    fn render_help(&self, f: &mut Frame, area: Rect) {
        let heading = |text: &'static str| {
            Line::from(vec![Span::styled(text, Style::default().add_modifier(Modifier::BOLD))])
        };
        let help_text = vec![
            heading("Task List:"),
            Line::from("  ↑/k, ↓/j     Move selection"),
            Line::from("  Enter/v      Show or hide details and subtasks"),
            Line::from("  Space/x      Toggle completed"),
            Line::from("  a            Add task"),
            Line::from("  n            Add subtask to the selected task"),
            Line::from("  e            Edit selected entry"),
            Line::from("  d            Delete selected entry"),
            Line::from("  r            Reload from disk"),
            Line::from("  h/?/F1       Show this help"),
            Line::from("  q/Esc/Ctrl+C Quit"),
            Line::from(""),
            heading("Forms:"),
            Line::from("  Tab/↓, Shift+Tab/↑  Move between fields"),
            Line::from("  Enter        Save (new line in Description)"),
            Line::from("  Ctrl+S       Save from any field"),
            Line::from("  Esc          Cancel"),
            Line::from(""),
            heading("Deadline Formats:"),
            Line::from("  YYYY-MM-DD HH:MM  Local date and time"),
            Line::from("  YYYY-MM-DD        End of that day (23:59)"),
            Line::from("  tomorrow          24 hours from now"),
            Line::from("  in 90m, in 3h, in 2d, in 1w"),
            Line::from("  (empty)           No deadline"),
        ];

        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help - Press any key to return"),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    /// Render a confirmation dialog before deleting.
    fn render_confirm(&self, f: &mut Frame, area: Rect, id: EntryId) {
        let block = Block::default()
            .title("Confirm Delete")
            .borders(Borders::ALL)
            .style(Style::default().bg(DARK_RED));

        let area = centered_rect(50, 25, area);
        f.render_widget(Clear, area);

        let mut text = vec![
            Line::from(""),
            Line::from(vec![Span::styled(
                format!("Delete {} '{}'?", id.level().to_string().to_lowercase(), self.title_of(id)),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
        ];
        if let EntryId::Task(t) = id {
            let subtasks = self.store.database().get(t).map_or(0, |t| t.subtasks.len());
            if subtasks > 0 {
                text.push(Line::from(format!("Its {subtasks} subtask(s) go with it.")));
            }
        }
        text.extend([
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ]);

        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_alert(&self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Alert")
            .borders(Borders::ALL)
            .style(Style::default().bg(DARK_RED).fg(Color::White));

        let area = centered_rect(50, 20, area);
        f.render_widget(Clear, area);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                self.alert.clone().unwrap_or_default(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press any key to continue"),
        ];
        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    /// Render the status bar at the bottom of the screen.
    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            match self.state {
                AppState::TaskList => format!(
                    "{} | a: add  e: edit  d: delete  space: done  enter: details  h: help",
                    self.store.location()
                ),
                AppState::AddTask => "Add Task".to_string(),
                AppState::AddSubtask(_) => "Add Subtask".to_string(),
                AppState::Editing(id) => format!("Editing {id}"),
                AppState::Confirm(_) => "Confirm Delete".to_string(),
                AppState::Alert => "Alert".to_string(),
                AppState::Help => "Help".to_string(),
            }
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(GOLD).fg(INK))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Main render function; draws the base screen, then any modal on top.
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0), Constraint::Length(1)])
            .split(f.area());

        self.render_header(f, chunks[0]);

        match self.base_state() {
            AppState::Help => self.render_help(f, chunks[1]),
            AppState::AddTask => {
                self.render_task_list(f, chunks[1]);
                self.render_add_form(f, chunks[1], None);
            }
            AppState::AddSubtask(task) => {
                self.render_task_list(f, chunks[1]);
                self.render_add_form(f, chunks[1], Some(task));
            }
            AppState::Confirm(id) => {
                self.render_task_list(f, chunks[1]);
                self.render_confirm(f, chunks[1], id);
            }
            _ => self.render_task_list(f, chunks[1]),
        }
        if self.state == AppState::Alert {
            self.render_alert(f, chunks[1]);
        }

        self.render_status_bar(f, chunks[2]);
    }

    /// Main event loop for the TUI application.
    ///
    /// Redraws at least every `poll_timeout` so expiry markers appear without
    /// a key press.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if event::poll(self.settings.poll_timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
