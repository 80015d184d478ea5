//! Entry form handling for the terminal user interface.
//!
//! One `EntryForm` backs the "add task" popup, the "add subtask" popup and the
//! inline edit form. It holds raw text only; turning it into a `Draft` parses
//! the deadline, and the store does the rest of the validation.

use chrono::{DateTime, Utc};

use crate::db::format_deadline_input;
use crate::task::{Draft, Entry};
use crate::tui::input::InputField;
use crate::validate::{parse_deadline_input, ValidationError};

/// Field order, top to bottom.
pub const TITLE_FIELD: usize = 0;
pub const DESCRIPTION_FIELD: usize = 1;
pub const DEADLINE_FIELD: usize = 2;
const FIELD_COUNT: usize = 3;

/// Form for creating or editing a task or subtask.
#[derive(Clone, Debug, Default)]
pub struct EntryForm {
    pub title: InputField,
    pub description: InputField,
    pub deadline: InputField,
    pub current_field: usize,
    /// Deadline of the entry being edited, with the text it was shown as.
    /// An untouched deadline field keeps this exact value instead of re-parsing.
    original_deadline: Option<(String, DateTime<Utc>)>,
}

impl EntryForm {
    /// Create an empty form with the title focused.
    pub fn new() -> Self {
        let mut form = Self::default();
        form.update_active_field();
        form
    }

    /// Create a form pre-populated from an existing entry.
    pub fn from_entry(entry: &impl Entry) -> Self {
        let deadline_text = format_deadline_input(entry.deadline());
        let mut form = Self {
            title: InputField::with_value(entry.title()),
            description: InputField::with_value(entry.description()),
            deadline: InputField::with_value(&deadline_text),
            current_field: TITLE_FIELD,
            original_deadline: entry.deadline().map(|d| (deadline_text, d)),
        };
        form.update_active_field();
        form
    }

    /// Turn the form into a draft, parsing the deadline text.
    pub fn to_draft(&self, now: DateTime<Utc>) -> Result<Draft, ValidationError> {
        let deadline = match &self.original_deadline {
            Some((text, original)) if *text == self.deadline.value => Some(*original),
            _ => parse_deadline_input(&self.deadline.value, now)?,
        };
        Ok(Draft {
            title: self.title.value.clone(),
            description: self.description.value.clone(),
            deadline,
        })
    }

    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % FIELD_COUNT;
        self.update_active_field();
    }

    pub fn prev_field(&mut self) {
        self.current_field = (self.current_field + FIELD_COUNT - 1) % FIELD_COUNT;
        self.update_active_field();
    }

    /// Update which field is currently active for editing.
    pub fn update_active_field(&mut self) {
        self.title.active = self.current_field == TITLE_FIELD;
        self.description.active = self.current_field == DESCRIPTION_FIELD;
        self.deadline.active = self.current_field == DEADLINE_FIELD;
    }

    /// The field that currently receives keystrokes.
    pub fn active_mut(&mut self) -> &mut InputField {
        match self.current_field {
            DESCRIPTION_FIELD => &mut self.description,
            DEADLINE_FIELD => &mut self.deadline,
            _ => &mut self.title,
        }
    }

    /// Fields with their labels, in visual order.
    pub fn fields(&self) -> [(&'static str, &InputField); FIELD_COUNT] {
        [
            ("Title *", &self.title),
            ("Description", &self.description),
            ("Deadline", &self.deadline),
        ]
    }
}
