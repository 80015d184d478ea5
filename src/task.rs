//! Task and subtask data structures.
//!
//! A `Task` is a top-level item that owns an ordered list of `Subtask`s. A
//! subtask has the same shape minus the nested list, so the hierarchy is
//! exactly two levels deep. View flags (details shown, edit mode) are not part
//! of these types; the TUI keeps them separately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A top-level work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    pub created: DateTime<Utc>,
    #[serde(default, with = "deadline_format", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

/// A second-level item owned by exactly one `Task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default)]
    pub id: u64,
    pub title: String,
    #[serde(default, rename = "desc")]
    pub description: String,
    pub created: DateTime<Utc>,
    #[serde(default, with = "deadline_format", skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: bool,
}

/// Read access shared by tasks and subtasks.
pub trait Entry {
    fn id(&self) -> u64;
    fn title(&self) -> &str;
    fn description(&self) -> &str;
    fn created(&self) -> DateTime<Utc>;
    fn deadline(&self) -> Option<DateTime<Utc>>;
    fn completed(&self) -> bool;

    /// An incomplete entry whose deadline lies before `now`.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.completed() && self.deadline().is_some_and(|d| d < now)
    }
}

macro_rules! impl_entry {
    ($ty:ty) => {
        impl Entry for $ty {
            fn id(&self) -> u64 {
                self.id
            }
            fn title(&self) -> &str {
                &self.title
            }
            fn description(&self) -> &str {
                &self.description
            }
            fn created(&self) -> DateTime<Utc> {
                self.created
            }
            fn deadline(&self) -> Option<DateTime<Utc>> {
                self.deadline
            }
            fn completed(&self) -> bool {
                self.completed
            }
        }
    };
}

impl_entry!(Task);
impl_entry!(Subtask);

impl Task {
    /// Find a subtask by id.
    pub fn subtask(&self, id: u64) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }

    /// Find a subtask by id, mutably.
    pub fn subtask_mut(&mut self, id: u64) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == id)
    }
}

/// User-supplied fields for creating or editing a task or subtask.
///
/// Nothing here is validated yet; the store checks a draft before applying it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub title: String,
    pub description: String,
    pub deadline: Option<DateTime<Utc>>,
}

impl Draft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn deadline(mut self, deadline: Option<DateTime<Utc>>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Draft pre-filled from an existing entry, used by the edit paths.
    pub fn from_entry(entry: &impl Entry) -> Self {
        Self {
            title: entry.title().to_string(),
            description: entry.description().to_string(),
            deadline: entry.deadline(),
        }
    }
}

/// Serde adapter for the optional deadline.
///
/// Writes RFC 3339. Reads RFC 3339, the empty string (no deadline) and the
/// naive `YYYY-MM-DDTHH:MM` local form that older snapshots contain.
mod deadline_format {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

    pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_str(&d.to_rfc3339()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        let raw = match raw.as_deref().map(str::trim) {
            None | Some("") => return Ok(None),
            Some(s) => s,
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Some(dt.with_timezone(&Utc)));
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
                return Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|dt| Some(dt.with_timezone(&Utc)))
                    .ok_or_else(|| de::Error::custom(format!("nonexistent local time '{raw}'")));
            }
        }
        Err(de::Error::custom(format!("unrecognised deadline '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Local, TimeZone};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn expired_requires_past_deadline_and_incomplete() {
        let mut sub = Subtask {
            id: 1,
            title: "Call bank".into(),
            description: String::new(),
            created: at(8),
            deadline: Some(at(10)),
            completed: false,
        };
        assert!(!sub.is_expired(at(9)));
        assert!(sub.is_expired(at(11)));
        sub.completed = true;
        assert!(!sub.is_expired(at(11)));
        sub.deadline = None;
        sub.completed = false;
        assert!(!sub.is_expired(at(11) + Duration::days(365)));
    }

    #[test]
    fn reads_snapshot_written_by_browser_version() {
        let json = r#"[{
            "title": "Buy milk",
            "desc": "",
            "created": "2026-03-01T08:00:00.000Z",
            "deadline": "",
            "completed": false,
            "showDetails": true,
            "editing": false,
            "subtasks": [{
                "title": "Find wallet",
                "desc": "pocket?",
                "deadline": "2026-03-01T12:30",
                "created": "2026-03-01T08:05:00.000Z",
                "completed": true,
                "showDetails": false,
                "editing": false
            }]
        }]"#;
        let tasks: Vec<Task> = serde_json::from_str(json).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Buy milk");
        assert_eq!(tasks[0].id, 0);
        assert!(tasks[0].deadline.is_none());
        let sub = &tasks[0].subtasks[0];
        assert_eq!(sub.description, "pocket?");
        assert!(sub.completed);
        let expected = Local
            .with_ymd_and_hms(2026, 3, 1, 12, 30, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(sub.deadline, Some(expected));
    }

    #[test]
    fn serialises_without_view_flags_and_omits_missing_deadline() {
        let task = Task {
            id: 3,
            title: "Pay bills".into(),
            description: "electricity".into(),
            created: at(8),
            deadline: None,
            completed: false,
            subtasks: Vec::new(),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["desc"], "electricity");
        assert!(value.get("deadline").is_none());
        assert!(value.get("showDetails").is_none());
        assert!(value.get("editing").is_none());

        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back, task);
    }
}
