//! Title and deadline validation.
//!
//! Every check here is pure: callers pass the sibling scope and the current
//! time in, and nothing is mutated. The store runs these before it touches
//! the task list, so a failed check never leaves partial state behind.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::fields::Level;

/// Minimum gap between an entry's creation and its deadline.
pub const MIN_DEADLINE_LEAD_MINUTES: i64 = 60;

/// Reasons a create or edit is rejected. The messages are shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a task title.")]
    EmptyTitle,
    #[error("Subtask title required.")]
    EmptySubtaskTitle,
    #[error("{level} with this title already exists!")]
    DuplicateTitle { level: Level },
    #[error("Deadline cannot be in the past!")]
    PastDeadline,
    #[error("Deadline must be at least 1 hour later than creation time.")]
    TooSoonAfterCreation,
    #[error("Unrecognised deadline '{0}'. Use YYYY-MM-DD HH:MM or a relative time like 'in 2h'.")]
    InvalidDeadline(String),
}

/// Check that a title is non-empty after trimming and return the trimmed form.
pub fn validate_title(title: &str, level: Level) -> Result<&str, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(match level {
            Level::Task => ValidationError::EmptyTitle,
            Level::Subtask => ValidationError::EmptySubtaskTitle,
        });
    }
    Ok(trimmed)
}

/// Case-insensitive title clash against one sibling scope.
///
/// `exclude` is the current title of the entry being edited: keeping that
/// title (in any casing) is never a clash.
pub fn is_duplicate_title<'a, I>(title: &str, scope: I, exclude: Option<&str>) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = title.trim().to_lowercase();
    if exclude.is_some_and(|current| current.trim().to_lowercase() == wanted) {
        return false;
    }
    scope.into_iter().any(|t| t.trim().to_lowercase() == wanted)
}

/// Check an optional deadline against the current time and the creation time.
///
/// The past check runs first, matching what the user sees when both fail.
/// Returns the deadline normalised to UTC; `None` is always valid.
pub fn validate_deadline<Tz: TimeZone>(
    deadline: Option<DateTime<Tz>>,
    created: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let Some(deadline) = deadline.map(|d| d.with_timezone(&Utc)) else {
        return Ok(None);
    };
    if deadline < now {
        return Err(ValidationError::PastDeadline);
    }
    if deadline < created + Duration::minutes(MIN_DEADLINE_LEAD_MINUTES) {
        return Err(ValidationError::TooSoonAfterCreation);
    }
    Ok(Some(deadline))
}

/// Parse user-entered deadline text.
///
/// Supports:
/// - empty text (no deadline)
/// - RFC 3339 (`2026-10-18T09:00:00Z`)
/// - `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM` and the same with seconds, in local time
/// - `YYYY-MM-DD` (end of that local day, 23:59)
/// - `tomorrow` (same time tomorrow)
/// - `in 45m`, `in 2h`, `in 3d`, `in 1w`
pub fn parse_deadline_input(
    text: &str,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let s = text.trim().to_lowercase();
    if s.is_empty() {
        return Ok(None);
    }
    let invalid = || ValidationError::InvalidDeadline(text.trim().to_string());

    if s == "tomorrow" {
        return Ok(Some(now + Duration::days(1)));
    }

    if let Some(rest) = s.strip_prefix("in ") {
        let rest = rest.trim();
        let split = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        let (amount, unit) = rest.split_at(split);
        let amount: i64 = amount.parse().map_err(|_| invalid())?;
        let delta = match unit.trim() {
            "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(amount),
            "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(amount),
            "d" | "day" | "days" => Duration::try_days(amount),
            "w" | "week" | "weeks" => Duration::try_weeks(amount),
            _ => return Err(invalid()),
        };
        return delta
            .and_then(|delta| now.checked_add_signed(delta))
            .map(Some)
            .ok_or_else(invalid);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text.trim()) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }

    let naive = ["%Y-%m-%d %H:%M", "%Y-%m-%dt%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dt%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .ok()
                .and_then(|d| NaiveTime::from_hms_opt(23, 59, 0).map(|t| d.and_time(t)))
        })
        .ok_or_else(invalid)?;

    // A local time that falls in a DST gap has no instant; treat it as unparseable.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap()
    }

    #[test]
    fn blank_titles_are_rejected_per_level() {
        assert_eq!(validate_title("   ", Level::Task), Err(ValidationError::EmptyTitle));
        assert_eq!(validate_title("", Level::Subtask), Err(ValidationError::EmptySubtaskTitle));
        assert_eq!(validate_title("  Buy milk ", Level::Task), Ok("Buy milk"));
    }

    #[test]
    fn duplicate_check_ignores_case_and_whitespace() {
        let scope = ["Buy milk", "Pay bills"];
        assert!(is_duplicate_title("buy MILK", scope, None));
        assert!(is_duplicate_title(" Pay bills ", scope, None));
        assert!(!is_duplicate_title("Walk dog", scope, None));
    }

    #[test]
    fn editing_keeps_own_title_without_clash() {
        let scope = ["Buy milk", "Pay bills"];
        assert!(!is_duplicate_title("Buy milk", scope, Some("Buy milk")));
        assert!(!is_duplicate_title("BUY MILK", scope, Some("Buy milk")));
        // Renaming onto a sibling still clashes.
        assert!(is_duplicate_title("pay bills", scope, Some("Buy milk")));
    }

    #[test]
    fn deadline_rules() {
        let now = now();
        assert_eq!(validate_deadline::<Utc>(None, now, now), Ok(None));
        assert_eq!(
            validate_deadline(Some(now - Duration::minutes(1)), now, now),
            Err(ValidationError::PastDeadline)
        );
        assert_eq!(
            validate_deadline(Some(now + Duration::minutes(30)), now, now),
            Err(ValidationError::TooSoonAfterCreation)
        );
        let exactly = now + Duration::hours(1);
        assert_eq!(validate_deadline(Some(exactly), now, now), Ok(Some(exactly)));
        let later = now + Duration::hours(2);
        assert_eq!(validate_deadline(Some(later), now, now), Ok(Some(later)));
    }

    #[test]
    fn one_hour_rule_is_anchored_on_creation_not_now() {
        let created = now() - Duration::hours(5);
        // Forty minutes from now is fine for something created five hours ago.
        let deadline = now() + Duration::minutes(40);
        assert_eq!(validate_deadline(Some(deadline), created, now()), Ok(Some(deadline)));
    }

    #[test]
    fn past_check_wins_when_both_fail() {
        let created = now();
        let deadline = now() - Duration::hours(3);
        assert_eq!(
            validate_deadline(Some(deadline), created, now()),
            Err(ValidationError::PastDeadline)
        );
    }

    #[test]
    fn parses_relative_and_absolute_deadlines() {
        let now = now();
        assert_eq!(parse_deadline_input("", now), Ok(None));
        assert_eq!(parse_deadline_input("in 2h", now), Ok(Some(now + Duration::hours(2))));
        assert_eq!(parse_deadline_input("in 30m", now), Ok(Some(now + Duration::minutes(30))));
        assert_eq!(parse_deadline_input("In 3 days", now), Ok(Some(now + Duration::days(3))));
        assert_eq!(parse_deadline_input("tomorrow", now), Ok(Some(now + Duration::days(1))));
        assert_eq!(
            parse_deadline_input("2026-10-18T10:00:00Z", now),
            Ok(Some(Utc.with_ymd_and_hms(2026, 10, 18, 10, 0, 0).unwrap()))
        );

        let local = Local
            .with_ymd_and_hms(2026, 10, 18, 14, 30, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_deadline_input("2026-10-18 14:30", now), Ok(Some(local)));
        assert_eq!(parse_deadline_input("2026-10-18T14:30", now), Ok(Some(local)));
    }

    #[test]
    fn rejects_garbage_deadlines() {
        assert_eq!(
            parse_deadline_input("next blue moon", now()),
            Err(ValidationError::InvalidDeadline("next blue moon".into()))
        );
        assert!(parse_deadline_input("in 2 fortnights", now()).is_err());
        assert!(parse_deadline_input("in h", now()).is_err());
    }

    #[test]
    fn out_of_range_relative_deadlines_are_invalid() {
        assert_eq!(
            parse_deadline_input("in 999999999d", now()),
            Err(ValidationError::InvalidDeadline("in 999999999d".into()))
        );
        assert_eq!(
            parse_deadline_input("in 99999999999999w", now()),
            Err(ValidationError::InvalidDeadline("in 99999999999999w".into()))
        );
        // Too many digits for an i64.
        assert!(parse_deadline_input("in 99999999999999999999m", now()).is_err());
    }
}
