//! Recurrence types.

use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{RecurrenceError, parse_time_of_day, resolve_zone};

/// When and how often a reminder fires.
///
/// Serialized flat, with the pattern tag alongside the shared fields:
///
/// ```json
/// {"pattern": "weekly", "weekdays": ["Mon", "Fri"], "time_of_day": "09:00", "zone": "Europe/Berlin"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Pattern and its pattern-specific parameters.
    #[serde(flatten)]
    pub kind: RecurrenceKind,
    /// Wall-clock `HH:MM` in `zone`.
    pub time_of_day: String,
    /// IANA zone name. Kept as a string and resolved on use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    /// First local date the reminder may fire. Anchors `Once` and spaced repetition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last local date the reminder may fire (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Recurrence pattern with only the parameters that pattern uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum RecurrenceKind {
    /// Fire once on `start_date`.
    Once,
    /// Fire every day.
    Daily,
    /// Fire on the listed weekdays.
    Weekly { weekdays: Vec<Weekday> },
    /// Fire on the listed days of the month. Days a month lacks are skipped.
    Monthly { days_of_month: Vec<u32> },
    /// Fire every `interval_days` days.
    Interval { interval_days: u32 },
    /// Fire after progressively spaced gaps.
    SpacedRepetition {
        spaced_offsets: Vec<u32>,
        /// Number of times this reminder has fired so far.
        #[serde(default)]
        firings: u32,
    },
    /// A pattern tag this version does not know. Scheduled as daily.
    #[serde(other)]
    Unknown,
}

impl RecurrenceKind {
    /// Stable lowercase name, matching the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly { .. } => "weekly",
            Self::Monthly { .. } => "monthly",
            Self::Interval { .. } => "interval",
            Self::SpacedRepetition { .. } => "spaced_repetition",
            Self::Unknown => "unknown",
        }
    }
}

impl Recurrence {
    fn with_kind(kind: RecurrenceKind, time_of_day: impl Into<String>) -> Self {
        Self {
            kind,
            time_of_day: time_of_day.into(),
            zone: None,
            start_date: None,
            end_date: None,
        }
    }

    /// One-shot recurrence on `date`.
    pub fn once(date: NaiveDate, time_of_day: impl Into<String>) -> Self {
        let mut recurrence = Self::with_kind(RecurrenceKind::Once, time_of_day);
        recurrence.start_date = Some(date);
        recurrence
    }

    /// Every day.
    pub fn daily(time_of_day: impl Into<String>) -> Self {
        Self::with_kind(RecurrenceKind::Daily, time_of_day)
    }

    /// On the given weekdays.
    pub fn weekly(weekdays: Vec<Weekday>, time_of_day: impl Into<String>) -> Self {
        Self::with_kind(RecurrenceKind::Weekly { weekdays }, time_of_day)
    }

    /// On the given days of the month.
    pub fn monthly(days_of_month: Vec<u32>, time_of_day: impl Into<String>) -> Self {
        Self::with_kind(RecurrenceKind::Monthly { days_of_month }, time_of_day)
    }

    /// Every `interval_days` days.
    pub fn interval(interval_days: u32, time_of_day: impl Into<String>) -> Self {
        Self::with_kind(RecurrenceKind::Interval { interval_days }, time_of_day)
    }

    /// Spaced repetition over the given day offsets.
    pub fn spaced_repetition(spaced_offsets: Vec<u32>, time_of_day: impl Into<String>) -> Self {
        Self::with_kind(
            RecurrenceKind::SpacedRepetition {
                spaced_offsets,
                firings: 0,
            },
            time_of_day,
        )
    }

    /// Set the IANA zone name.
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Set the first local date the reminder may fire.
    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Set the last local date the reminder may fire.
    pub fn with_end_date(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    /// Resolved time zone. Unknown or missing names resolve to UTC.
    pub fn tz(&self) -> Tz {
        resolve_zone(self.zone.as_deref())
    }

    /// Whether `zone` is absent or names a zone the tz database knows.
    pub fn has_known_zone(&self) -> bool {
        self.zone
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .is_none_or(|z| z.parse::<Tz>().is_ok())
    }

    /// Whether this recurrence never fires more than once.
    pub fn is_once(&self) -> bool {
        matches!(self.kind, RecurrenceKind::Once)
    }

    /// Record that the reminder fired.
    ///
    /// Only spaced repetition tracks firings; other patterns are stateless.
    pub fn record_firing(&mut self) {
        if let RecurrenceKind::SpacedRepetition { firings, .. } = &mut self.kind {
            *firings = firings.saturating_add(1);
        }
    }

    /// Check the recurrence is well formed enough to schedule.
    ///
    /// Unknown zone names are accepted; they resolve to UTC.
    pub fn validate(&self) -> Result<(), RecurrenceError> {
        parse_time_of_day(&self.time_of_day)?;

        match &self.kind {
            RecurrenceKind::Once | RecurrenceKind::Daily | RecurrenceKind::Unknown => {}
            RecurrenceKind::Weekly { weekdays } => {
                if weekdays.is_empty() {
                    return Err(RecurrenceError::InvalidConfig(
                        "weekly recurrence needs at least one weekday".to_string(),
                    ));
                }
            }
            RecurrenceKind::Monthly { days_of_month } => {
                if days_of_month.is_empty() {
                    return Err(RecurrenceError::InvalidConfig(
                        "monthly recurrence needs at least one day".to_string(),
                    ));
                }
                if let Some(day) = days_of_month.iter().find(|d| !(1..=31).contains(*d)) {
                    return Err(RecurrenceError::InvalidConfig(format!(
                        "day of month out of range: {}",
                        day
                    )));
                }
            }
            RecurrenceKind::Interval { interval_days } => {
                if *interval_days == 0 {
                    return Err(RecurrenceError::InvalidConfig(
                        "interval must be at least one day".to_string(),
                    ));
                }
            }
            RecurrenceKind::SpacedRepetition { spaced_offsets, .. } => {
                if spaced_offsets.is_empty() {
                    return Err(RecurrenceError::InvalidConfig(
                        "spaced repetition needs at least one offset".to_string(),
                    ));
                }
            }
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && end < start
        {
            return Err(RecurrenceError::InvalidConfig(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }

        Ok(())
    }
}
