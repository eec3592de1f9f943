//! Reminder types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nudge_recurrence::{
    Recurrence, RecurrenceError, RecurrenceKind, initial_trigger, next_for_recurrence,
};

/// A scheduled reminder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique reminder id.
    pub id: Uuid,
    /// Chat user who owns the reminder and receives it.
    pub user_id: i64,
    /// Text delivered when the reminder fires.
    pub message: String,
    /// When this reminder was created.
    pub created_at: DateTime<Utc>,
    /// How the reminder repeats. `None` is an ad-hoc one-shot reminder.
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    /// When this reminder should next fire.
    #[serde(default)]
    pub next_trigger: Option<DateTime<Utc>>,
    /// Whether the reminder still fires.
    pub is_active: bool,
    /// Rescheduling made no progress; skipped until someone fixes the recurrence.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stalled: bool,
}

/// Owner, message and timing shared by every `create_*` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub user_id: i64,
    pub message: String,
    /// Wall-clock `HH:MM`.
    pub time_of_day: String,
    /// IANA zone name; UTC when absent.
    pub zone: Option<String>,
}

impl ReminderRequest {
    pub fn new(user_id: i64, message: impl Into<String>, time_of_day: impl Into<String>) -> Self {
        Self {
            user_id,
            message: message.into(),
            time_of_day: time_of_day.into(),
            zone: None,
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Attach a pattern, producing the full recurrence.
    pub fn recurrence(&self, kind: RecurrenceKind) -> Recurrence {
        Recurrence {
            kind,
            time_of_day: self.time_of_day.clone(),
            zone: self.zone.clone(),
            start_date: None,
            end_date: None,
        }
    }
}

/// What happened to a reminder's schedule after it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to a later trigger.
    Rescheduled(DateTime<Utc>),
    /// No further occurrence; the reminder is now inactive.
    Deactivated,
    /// The calculator made no progress; `next_trigger` was left alone.
    Stalled,
}

impl Reminder {
    /// Create a reminder with a known first trigger.
    pub fn new(
        user_id: i64,
        message: impl Into<String>,
        recurrence: Option<Recurrence>,
        next_trigger: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            message: message.into(),
            created_at: Utc::now(),
            recurrence,
            next_trigger: Some(next_trigger),
            is_active: true,
            stalled: false,
        }
    }

    /// Create an ad-hoc one-shot reminder with no recurrence.
    pub fn at(user_id: i64, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::new(user_id, message, None, at)
    }

    /// Whether this reminder fires at most once.
    pub fn is_one_shot(&self) -> bool {
        self.recurrence.as_ref().is_none_or(Recurrence::is_once)
    }

    /// Check if this reminder is due at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.stalled && self.next_trigger.is_some_and(|t| t <= now)
    }

    /// Move the schedule past a firing at `now`.
    ///
    /// One-shot reminders deactivate. Recurring reminders recompute from the
    /// recurrence's own time of day rather than the previous trigger, so
    /// drift in a stored trigger never compounds.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Advance {
        let Some(recurrence) = self.recurrence.as_mut().filter(|r| !r.is_once()) else {
            self.is_active = false;
            return Advance::Deactivated;
        };

        recurrence.record_firing();
        let time_of_day = recurrence.time_of_day.clone();

        match next_for_recurrence(now, &time_of_day, recurrence) {
            None => {
                self.is_active = false;
                Advance::Deactivated
            }
            Some(next) if next <= now => {
                self.stalled = true;
                Advance::Stalled
            }
            Some(next) => {
                self.next_trigger = Some(next);
                Advance::Rescheduled(next)
            }
        }
    }

    /// Recompute the schedule from the recurrence as if it were new at `now`.
    ///
    /// Recovers reminders that stalled or lost their trigger. Clears
    /// `stalled` on success; fails without touching the reminder if the
    /// recurrence is still invalid. A recurrence with nothing left before its
    /// end date deactivates, as does an ad-hoc reminder with no trigger.
    /// Inactive reminders stay inactive.
    pub fn reschedule(&mut self, now: DateTime<Utc>) -> Result<Advance, RecurrenceError> {
        let Some(recurrence) = self.recurrence.as_ref() else {
            self.stalled = false;
            return Ok(match self.next_trigger {
                Some(at) => Advance::Rescheduled(at),
                None => {
                    self.is_active = false;
                    Advance::Deactivated
                }
            });
        };

        recurrence.validate()?;
        self.stalled = false;
        match initial_trigger(now, recurrence) {
            Some(next) => {
                self.next_trigger = Some(next);
                Ok(Advance::Rescheduled(next))
            }
            None => {
                self.is_active = false;
                Ok(Advance::Deactivated)
            }
        }
    }
}
