//! The reminder persistence seam.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use tracing::info;
use uuid::Uuid;

use nudge_recurrence::{Recurrence, RecurrenceKind, initial_trigger};

use crate::{Reminder, ReminderRequest, SchedulerError};

/// Storage for reminders.
///
/// Implementations own their synchronization. Callers hold only transient
/// copies: read, mutate, then write back through [`update_reminder`].
///
/// The `create_*` methods validate the recurrence, compute the first
/// trigger, and persist the new reminder through [`insert_reminder`].
///
/// [`update_reminder`]: ReminderRepository::update_reminder
/// [`insert_reminder`]: ReminderRepository::insert_reminder
#[async_trait]
pub trait ReminderRepository: Send + Sync {
    /// Store a new reminder. Fails if the id is already taken.
    async fn insert_reminder(&self, reminder: Reminder) -> Result<(), SchedulerError>;

    /// Get a reminder by id.
    async fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>, SchedulerError>;

    /// Every stored reminder, active or not, in storage order.
    async fn get_all_reminders(&self) -> Result<Vec<Reminder>, SchedulerError>;

    /// Replace a stored reminder with the caller's copy.
    async fn update_reminder(&self, reminder: &Reminder) -> Result<(), SchedulerError>;

    /// Delete a reminder. Returns false if it did not exist.
    async fn delete_reminder(&self, id: Uuid) -> Result<bool, SchedulerError>;

    /// Reminders that still fire.
    async fn get_active_reminders(&self) -> Result<Vec<Reminder>, SchedulerError> {
        let mut reminders = self.get_all_reminders().await?;
        reminders.retain(|r| r.is_active);
        Ok(reminders)
    }

    /// Reminders owned by one user.
    async fn get_user_reminders(&self, user_id: i64) -> Result<Vec<Reminder>, SchedulerError> {
        let mut reminders = self.get_all_reminders().await?;
        reminders.retain(|r| r.user_id == user_id);
        Ok(reminders)
    }

    /// Recompute a stored reminder's schedule at `now` and persist it.
    ///
    /// See [`Reminder::reschedule`]. Used to recover reminders that stalled
    /// or were stored without a trigger.
    async fn reschedule_reminder(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        let mut reminder = self
            .get_reminder(id)
            .await?
            .ok_or(SchedulerError::ReminderNotFound(id))?;

        let outcome = reminder.reschedule(now)?;
        self.update_reminder(&reminder).await?;

        info!(
            id = %reminder.id,
            pattern = reminder_pattern(&reminder),
            ?outcome,
            "rescheduled reminder"
        );
        Ok(reminder)
    }

    /// Bind a recurrence to a new reminder and persist it.
    async fn create_reminder(
        &self,
        user_id: i64,
        message: String,
        recurrence: Recurrence,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        recurrence.validate()?;
        let next_trigger =
            initial_trigger(now, &recurrence).ok_or(SchedulerError::NoOccurrence)?;

        let reminder = Reminder::new(user_id, message, Some(recurrence), next_trigger);
        self.insert_reminder(reminder.clone()).await?;

        info!(
            id = %reminder.id,
            pattern = reminder_pattern(&reminder),
            %next_trigger,
            "created reminder"
        );
        Ok(reminder)
    }

    /// One-shot reminder on `date`.
    async fn create_once_reminder(
        &self,
        request: ReminderRequest,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        let mut recurrence = request.recurrence(RecurrenceKind::Once);
        recurrence.start_date = Some(date);
        self.create_reminder(request.user_id, request.message, recurrence, now)
            .await
    }

    /// Reminder that fires every day.
    async fn create_daily_reminder(
        &self,
        request: ReminderRequest,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        let recurrence = request.recurrence(RecurrenceKind::Daily);
        self.create_reminder(request.user_id, request.message, recurrence, now)
            .await
    }

    /// Reminder that fires on the given weekdays.
    async fn create_weekly_reminder(
        &self,
        request: ReminderRequest,
        weekdays: Vec<Weekday>,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        let recurrence = request.recurrence(RecurrenceKind::Weekly { weekdays });
        self.create_reminder(request.user_id, request.message, recurrence, now)
            .await
    }

    /// Reminder that fires on the given days of the month.
    async fn create_monthly_reminder(
        &self,
        request: ReminderRequest,
        days_of_month: Vec<u32>,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        let recurrence = request.recurrence(RecurrenceKind::Monthly { days_of_month });
        self.create_reminder(request.user_id, request.message, recurrence, now)
            .await
    }

    /// Reminder that fires every `interval_days` days.
    async fn create_interval_reminder(
        &self,
        request: ReminderRequest,
        interval_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        let recurrence = request.recurrence(RecurrenceKind::Interval { interval_days });
        self.create_reminder(request.user_id, request.message, recurrence, now)
            .await
    }

    /// Reminder that fires after progressively spaced gaps.
    async fn create_spaced_repetition_reminder(
        &self,
        request: ReminderRequest,
        spaced_offsets: Vec<u32>,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SchedulerError> {
        let recurrence = request.recurrence(RecurrenceKind::SpacedRepetition {
            spaced_offsets,
            firings: 0,
        });
        self.create_reminder(request.user_id, request.message, recurrence, now)
            .await
    }
}

fn reminder_pattern(reminder: &Reminder) -> &'static str {
    reminder
        .recurrence
        .as_ref()
        .map_or("none", |r| r.kind.name())
}
