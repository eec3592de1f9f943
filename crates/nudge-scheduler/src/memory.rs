//! In-memory reminder store.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::{Reminder, ReminderRepository, SchedulerError};

/// Reminder store that lives for the life of the process.
///
/// Cloning shares the underlying store, so the creation path and the
/// notifier can hold handles to the same reminders.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    reminders: Arc<RwLock<Vec<Reminder>>>,
}

impl InMemoryRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store preloaded with reminders.
    pub fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self {
            reminders: Arc::new(RwLock::new(reminders)),
        }
    }
}

#[async_trait]
impl ReminderRepository for InMemoryRepository {
    async fn insert_reminder(&self, reminder: Reminder) -> Result<(), SchedulerError> {
        let mut reminders = self.reminders.write().await;
        if reminders.iter().any(|r| r.id == reminder.id) {
            return Err(SchedulerError::ReminderExists(reminder.id));
        }
        reminders.push(reminder);
        Ok(())
    }

    async fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>, SchedulerError> {
        Ok(self
            .reminders
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn get_all_reminders(&self) -> Result<Vec<Reminder>, SchedulerError> {
        Ok(self.reminders.read().await.clone())
    }

    async fn update_reminder(&self, reminder: &Reminder) -> Result<(), SchedulerError> {
        let mut reminders = self.reminders.write().await;
        let slot = reminders
            .iter_mut()
            .find(|r| r.id == reminder.id)
            .ok_or(SchedulerError::ReminderNotFound(reminder.id))?;
        *slot = reminder.clone();
        debug!(id = %reminder.id, "updated reminder");
        Ok(())
    }

    async fn delete_reminder(&self, id: Uuid) -> Result<bool, SchedulerError> {
        let mut reminders = self.reminders.write().await;
        let before = reminders.len();
        reminders.retain(|r| r.id != id);
        Ok(reminders.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc, Weekday};
    use nudge_recurrence::{Recurrence, RecurrenceKind};

    use crate::ReminderRequest;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 10, 30, 0).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let repo = InMemoryRepository::new();
        let reminder = Reminder::at(1, "hello", now());
        repo.insert_reminder(reminder.clone()).await.unwrap();

        assert_eq!(repo.get_reminder(reminder.id).await.unwrap(), Some(reminder));
        assert_eq!(repo.get_reminder(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let repo = InMemoryRepository::new();
        let reminder = Reminder::at(1, "hello", now());
        repo.insert_reminder(reminder.clone()).await.unwrap();

        let result = repo.insert_reminder(reminder.clone()).await;
        assert!(matches!(result, Err(SchedulerError::ReminderExists(id)) if id == reminder.id));
    }

    #[tokio::test]
    async fn test_update_missing_fails() {
        let repo = InMemoryRepository::new();
        let reminder = Reminder::at(1, "hello", now());
        let result = repo.update_reminder(&reminder).await;
        assert!(matches!(result, Err(SchedulerError::ReminderNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_replaces() {
        let repo = InMemoryRepository::new();
        let mut reminder = Reminder::at(1, "hello", now());
        repo.insert_reminder(reminder.clone()).await.unwrap();

        reminder.is_active = false;
        repo.update_reminder(&reminder).await.unwrap();
        assert!(repo.get_active_reminders().await.unwrap().is_empty());
        assert_eq!(repo.get_all_reminders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryRepository::new();
        let reminder = Reminder::at(1, "hello", now());
        repo.insert_reminder(reminder.clone()).await.unwrap();

        assert!(repo.delete_reminder(reminder.id).await.unwrap());
        assert!(!repo.delete_reminder(reminder.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_clones_share_store() {
        let repo = InMemoryRepository::new();
        let handle = repo.clone();
        repo.insert_reminder(Reminder::at(1, "hello", now()))
            .await
            .unwrap();
        assert_eq!(handle.get_all_reminders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_user_reminders() {
        let repo = InMemoryRepository::new();
        repo.insert_reminder(Reminder::at(1, "a", now())).await.unwrap();
        repo.insert_reminder(Reminder::at(2, "b", now())).await.unwrap();
        repo.insert_reminder(Reminder::at(1, "c", now())).await.unwrap();

        let mine = repo.get_user_reminders(1).await.unwrap();
        let messages: Vec<_> = mine.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_create_binds_initial_trigger() {
        let repo = InMemoryRepository::new();
        let request = ReminderRequest::new(9, "standup", "11:00");

        let once = repo
            .create_once_reminder(
                request.clone(),
                NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
                now(),
            )
            .await
            .unwrap();
        assert_eq!(
            once.next_trigger,
            Some(Utc.with_ymd_and_hms(2025, 1, 20, 11, 0, 0).unwrap())
        );

        let daily = repo
            .create_daily_reminder(request.clone(), now())
            .await
            .unwrap();
        assert_eq!(
            daily.next_trigger,
            Some(Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap())
        );

        let weekly = repo
            .create_weekly_reminder(request.clone(), vec![Weekday::Mon, Weekday::Fri], now())
            .await
            .unwrap();
        assert_eq!(
            weekly.next_trigger,
            Some(Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap())
        );

        let monthly = repo
            .create_monthly_reminder(request.clone(), vec![1], now())
            .await
            .unwrap();
        assert_eq!(
            monthly.next_trigger,
            Some(Utc.with_ymd_and_hms(2025, 2, 1, 11, 0, 0).unwrap())
        );

        let interval = repo
            .create_interval_reminder(request.clone(), 4, now())
            .await
            .unwrap();
        assert_eq!(
            interval.next_trigger,
            Some(Utc.with_ymd_and_hms(2025, 1, 13, 11, 0, 0).unwrap())
        );

        let spaced = repo
            .create_spaced_repetition_reminder(request, vec![0, 1, 2], now())
            .await
            .unwrap();
        assert_eq!(
            spaced.next_trigger,
            Some(Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap())
        );
        assert!(matches!(
            spaced.recurrence.as_ref().map(|r| &r.kind),
            Some(RecurrenceKind::SpacedRepetition { firings: 0, .. })
        ));

        assert_eq!(repo.get_active_reminders().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_recurrence() {
        let repo = InMemoryRepository::new();

        let bad_time = repo
            .create_daily_reminder(ReminderRequest::new(1, "x", "25:00"), now())
            .await;
        assert!(matches!(bad_time, Err(SchedulerError::InvalidRecurrence(_))));

        let no_days = repo
            .create_weekly_reminder(ReminderRequest::new(1, "x", "09:00"), vec![], now())
            .await;
        assert!(matches!(no_days, Err(SchedulerError::InvalidRecurrence(_))));

        assert!(repo.get_all_reminders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_reminder() {
        let repo = InMemoryRepository::new();
        let mut stuck = Reminder::new(
            1,
            "water plants",
            Some(Recurrence::daily("18:00")),
            now(),
        );
        stuck.next_trigger = None;
        stuck.stalled = true;
        repo.insert_reminder(stuck.clone()).await.unwrap();

        let fixed = repo.reschedule_reminder(stuck.id, now()).await.unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 1, 10, 18, 0, 0).unwrap();
        assert_eq!(fixed.next_trigger, Some(expected));
        assert!(!fixed.stalled);
        assert_eq!(repo.get_reminder(stuck.id).await.unwrap(), Some(fixed));

        let missing = repo.reschedule_reminder(Uuid::new_v4(), now()).await;
        assert!(matches!(missing, Err(SchedulerError::ReminderNotFound(_))));
    }

    #[tokio::test]
    async fn test_reschedule_reminder_keeps_invalid_recurrence_stalled() {
        let repo = InMemoryRepository::new();
        let mut stuck = Reminder::new(1, "x", Some(Recurrence::daily("later")), now());
        stuck.stalled = true;
        repo.insert_reminder(stuck.clone()).await.unwrap();

        let result = repo.reschedule_reminder(stuck.id, now()).await;
        assert!(matches!(result, Err(SchedulerError::InvalidRecurrence(_))));
        assert_eq!(repo.get_reminder(stuck.id).await.unwrap(), Some(stuck));
    }
}
