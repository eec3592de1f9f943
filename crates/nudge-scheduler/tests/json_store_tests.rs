//! JSON file store persistence.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use nudge_recurrence::{Recurrence, RecurrenceKind};
use nudge_scheduler::{
    JsonFileRepository, Notifier, Reminder, ReminderRepository, ReminderRequest, SchedulerError,
    log_delivery,
};

fn store_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("reminders.json")
}

#[tokio::test]
async fn test_missing_file_opens_empty() {
    let dir = TempDir::new().unwrap();
    let repo = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    assert!(repo.get_all_reminders().await.unwrap().is_empty());
    assert!(!store_path(&dir).exists());
}

#[tokio::test]
async fn test_blank_file_opens_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(store_path(&dir), "  \n").unwrap();
    let repo = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    assert!(repo.get_all_reminders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(store_path(&dir), "{not json").unwrap();
    let result = JsonFileRepository::open(store_path(&dir)).await;
    assert!(matches!(result, Err(SchedulerError::Json(_))));
}

#[tokio::test]
async fn test_reminders_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap();

    let created = {
        let repo = JsonFileRepository::open(store_path(&dir)).await.unwrap();
        repo.create_monthly_reminder(
            ReminderRequest::new(12, "pay rent", "08:00").with_zone("Europe/Berlin"),
            vec![1],
            now,
        )
        .await
        .unwrap()
    };

    let reopened = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let all = reopened.get_all_reminders().await.unwrap();
    assert_eq!(all, vec![created]);
    assert!(!dir.path().join("reminders.json.tmp").exists());
}

#[tokio::test]
async fn test_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("nudge").join("reminders.json");
    let repo = JsonFileRepository::open(&path).await.unwrap();
    repo.insert_reminder(Reminder::at(1, "hi", Utc::now()))
        .await
        .unwrap();
    assert!(path.exists());
    assert_eq!(repo.path(), path.as_path());
}

#[tokio::test]
async fn test_update_and_delete_persist() {
    let dir = TempDir::new().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();

    let repo = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let mut keep = Reminder::at(1, "keep", at);
    let gone = Reminder::at(2, "gone", at);
    repo.insert_reminder(keep.clone()).await.unwrap();
    repo.insert_reminder(gone.clone()).await.unwrap();

    keep.message = "keep, edited".to_string();
    repo.update_reminder(&keep).await.unwrap();
    assert!(repo.delete_reminder(gone.id).await.unwrap());

    let reopened = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    assert_eq!(reopened.get_all_reminders().await.unwrap(), vec![keep]);
}

#[tokio::test]
async fn test_failed_insert_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let repo = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let reminder = Reminder::at(1, "once", Utc::now());
    repo.insert_reminder(reminder.clone()).await.unwrap();

    let result = repo.insert_reminder(reminder.clone()).await;
    assert!(matches!(result, Err(SchedulerError::ReminderExists(_))));

    let reopened = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    assert_eq!(reopened.get_all_reminders().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_zone_survives_and_resolves_to_utc() {
    let dir = TempDir::new().unwrap();
    let at = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
    let recurrence = Recurrence::daily("09:00").with_zone("Mars/Olympus_Mons");
    let reminder = Reminder::new(1, "dust the rover", Some(recurrence), at);

    {
        let repo = JsonFileRepository::open(store_path(&dir)).await.unwrap();
        repo.insert_reminder(reminder.clone()).await.unwrap();
    }

    let reopened = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let loaded = reopened.get_reminder(reminder.id).await.unwrap().unwrap();
    let recurrence = loaded.recurrence.unwrap();
    assert_eq!(recurrence.zone.as_deref(), Some("Mars/Olympus_Mons"));
    assert_eq!(recurrence.tz(), Tz::UTC);
}

#[tokio::test]
async fn test_loads_hand_written_records() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        store_path(&dir),
        r#"[
          {
            "id": "6f1c2a4e-8d3b-4c5a-9e7f-0a1b2c3d4e5f",
            "user_id": 77,
            "message": "fortnightly review",
            "created_at": "2025-01-01T00:00:00Z",
            "recurrence": {"pattern": "fortnightly", "time_of_day": "07:30"},
            "next_trigger": "2025-01-02T07:30:00Z",
            "is_active": true
          },
          {
            "id": "0e9d8c7b-6a5f-4e3d-2c1b-a09f8e7d6c5b",
            "user_id": 78,
            "message": "bare",
            "created_at": "2025-01-01T00:00:00Z",
            "is_active": true
          }
        ]"#,
    )
    .unwrap();

    let repo = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let all = repo.get_all_reminders().await.unwrap();
    assert_eq!(all.len(), 2);

    let recurrence = all[0].recurrence.as_ref().unwrap();
    assert_eq!(recurrence.kind, RecurrenceKind::Unknown);
    assert!(!all[0].stalled);

    assert_eq!(all[1].recurrence, None);
    assert_eq!(all[1].next_trigger, None);
}

#[tokio::test]
async fn test_sweep_persists_advanced_schedule() {
    let dir = TempDir::new().unwrap();
    let fired_at = Utc.with_ymd_and_hms(2025, 2, 27, 6, 0, 0).unwrap();
    let recurrence = Recurrence::interval(2, "06:00")
        .with_end_date(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
    let reminder = Reminder::new(3, "run", Some(recurrence), fired_at);
    let id = reminder.id;

    let repo = Arc::new(JsonFileRepository::open(store_path(&dir)).await.unwrap());
    repo.insert_reminder(reminder).await.unwrap();

    let notifier = Notifier::new(repo.clone(), log_delivery());
    let report = notifier.sweep_at(fired_at).await.unwrap();
    assert_eq!(report.advanced, 1);

    let reopened = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let loaded = reopened.get_reminder(id).await.unwrap().unwrap();
    assert_eq!(
        loaded.next_trigger,
        Some(Utc.with_ymd_and_hms(2025, 3, 1, 6, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_handles_see_each_others_writes() {
    let dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();

    // The daemon opens the store first, then a CLI call adds a reminder.
    let daemon = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let mut fired = Reminder::new(1, "stretch", Some(Recurrence::daily("09:00")), now);
    daemon.insert_reminder(fired.clone()).await.unwrap();

    let cli = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let added = Reminder::at(2, "call mum", now);
    cli.insert_reminder(added.clone()).await.unwrap();
    assert_eq!(daemon.get_reminder(added.id).await.unwrap(), Some(added.clone()));

    // The daemon's update must not drop the CLI's reminder.
    fired.advance(now);
    daemon.update_reminder(&fired).await.unwrap();

    let reopened = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    assert_eq!(reopened.get_all_reminders().await.unwrap(), vec![fired, added]);
}

#[tokio::test]
async fn test_delete_is_not_undone_by_another_handle() {
    let dir = TempDir::new().unwrap();
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();

    let daemon = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let cli = JsonFileRepository::open(store_path(&dir)).await.unwrap();
    let mut kept = Reminder::at(1, "kept", now);
    let removed = Reminder::at(2, "removed", now);
    daemon.insert_reminder(kept.clone()).await.unwrap();
    daemon.insert_reminder(removed.clone()).await.unwrap();

    assert!(cli.delete_reminder(removed.id).await.unwrap());
    kept.is_active = false;
    daemon.update_reminder(&kept).await.unwrap();

    assert_eq!(daemon.get_all_reminders().await.unwrap(), vec![kept]);
    let stale = daemon.update_reminder(&removed).await;
    assert!(matches!(stale, Err(SchedulerError::ReminderNotFound(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_handles_keep_every_insert() {
    let dir = TempDir::new().unwrap();
    let path = store_path(&dir);

    let writers: Vec<_> = (0..8)
        .map(|user_id| {
            let path = path.clone();
            tokio::spawn(async move {
                let repo = JsonFileRepository::open(path).await.unwrap();
                repo.insert_reminder(Reminder::at(user_id, "hi", Utc::now()))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let repo = JsonFileRepository::open(&path).await.unwrap();
    let mut users: Vec<i64> = repo
        .get_all_reminders()
        .await
        .unwrap()
        .iter()
        .map(|r| r.user_id)
        .collect();
    users.sort_unstable();
    assert_eq!(users, (0..8).collect::<Vec<_>>());
}
