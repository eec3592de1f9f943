//! Reminder store backed by a JSON file.
//!
//! The whole store is a JSON array of reminders. Nothing is cached: every
//! read loads the file, and every mutation re-reads it under an exclusive
//! advisory lock on a sibling `.lock` file, applies its single-record change
//! and writes the result back. Several processes (the notifier daemon and
//! CLI invocations) can therefore share one store without losing each
//! other's writes.
//!
//! Writes go to a sibling temp file that is synced and then renamed over the
//! original, so readers never see a partial file and a crash mid-write
//! leaves the previous version intact.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::fs_std::FileExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Reminder, ReminderRepository, SchedulerError};

/// Durable reminder store in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Exclusive hold on the store. Released when dropped.
struct StoreLock(std::fs::File);

impl JsonFileRepository {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// The file is parsed once here so a corrupt store fails early.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SchedulerError> {
        let path = path.into();
        let lock_path = path.with_extension("json.lock");
        let repository = Self { path, lock_path };

        let count = repository.load().await?.len();
        info!(path = %repository.path.display(), count, "opened reminder store");
        Ok(repository)
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Reminder>, SchedulerError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_parent(&self) -> Result<(), SchedulerError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Take the cross-process write lock, waiting for other holders.
    async fn lock(&self) -> Result<StoreLock, SchedulerError> {
        self.ensure_parent().await?;

        let lock_path = self.lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(StoreLock(file))
    }

    /// Write the store: temp file, fsync, rename. Caller holds the lock.
    async fn persist(
        &self,
        _lock: &StoreLock,
        reminders: &[Reminder],
    ) -> Result<(), SchedulerError> {
        let content = serde_json::to_vec_pretty(reminders)?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;

        debug!(count = reminders.len(), "persisted reminders");
        Ok(())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

#[async_trait]
impl ReminderRepository for JsonFileRepository {
    async fn insert_reminder(&self, reminder: Reminder) -> Result<(), SchedulerError> {
        let lock = self.lock().await?;
        let mut reminders = self.load().await?;
        if reminders.iter().any(|r| r.id == reminder.id) {
            return Err(SchedulerError::ReminderExists(reminder.id));
        }

        reminders.push(reminder);
        self.persist(&lock, &reminders).await
    }

    async fn get_reminder(&self, id: Uuid) -> Result<Option<Reminder>, SchedulerError> {
        Ok(self.load().await?.into_iter().find(|r| r.id == id))
    }

    async fn get_all_reminders(&self) -> Result<Vec<Reminder>, SchedulerError> {
        self.load().await
    }

    async fn update_reminder(&self, reminder: &Reminder) -> Result<(), SchedulerError> {
        let lock = self.lock().await?;
        let mut reminders = self.load().await?;
        let slot = reminders
            .iter_mut()
            .find(|r| r.id == reminder.id)
            .ok_or(SchedulerError::ReminderNotFound(reminder.id))?;

        *slot = reminder.clone();
        self.persist(&lock, &reminders).await
    }

    async fn delete_reminder(&self, id: Uuid) -> Result<bool, SchedulerError> {
        let lock = self.lock().await?;
        let mut reminders = self.load().await?;
        let before = reminders.len();
        reminders.retain(|r| r.id != id);
        if reminders.len() == before {
            return Ok(false);
        }

        self.persist(&lock, &reminders).await?;
        Ok(true)
    }
}
