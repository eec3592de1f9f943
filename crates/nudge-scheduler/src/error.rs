//! Error types for the scheduler.

use thiserror::Error;
use uuid::Uuid;

use nudge_recurrence::RecurrenceError;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Recurrence failed validation.
    #[error(transparent)]
    InvalidRecurrence(#[from] RecurrenceError),

    /// Recurrence has no occurrence on or before its end date.
    #[error("recurrence has no occurrence before its end date")]
    NoOccurrence,

    /// Reminder already exists.
    #[error("reminder already exists: {0}")]
    ReminderExists(Uuid),

    /// Reminder not found.
    #[error("reminder not found: {0}")]
    ReminderNotFound(Uuid),

    /// Store file could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store file could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delivery action failed.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Invalid notifier or delivery configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
