//! Error types for recurrence validation.

use thiserror::Error;

/// Errors raised when validating recurrence input.
///
/// The calculators themselves never return these; they degrade to a safe
/// result instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    /// Time of day is not `HH:MM`.
    #[error("invalid time of day: {0:?}")]
    InvalidTimeOfDay(String),

    /// Pattern parameters are missing or out of range.
    #[error("invalid recurrence: {0}")]
    InvalidConfig(String),
}
