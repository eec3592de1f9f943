//! Recurrence scheduling for Nudge reminders.
//!
//! This crate provides:
//! - The [`Recurrence`] model describing when a reminder repeats
//! - Pure next-trigger calculators for every pattern, evaluated in the
//!   reminder's own IANA time zone
//! - The [`SpacedPolicy`] that maps firing counts to spaced-repetition gaps
//!
//! Nothing here performs I/O or holds state, so every function is safe to
//! call from any thread.

mod calc;
mod error;
mod spaced;
mod types;

pub use calc::{
    initial_trigger, next_daily, next_for_recurrence, next_monthly, next_weekly, parse_time_of_day,
    resolve_zone, upcoming,
};
pub use error::RecurrenceError;
pub use spaced::SpacedPolicy;
pub use types::{Recurrence, RecurrenceKind};
