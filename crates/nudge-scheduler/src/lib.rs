//! Reminder storage and notifier loop for Nudge.
//!
//! This crate provides:
//! - The [`Reminder`] entity and the [`ReminderRepository`] persistence seam
//! - In-memory and JSON-file repository implementations
//! - The [`Notifier`], which sweeps reminders, delivers due ones, and
//!   advances each schedule exactly once per firing

mod delivery;
mod error;
mod json_store;
mod memory;
mod notifier;
mod repository;
mod types;

pub use delivery::{DeliveryAction, log_delivery, webhook_delivery};
pub use error::SchedulerError;
pub use json_store::JsonFileRepository;
pub use memory::InMemoryRepository;
pub use notifier::{Notifier, NotifierConfig, SweepReport, delay_until_aligned};
pub use repository::ReminderRepository;
pub use types::{Advance, Reminder, ReminderRequest};
