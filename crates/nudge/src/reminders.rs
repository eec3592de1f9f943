//! Store management and preview subcommands.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use clap::{Args, Subcommand};
use miette::Result;
use tracing::warn;
use uuid::Uuid;

use nudge_recurrence::{Recurrence, RecurrenceKind, upcoming};
use nudge_scheduler::{JsonFileRepository, Reminder, ReminderRepository};

/// When a reminder fires, shared by every pattern.
#[derive(Args, Debug, Clone)]
pub struct TimingArgs {
    /// Wall-clock time of day (HH:MM)
    #[arg(long)]
    pub at: String,

    /// IANA time zone, e.g. Europe/Berlin (default: UTC)
    #[arg(long)]
    pub zone: Option<String>,

    /// First date the reminder may fire (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date the reminder may fire (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

/// Recurrence pattern.
#[derive(Subcommand, Debug, Clone)]
pub enum PatternArgs {
    /// Fire once
    Once {
        /// Date to fire on (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },

    /// Fire every day
    Daily,

    /// Fire on some weekdays
    Weekly {
        /// Comma-separated weekdays, e.g. mon,thu
        #[arg(long, value_delimiter = ',', required = true, value_parser = parse_weekday)]
        days: Vec<Weekday>,
    },

    /// Fire on some days of the month
    Monthly {
        /// Comma-separated days of the month, e.g. 1,15
        #[arg(long, value_delimiter = ',', required = true)]
        days: Vec<u32>,
    },

    /// Fire every N days
    Interval {
        /// Days between firings
        #[arg(long)]
        every: u32,
    },

    /// Fire after growing gaps
    Spaced {
        /// Comma-separated day offsets, e.g. 0,1,3,7
        #[arg(long, value_delimiter = ',', required = true)]
        offsets: Vec<u32>,
    },
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| format!("invalid weekday '{}', expected mon..sun", s))
}

/// Combine CLI arguments into a recurrence.
pub fn build_recurrence(timing: &TimingArgs, pattern: &PatternArgs) -> Recurrence {
    let kind = match pattern {
        PatternArgs::Once { .. } => RecurrenceKind::Once,
        PatternArgs::Daily => RecurrenceKind::Daily,
        PatternArgs::Weekly { days } => RecurrenceKind::Weekly {
            weekdays: days.clone(),
        },
        PatternArgs::Monthly { days } => RecurrenceKind::Monthly {
            days_of_month: days.clone(),
        },
        PatternArgs::Interval { every } => RecurrenceKind::Interval {
            interval_days: *every,
        },
        PatternArgs::Spaced { offsets } => RecurrenceKind::SpacedRepetition {
            spaced_offsets: offsets.clone(),
            firings: 0,
        },
    };

    let start_date = match pattern {
        PatternArgs::Once { date } => Some(*date),
        _ => timing.start,
    };

    Recurrence {
        kind,
        time_of_day: timing.at.clone(),
        zone: timing.zone.clone(),
        start_date,
        end_date: timing.end,
    }
}

fn warn_on_unknown_zone(recurrence: &Recurrence) {
    if !recurrence.has_known_zone() {
        warn!(
            zone = recurrence.zone.as_deref().unwrap_or_default(),
            "unknown time zone, reminder will use UTC"
        );
    }
}

/// One-line summary of a stored reminder.
pub fn describe(reminder: &Reminder) -> String {
    let pattern = reminder
        .recurrence
        .as_ref()
        .map_or("once", |r| r.kind.name());
    let next = reminder
        .next_trigger
        .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
    let status = if !reminder.is_active {
        "done"
    } else if reminder.stalled {
        "stalled"
    } else if reminder.next_trigger.is_none() {
        "stuck"
    } else {
        "active"
    };

    format!(
        "{}  user={}  {:<17} next={}  [{}]  {}",
        reminder.id, reminder.user_id, pattern, next, status, reminder.message
    )
}

/// Upcoming triggers rendered in UTC and in the recurrence's own zone.
pub fn preview_lines(
    recurrence: &Recurrence,
    now: DateTime<Utc>,
    count: usize,
) -> Result<Vec<String>> {
    recurrence
        .validate()
        .map_err(|e| miette::miette!("invalid recurrence: {}", e))?;

    let zone = recurrence.tz();
    Ok(upcoming(recurrence, now, count)
        .into_iter()
        .map(|t| {
            format!(
                "{}  ({})",
                t.to_rfc3339(),
                t.with_timezone(&zone).format("%a %Y-%m-%d %H:%M %Z")
            )
        })
        .collect())
}

async fn open(store: &Path) -> Result<JsonFileRepository> {
    JsonFileRepository::open(store)
        .await
        .map_err(|e| miette::miette!("failed to open store {}: {}", store.display(), e))
}

pub async fn add(
    store: &Path,
    user: i64,
    message: String,
    timing: &TimingArgs,
    pattern: &PatternArgs,
) -> Result<()> {
    let recurrence = build_recurrence(timing, pattern);
    warn_on_unknown_zone(&recurrence);

    let repository = open(store).await?;
    let reminder = repository
        .create_reminder(user, message, recurrence, Utc::now())
        .await
        .map_err(|e| miette::miette!("failed to add reminder: {}", e))?;

    println!("{}", describe(&reminder));
    Ok(())
}

pub async fn list(store: &Path, user: Option<i64>, all: bool) -> Result<()> {
    let repository = open(store).await?;
    let reminders = match user {
        Some(user) => repository.get_user_reminders(user).await,
        None => repository.get_all_reminders().await,
    }
    .map_err(|e| miette::miette!("{}", e))?;

    let shown: Vec<&Reminder> = reminders.iter().filter(|r| all || r.is_active).collect();
    if shown.is_empty() {
        println!("no reminders");
    }
    for reminder in shown {
        println!("{}", describe(reminder));
    }
    Ok(())
}

pub async fn remove(store: &Path, id: Uuid) -> Result<()> {
    let repository = open(store).await?;
    let removed = repository
        .delete_reminder(id)
        .await
        .map_err(|e| miette::miette!("{}", e))?;

    if !removed {
        return Err(miette::miette!("no reminder with id {}", id));
    }
    println!("removed {}", id);
    Ok(())
}

pub async fn reschedule(store: &Path, id: Uuid) -> Result<()> {
    let repository = open(store).await?;
    let reminder = repository
        .reschedule_reminder(id, Utc::now())
        .await
        .map_err(|e| miette::miette!("failed to reschedule {}: {}", id, e))?;

    println!("{}", describe(&reminder));
    Ok(())
}

pub fn preview(timing: &TimingArgs, pattern: &PatternArgs, count: usize) -> Result<()> {
    let recurrence = build_recurrence(timing, pattern);
    warn_on_unknown_zone(&recurrence);

    let lines = preview_lines(&recurrence, Utc::now(), count)?;
    if lines.is_empty() {
        println!("no upcoming triggers");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}
