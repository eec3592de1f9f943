//! Notifier loop: sweep reminders, deliver due ones, advance their schedules.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, Timelike, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use nudge_recurrence::resolve_zone;

use crate::{Advance, DeliveryAction, Reminder, ReminderRepository, SchedulerError};

/// Default time between sweeps.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15 * 60;

/// Shortest accepted time between sweeps.
const MIN_POLL_INTERVAL_SECS: u64 = 1;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Configuration for the notifier loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Time between sweeps.
    pub poll_interval: Duration,
    /// Delay the first sweep to a multiple of `poll_interval` since local midnight.
    pub align_to_interval: bool,
    /// Zone whose midnight alignment counts from. Server local time when `None`.
    pub align_zone: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            align_to_interval: true,
            align_zone: None,
        }
    }
}

impl NotifierConfig {
    /// Reject intervals the loop cannot honour.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.poll_interval < Duration::from_secs(MIN_POLL_INTERVAL_SECS) {
            return Err(SchedulerError::InvalidConfig(format!(
                "poll interval must be at least {}s, got {:?}",
                MIN_POLL_INTERVAL_SECS, self.poll_interval
            )));
        }
        Ok(())
    }
}

/// Counts from a single sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Reminders returned by the repository.
    pub scanned: usize,
    /// Reminders that were due.
    pub due: usize,
    /// Deliveries that succeeded.
    pub delivered: usize,
    /// Deliveries that failed.
    pub delivery_failures: usize,
    /// Reminders moved to a later trigger.
    pub advanced: usize,
    /// Reminders deactivated.
    pub deactivated: usize,
    /// Reminders whose schedule made no progress.
    pub stalled: usize,
    /// Active reminders with no trigger that were given one.
    pub backfilled: usize,
    /// Updates the repository rejected.
    pub persist_failures: usize,
}

/// Time to wait until the next multiple of `interval` since midnight.
///
/// Boundaries past the end of the day snap to the next midnight.
pub fn delay_until_aligned(now: NaiveDateTime, interval: Duration) -> Duration {
    let interval_secs = interval.as_secs().max(1);
    let since_midnight = u64::from(now.time().num_seconds_from_midnight());
    let nanos = now.time().nanosecond().min(999_999_999);

    let boundary = ((since_midnight / interval_secs + 1) * interval_secs).min(SECS_PER_DAY);
    Duration::from_secs(boundary - since_midnight).saturating_sub(Duration::from_nanos(
        u64::from(nanos),
    ))
}

/// Periodically fires due reminders.
pub struct Notifier {
    repository: Arc<dyn ReminderRepository>,
    deliver: DeliveryAction,
    config: NotifierConfig,
}

impl Notifier {
    /// Create a notifier with the default configuration.
    pub fn new(repository: Arc<dyn ReminderRepository>, deliver: DeliveryAction) -> Self {
        Self {
            repository,
            deliver,
            config: NotifierConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: NotifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    /// Run the notifier loop until shutdown is signalled.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let interval = self.config.poll_interval;
        info!(poll_interval_secs = interval.as_secs(), "notifier starting");

        if self.config.align_to_interval {
            let delay = delay_until_aligned(self.local_now(), interval);
            debug!(delay_secs = delay.as_secs(), "waiting for aligned start");
            if wait_for_shutdown(&mut shutdown_rx, delay).await {
                info!("notifier shut down before first sweep");
                return;
            }
        }

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.sweep().await {
                Ok(report) if report.due > 0 || report.backfilled > 0 => {
                    info!(?report, "sweep complete")
                }
                Ok(report) => debug!(scanned = report.scanned, "sweep found nothing due"),
                Err(e) => error!(error = %e, "sweep failed"),
            }

            if wait_for_shutdown(&mut shutdown_rx, interval).await {
                break;
            }
        }

        info!("notifier shut down gracefully");
    }

    /// Sweep at the current time.
    pub async fn sweep(&self) -> Result<SweepReport, SchedulerError> {
        self.sweep_at(Utc::now()).await
    }

    /// Fire every reminder due at `now` and advance its schedule.
    ///
    /// Reminders are processed in repository order. Each one is persisted
    /// independently; a failed update is logged and the reminder will be
    /// seen as due again on the next sweep.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, SchedulerError> {
        let reminders = self.repository.get_all_reminders().await?;
        let mut report = SweepReport {
            scanned: reminders.len(),
            ..SweepReport::default()
        };

        for reminder in reminders {
            if reminder.is_due(now) {
                report.due += 1;
                self.fire(reminder, now, &mut report).await;
            } else if reminder.is_active
                && !reminder.stalled
                && reminder.next_trigger.is_none()
            {
                self.backfill(reminder, now, &mut report).await;
            }
        }

        Ok(report)
    }

    /// Give an active reminder that lost its trigger a fresh schedule.
    async fn backfill(
        &self,
        mut reminder: Reminder,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) {
        match reminder.reschedule(now) {
            Ok(Advance::Rescheduled(next)) => {
                report.backfilled += 1;
                info!(
                    id = %reminder.id,
                    next_trigger = %next,
                    "scheduled reminder with no trigger"
                );
            }
            Ok(_) => {
                report.deactivated += 1;
                info!(
                    id = %reminder.id,
                    "reminder with no trigger has nothing left to fire"
                );
            }
            Err(e) => {
                report.stalled += 1;
                reminder.stalled = true;
                warn!(
                    id = %reminder.id,
                    error = %e,
                    "reminder has no trigger and an invalid recurrence"
                );
            }
        }

        if let Err(e) = self.repository.update_reminder(&reminder).await {
            report.persist_failures += 1;
            error!(id = %reminder.id, error = %e, "failed to persist reminder");
        }
    }

    async fn fire(&self, mut reminder: Reminder, now: DateTime<Utc>, report: &mut SweepReport) {
        debug!(id = %reminder.id, user_id = reminder.user_id, "firing reminder");

        match (self.deliver)(reminder.user_id, reminder.message.clone()).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.delivery_failures += 1;
                warn!(
                    id = %reminder.id,
                    user_id = reminder.user_id,
                    error = %e,
                    "delivery failed, advancing schedule anyway"
                );
            }
        }

        match reminder.advance(now) {
            Advance::Rescheduled(next) => {
                report.advanced += 1;
                debug!(id = %reminder.id, next_trigger = %next, "rescheduled reminder");
            }
            Advance::Deactivated => {
                report.deactivated += 1;
                info!(id = %reminder.id, "reminder finished");
            }
            Advance::Stalled => {
                report.stalled += 1;
                warn!(
                    id = %reminder.id,
                    time_of_day = reminder
                        .recurrence
                        .as_ref()
                        .map(|r| r.time_of_day.as_str())
                        .unwrap_or_default(),
                    "schedule made no progress, reminder needs inspection"
                );
            }
        }

        if let Err(e) = self.repository.update_reminder(&reminder).await {
            report.persist_failures += 1;
            error!(id = %reminder.id, error = %e, "failed to persist reminder");
        }
    }

    fn local_now(&self) -> NaiveDateTime {
        match &self.config.align_zone {
            Some(zone) => Utc::now()
                .with_timezone(&resolve_zone(Some(zone)))
                .naive_local(),
            None => Local::now().naive_local(),
        }
    }
}

/// Sleep for `duration`. Returns true if shutdown was signalled instead.
async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>, duration: Duration) -> bool {
    if *shutdown_rx.borrow() {
        return true;
    }

    tokio::select! {
        changed = shutdown_rx.changed() => {
            let stop = changed.is_err() || *shutdown_rx.borrow();
            if stop {
                info!("notifier received shutdown signal");
            }
            stop
        }
        _ = sleep(duration) => false,
    }
}
