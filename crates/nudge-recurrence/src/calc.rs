//! Next-trigger calculation.
//!
//! Every calculator builds candidates by wall-clock construction: a local
//! date plus the configured time of day, resolved through the reminder's
//! zone. Advancing to a later date never adds a fixed 24-hour duration, so
//! the local time a reminder fires at stays put across DST transitions.
//!
//! Malformed input never panics. An unparseable time of day makes the
//! calculators return `from` unchanged; callers treat "no progress" as a
//! reminder that needs inspection.

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::{Recurrence, RecurrenceError, RecurrenceKind, SpacedPolicy};

/// How many months `next_monthly` searches before giving up.
const MONTHLY_SCAN_MONTHS: usize = 3;

/// Parse a wall-clock `HH:MM` (or `HH:MM:SS`) time of day.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, RecurrenceError> {
    let trimmed = input.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| RecurrenceError::InvalidTimeOfDay(input.to_string()))
}

/// Resolve an IANA zone name, falling back to UTC when missing or unknown.
pub fn resolve_zone(name: Option<&str>) -> Tz {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Tz::UTC;
    };

    name.parse::<Tz>().unwrap_or_else(|_| {
        debug!(zone = name, "unknown time zone, using UTC");
        Tz::UTC
    })
}

/// Next instant at `time_of_day` strictly after `from`.
pub fn next_daily(from: DateTime<Utc>, time_of_day: &str, zone: Tz) -> DateTime<Utc> {
    match parse_time_of_day(time_of_day) {
        Ok(time) => daily_after(from, time, zone),
        Err(e) => {
            warn!(error = %e, "cannot compute daily trigger");
            from
        }
    }
}

/// Earliest instant strictly after `from` on one of `weekdays` at `time_of_day`.
///
/// An empty weekday set schedules like daily.
pub fn next_weekly(
    from: DateTime<Utc>,
    weekdays: &[Weekday],
    time_of_day: &str,
    zone: Tz,
) -> DateTime<Utc> {
    match parse_time_of_day(time_of_day) {
        Ok(time) => weekly_after(from, weekdays, time, zone),
        Err(e) => {
            warn!(error = %e, "cannot compute weekly trigger");
            from
        }
    }
}

/// Earliest instant strictly after `from` on one of `days_of_month` at `time_of_day`.
///
/// Days a month does not have are skipped for that month.
pub fn next_monthly(
    from: DateTime<Utc>,
    days_of_month: &[u32],
    time_of_day: &str,
    zone: Tz,
) -> DateTime<Utc> {
    match parse_time_of_day(time_of_day) {
        Ok(time) => monthly_after(from, days_of_month, time, zone),
        Err(e) => {
            warn!(error = %e, "cannot compute monthly trigger");
            from
        }
    }
}

/// Next trigger after a reminder fired at `from`.
///
/// Returns `None` when the recurrence has no further occurrence: `Once`,
/// or a computed trigger past `end_date`. A malformed time of day yields
/// `Some(from)`.
pub fn next_for_recurrence(
    from: DateTime<Utc>,
    time_of_day: &str,
    recurrence: &Recurrence,
) -> Option<DateTime<Utc>> {
    let zone = recurrence.tz();

    let next = match &recurrence.kind {
        RecurrenceKind::Once => return None,
        RecurrenceKind::Daily | RecurrenceKind::Unknown => next_daily(from, time_of_day, zone),
        RecurrenceKind::Weekly { weekdays } => next_weekly(from, weekdays, time_of_day, zone),
        RecurrenceKind::Monthly { days_of_month } => {
            next_monthly(from, days_of_month, time_of_day, zone)
        }
        RecurrenceKind::Interval { interval_days } => {
            let days = (*interval_days).max(1);
            match parse_time_of_day(time_of_day) {
                Ok(time) => days_later(from, days, time, zone),
                Err(e) => {
                    warn!(error = %e, "cannot compute interval trigger");
                    from
                }
            }
        }
        RecurrenceKind::SpacedRepetition {
            spaced_offsets,
            firings,
        } => {
            let policy = SpacedPolicy::new(spaced_offsets);
            match (
                policy.days_until_next(*firings),
                parse_time_of_day(time_of_day),
            ) {
                (Some(days), Ok(time)) => days_later(from, days, time, zone),
                (None, _) => {
                    warn!("spaced repetition without offsets, scheduling daily");
                    next_daily(from, time_of_day, zone)
                }
                (_, Err(e)) => {
                    warn!(error = %e, "cannot compute spaced repetition trigger");
                    from
                }
            }
        }
    };

    within_bounds(recurrence, next, zone).then_some(next)
}

/// First trigger for a newly created reminder.
///
/// A `start_date` later than today moves the search to that date. Returns
/// `None` if the first occurrence is already past `end_date`.
pub fn initial_trigger(now: DateTime<Utc>, recurrence: &Recurrence) -> Option<DateTime<Utc>> {
    let zone = recurrence.tz();
    let today = local_date(now, zone);
    let Ok(time) = parse_time_of_day(&recurrence.time_of_day) else {
        warn!(
            time_of_day = %recurrence.time_of_day,
            "cannot compute initial trigger"
        );
        return Some(now);
    };

    // Search from just before the start date so a trigger at local midnight counts.
    let anchor = match recurrence.start_date {
        Some(start) if start > today => {
            wall_clock(start, NaiveTime::MIN, zone) - Duration::seconds(1)
        }
        _ => now,
    };

    let first = match &recurrence.kind {
        RecurrenceKind::Once => match recurrence.start_date {
            Some(date) => wall_clock(date, time, zone),
            None => daily_after(now, time, zone),
        },
        RecurrenceKind::Daily | RecurrenceKind::Unknown => daily_after(anchor, time, zone),
        RecurrenceKind::Weekly { weekdays } => weekly_after(anchor, weekdays, time, zone),
        RecurrenceKind::Monthly { days_of_month } => {
            monthly_after(anchor, days_of_month, time, zone)
        }
        RecurrenceKind::Interval { interval_days } => {
            let first = daily_after(anchor, time, zone);
            let extra = interval_days.saturating_sub(1);
            if extra == 0 {
                first
            } else {
                days_later(first, extra, time, zone)
            }
        }
        RecurrenceKind::SpacedRepetition { spaced_offsets, .. } => {
            let seed = SpacedPolicy::new(spaced_offsets)
                .days_until_next(0)
                .unwrap_or(0);
            let base = recurrence.start_date.unwrap_or(today);
            match base.checked_add_days(Days::new(u64::from(seed))) {
                Some(date) => wall_clock(date, time, zone),
                None => daily_after(anchor, time, zone),
            }
        }
    };

    within_bounds(recurrence, first, zone).then_some(first)
}

/// The next `count` triggers of a recurrence, starting from its initial trigger.
///
/// Stops early when the recurrence runs out or stops making progress.
pub fn upcoming(recurrence: &Recurrence, now: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
    let mut triggers = Vec::with_capacity(count);
    let Some(mut current) = initial_trigger(now, recurrence) else {
        return triggers;
    };
    let mut recurrence = recurrence.clone();

    while triggers.len() < count {
        triggers.push(current);
        recurrence.record_firing();
        match next_for_recurrence(current, &recurrence.time_of_day, &recurrence) {
            Some(next) if next > current => current = next,
            _ => break,
        }
    }

    triggers
}

fn daily_after(from: DateTime<Utc>, time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    let today = local_date(from, zone);
    let candidate = wall_clock(today, time, zone);
    if candidate > from {
        return candidate;
    }

    match today.succ_opt() {
        Some(tomorrow) => wall_clock(tomorrow, time, zone),
        None => from + Duration::hours(24),
    }
}

fn weekly_after(
    from: DateTime<Utc>,
    weekdays: &[Weekday],
    time: NaiveTime,
    zone: Tz,
) -> DateTime<Utc> {
    let mut days = weekdays.to_vec();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();

    if days.is_empty() {
        warn!("weekly recurrence without weekdays, scheduling daily");
        return daily_after(from, time, zone);
    }

    let start = local_date(from, zone);

    // A 7-day window misses the same weekday one week on, when today's
    // slot has already passed; the second window catches it.
    for week in 0..2u64 {
        let earliest = (0..7u64)
            .filter_map(|offset| start.checked_add_days(Days::new(week * 7 + offset)))
            .filter(|date| days.contains(&date.weekday()))
            .map(|date| wall_clock(date, time, zone))
            .filter(|candidate| *candidate > from)
            .min();

        if let Some(next) = earliest {
            return next;
        }
    }

    daily_after(from, time, zone)
}

fn monthly_after(
    from: DateTime<Utc>,
    days_of_month: &[u32],
    time: NaiveTime,
    zone: Tz,
) -> DateTime<Utc> {
    let mut days: Vec<u32> = days_of_month
        .iter()
        .copied()
        .filter(|d| (1..=31).contains(d))
        .collect();
    days.sort_unstable();
    days.dedup();

    let start = local_date(from, zone);
    let (mut year, mut month) = (start.year(), start.month());

    for _ in 0..MONTHLY_SCAN_MONTHS {
        let earliest = days
            .iter()
            .filter_map(|&day| NaiveDate::from_ymd_opt(year, month, day))
            .map(|date| wall_clock(date, time, zone))
            .find(|candidate| *candidate > from);

        if let Some(next) = earliest {
            return next;
        }

        (year, month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
    }

    warn!(?days_of_month, "no monthly trigger found, retrying in a day");
    from + Duration::hours(24)
}

/// `time` on the local date `days` after `from`'s local date.
fn days_later(from: DateTime<Utc>, days: u32, time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    match local_date(from, zone).checked_add_days(Days::new(u64::from(days))) {
        Some(date) => wall_clock(date, time, zone),
        None => from + Duration::days(i64::from(days)),
    }
}

fn within_bounds(recurrence: &Recurrence, instant: DateTime<Utc>, zone: Tz) -> bool {
    match recurrence.end_date {
        Some(end) => local_date(instant, zone) <= end,
        None => true,
    }
}

fn local_date(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

/// Resolve a local date and time in `zone` to an instant.
///
/// Repeated local times (DST fall-back) take the earlier instant. Skipped
/// local times (DST spring-forward) take the same wall clock an hour later.
fn wall_clock(date: NaiveDate, time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    let local = date.and_time(time);
    if let Some(resolved) = zone.from_local_datetime(&local).earliest() {
        return resolved.with_timezone(&Utc);
    }

    let shifted = local + Duration::hours(1);
    match zone.from_local_datetime(&shifted).earliest() {
        Some(resolved) => resolved.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&local),
    }
}
