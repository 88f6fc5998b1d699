//! Cron parsing and reset-boundary search for tumbling windows.
//!
//! Expressions follow standard cron semantics:
//! - day-of-week runs `0-6` with Sunday as `0` (`7` is also Sunday)
//! - when both day-of-month and day-of-week are restricted, a day matching
//!   either one fires
//!
//! The `cron` crate numbers weekdays `1-7` from Sunday and ANDs the two day
//! fields, so numeric weekdays are rewritten to names and a doubly
//! restricted expression is split into two schedules.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

const DAY_OF_MONTH: usize = 3;
const DAY_OF_WEEK: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum CronError {
    #[error(transparent)]
    Schedule(#[from] cron::error::Error),

    #[error("invalid day-of-week field '{field}': {reason}")]
    DayOfWeek { field: String, reason: String },
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Scheduler configs use standard 5-field cron: `min hour day-of-month month day-of-week`.
pub fn normalize_cron(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// Reset occurrences of one cron expression.
#[derive(Debug, Clone)]
pub struct ResetSchedule {
    // More than one entry only when day-of-month and day-of-week are both
    // restricted; occurrences are the union.
    schedules: Vec<Schedule>,
}

impl ResetSchedule {
    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedules
            .iter()
            .filter_map(|s| s.after(after).next())
            .min()
    }
}

impl FromStr for ResetSchedule {
    type Err = CronError;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        parse_schedule(expr)
    }
}

/// Parse a (possibly 5-field) cron expression.
pub fn parse_schedule(expr: &str) -> Result<ResetSchedule, CronError> {
    let normalized = normalize_cron(expr);
    let mut fields: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();

    // Macros such as `@daily` have no day fields to rewrite.
    if !(6..=7).contains(&fields.len()) {
        return Ok(ResetSchedule {
            schedules: vec![Schedule::from_str(&normalized)?],
        });
    }

    fields[DAY_OF_WEEK] = day_of_week_names(&fields[DAY_OF_WEEK])?;
    if fields[DAY_OF_MONTH] == "?" {
        fields[DAY_OF_MONTH] = "*".to_string();
    }

    let schedules = if fields[DAY_OF_MONTH] != "*" && fields[DAY_OF_WEEK] != "*" {
        let mut by_month_day = fields.clone();
        by_month_day[DAY_OF_WEEK] = "*".to_string();
        let mut by_weekday = fields;
        by_weekday[DAY_OF_MONTH] = "*".to_string();
        vec![compile(&by_month_day)?, compile(&by_weekday)?]
    } else {
        vec![compile(&fields)?]
    };
    Ok(ResetSchedule { schedules })
}

fn compile(fields: &[String]) -> Result<Schedule, CronError> {
    Ok(Schedule::from_str(&fields.join(" "))?)
}

/// Rewrite a standard day-of-week field as a list of weekday names.
fn day_of_week_names(field: &str) -> Result<String, CronError> {
    if field == "*" || field == "?" {
        return Ok("*".to_string());
    }
    let invalid = |reason: String| CronError::DayOfWeek {
        field: field.to_string(),
        reason,
    };

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (base, step) = match item.split_once('/') {
            Some((base, step)) => {
                let step: u8 = step
                    .parse()
                    .map_err(|_| invalid(format!("bad step '{step}'")))?;
                if step == 0 {
                    return Err(invalid("step must be greater than zero".to_string()));
                }
                (base, Some(step))
            }
            None => (item, None),
        };

        let (first, last) = if base == "*" {
            (0, 6)
        } else if let Some((lo, hi)) = base.split_once('-') {
            (weekday(lo).map_err(&invalid)?, weekday(hi).map_err(&invalid)?)
        } else {
            let day = weekday(base).map_err(&invalid)?;
            // `n/step` runs from n to the end of the week.
            (day, if step.is_some() { 6 } else { day })
        };
        if first > last {
            return Err(invalid(format!("range '{base}' runs backwards")));
        }

        days.extend((first..=last).step_by(usize::from(step.unwrap_or(1))).map(|d| d % 7));
    }

    Ok(days
        .into_iter()
        .map(|d| WEEKDAYS[usize::from(d)])
        .collect::<Vec<_>>()
        .join(","))
}

/// Weekday number `0..=7` from a number or a three-letter name.
fn weekday(token: &str) -> Result<u8, String> {
    if let Ok(n) = token.parse::<u8>() {
        return if n <= 7 {
            Ok(n)
        } else {
            Err(format!("day {n} is out of range 0-7"))
        };
    }
    WEEKDAYS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .map(|i| i as u8)
        .ok_or_else(|| format!("unknown day '{token}'"))
}

/// Most recent reset boundary at or before `now`.
///
/// Walks cron occurrences forward from `window_start` and keeps the last one
/// that is `<= now`. When no occurrence falls in `(window_start, now]` the
/// boundary is `window_start` itself, so the whole window counts.
pub fn latest_reset(
    schedule: &ResetSchedule,
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let mut last_reset = window_start;
    let mut next_reset = window_start;

    while next_reset <= now {
        last_reset = next_reset;
        match schedule.next_after(&next_reset) {
            Some(next) => next_reset = next,
            None => break,
        }
    }
    last_reset
}
