//! Reporting window resolution.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WindowError;

/// Default window length when no lower bound is given.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// An inclusive time range `[since, until]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting ranges whose start is after their end.
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self, WindowError> {
        if since > until {
            return Err(WindowError::InvalidRange {
                since: since.to_rfc3339(),
                until: until.to_rfc3339(),
            });
        }
        Ok(Self { since, until })
    }

    /// The last `days` days ending at `now`.
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Self {
        Self {
            since: now - Duration::days(days),
            until: now,
        }
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.since && *ts <= self.until
    }

    pub fn length(&self) -> Duration {
        self.until - self.since
    }

    /// The window of equal length ending one second before this one starts.
    pub fn preceding(&self) -> Self {
        let until = self.since - Duration::seconds(1);
        Self {
            since: until - self.length(),
            until,
        }
    }
}

/// Which end of the window a user-supplied bound describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

/// Resolve optional `--since` / `--until` strings into a window.
///
/// A missing upper bound means `now`; a missing lower bound means
/// [`DEFAULT_WINDOW_DAYS`] before the upper bound.
pub fn resolve_window(
    since: Option<&str>,
    until: Option<&str>,
    now: DateTime<Utc>,
) -> Result<TimeWindow, WindowError> {
    let until = match until {
        Some(u) => parse_time_bound(u, Bound::End, now)?,
        None => now,
    };
    let since = match since {
        Some(s) => parse_time_bound(s, Bound::Start, now)?,
        None => until - Duration::days(DEFAULT_WINDOW_DAYS),
    };
    TimeWindow::new(since, until)
}

/// Parse a date, timestamp, keyword, or relative duration.
///
/// Bare dates resolve to the first second of the day for [`Bound::Start`] and
/// the last second of the day for [`Bound::End`], so both ends stay inclusive.
pub fn parse_time_bound(
    input: &str,
    bound: Bound,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, WindowError> {
    let trimmed = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day_bound(date, bound));
    }

    match trimmed.to_lowercase().as_str() {
        "now" => return Ok(now),
        "today" => return Ok(day_bound(now.date_naive(), bound)),
        "yesterday" => {
            let date = now.date_naive() - Duration::days(1);
            return Ok(day_bound(date, bound));
        }
        _ => {}
    }

    let relative = trimmed
        .strip_suffix("ago")
        .map(str::trim)
        .unwrap_or(trimmed)
        .trim_start_matches('-');

    if let Ok(std_duration) = humantime::parse_duration(relative) {
        let duration = Duration::from_std(std_duration)
            .map_err(|_| WindowError::Overflow(input.to_string()))?;
        return now
            .checked_sub_signed(duration)
            .ok_or_else(|| WindowError::Overflow(input.to_string()));
    }

    Err(WindowError::Unparseable(input.to_string()))
}

fn day_bound(date: NaiveDate, bound: Bound) -> DateTime<Utc> {
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
    };
    Utc.from_utc_datetime(&date.and_time(time))
}
