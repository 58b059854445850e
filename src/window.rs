//! Time-window predicates over file modification times.
//!
//! Both predicates take `now` as an argument and never read the clock, so a
//! run can evaluate every document against one instant and tests can pin it.
//! Nothing here is persisted: each run recomputes from wall-clock time and
//! raw file timestamps.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::config::WindowsConfig;

/// Lookback lengths for the "new" and "week" windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    pub new: Duration,
    pub week: Duration,
}

impl Default for Windows {
    fn default() -> Self {
        Self {
            new: Duration::days(1),
            week: Duration::days(7),
        }
    }
}

impl From<&WindowsConfig> for Windows {
    fn from(cfg: &WindowsConfig) -> Self {
        Self {
            new: Duration::try_hours(cfg.new_hours).unwrap_or(Duration::MAX),
            week: Duration::try_days(cfg.week_days).unwrap_or(Duration::MAX),
        }
    }
}

impl Windows {
    /// `mtime > now - new`; the lower bound is exclusive.
    pub fn is_new(&self, mtime: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        mtime > lower_bound(now, self.new)
    }

    /// `now - week <= mtime <= now`; both bounds inclusive.
    pub fn in_week(&self, mtime: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let week = self.week_range(now);
        week.start <= mtime && mtime <= week.end
    }

    pub fn week_range(&self, now: DateTime<Utc>) -> WeekRange {
        WeekRange {
            start: lower_bound(now, self.week),
            end: now,
        }
    }
}

/// `now - span`, saturating at the earliest representable instant so an
/// oversized window admits everything.
fn lower_bound(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Closed interval evaluated by [`Windows::in_week`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WeekRange {
    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// The digest's reference date; names the output file.
    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }
}

/// [`Windows::is_new`] with the default 24-hour lookback.
pub fn is_new(mtime: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    Windows::default().is_new(mtime, now)
}

/// [`Windows::in_week`] with the default 7-day lookback.
pub fn in_week(mtime: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    Windows::default().in_week(mtime, now)
}
