//! Billing windows.
//!
//! A run computes its window from an explicit reference instant, never from
//! the wall clock, so the same reference always yields the same window.

use chrono::{DateTime, Duration, DurationRound, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};

/// Timezone of the provider's invoicing calendar.
pub const BILLING_TIMEZONE: Tz = chrono_tz::Europe::Zurich;

/// Granularity of a product's billing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// The previous calendar day.
    Daily,
    /// The current hour.
    Hourly,
}

/// Half-open time interval a record's consumption is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the window (inclusive).
    pub from: DateTime<Utc>,
    /// End of the window (exclusive).
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Window of the given kind for a reference instant.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidWindow` if the window cannot be represented.
    pub fn for_kind(kind: WindowKind, reference: DateTime<Utc>) -> Result<Self> {
        match kind {
            WindowKind::Daily => Self::daily(reference),
            WindowKind::Hourly => Self::hourly(reference),
        }
    }

    /// The billing day before the reference's local date: 24 hours from local midnight.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidWindow` if the date underflows.
    pub fn daily(reference: DateTime<Utc>) -> Result<Self> {
        let today = billing_date(reference);
        let yesterday = today
            .pred_opt()
            .ok_or_else(|| BillingError::InvalidWindow(format!("no day before {today}")))?;
        let from = local_midnight(yesterday)?;

        Ok(Self {
            from,
            to: from + Duration::days(1),
        })
    }

    /// The hour containing the reference instant.
    ///
    /// The billing timezone uses whole-hour offsets, so truncating in UTC
    /// lands on the same boundary as truncating local time.
    ///
    /// # Errors
    ///
    /// Returns `BillingError::InvalidWindow` if the instant cannot be truncated.
    pub fn hourly(reference: DateTime<Utc>) -> Result<Self> {
        let from = reference
            .duration_trunc(Duration::hours(1))
            .map_err(|e| BillingError::InvalidWindow(e.to_string()))?;

        Ok(Self {
            from,
            to: from + Duration::hours(1),
        })
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.to - self.from
    }

    /// Local calendar date the window starts on.
    #[must_use]
    pub fn start_date(&self) -> NaiveDate {
        billing_date(self.from)
    }
}

/// Calendar date of an instant in the billing timezone.
#[must_use]
pub fn billing_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&BILLING_TIMEZONE).date_naive()
}

/// Start of a local billing day, in UTC.
///
/// # Errors
///
/// Returns `BillingError::InvalidWindow` if local midnight does not exist.
pub fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| BillingError::InvalidWindow(format!("no midnight on {date}")))?;

    BILLING_TIMEZONE
        .from_local_datetime(&midnight)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| BillingError::InvalidWindow(format!("no local midnight on {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn daily_window_is_yesterday_in_zurich() {
        // 2023-01-10 23:30 UTC is already 2023-01-11 in Zurich (UTC+1)
        let window = TimeRange::daily(utc("2023-01-10T23:30:00Z")).unwrap();

        assert_eq!(window.from, utc("2023-01-09T23:00:00Z"));
        assert_eq!(window.to, utc("2023-01-10T23:00:00Z"));
        assert_eq!(window.duration(), Duration::days(1));
        assert_eq!(window.start_date(), NaiveDate::from_ymd_opt(2023, 1, 10).unwrap());
    }

    #[test]
    fn daily_window_in_summer_time() {
        let window = TimeRange::daily(utc("2023-07-15T08:00:00Z")).unwrap();

        assert_eq!(window.from, utc("2023-07-13T22:00:00Z"));
        assert_eq!(window.to, utc("2023-07-14T22:00:00Z"));
    }

    #[test]
    fn daily_window_is_exactly_one_day_across_dst_change() {
        // Zurich switches to summer time on 2023-03-26
        let window = TimeRange::daily(utc("2023-03-27T10:00:00Z")).unwrap();

        assert_eq!(window.from, utc("2023-03-25T23:00:00Z"));
        assert_eq!(window.duration(), Duration::days(1));
        assert!(window.to > window.from);
    }

    #[test]
    fn hourly_window_contains_reference() {
        let reference = utc("2023-01-11T10:42:13Z");
        let window = TimeRange::hourly(reference).unwrap();

        assert_eq!(window.from, utc("2023-01-11T10:00:00Z"));
        assert_eq!(window.to, utc("2023-01-11T11:00:00Z"));
        assert!(window.from <= reference && reference < window.to);
        assert_eq!(window.duration(), Duration::hours(1));
    }

    #[test]
    fn same_reference_gives_same_window() {
        let reference = utc("2023-05-01T12:00:00Z");
        assert_eq!(
            TimeRange::for_kind(WindowKind::Daily, reference).unwrap(),
            TimeRange::for_kind(WindowKind::Daily, reference).unwrap()
        );
    }
}
