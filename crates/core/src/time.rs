use chrono::{DateTime, Duration, NaiveDate, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Source of "now" for services; core functions always take `now` explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Moves a fixed clock forward. No effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Converts fractional days into a `Duration` with second precision.
///
/// Saturates at `Duration::MAX`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn days_to_duration(days: f64) -> Duration {
    if days.is_nan() || days <= 0.0 {
        return Duration::zero();
    }
    Duration::try_seconds((days * SECONDS_PER_DAY).round() as i64).unwrap_or(Duration::MAX)
}

/// `at` plus `days`, saturating at the latest representable time.
#[must_use]
pub fn add_days(at: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    at.checked_add_signed(days_to_duration(days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Converts a `Duration` into fractional days (negative durations stay negative).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn duration_to_days(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / SECONDS_PER_DAY
}

/// UTC calendar day of a timestamp, used for daily buckets.
#[must_use]
pub fn utc_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = Clock::fixed(fixed_now());
        clock.advance(Duration::days(2));
        assert_eq!(clock.now(), fixed_now() + Duration::days(2));
    }

    #[test]
    fn fractional_days_round_trip_to_seconds() {
        let d = days_to_duration(1.5);
        assert_eq!(d, Duration::hours(36));
        assert!((duration_to_days(d) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn non_positive_days_collapse_to_zero() {
        assert_eq!(days_to_duration(-3.0), Duration::zero());
        assert_eq!(days_to_duration(f64::NAN), Duration::zero());
    }

    #[test]
    fn huge_day_counts_saturate() {
        assert_eq!(days_to_duration(1e12), Duration::MAX);
        assert_eq!(days_to_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(add_days(fixed_now(), 1e12), DateTime::<Utc>::MAX_UTC);
        assert_eq!(add_days(fixed_now(), 1.0), fixed_now() + Duration::days(1));
    }
}
