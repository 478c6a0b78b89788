//! Time source for time-window constraints.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

/// Supplies the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Freeze at an RFC 3339 timestamp.
    pub fn at(rfc3339: &str) -> Result<Self> {
        parse_timestamp(rfc3339).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::at("2024-06-01T12:00:00Z").unwrap();
        assert_eq!(clock.now().to_rfc3339(), "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn test_offsets_compare_by_instant() {
        let a = parse_timestamp("2024-06-01T14:00:00+02:00").unwrap();
        let b = parse_timestamp("2024-06-01T12:00:00Z").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_closure_clock() {
        let instant = parse_timestamp("2030-01-01T00:00:00Z").unwrap();
        let clock = move || instant;
        assert_eq!(Clock::now(&clock), instant);
    }

    #[test]
    fn test_invalid_timestamp() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(Error::InvalidTimestamp { .. })
        ));
    }
}
