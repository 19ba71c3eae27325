use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::fmt;

/// Source of the current time, injectable so passes can be frozen in tests
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Frozen at a unix timestamp; out-of-range values fall back to the epoch
    pub fn at_timestamp(timestamp: i64) -> Self {
        Self(
            Utc.timestamp_opt(timestamp, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The single instant shared by every identifier generated in one planning pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildStamp {
    timestamp: i64,
}

impl RebuildStamp {
    /// Read the clock once
    pub fn capture(clock: &dyn Clock) -> Self {
        Self {
            timestamp: clock.now().timestamp(),
        }
    }

    pub fn from_timestamp(timestamp: i64) -> Self {
        Self { timestamp }
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }
}
