//! Half-open integer time intervals.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Integer time used throughout the engine, in device time units.
pub type Time = i64;

/// A half-open interval `[start, stop)`.
///
/// `stop >= start` always holds. Intervals order by `(start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: Time,
    stop: Time,
}

impl Interval {
    /// Create a new interval, rejecting `stop < start`.
    pub fn new(start: Time, stop: Time) -> Result<Self> {
        if stop < start {
            return Err(Error::timing(format!(
                "Interval stop {} precedes its start {}",
                stop, start
            )));
        }
        Ok(Self { start, stop })
    }

    /// Interval of `duration` units starting at `start`.
    pub fn from_duration(start: Time, duration: Time) -> Result<Self> {
        if duration < 0 {
            return Err(Error::timing(format!(
                "Duration must be non-negative, got {}",
                duration
            )));
        }
        let stop = start.checked_add(duration).ok_or_else(|| {
            Error::timing(format!(
                "Interval starting at {} with duration {} exceeds the time range",
                start, duration
            ))
        })?;
        Self::new(start, stop)
    }

    pub fn start(&self) -> Time {
        self.start
    }

    pub fn stop(&self) -> Time {
        self.stop
    }

    pub fn duration(&self) -> Time {
        self.stop - self.start
    }

    /// Zero-length intervals never overlap anything.
    pub fn is_degenerate(&self) -> bool {
        self.start == self.stop
    }

    /// Translate both bounds by `delta`.
    ///
    /// Fails with a Timing error if either bound leaves the `Time` range.
    pub fn shifted(&self, delta: Time) -> Result<Self> {
        match (self.start.checked_add(delta), self.stop.checked_add(delta)) {
            (Some(start), Some(stop)) => Ok(Self { start, stop }),
            _ => Err(Error::timing(format!(
                "Shifting {} by {} exceeds the time range",
                self, delta
            ))),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

impl TryFrom<(Time, Time)> for Interval {
    type Error = Error;

    fn try_from((start, stop): (Time, Time)) -> Result<Self> {
        Interval::new(start, stop)
    }
}
