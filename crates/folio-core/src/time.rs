use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::ops::{Add, Sub};
use std::rc::Rc;

/// Time span with sub-millisecond precision (stored as fractional milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Duration {
    /// Duration in milliseconds.
    millis: f64,
}

impl Duration {
    /// Create a duration from milliseconds. Negative input clamps to zero.
    pub fn from_millis(ms: f64) -> Self {
        Self {
            millis: ms.max(0.0),
        }
    }

    /// Create a duration from seconds.
    pub fn from_seconds(s: f64) -> Self {
        Self::from_millis(s * 1000.0)
    }

    /// Create a zero duration.
    pub fn zero() -> Self {
        Self { millis: 0.0 }
    }

    /// Get duration as milliseconds.
    pub fn as_millis(&self) -> f64 {
        self.millis
    }

    /// Get duration as seconds.
    pub fn as_seconds(&self) -> f64 {
        self.millis / 1000.0
    }

    /// Interval between frames for a target rate. Non-positive rates yield zero.
    pub fn per_frame(fps: f64) -> Self {
        if fps > 0.0 {
            Self::from_millis(1000.0 / fps)
        } else {
            Self::zero()
        }
    }
}

impl Default for Duration {
    fn default() -> Self {
        Duration::zero()
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration::from_millis(self.millis + rhs.millis)
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_millis(self.millis - rhs.millis)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis < 1000.0 {
            write!(f, "{:.0}ms", self.millis)
        } else {
            write!(f, "{:.2}s", self.as_seconds())
        }
    }
}

/// A monotonic point in time, in milliseconds from an arbitrary clock origin.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Timestamp {
    millis: f64,
}

impl Timestamp {
    pub fn from_millis(ms: f64) -> Self {
        Self { millis: ms }
    }

    /// The clock origin.
    pub fn zero() -> Self {
        Self { millis: 0.0 }
    }

    pub fn as_millis(&self) -> f64 {
        self.millis
    }

    /// Time elapsed from `earlier` to `self`; zero if `earlier` is later.
    pub fn since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.millis - earlier.millis)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::zero()
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp::from_millis(self.millis + rhs.as_millis())
    }
}

impl Sub for Timestamp {
    type Output = Duration;
    fn sub(self, rhs: Timestamp) -> Duration {
        self.since(rhs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{:.1}ms", self.millis)
    }
}

/// Source of monotonic timestamps.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(ms)),
        }
    }

    /// Move time forward by `ms` and return the new time.
    pub fn advance(&self, ms: f64) -> Timestamp {
        self.now.set(self.now.get() + ms.max(0.0));
        self.now()
    }

    /// Jump to an absolute time. Going backwards is ignored.
    pub fn set(&self, ms: f64) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.now.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_seconds() {
        let d = Duration::from_seconds(2.5);
        assert!((d.as_millis() - 2500.0).abs() < 0.001);
    }

    #[test]
    fn test_duration_per_frame() {
        assert!((Duration::per_frame(30.0).as_millis() - 33.333).abs() < 0.01);
        assert_eq!(Duration::per_frame(0.0), Duration::zero());
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(format!("{}", Duration::from_seconds(2.5)), "2.50s");
        assert_eq!(format!("{}", Duration::from_millis(500.0)), "500ms");
    }

    #[test]
    fn test_timestamp_since_clamps() {
        let a = Timestamp::from_millis(100.0);
        let b = Timestamp::from_millis(250.0);
        assert!((b.since(a).as_millis() - 150.0).abs() < 0.001);
        assert_eq!(a.since(b), Duration::zero());
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(16.0);
        assert!((other.now().as_millis() - 16.0).abs() < 0.001);
        other.set(10.0);
        assert!((clock.now().as_millis() - 16.0).abs() < 0.001);
    }
}
