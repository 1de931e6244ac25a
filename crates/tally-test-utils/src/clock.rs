//! Deterministic clocks.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tally_core::Clock;

/// Clock that returns `start`, then advances by `step` on every read.
#[derive(Debug)]
pub struct StepClock {
    next: Mutex<DateTime<Utc>>,
    step: Duration,
}

impl StepClock {
    /// Creates a clock starting at `start` and advancing by `step` per read.
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            next: Mutex::new(start),
            step,
        }
    }

    /// Creates a clock that always returns `instant`.
    pub fn fixed(instant: DateTime<Utc>) -> Self {
        Self::new(instant, Duration::zero())
    }
}

impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().expect("lock");
        let now = *next;
        *next = now + self.step;
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn step_clock_advances_per_read() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = StepClock::new(start, Duration::seconds(5));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + Duration::seconds(5));
    }
}
