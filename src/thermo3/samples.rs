use serde::Serialize;
use std::time::Instant;

/// The current temperature and the extremes seen since the last reset, in
/// hundredths of a degree Celsius.
#[derive(Copy, Clone, Debug)]
pub struct Samples {
    current: i32,
    low: Extremum,
    high: Extremum,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Extremum {
    pub value: i32,
    pub at: Instant,
}

/// The response body of a Thermo3 request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Report {
    pub temp_cur: i32,
    pub temp_high: i32,
    pub temp_low: i32,
    /// Seconds since `temp_high` was recorded.
    pub temp_high_time: u64,
    /// Seconds since `temp_low` was recorded.
    pub temp_low_time: u64,
}

impl Samples {
    /// Returns an empty sample state. The extremes start out at the far ends
    /// of the range, so the first reading replaces both.
    #[must_use]
    pub fn new(now: Instant) -> Self {
        Self {
            current: 0,
            low: Extremum {
                value: i32::MAX,
                at: now,
            },
            high: Extremum {
                value: i32::MIN,
                at: now,
            },
        }
    }

    /// Records a new reading.
    ///
    /// An extremum only moves if the reading is strictly beyond it, so of two
    /// equal readings the earlier one's timestamp is kept.
    pub fn record(&mut self, reading: i32, now: Instant) {
        self.current = reading;
        if reading < self.low.value {
            self.low = Extremum {
                value: reading,
                at: now,
            };
        }
        if reading > self.high.value {
            self.high = Extremum {
                value: reading,
                at: now,
            };
        }
    }

    /// Resets both extremes to `reading`, as of `now`.
    pub fn resync(&mut self, reading: i32, now: Instant) {
        let extremum = Extremum {
            value: reading,
            at: now,
        };
        self.current = reading;
        self.low = extremum;
        self.high = extremum;
    }

    #[must_use]
    pub fn current(&self) -> i32 {
        self.current
    }

    #[must_use]
    pub fn low(&self) -> Extremum {
        self.low
    }

    #[must_use]
    pub fn high(&self) -> Extremum {
        self.high
    }

    #[must_use]
    pub fn report(&self, now: Instant) -> Report {
        let since = |at: Instant| now.saturating_duration_since(at).as_secs();
        Report {
            temp_cur: self.current,
            temp_high: self.high.value,
            temp_low: self.low.value,
            temp_high_time: since(self.high.at),
            temp_low_time: since(self.low.at),
        }
    }
}
