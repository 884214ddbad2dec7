use chrono::{NaiveDateTime, TimeDelta};

/// Logical simulation clock stepping from a start to an end instant.
///
/// The clock starts at `start` and advances one timestep per tick until it
/// lands on `end`. The final step is shortened if the horizon is not a whole
/// number of timesteps.
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeDelta};
/// use depot_sim::sim::clock::Clock;
///
/// let start = NaiveDate::from_ymd_opt(2024, 12, 6).unwrap().and_hms_opt(19, 0, 0).unwrap();
/// let mut clock = Clock::new(start, start + TimeDelta::hours(3), TimeDelta::hours(1));
/// let mut steps = Vec::new();
///
/// clock.run(|step, _| steps.push(step));
/// assert_eq!(steps, vec![1, 2, 3]);
/// assert!(clock.is_done());
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: TimeDelta,
    current: NaiveDateTime,
    index: usize,
}

impl Clock {
    /// Creates a clock positioned at `start`.
    ///
    /// # Panics
    ///
    /// Panics if `step` is not positive or `end < start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, step: TimeDelta) -> Self {
        assert!(step > TimeDelta::zero(), "timestep must be positive");
        assert!(end >= start, "end must not precede start");
        Self {
            start,
            end,
            step,
            current: start,
            index: 0,
        }
    }

    /// Advances the clock by one timestep.
    ///
    /// # Returns
    ///
    /// * `Some((index, instant))` - Tick count since start (from 1) and the new time
    /// * `None` - If the clock has already reached its end
    pub fn tick(&mut self) -> Option<(usize, NaiveDateTime)> {
        if self.is_done() {
            return None;
        }
        self.current = (self.current + self.step).min(self.end);
        self.index += 1;
        Some((self.index, self.current))
    }

    /// Runs a function for each remaining tick.
    pub fn run(&mut self, mut f: impl FnMut(usize, NaiveDateTime)) {
        while let Some((index, now)) = self.tick() {
            f(index, now);
        }
    }

    /// Rewinds to the start instant.
    pub fn reset(&mut self) {
        self.current = self.start;
        self.index = 0;
    }

    pub fn now(&self) -> NaiveDateTime {
        self.current
    }

    /// Ticks elapsed since the start.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn step(&self) -> TimeDelta {
        self.step
    }

    /// Length of one timestep in hours.
    pub fn step_hours(&self) -> f32 {
        self.step.num_seconds() as f32 / 3600.0
    }

    /// Number of ticks from start to end.
    pub fn total_steps(&self) -> usize {
        let horizon = (self.end - self.start).num_seconds();
        let step = self.step.num_seconds();
        ((horizon + step - 1) / step) as usize
    }

    /// Returns `true` once the clock sits on the end instant.
    pub fn is_done(&self) -> bool {
        self.current >= self.end
    }
}
