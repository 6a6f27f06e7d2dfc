use chrono::NaiveDateTime;

use super::types::SimConfig;

/// A simulation clock that walks the steps of a [`SimConfig`].
///
/// Each tick yields the step index and its timestamp.
///
/// # Examples
///
/// ```
/// use chargepark_sim::sim::clock::Clock;
/// use chargepark_sim::sim::types::SimConfig;
/// use chrono::{NaiveDate, TimeDelta};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let cfg = SimConfig::new(start, start + TimeDelta::hours(2), TimeDelta::hours(1)).unwrap();
/// let mut clock = Clock::new(&cfg);
/// let mut steps = Vec::new();
///
/// clock.run(|step, _| steps.push(step));
/// assert_eq!(steps, vec![0, 1, 2]);
/// ```
pub struct Clock {
    /// Current step of the simulation
    current: usize,
    /// Total steps to run in the simulation
    total: usize,
    config: SimConfig,
}

impl Clock {
    /// Creates a clock positioned at the first step of `config`.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            current: 0,
            total: config.total_steps(),
            config: config.clone(),
        }
    }

    /// Total number of steps.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Advances the clock by one step.
    ///
    /// # Returns
    ///
    /// * `Some((step, timestamp))` - The step before advancing
    /// * `None` - If every step has been visited
    pub fn tick(&mut self) -> Option<(usize, NaiveDateTime)> {
        if self.current < self.total {
            let step = self.current;
            self.current += 1;
            Some((step, self.config.timestamp(step)))
        } else {
            None
        }
    }

    /// Runs a function for each remaining step in the clock.
    pub fn run(&mut self, mut f: impl FnMut(usize, NaiveDateTime)) {
        while let Some((step, ts)) = self.tick() {
            f(step, ts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn config(hours: i64) -> SimConfig {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        SimConfig::new(start, start + TimeDelta::hours(hours), TimeDelta::hours(1)).unwrap()
    }

    #[test]
    fn test_new_clock() {
        let clock = Clock::new(&config(4));
        assert_eq!(clock.current, 0);
        assert_eq!(clock.total(), 5);
    }

    #[test]
    fn test_tick() {
        let cfg = config(1);
        let mut clock = Clock::new(&cfg);
        assert_eq!(clock.tick(), Some((0, cfg.start)));
        assert_eq!(clock.tick(), Some((1, cfg.start + TimeDelta::hours(1))));
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_run() {
        let mut clock = Clock::new(&config(2));
        let mut steps = Vec::new();

        clock.run(|step, _| steps.push(step));

        assert_eq!(steps, vec![0, 1, 2]);
    }

    #[test]
    fn test_exhausted_clock() {
        let mut clock = Clock::new(&config(0));
        assert!(clock.tick().is_some());

        let mut was_called = false;
        clock.run(|_, _| was_called = true);
        assert!(!was_called);
    }
}
