//! Core simulation types: time horizon, opening hours, disconnect policy.

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::Serialize;

use crate::devices::storage::step_hours;
use crate::error::ValidationError;

/// Simulated time window.
///
/// Steps run from `start` to `end` inclusive at `resolution`.
///
/// # Examples
///
/// ```
/// use chargepark_sim::sim::types::SimConfig;
/// use chrono::{NaiveDate, TimeDelta};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let end = start + TimeDelta::hours(23);
/// let cfg = SimConfig::new(start, end, TimeDelta::hours(1)).unwrap();
/// assert_eq!(cfg.total_steps(), 24);
/// assert_eq!(cfg.step_hours(), 1.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimConfig {
    /// First simulated timestamp.
    pub start: NaiveDateTime,
    /// Last simulated timestamp (inclusive).
    pub end: NaiveDateTime,
    /// Length of one step.
    #[serde(serialize_with = "serialize_resolution")]
    pub resolution: TimeDelta,
}

impl SimConfig {
    /// Creates a time window.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `resolution` is not a positive whole
    /// number of milliseconds or `end < start`.
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        resolution: TimeDelta,
    ) -> Result<Self, ValidationError> {
        if resolution <= TimeDelta::zero() {
            return Err(ValidationError::invalid("resolution", "must be positive"));
        }
        if resolution < TimeDelta::milliseconds(1) || resolution.subsec_nanos() % 1_000_000 != 0 {
            return Err(ValidationError::invalid(
                "resolution",
                "must be a whole number of milliseconds",
            ));
        }
        if end < start {
            return Err(ValidationError::invalid("end", "must not be before start"));
        }
        Ok(Self {
            start,
            end,
            resolution,
        })
    }

    /// Number of steps in `[start, end]`.
    pub fn total_steps(&self) -> usize {
        let span = (self.end - self.start).num_milliseconds();
        (span / self.resolution.num_milliseconds()) as usize + 1
    }

    /// Step length in hours.
    pub fn step_hours(&self) -> f64 {
        step_hours(self.resolution)
    }

    /// Timestamp of step `index`.
    pub fn timestamp(&self, index: usize) -> NaiveDateTime {
        self.start + TimeDelta::milliseconds(self.resolution.num_milliseconds() * index as i64)
    }

    /// All step timestamps in order.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        (0..self.total_steps()).map(|i| self.timestamp(i)).collect()
    }
}

fn serialize_resolution<S: serde::Serializer>(
    resolution: &TimeDelta,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(resolution.num_seconds())
}

/// Daily window in which vehicles may connect, in fractional hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpeningHours {
    open: f64,
    close: f64,
}

impl OpeningHours {
    /// # Errors
    ///
    /// Returns a `ValidationError` unless `0 <= open <= close <= 24`.
    pub fn new(open: f64, close: f64) -> Result<Self, ValidationError> {
        if !(0.0..=24.0).contains(&open) || !(0.0..=24.0).contains(&close) {
            return Err(ValidationError::invalid("opening_hours", "must be within [0, 24]"));
        }
        if open > close {
            return Err(ValidationError::invalid(
                "opening_hours",
                format!("opens at {open} but closes at {close}"),
            ));
        }
        Ok(Self { open, close })
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    /// Whether `timestamp` falls inside the window, both ends inclusive.
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        let hour = timestamp.hour() as f64
            + timestamp.minute() as f64 / 60.0
            + timestamp.second() as f64 / 3600.0;
        self.open <= hour && hour <= self.close
    }
}

/// Criterion for forcibly disconnecting a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisconnectPolicy {
    /// Disconnect once the leaving time has passed.
    ByTime,
    /// Disconnect once the target SOC is reached.
    BySoc,
}

impl DisconnectPolicy {
    pub fn from_flag(disconnect_by_time: bool) -> Self {
        if disconnect_by_time {
            Self::ByTime
        } else {
            Self::BySoc
        }
    }
}

impl fmt::Display for DisconnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByTime => write!(f, "by_time"),
            Self::BySoc => write!(f, "by_soc"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    #[test]
    fn sim_config_basic() {
        let cfg = SimConfig::new(at(0, 0), at(23, 0), TimeDelta::hours(1)).unwrap();
        assert_eq!(cfg.total_steps(), 24);
        assert_eq!(cfg.step_hours(), 1.0);
        assert_eq!(cfg.timestamp(5), at(5, 0));
        assert_eq!(cfg.timestamps().len(), 24);
    }

    #[test]
    fn sim_config_sub_hour() {
        let cfg = SimConfig::new(at(0, 0), at(2, 0), TimeDelta::minutes(15)).unwrap();
        assert_eq!(cfg.total_steps(), 9);
        assert_eq!(cfg.step_hours(), 0.25);
        assert_eq!(cfg.timestamp(8), at(2, 0));
    }

    #[test]
    fn sim_config_single_step() {
        let cfg = SimConfig::new(at(6, 0), at(6, 0), TimeDelta::hours(1)).unwrap();
        assert_eq!(cfg.total_steps(), 1);
    }

    #[test]
    fn sim_config_rejects_bad_window() {
        assert!(SimConfig::new(at(6, 0), at(5, 0), TimeDelta::hours(1)).is_err());
        assert!(SimConfig::new(at(0, 0), at(5, 0), TimeDelta::zero()).is_err());
    }

    #[test]
    fn sim_config_rejects_sub_millisecond_resolution() {
        assert!(SimConfig::new(at(0, 0), at(5, 0), TimeDelta::microseconds(500)).is_err());
        assert!(SimConfig::new(at(0, 0), at(5, 0), TimeDelta::microseconds(1500)).is_err());
        assert!(SimConfig::new(at(0, 0), at(0, 1), TimeDelta::milliseconds(1)).is_ok());
    }

    #[test]
    fn timestamp_far_into_a_fine_horizon() {
        let start = at(0, 0);
        let cfg =
            SimConfig::new(start, start + TimeDelta::days(40), TimeDelta::seconds(1)).unwrap();
        assert_eq!(cfg.total_steps(), 40 * 86_400 + 1);
        assert_eq!(cfg.timestamp(40 * 86_400), start + TimeDelta::days(40));
    }

    #[test]
    fn opening_hours_inclusive() {
        let oh = OpeningHours::new(8.0, 18.5).unwrap();
        assert!(!oh.contains(at(7, 59)));
        assert!(oh.contains(at(8, 0)));
        assert!(oh.contains(at(18, 30)));
        assert!(!oh.contains(at(18, 31)));
    }

    #[test]
    fn opening_hours_validation() {
        assert!(OpeningHours::new(9.0, 8.0).is_err());
        assert!(OpeningHours::new(-1.0, 8.0).is_err());
        assert!(OpeningHours::new(0.0, 25.0).is_err());
        assert!(OpeningHours::new(0.0, 24.0).is_ok());
    }

    #[test]
    fn disconnect_policy_from_flag() {
        assert_eq!(DisconnectPolicy::from_flag(true), DisconnectPolicy::ByTime);
        assert_eq!(DisconnectPolicy::from_flag(false), DisconnectPolicy::BySoc);
        assert_eq!(DisconnectPolicy::BySoc.to_string(), "by_soc");
    }
}
