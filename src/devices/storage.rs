use chrono::TimeDelta;

use super::Battery;
use crate::error::{SimError, ValidationError};

/// Slack applied to the SOC bounds check to absorb float rounding.
const SOC_EPSILON: f64 = 1e-9;

/// A stationary battery with a state of charge.
///
/// Mutated only through [`StationaryBattery::charge`] and
/// [`StationaryBattery::discharge`]. Each successful call appends the new SOC
/// to the history.
///
/// # Power Flow Convention
/// - Positive power: charging (load on the transformer)
/// - Negative power: discharging (supply to the transformer)
#[derive(Debug, Clone)]
pub struct StationaryBattery {
    battery: Battery,
    soc: f64,
    min_soc: f64,
    power: f64,
    soc_history: Vec<f64>,
}

impl StationaryBattery {
    /// Creates a storage battery.
    ///
    /// # Arguments
    ///
    /// * `battery` - Capability specification; `max_charge_power` also bounds
    ///   discharge power
    /// * `initial_soc` - SOC at the start of the run
    /// * `min_soc` - Lower SOC bound, must be `<= initial_soc`
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if either SOC is outside `[0, 1]` or
    /// `min_soc > initial_soc`.
    pub fn new(battery: Battery, initial_soc: f64, min_soc: f64) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&initial_soc) {
            return Err(ValidationError::invalid("initial_soc", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&min_soc) {
            return Err(ValidationError::invalid("min_soc", "must be in [0, 1]"));
        }
        if min_soc > initial_soc {
            return Err(ValidationError::invalid(
                "min_soc",
                format!("{min_soc} is above initial_soc {initial_soc}"),
            ));
        }
        Ok(Self {
            battery,
            soc: initial_soc,
            min_soc,
            power: 0.0,
            soc_history: Vec::new(),
        })
    }

    /// Capability specification.
    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    /// Current state of charge.
    pub fn soc(&self) -> f64 {
        self.soc
    }

    /// Lower SOC bound.
    pub fn min_soc(&self) -> f64 {
        self.min_soc
    }

    /// Power realized in the most recent operation (kW, signed).
    pub fn power(&self) -> f64 {
        self.power
    }

    /// SOC after every successful operation, oldest first.
    pub fn soc_history(&self) -> &[f64] {
        &self.soc_history
    }

    /// Largest discharge power feasible for one step, in kW.
    ///
    /// `assigned_power` is power already committed for the same step and
    /// is subtracted from both the ceiling and the energy above `min_soc`.
    /// The result is floored at 0 and rounded down to three decimals.
    pub fn max_discharge_power(&self, assigned_power: f64, step_length: TimeDelta) -> f64 {
        let hours = step_hours(step_length);
        let capacity = self.battery.capacity();
        let theoretical = self.battery.max_charge_power() - assigned_power;
        let committed_soc = assigned_power / capacity * hours;
        let to_empty = (self.soc - committed_soc - self.min_soc) * capacity / hours;
        floor_to_millis(theoretical.min(to_empty).max(0.0))
    }

    /// Charges with at most `available_power` for one step.
    ///
    /// Applies `min(available_power, max_charge_power, power to reach SOC 1)`
    /// and returns that power.
    ///
    /// # Panics
    ///
    /// Panics if `available_power` is negative.
    ///
    /// # Errors
    ///
    /// Returns `SimError::SocOutOfBounds` if the resulting SOC leaves
    /// `[min_soc, 1]`.
    pub fn charge(
        &mut self,
        available_power: f64,
        step_length: TimeDelta,
    ) -> Result<f64, SimError> {
        assert!(
            available_power >= 0.0,
            "available power must be >= 0, got {available_power}"
        );
        let hours = step_hours(step_length);
        let capacity = self.battery.capacity();
        let to_full = (1.0 - self.soc) * capacity / hours;
        let power = to_full
            .min(self.battery.max_charge_power())
            .min(available_power)
            .max(0.0);

        let soc = self.checked_soc(self.soc + power * hours / capacity)?;
        self.soc = soc;
        self.power = power;
        self.soc_history.push(soc);
        Ok(power)
    }

    /// Discharges exactly `power_to_discharge` for one step.
    ///
    /// Either fully applied or not applied at all.
    ///
    /// # Panics
    ///
    /// Panics if `power_to_discharge` is negative.
    ///
    /// # Errors
    ///
    /// Returns `SimError::DischargeOutOfLimits` without mutating state when the
    /// request exceeds [`StationaryBattery::max_discharge_power`], and
    /// `SimError::SocOutOfBounds` if the resulting SOC leaves `[min_soc, 1]`.
    pub fn discharge(
        &mut self,
        power_to_discharge: f64,
        step_length: TimeDelta,
    ) -> Result<(), SimError> {
        assert!(
            power_to_discharge >= 0.0,
            "discharge power must be >= 0, got {power_to_discharge}"
        );
        let limit = self.max_discharge_power(0.0, step_length);
        if limit < power_to_discharge {
            return Err(SimError::DischargeOutOfLimits {
                requested_kw: power_to_discharge,
                limit_kw: limit,
            });
        }

        let hours = step_hours(step_length);
        let soc =
            self.checked_soc(self.soc - power_to_discharge * hours / self.battery.capacity())?;
        self.soc = soc;
        self.power = -power_to_discharge;
        self.soc_history.push(soc);
        Ok(())
    }

    fn checked_soc(&self, soc: f64) -> Result<f64, SimError> {
        if soc < self.min_soc - SOC_EPSILON || soc > 1.0 + SOC_EPSILON {
            return Err(SimError::SocOutOfBounds {
                soc,
                min_soc: self.min_soc,
            });
        }
        Ok(soc.clamp(self.min_soc, 1.0))
    }
}

/// Step length in fractional hours.
pub fn step_hours(step_length: TimeDelta) -> f64 {
    step_length.num_milliseconds() as f64 / 3_600_000.0
}

/// Rounds `value` down to three decimals.
fn floor_to_millis(value: f64) -> f64 {
    (value * 1000.0).floor() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(capacity: f64, max_power: f64, soc: f64, min_soc: f64) -> StationaryBattery {
        let battery = Battery::without_degradation(capacity, max_power, 0.0, 1.0).unwrap();
        StationaryBattery::new(battery, soc, min_soc).unwrap()
    }

    #[test]
    fn charge_stops_at_full() {
        let mut s = storage(100.0, 200.0, 0.9, 0.0);
        let p = s.charge(100.0, TimeDelta::hours(1)).unwrap();
        assert!((p - 10.0).abs() < 1e-9);
        assert!((s.soc() - 1.0).abs() < 1e-9);
        assert_eq!(s.soc_history().len(), 1);
        assert!((s.power() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn charge_limited_by_power_ceiling() {
        let mut s = storage(100.0, 20.0, 0.2, 0.0);
        let p = s.charge(50.0, TimeDelta::minutes(30)).unwrap();
        assert_eq!(p, 20.0);
        assert!((s.soc() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn charge_with_zero_available_records_history() {
        let mut s = storage(100.0, 20.0, 0.5, 0.0);
        let p = s.charge(0.0, TimeDelta::hours(1)).unwrap();
        assert_eq!(p, 0.0);
        assert_eq!(s.soc_history(), &[0.5]);
    }

    #[test]
    #[should_panic]
    fn charge_negative_panics() {
        let mut s = storage(100.0, 20.0, 0.5, 0.0);
        let _ = s.charge(-1.0, TimeDelta::hours(1));
    }

    #[test]
    fn max_discharge_bounded_by_energy_above_floor() {
        let s = storage(100.0, 50.0, 0.5, 0.2);
        // 0.3 * 100 kWh over 1 h = 30 kW
        assert!((s.max_discharge_power(0.0, TimeDelta::hours(1)) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn max_discharge_bounded_by_ceiling() {
        let s = storage(100.0, 10.0, 0.9, 0.0);
        assert_eq!(s.max_discharge_power(0.0, TimeDelta::hours(1)), 10.0);
        assert_eq!(s.max_discharge_power(4.0, TimeDelta::hours(1)), 6.0);
    }

    #[test]
    fn max_discharge_rounds_down() {
        // (0.33333 - 0) * 10 / 1 = 3.3333 -> 3.333
        let s = storage(10.0, 100.0, 0.33333, 0.0);
        assert_eq!(s.max_discharge_power(0.0, TimeDelta::hours(1)), 3.333);
    }

    #[test]
    fn max_discharge_floored_at_zero() {
        let s = storage(100.0, 10.0, 0.2, 0.2);
        assert_eq!(s.max_discharge_power(5.0, TimeDelta::hours(1)), 0.0);
    }

    #[test]
    fn discharge_reduces_soc() {
        let mut s = storage(100.0, 50.0, 0.5, 0.1);
        s.discharge(20.0, TimeDelta::hours(1)).unwrap();
        assert!((s.soc() - 0.3).abs() < 1e-9);
        assert_eq!(s.power(), -20.0);
        assert_eq!(s.soc_history().len(), 1);
    }

    #[test]
    fn infeasible_discharge_leaves_state_untouched() {
        let mut s = storage(100.0, 50.0, 0.3, 0.2);
        let err = s.discharge(11.0, TimeDelta::hours(1));
        assert!(matches!(err, Err(SimError::DischargeOutOfLimits { .. })));
        assert_eq!(s.soc(), 0.3);
        assert_eq!(s.power(), 0.0);
        assert!(s.soc_history().is_empty());
    }

    #[test]
    fn discharge_to_floor_exactly() {
        let mut s = storage(100.0, 50.0, 0.3, 0.2);
        let limit = s.max_discharge_power(0.0, TimeDelta::hours(1));
        s.discharge(limit, TimeDelta::hours(1)).unwrap();
        assert!(s.soc() >= s.min_soc());
    }

    #[test]
    fn rejects_min_soc_above_initial() {
        let battery = Battery::without_degradation(10.0, 5.0, 0.0, 1.0).unwrap();
        assert!(StationaryBattery::new(battery, 0.2, 0.3).is_err());
        assert!(StationaryBattery::new(battery, 1.2, 0.0).is_err());
    }

    #[test]
    fn step_hours_handles_sub_hour_steps() {
        assert_eq!(step_hours(TimeDelta::minutes(15)), 0.25);
        assert_eq!(step_hours(TimeDelta::hours(2)), 2.0);
    }
}
