use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Charging capability of a battery.
///
/// `Battery` is a read-only specification: it carries no state of charge and
/// answers how much power the cell can accept at a given SOC. Vehicle types
/// share one instance across all of their charging events; stationary storage
/// wraps one in [`super::StationaryBattery`].
///
/// Above `start_power_degradation` the accepted power falls linearly from
/// `max_charge_power` to `max_charge_power * max_degradation_level` at full
/// charge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    /// Usable energy content in kWh.
    capacity: f64,
    /// Charge power ceiling in kW.
    max_charge_power: f64,
    /// Smallest power the charger can deliver in kW.
    min_charge_power: f64,
    /// Conversion efficiency (0..=1).
    efficiency: f64,
    /// SOC above which the power ceiling starts to derate.
    start_power_degradation: f64,
    /// Fraction of `max_charge_power` still accepted at SOC 1.
    max_degradation_level: f64,
}

impl Battery {
    /// Creates a battery specification.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Energy content in kWh (must be > 0)
    /// * `max_charge_power` - Power ceiling in kW (must be >= 0)
    /// * `min_charge_power` - Power floor in kW (must be >= 0)
    /// * `efficiency` - Conversion efficiency in `[0, 1]`
    /// * `start_power_degradation` - Knee of the derating curve in `[0, 1]`
    /// * `max_degradation_level` - Derated fraction at full charge in `[0, 1]`
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if any parameter is out of domain or if the
    /// fully derated ceiling `max_degradation_level * max_charge_power` falls
    /// below `min_charge_power`.
    pub fn new(
        capacity: f64,
        max_charge_power: f64,
        min_charge_power: f64,
        efficiency: f64,
        start_power_degradation: f64,
        max_degradation_level: f64,
    ) -> Result<Self, ValidationError> {
        if !(capacity > 0.0) {
            return Err(ValidationError::invalid("capacity", "must be > 0"));
        }
        if !(max_charge_power >= 0.0) {
            return Err(ValidationError::invalid("max_charge_power", "must be >= 0"));
        }
        if !(min_charge_power >= 0.0) {
            return Err(ValidationError::invalid("min_charge_power", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&efficiency) {
            return Err(ValidationError::invalid("efficiency", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&start_power_degradation) {
            return Err(ValidationError::invalid(
                "start_power_degradation",
                "must be in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&max_degradation_level) {
            return Err(ValidationError::invalid(
                "max_degradation_level",
                "must be in [0, 1]",
            ));
        }
        if max_degradation_level * max_charge_power < min_charge_power {
            return Err(ValidationError::invalid(
                "max_degradation_level",
                format!(
                    "derated ceiling {:.3} kW is below min_charge_power {min_charge_power:.3} kW",
                    max_degradation_level * max_charge_power
                ),
            ));
        }

        Ok(Self {
            capacity,
            max_charge_power,
            min_charge_power,
            efficiency,
            start_power_degradation,
            max_degradation_level,
        })
    }

    /// Creates a battery whose ceiling never derates.
    ///
    /// # Errors
    ///
    /// Same as [`Battery::new`]. With derating disabled the floor check
    /// requires `min_charge_power == 0`.
    pub fn without_degradation(
        capacity: f64,
        max_charge_power: f64,
        min_charge_power: f64,
        efficiency: f64,
    ) -> Result<Self, ValidationError> {
        Self::new(
            capacity,
            max_charge_power,
            min_charge_power,
            efficiency,
            1.0,
            0.0,
        )
    }

    /// Energy content in kWh.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Power ceiling in kW.
    pub fn max_charge_power(&self) -> f64 {
        self.max_charge_power
    }

    /// Power floor in kW.
    pub fn min_charge_power(&self) -> f64 {
        self.min_charge_power
    }

    /// Conversion efficiency. Not applied to energy accounting.
    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Knee of the derating curve.
    pub fn start_power_degradation(&self) -> f64 {
        self.start_power_degradation
    }

    /// Derated fraction of the ceiling at full charge.
    pub fn max_degradation_level(&self) -> f64 {
        self.max_degradation_level
    }

    /// Highest power the battery accepts at `soc`, in kW.
    ///
    /// Constant up to the knee, then linear down to the derated ceiling at
    /// `soc == 1`.
    pub fn max_power_possible(&self, soc: f64) -> f64 {
        if soc > self.start_power_degradation {
            let progress =
                (soc - self.start_power_degradation) / (1.0 - self.start_power_degradation);
            self.max_charge_power
                - progress * self.max_charge_power * (1.0 - self.max_degradation_level)
        } else {
            self.max_charge_power
        }
    }

    /// Lowest power the battery accepts at `soc`, in kW.
    ///
    /// Independent of `soc`.
    pub fn min_power_possible(&self, _soc: f64) -> f64 {
        self.min_charge_power
    }
}
