use serde::Serialize;

use super::Battery;
use crate::error::ValidationError;

/// A vehicle type: make, model, battery and how often it shows up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElectricVehicle {
    brand: String,
    model: String,
    battery: Battery,
    probability: f64,
}

impl ElectricVehicle {
    /// Creates a vehicle type.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `probability` is outside `[0, 1]` or the
    /// battery has no charge power.
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        battery: Battery,
        probability: f64,
    ) -> Result<Self, ValidationError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ValidationError::invalid("probability", "must be in [0, 1]"));
        }
        if !(battery.max_charge_power() > 0.0) {
            return Err(ValidationError::invalid(
                "max_charge_power",
                "vehicle batteries must accept power",
            ));
        }
        Ok(Self {
            brand: brand.into(),
            model: model.into(),
            battery,
            probability,
        })
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    /// Selection weight used by the event generator.
    pub fn probability(&self) -> f64 {
        self.probability
    }
}
