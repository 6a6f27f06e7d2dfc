//! Charging events and the per-connection vehicle state.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::devices::storage::step_hours;
use crate::devices::{Battery, ElectricVehicle};
use crate::error::ValidationError;

/// Stable identifier of a charging event (its position in arrival order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventId(pub usize);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event-{}", self.0)
    }
}

/// One vehicle's visit to the site.
///
/// Immutable once created. Connecting it to a charging point produces a
/// [`ConnectedVehicle`] that carries the evolving SOC.
#[derive(Debug, Clone)]
pub struct ChargingEvent {
    id: EventId,
    arrival_time: NaiveDateTime,
    leaving_time: NaiveDateTime,
    soc: f64,
    soc_target: f64,
    vehicle_type: Arc<ElectricVehicle>,
}

impl ChargingEvent {
    /// Creates a charging event.
    ///
    /// A `soc_target` below `soc` is accepted and means no charging is needed.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` unless `arrival_time < leaving_time` and
    /// both SOC values are in `[0, 1]`.
    pub fn new(
        id: EventId,
        arrival_time: NaiveDateTime,
        leaving_time: NaiveDateTime,
        soc: f64,
        soc_target: f64,
        vehicle_type: Arc<ElectricVehicle>,
    ) -> Result<Self, ValidationError> {
        if arrival_time >= leaving_time {
            return Err(ValidationError::invalid(
                "leaving_time",
                format!("{leaving_time} is not after arrival {arrival_time}"),
            ));
        }
        if !(0.0..=1.0).contains(&soc) {
            return Err(ValidationError::invalid("soc", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&soc_target) {
            return Err(ValidationError::invalid("soc_target", "must be in [0, 1]"));
        }
        Ok(Self {
            id,
            arrival_time,
            leaving_time,
            soc,
            soc_target,
            vehicle_type,
        })
    }

    /// Creates an event whose leaving time is `parking_time` after arrival.
    ///
    /// # Errors
    ///
    /// Same as [`ChargingEvent::new`].
    pub fn with_parking_time(
        id: EventId,
        arrival_time: NaiveDateTime,
        parking_time: TimeDelta,
        soc: f64,
        soc_target: f64,
        vehicle_type: Arc<ElectricVehicle>,
    ) -> Result<Self, ValidationError> {
        Self::new(
            id,
            arrival_time,
            arrival_time + parking_time,
            soc,
            soc_target,
            vehicle_type,
        )
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn arrival_time(&self) -> NaiveDateTime {
        self.arrival_time
    }

    pub fn leaving_time(&self) -> NaiveDateTime {
        self.leaving_time
    }

    /// SOC on arrival.
    pub fn soc(&self) -> f64 {
        self.soc
    }

    pub fn soc_target(&self) -> f64 {
        self.soc_target
    }

    pub fn vehicle_type(&self) -> &ElectricVehicle {
        &self.vehicle_type
    }

    /// Energy needed to go from arrival SOC to target SOC, in kWh.
    pub fn energy_demand(&self) -> f64 {
        (self.soc_target - self.soc).max(0.0) * self.vehicle_type.battery().capacity()
    }

    pub(crate) fn with_id(mut self, id: EventId) -> Self {
        self.id = id;
        self
    }
}

/// State of a vehicle while it is plugged into a charging point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectedVehicle {
    /// Event that produced this connection.
    pub id: EventId,
    /// Current SOC.
    pub soc: f64,
    /// SOC at which the vehicle is satisfied.
    pub soc_target: f64,
    /// Arrival at the site.
    pub arrival_time: NaiveDateTime,
    /// Time the vehicle must leave.
    pub leaving_time: NaiveDateTime,
    /// Battery specification of the vehicle type.
    pub battery: Battery,
}

impl ConnectedVehicle {
    pub fn from_event(event: &ChargingEvent) -> Self {
        Self {
            id: event.id(),
            soc: event.soc(),
            soc_target: event.soc_target(),
            arrival_time: event.arrival_time(),
            leaving_time: event.leaving_time(),
            battery: *event.vehicle_type().battery(),
        }
    }

    /// Power that brings the vehicle to its target by the end of the step.
    pub fn power_to_target(&self, step_length: TimeDelta) -> f64 {
        ((self.soc_target - self.soc) * self.battery.capacity() / step_hours(step_length)).max(0.0)
    }

    /// Power the vehicle would draw this step if nothing else limited it.
    pub fn demand(&self, step_length: TimeDelta) -> f64 {
        self.battery
            .max_power_possible(self.soc)
            .min(self.power_to_target(step_length))
    }

    /// Smallest non-zero power this vehicle accepts.
    pub fn min_power(&self) -> f64 {
        self.battery.min_power_possible(self.soc)
    }

    /// Whether the target SOC is reached (compared at three decimals).
    pub fn target_reached(&self) -> bool {
        round_to_millis(self.soc) >= self.soc_target
    }

    /// Applies `power` for one step and returns the power actually absorbed.
    ///
    /// Requests above the battery's derated ceiling or beyond a full battery
    /// are clamped, never rejected.
    pub fn charge(&mut self, power: f64, step_length: TimeDelta) -> f64 {
        let hours = step_hours(step_length);
        let capacity = self.battery.capacity();
        let to_full = (1.0 - self.soc) * capacity / hours;
        let applied = power
            .min(self.battery.max_power_possible(self.soc))
            .min(to_full)
            .max(0.0);
        self.soc = (self.soc + applied * hours / capacity).clamp(0.0, 1.0);
        applied
    }
}

fn round_to_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
