//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use chargepark_sim::devices::{Battery, ElectricVehicle};
use chargepark_sim::scenario::ScenarioRealisation;
use chargepark_sim::sim::event::{ChargingEvent, EventId};
use chargepark_sim::sim::infrastructure::{Infrastructure, TransformerSpec};
use chargepark_sim::sim::policy::{PolicyKind, SchedulingPolicy};
use chargepark_sim::sim::types::SimConfig;

/// 2024-01-01 (a Monday) at `hour`:00.
pub fn at(hour: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap()
        + TimeDelta::hours(hour)
}

/// Hourly horizon with `steps` steps starting at midnight.
pub fn hourly(steps: i64) -> SimConfig {
    SimConfig::new(at(0), at(steps - 1), TimeDelta::hours(1)).unwrap()
}

/// Vehicle type without derating and without a minimum power.
pub fn vehicle(capacity: f64, max_power: f64) -> Arc<ElectricVehicle> {
    let battery = Battery::without_degradation(capacity, max_power, 0.0, 1.0).unwrap();
    Arc::new(ElectricVehicle::new("Test", "Car", battery, 1.0).unwrap())
}

/// Visit arriving at `arrival_h`, parked for `park_h` hours, charging to full.
pub fn event(
    id: usize,
    arrival_h: i64,
    park_h: i64,
    soc: f64,
    vehicle: &Arc<ElectricVehicle>,
) -> ChargingEvent {
    ChargingEvent::with_parking_time(
        EventId(id),
        at(arrival_h),
        TimeDelta::hours(park_h),
        soc,
        1.0,
        Arc::clone(vehicle),
    )
    .unwrap()
}

/// One transformer with `num_cp` points of `power_cp` kW, two per station.
pub fn wallbox_site(num_cp: usize, power_cp: f64, transformer: Option<f64>) -> Infrastructure {
    let spec = TransformerSpec::wallbox(num_cp, power_cp, 2, None, transformer, 0.0).unwrap();
    Infrastructure::new(&[spec]).unwrap()
}

/// Scenario on `infra` over `config` with the given built-in policy.
pub fn scenario(
    config: SimConfig,
    infra: Infrastructure,
    kind: PolicyKind,
    events: Vec<ChargingEvent>,
) -> ScenarioRealisation {
    ScenarioRealisation::new(config, infra, SchedulingPolicy::new(kind, TimeDelta::hours(1)))
        .with_events(events)
}
