//! Scheduling policies: how power is shared among connected vehicles and
//! storage in one step.
//!
//! Every policy implements [`Scheduler`]. [`SchedulingPolicy`] is the closed
//! set of built-in policies, resolved once from a [`PolicyKind`] before the
//! run starts.

mod discrimination_free;
mod fcfs;
mod optimized;
mod uncontrolled;
mod with_storage;

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

pub use discrimination_free::DiscriminationFree;
pub use fcfs::Fcfs;
pub use optimized::Optimized;
pub use uncontrolled::Uncontrolled;
pub use with_storage::WithStorage;

use super::allocation::Allocation;
use super::event::ConnectedVehicle;
use super::infrastructure::{Infrastructure, POWER_EPSILON, PointId};
use super::occupancy::Occupancy;
use super::periods::ChargingPeriods;

/// Read-only view of the site handed to a policy each step.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleContext<'a> {
    pub infrastructure: &'a Infrastructure,
    pub occupancy: &'a Occupancy,
    pub charging_periods: &'a ChargingPeriods,
    /// Step index.
    pub step: usize,
    /// Timestamp of the step.
    pub timestamp: NaiveDateTime,
    /// Step length.
    pub step_length: TimeDelta,
    /// Baseline load on every transformer this step (kW).
    pub preload: f64,
}

impl<'a> ScheduleContext<'a> {
    /// Busy points with their vehicles, in point order.
    pub fn busy_vehicles(&self) -> Vec<(PointId, &'a ConnectedVehicle)> {
        let infra = self.infrastructure;
        self.occupancy
            .busy()
            .filter_map(|p| infra.point(p).connected().map(|v| (p, v)))
            .collect()
    }

    /// Smallest non-zero power the point and vehicle can run at.
    pub fn min_power(&self, point: PointId, vehicle: &ConnectedVehicle) -> f64 {
        self.infrastructure
            .point(point)
            .min_power()
            .max(vehicle.min_power())
    }
}

/// Computes one step's power allocation.
///
/// Implementations must assign a value to every busy point and every storage
/// system, and must keep every node of the capacity tree within its ceiling.
pub trait Scheduler {
    fn schedule(&mut self, ctx: &ScheduleContext<'_>) -> Allocation;
}

/// Names of the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Uncontrolled,
    Fcfs,
    DiscriminationFree,
    WithStorage,
    Optimized,
}

impl PolicyKind {
    /// Every accepted spelling, canonical name first.
    pub const ALIASES: &'static [(&'static str, PolicyKind)] = &[
        ("uncontrolled", PolicyKind::Uncontrolled),
        ("uc", PolicyKind::Uncontrolled),
        ("fcfs", PolicyKind::Fcfs),
        ("discrimination_free", PolicyKind::DiscriminationFree),
        ("df", PolicyKind::DiscriminationFree),
        ("with_storage", PolicyKind::WithStorage),
        ("ws", PolicyKind::WithStorage),
        ("optimized", PolicyKind::Optimized),
        ("opt", PolicyKind::Optimized),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uncontrolled => "uncontrolled",
            Self::Fcfs => "fcfs",
            Self::DiscriminationFree => "discrimination_free",
            Self::WithStorage => "with_storage",
            Self::Optimized => "optimized",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unrecognised policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scheduling policy \"{0}\"")]
pub struct UnknownPolicy(pub String);

impl FromStr for PolicyKind {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| UnknownPolicy(s.to_string()))
    }
}

/// The built-in policies.
#[derive(Debug, Clone)]
pub enum SchedulingPolicy {
    Uncontrolled(Uncontrolled),
    Fcfs(Fcfs),
    DiscriminationFree(DiscriminationFree),
    WithStorage(WithStorage),
    Optimized(Optimized),
}

impl SchedulingPolicy {
    /// Instantiates the policy named by `kind`.
    ///
    /// `df_charging_period` is only used by the discrimination-free policy.
    pub fn new(kind: PolicyKind, df_charging_period: TimeDelta) -> Self {
        match kind {
            PolicyKind::Uncontrolled => Self::Uncontrolled(Uncontrolled),
            PolicyKind::Fcfs => Self::Fcfs(Fcfs),
            PolicyKind::DiscriminationFree => {
                Self::DiscriminationFree(DiscriminationFree::new(df_charging_period))
            }
            PolicyKind::WithStorage => Self::WithStorage(WithStorage),
            PolicyKind::Optimized => Self::Optimized(Optimized),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::Uncontrolled(_) => PolicyKind::Uncontrolled,
            Self::Fcfs(_) => PolicyKind::Fcfs,
            Self::DiscriminationFree(_) => PolicyKind::DiscriminationFree,
            Self::WithStorage(_) => PolicyKind::WithStorage,
            Self::Optimized(_) => PolicyKind::Optimized,
        }
    }
}

impl Scheduler for SchedulingPolicy {
    fn schedule(&mut self, ctx: &ScheduleContext<'_>) -> Allocation {
        let allocation = match self {
            Self::Uncontrolled(p) => p.schedule(ctx),
            Self::Fcfs(p) => p.schedule(ctx),
            Self::DiscriminationFree(p) => p.schedule(ctx),
            Self::WithStorage(p) => p.schedule(ctx),
            Self::Optimized(p) => p.schedule(ctx),
        };
        debug_assert!(
            ctx.infrastructure
                .check_allocation(&allocation, ctx.preload)
                .is_ok(),
            "{} policy exceeded hardware capacity at step {}",
            self.kind(),
            ctx.step
        );
        allocation
    }
}

/// Serves points one after another, each taking as much as it can.
///
/// A vehicle gets nothing if its headroom is below its minimum power.
pub(crate) fn greedy_fill(
    ctx: &ScheduleContext<'_>,
    order: impl IntoIterator<Item = PointId>,
    allocation: &mut Allocation,
) {
    for point in order {
        let Some(vehicle) = ctx.infrastructure.point(point).connected() else {
            continue;
        };
        let headroom = ctx
            .infrastructure
            .max_hardware_power(point, allocation, ctx.preload);
        let power = if headroom + POWER_EPSILON < ctx.min_power(point, vehicle) {
            0.0
        } else {
            vehicle.demand(ctx.step_length).min(headroom)
        };
        allocation.set_point(point, power);
    }
}

/// Assigns 0 to every storage system, leaving them to self-charge.
pub(crate) fn idle_storage(ctx: &ScheduleContext<'_>, allocation: &mut Allocation) {
    for id in ctx.infrastructure.storage_ids() {
        allocation.set_storage(id, 0.0);
    }
}

/// Pre-assigns every storage system its full discharge capability.
///
/// Widens the transformer headroom seen by the vehicle allocation. Must be
/// followed by [`settle_storage_discharge`].
pub(crate) fn reserve_storage_discharge(ctx: &ScheduleContext<'_>, allocation: &mut Allocation) {
    for (id, system) in ctx.infrastructure.storage_systems() {
        let limit = system.battery().max_discharge_power(0.0, ctx.step_length);
        allocation.set_storage(id, -limit);
    }
}

/// Shrinks reserved discharge to exactly the transformer overload.
///
/// Storage systems are drawn on in order. Any system not needed is set to 0.
/// When the preload alone exceeds the ceiling, storage covers what it can and
/// the rest stays uncovered.
pub(crate) fn settle_storage_discharge(ctx: &ScheduleContext<'_>, allocation: &mut Allocation) {
    let infra = ctx.infrastructure;
    for (tid, transformer) in infra.transformers() {
        let points: f64 = transformer
            .stations()
            .iter()
            .map(|&s| infra.station_load(s, allocation))
            .sum();
        let mut shortfall = (ctx.preload + points - transformer.max_power()).max(0.0);
        for &sid in transformer.storage() {
            let reserved = -allocation.storage(sid);
            let discharge = shortfall.min(reserved).max(0.0);
            allocation.set_storage(sid, if discharge > 0.0 { -discharge } else { 0.0 });
            shortfall -= discharge;
        }
        // preload above the ceiling is not the policy's to cover
        let preload_excess = (ctx.preload - transformer.max_power()).max(0.0);
        debug_assert!(
            shortfall <= preload_excess + POWER_EPSILON,
            "storage behind {tid} cannot cover {shortfall} kW of vehicle load"
        );
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    use super::ScheduleContext;
    use crate::devices::{Battery, ElectricVehicle};
    use crate::sim::event::{ChargingEvent, EventId};
    use crate::sim::infrastructure::{
        Infrastructure, PointId, PointSpec, StationSpec, StorageSpec, TransformerSpec,
    };
    use crate::sim::occupancy::{Occupancy, PointStatus};
    use crate::sim::periods::ChargingPeriods;

    pub fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    /// One transformer with one station per entry of `station_points`.
    pub fn site(
        transformer_kw: f64,
        station_kw: f64,
        point_kw: f64,
        station_points: &[usize],
        storage: Option<StorageSpec>,
    ) -> Infrastructure {
        let mut n = 0;
        let stations = station_points
            .iter()
            .enumerate()
            .map(|(i, &count)| StationSpec {
                id: format!("cs{i}"),
                max_power: station_kw,
                min_power: 0.0,
                charging_points: (0..count)
                    .map(|_| {
                        n += 1;
                        PointSpec {
                            id: format!("cp{n}"),
                            max_power: point_kw,
                            min_power: 0.0,
                        }
                    })
                    .collect(),
            })
            .collect();
        let spec = TransformerSpec {
            id: "t1".into(),
            max_power: transformer_kw,
            min_power: 0.0,
            charging_stations: stations,
            storage: storage.into_iter().collect(),
        };
        Infrastructure::new(&[spec]).unwrap()
    }

    pub fn storage(capacity: f64, max_power: f64, soc: f64) -> StorageSpec {
        StorageSpec {
            id: "st1".into(),
            capacity,
            max_power,
            min_power: 0.0,
            efficiency: 1.0,
            initial_soc: soc,
            min_soc: 0.0,
        }
    }

    pub fn event(id: usize, arrival: u32, soc: f64, max_kw: f64) -> ChargingEvent {
        let battery = Battery::without_degradation(60.0, max_kw, 0.0, 1.0).unwrap();
        let ev = Arc::new(ElectricVehicle::new("Generic", "Car", battery, 1.0).unwrap());
        ChargingEvent::new(EventId(id), at(arrival), at(23), soc, 1.0, ev).unwrap()
    }

    /// Connects `events` to the given points and returns the occupancy map.
    pub fn connect(infra: &mut Infrastructure, plugs: &[(usize, ChargingEvent)]) -> Occupancy {
        let mut occ = Occupancy::new(infra.point_ids());
        for (p, e) in plugs {
            infra.connect_vehicle(PointId(*p), e);
            occ.set(PointId(*p), PointStatus::Busy);
        }
        occ
    }

    pub fn ctx<'a>(
        infra: &'a Infrastructure,
        occ: &'a Occupancy,
        periods: &'a ChargingPeriods,
        hour: u32,
        preload: f64,
    ) -> ScheduleContext<'a> {
        ScheduleContext {
            infrastructure: infra,
            occupancy: occ,
            charging_periods: periods,
            step: hour as usize,
            timestamp: at(hour),
            step_length: TimeDelta::hours(1),
            preload,
        }
    }
}
