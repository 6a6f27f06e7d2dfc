//! Transformer, charging station and charging point hierarchy.
//!
//! Nodes live in flat arenas and refer to their parent and children by index.
//! Each node has a power ceiling, and the power assigned below a node must
//! never exceed it. [`Infrastructure::max_hardware_power`] answers how much a
//! single charging point may still draw given everything else already
//! assigned in the same step.

use std::collections::HashSet;
use std::fmt;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use super::allocation::Allocation;
use super::event::{ChargingEvent, ConnectedVehicle};
use crate::devices::{Battery, StationaryBattery};
use crate::error::{SimError, ValidationError};

/// Tolerance for capacity comparisons (kW).
pub const POWER_EPSILON: f64 = 1e-6;

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

node_id!(
    /// Index of a transformer.
    TransformerId,
    "transformer"
);
node_id!(
    /// Index of a charging station.
    StationId,
    "station"
);
node_id!(
    /// Index of a charging point.
    PointId,
    "point"
);
node_id!(
    /// Index of a storage system.
    StorageId,
    "storage"
);

/// Charging point parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PointSpec {
    pub id: String,
    pub max_power: f64,
    #[serde(default)]
    pub min_power: f64,
}

/// Charging station parameters with its points.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StationSpec {
    pub id: String,
    pub max_power: f64,
    #[serde(default)]
    pub min_power: f64,
    pub charging_points: Vec<PointSpec>,
}

/// Stationary storage parameters.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSpec {
    pub id: String,
    pub capacity: f64,
    pub max_power: f64,
    #[serde(default)]
    pub min_power: f64,
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    pub initial_soc: f64,
    #[serde(default)]
    pub min_soc: f64,
}

fn default_efficiency() -> f64 {
    1.0
}

/// Transformer parameters with its stations and storage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransformerSpec {
    pub id: String,
    pub max_power: f64,
    #[serde(default)]
    pub min_power: f64,
    pub charging_stations: Vec<StationSpec>,
    #[serde(default)]
    pub storage: Vec<StorageSpec>,
}

impl TransformerSpec {
    /// Lays out `num_cp` identical wallboxes, `num_cp_per_cs` per station.
    ///
    /// Station and transformer ceilings default to the sum of their children.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if `num_cp` or `num_cp_per_cs` is zero.
    pub fn wallbox(
        num_cp: usize,
        power_cp: f64,
        num_cp_per_cs: usize,
        power_cs: Option<f64>,
        power_transformer: Option<f64>,
        min_power_cp: f64,
    ) -> Result<Self, ValidationError> {
        if num_cp == 0 {
            return Err(ValidationError::invalid("num_cp", "must be > 0"));
        }
        if num_cp_per_cs == 0 {
            return Err(ValidationError::invalid("num_cp_per_cs", "must be > 0"));
        }

        let mut stations = Vec::new();
        let mut cp_index = 0;
        while cp_index < num_cp {
            let count = num_cp_per_cs.min(num_cp - cp_index);
            let charging_points = (cp_index..cp_index + count)
                .map(|i| PointSpec {
                    id: format!("cp{}", i + 1),
                    max_power: power_cp,
                    min_power: min_power_cp,
                })
                .collect();
            stations.push(StationSpec {
                id: format!("cs{}", stations.len() + 1),
                max_power: power_cs.unwrap_or(power_cp * count as f64),
                min_power: 0.0,
                charging_points,
            });
            cp_index += count;
        }

        let total: f64 = stations.iter().map(|s| s.max_power).sum();
        Ok(Self {
            id: "transformer1".to_string(),
            max_power: power_transformer.unwrap_or(total),
            min_power: 0.0,
            charging_stations: stations,
            storage: Vec::new(),
        })
    }
}

/// Leaf node: one plug, one vehicle at a time.
#[derive(Debug, Clone)]
pub struct ChargingPoint {
    name: String,
    max_power: f64,
    min_power: f64,
    station: StationId,
    connected: Option<ConnectedVehicle>,
}

impl ChargingPoint {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    pub fn min_power(&self) -> f64 {
        self.min_power
    }

    pub fn station(&self) -> StationId {
        self.station
    }

    /// The connected vehicle, if any.
    pub fn connected(&self) -> Option<&ConnectedVehicle> {
        self.connected.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.connected.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ChargingStation {
    name: String,
    max_power: f64,
    min_power: f64,
    transformer: TransformerId,
    points: Vec<PointId>,
}

impl ChargingStation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    pub fn min_power(&self) -> f64 {
        self.min_power
    }

    pub fn transformer(&self) -> TransformerId {
        self.transformer
    }

    pub fn points(&self) -> &[PointId] {
        &self.points
    }
}

#[derive(Debug, Clone)]
pub struct Transformer {
    name: String,
    max_power: f64,
    min_power: f64,
    stations: Vec<StationId>,
    storage: Vec<StorageId>,
}

impl Transformer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_power(&self) -> f64 {
        self.max_power
    }

    pub fn min_power(&self) -> f64 {
        self.min_power
    }

    pub fn stations(&self) -> &[StationId] {
        &self.stations
    }

    pub fn storage(&self) -> &[StorageId] {
        &self.storage
    }
}

/// Stationary battery connected behind a transformer.
#[derive(Debug, Clone)]
pub struct StorageSystem {
    name: String,
    transformer: TransformerId,
    battery: StationaryBattery,
}

impl StorageSystem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transformer(&self) -> TransformerId {
        self.transformer
    }

    pub fn battery(&self) -> &StationaryBattery {
        &self.battery
    }
}

/// The full capacity tree of a site.
#[derive(Debug, Clone)]
pub struct Infrastructure {
    transformers: Vec<Transformer>,
    stations: Vec<ChargingStation>,
    points: Vec<ChargingPoint>,
    storage: Vec<StorageSystem>,
}

impl Infrastructure {
    /// Builds the tree from nested specifications.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if a ceiling is negative or below its
    /// floor, an id repeats within its level, a storage battery is invalid, or
    /// there is no charging point.
    pub fn new(specs: &[TransformerSpec]) -> Result<Self, ValidationError> {
        let mut infra = Self {
            transformers: Vec::new(),
            stations: Vec::new(),
            points: Vec::new(),
            storage: Vec::new(),
        };
        let mut seen = [HashSet::new(), HashSet::new(), HashSet::new(), HashSet::new()];

        for t in specs {
            check_node("transformer", &t.id, t.max_power, t.min_power, &mut seen[0])?;
            let tid = TransformerId(infra.transformers.len());
            let mut station_ids = Vec::new();
            let mut storage_ids = Vec::new();

            for s in &t.charging_stations {
                check_node("charging station", &s.id, s.max_power, s.min_power, &mut seen[1])?;
                let sid = StationId(infra.stations.len());
                let mut point_ids = Vec::new();
                for p in &s.charging_points {
                    check_node("charging point", &p.id, p.max_power, p.min_power, &mut seen[2])?;
                    let pid = PointId(infra.points.len());
                    infra.points.push(ChargingPoint {
                        name: p.id.clone(),
                        max_power: p.max_power,
                        min_power: p.min_power,
                        station: sid,
                        connected: None,
                    });
                    point_ids.push(pid);
                }
                infra.stations.push(ChargingStation {
                    name: s.id.clone(),
                    max_power: s.max_power,
                    min_power: s.min_power,
                    transformer: tid,
                    points: point_ids,
                });
                station_ids.push(sid);
            }

            for st in &t.storage {
                if !seen[3].insert(st.id.clone()) {
                    return Err(ValidationError::DuplicateId {
                        kind: "storage system",
                        id: st.id.clone(),
                    });
                }
                let battery = Battery::without_degradation(
                    st.capacity,
                    st.max_power,
                    st.min_power,
                    st.efficiency,
                )?;
                let stid = StorageId(infra.storage.len());
                infra.storage.push(StorageSystem {
                    name: st.id.clone(),
                    transformer: tid,
                    battery: StationaryBattery::new(battery, st.initial_soc, st.min_soc)?,
                });
                storage_ids.push(stid);
            }

            infra.transformers.push(Transformer {
                name: t.id.clone(),
                max_power: t.max_power,
                min_power: t.min_power,
                stations: station_ids,
                storage: storage_ids,
            });
        }

        if infra.points.is_empty() {
            return Err(ValidationError::NoChargingPoints);
        }
        Ok(infra)
    }

    pub fn transformers(&self) -> impl Iterator<Item = (TransformerId, &Transformer)> {
        self.transformers
            .iter()
            .enumerate()
            .map(|(i, t)| (TransformerId(i), t))
    }

    pub fn stations(&self) -> impl Iterator<Item = (StationId, &ChargingStation)> {
        self.stations
            .iter()
            .enumerate()
            .map(|(i, s)| (StationId(i), s))
    }

    pub fn points(&self) -> impl Iterator<Item = (PointId, &ChargingPoint)> {
        self.points.iter().enumerate().map(|(i, p)| (PointId(i), p))
    }

    pub fn storage_systems(&self) -> impl Iterator<Item = (StorageId, &StorageSystem)> {
        self.storage
            .iter()
            .enumerate()
            .map(|(i, s)| (StorageId(i), s))
    }

    pub fn point_ids(&self) -> Vec<PointId> {
        (0..self.points.len()).map(PointId).collect()
    }

    pub fn storage_ids(&self) -> Vec<StorageId> {
        (0..self.storage.len()).map(StorageId).collect()
    }

    pub fn transformer(&self, id: TransformerId) -> &Transformer {
        &self.transformers[id.0]
    }

    pub fn station(&self, id: StationId) -> &ChargingStation {
        &self.stations[id.0]
    }

    pub fn point(&self, id: PointId) -> &ChargingPoint {
        &self.points[id.0]
    }

    pub fn storage_system(&self, id: StorageId) -> &StorageSystem {
        &self.storage[id.0]
    }

    /// Looks up a charging point by its configured name.
    pub fn find_point(&self, name: &str) -> Option<PointId> {
        self.points.iter().position(|p| p.name == name).map(PointId)
    }

    /// Transformer feeding `point`.
    pub fn point_transformer(&self, point: PointId) -> TransformerId {
        self.station(self.point(point).station).transformer
    }

    /// Sum of the point ceilings.
    pub fn installed_point_power(&self) -> f64 {
        self.points.iter().map(|p| p.max_power).sum()
    }

    /// Power assigned to the points of `station`.
    pub fn station_load(&self, station: StationId, allocation: &Allocation) -> f64 {
        self.station(station)
            .points
            .iter()
            .map(|&p| allocation.point(p))
            .sum()
    }

    /// Net power assigned below `transformer`: its points plus signed storage.
    pub fn transformer_load(&self, transformer: TransformerId, allocation: &Allocation) -> f64 {
        let t = self.transformer(transformer);
        let points: f64 = t
            .stations
            .iter()
            .map(|&s| self.station_load(s, allocation))
            .sum();
        let storage: f64 = t.storage.iter().map(|&s| allocation.storage(s)).sum();
        points + storage
    }

    /// Spare capacity at `transformer` after `preload` and `allocation`.
    pub fn transformer_headroom(
        &self,
        transformer: TransformerId,
        allocation: &Allocation,
        preload: f64,
    ) -> f64 {
        let t = self.transformer(transformer);
        (t.max_power - preload - self.transformer_load(transformer, allocation)).max(0.0)
    }

    /// Spare capacity at `station` after `allocation`.
    pub fn station_headroom(&self, station: StationId, allocation: &Allocation) -> f64 {
        (self.station(station).max_power - self.station_load(station, allocation)).max(0.0)
    }

    /// Additional power `point` may draw on top of what `allocation` already
    /// gives it.
    ///
    /// The smallest spare capacity along the path point -> station ->
    /// transformer, with `preload` charged against the transformer.
    pub fn max_hardware_power(&self, point: PointId, allocation: &Allocation, preload: f64) -> f64 {
        let cp = self.point(point);
        let own = (cp.max_power - allocation.point(point)).max(0.0);
        let station = self.station_headroom(cp.station, allocation);
        let transformer =
            self.transformer_headroom(self.station(cp.station).transformer, allocation, preload);
        own.min(station).min(transformer)
    }

    /// Verifies that `allocation` respects every ceiling in the tree.
    ///
    /// A transformer whose preload alone exceeds its ceiling is only flagged
    /// when the allocation adds load on top.
    ///
    /// # Errors
    ///
    /// Returns `SimError::CapacityExceeded` for the first violated node.
    pub fn check_allocation(&self, allocation: &Allocation, preload: f64) -> Result<(), SimError> {
        for (&pid, &power) in allocation.points() {
            let cp = self.point(pid);
            if power < -POWER_EPSILON || power > cp.max_power + POWER_EPSILON {
                return Err(SimError::CapacityExceeded {
                    node: format!("charging point \"{}\"", cp.name),
                    assigned_kw: power,
                    limit_kw: cp.max_power,
                });
            }
        }
        for (sid, station) in self.stations() {
            let load = self.station_load(sid, allocation);
            if load > station.max_power + POWER_EPSILON {
                return Err(SimError::CapacityExceeded {
                    node: format!("charging station \"{}\"", station.name),
                    assigned_kw: load,
                    limit_kw: station.max_power,
                });
            }
        }
        for (tid, transformer) in self.transformers() {
            let load = self.transformer_load(tid, allocation);
            if load > POWER_EPSILON && preload + load > transformer.max_power + POWER_EPSILON {
                return Err(SimError::CapacityExceeded {
                    node: format!("transformer \"{}\"", transformer.name),
                    assigned_kw: preload + load,
                    limit_kw: transformer.max_power,
                });
            }
        }
        Ok(())
    }

    /// Plugs the vehicle of `event` into `point`.
    ///
    /// # Panics
    ///
    /// Panics if `point` is already occupied.
    pub fn connect_vehicle(&mut self, point: PointId, event: &ChargingEvent) {
        let cp = &mut self.points[point.0];
        assert!(
            cp.connected.is_none(),
            "charging point \"{}\" is already occupied",
            cp.name
        );
        cp.connected = Some(ConnectedVehicle::from_event(event));
    }

    /// Unplugs and returns the vehicle at `point`.
    pub fn disconnect_vehicle(&mut self, point: PointId) -> Option<ConnectedVehicle> {
        self.points[point.0].connected.take()
    }

    /// Charges the vehicle at `point` and returns the power it absorbed.
    ///
    /// Returns 0 for an empty point.
    pub fn charge_vehicle(&mut self, point: PointId, power: f64, step_length: TimeDelta) -> f64 {
        let cp = &mut self.points[point.0];
        let ceiling = power.min(cp.max_power);
        cp.connected
            .as_mut()
            .map_or(0.0, |vehicle| vehicle.charge(ceiling, step_length))
    }

    pub(crate) fn storage_battery_mut(&mut self, id: StorageId) -> &mut StationaryBattery {
        &mut self.storage[id.0].battery
    }
}

fn check_node(
    kind: &'static str,
    id: &str,
    max_power: f64,
    min_power: f64,
    seen: &mut HashSet<String>,
) -> Result<(), ValidationError> {
    if !seen.insert(id.to_string()) {
        return Err(ValidationError::DuplicateId {
            kind,
            id: id.to_string(),
        });
    }
    if !(max_power >= 0.0) {
        return Err(ValidationError::invalid(
            "max_power",
            format!("{kind} \"{id}\" must be >= 0"),
        ));
    }
    if !(min_power >= 0.0) || min_power > max_power {
        return Err(ValidationError::invalid(
            "min_power",
            format!("{kind} \"{id}\" must be in [0, max_power]"),
        ));
    }
    Ok(())
}
