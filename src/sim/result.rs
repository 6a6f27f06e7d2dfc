//! In-memory accumulator for the per-step outcome of a run.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};

use super::infrastructure::{Infrastructure, PointId, StorageId};
use super::periods::ChargingPeriods;
use super::types::SimConfig;

/// Everything a finished run produced.
///
/// Series are preallocated for the whole horizon and indexed by step, so a
/// point that is idle in a step simply keeps its 0. The aggregate load
/// profile is only valid once a store call has been flagged `is_last`.
///
/// # Power Flow Convention
/// - Positive power: load on the transformer (vehicles, storage charging)
/// - Negative power: supply to the transformer (storage discharging)
#[derive(Debug, Clone)]
pub struct SimulationResult {
    config: SimConfig,
    point_names: Vec<String>,
    storage_names: Vec<String>,
    transformer_count: usize,
    point_power: Vec<Vec<f64>>,
    storage_power: Vec<Vec<f64>>,
    storage_soc: Vec<Vec<f64>>,
    busy_points: Vec<usize>,
    preload: Vec<f64>,
    load_profile: Vec<f64>,
    finalized: bool,
    /// Arrivals that found neither a free point nor room in the queue.
    pub counter_rejections: usize,
    /// Arrivals seen during the run.
    pub counter_arrivals: usize,
    /// Vehicles plugged into a point, directly or from the queue.
    pub counter_connections: usize,
    /// First and last charged step per event.
    pub charging_periods: ChargingPeriods,
}

impl SimulationResult {
    /// Creates an empty accumulator sized for `config`.
    ///
    /// # Arguments
    ///
    /// * `infrastructure` - Site whose points and storage are recorded
    /// * `config` - Simulated horizon
    /// * `preload` - Baseline load per step, already covering the horizon
    pub fn new(infrastructure: &Infrastructure, config: &SimConfig, preload: Vec<f64>) -> Self {
        let steps = config.total_steps();
        let points = infrastructure.point_ids().len();
        let storage = infrastructure.storage_ids().len();
        Self {
            config: config.clone(),
            point_names: infrastructure
                .points()
                .map(|(_, p)| p.name().to_string())
                .collect(),
            storage_names: infrastructure
                .storage_systems()
                .map(|(_, s)| s.name().to_string())
                .collect(),
            transformer_count: infrastructure.transformers().count(),
            point_power: vec![vec![0.0; steps]; points],
            storage_power: vec![vec![0.0; steps]; storage],
            storage_soc: vec![vec![0.0; steps]; storage],
            busy_points: vec![0; steps],
            preload,
            load_profile: vec![0.0; steps],
            finalized: false,
            counter_rejections: 0,
            counter_arrivals: 0,
            counter_connections: 0,
            charging_periods: ChargingPeriods::new(),
        }
    }

    /// Records realized point power for `step`.
    pub fn store_power_charging_points(
        &mut self,
        power: &BTreeMap<PointId, f64>,
        step: usize,
        is_last: bool,
    ) {
        for (&id, &p) in power {
            self.point_power[id.0][step] = p;
        }
        if is_last {
            self.finalize();
        }
    }

    /// Records realized storage power for `step`.
    pub fn store_power_storage_systems(
        &mut self,
        power: &BTreeMap<StorageId, f64>,
        step: usize,
        is_last: bool,
    ) {
        for (&id, &p) in power {
            self.storage_power[id.0][step] = p;
        }
        if is_last {
            self.finalize();
        }
    }

    /// Records the storage SOC at the end of `step`.
    pub fn store_soc_storage_systems(&mut self, soc: &BTreeMap<StorageId, f64>, step: usize) {
        for (&id, &s) in soc {
            self.storage_soc[id.0][step] = s;
        }
    }

    /// Records how many points were occupied during `step`.
    pub fn store_busy_points(&mut self, busy: usize, step: usize) {
        self.busy_points[step] = busy;
    }

    fn finalize(&mut self) {
        for (step, load) in self.load_profile.iter_mut().enumerate() {
            let points: f64 = self.point_power.iter().map(|s| s[step]).sum();
            let storage: f64 = self.storage_power.iter().map(|s| s[step]).sum();
            *load = points + storage + self.preload[step] * self.transformer_count as f64;
        }
        self.finalized = true;
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn total_steps(&self) -> usize {
        self.load_profile.len()
    }

    pub fn resolution(&self) -> TimeDelta {
        self.config.resolution
    }

    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.config.timestamps()
    }

    pub fn point_names(&self) -> &[String] {
        &self.point_names
    }

    pub fn storage_names(&self) -> &[String] {
        &self.storage_names
    }

    /// Power series of one charging point.
    pub fn point_power(&self, point: PointId) -> &[f64] {
        &self.point_power[point.0]
    }

    /// Power series of the point configured as `name`.
    pub fn point_power_by_name(&self, name: &str) -> Option<&[f64]> {
        self.point_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.point_power[i].as_slice())
    }

    /// Signed power series of one storage system.
    pub fn storage_power(&self, storage: StorageId) -> &[f64] {
        &self.storage_power[storage.0]
    }

    /// SOC of one storage system at the end of every step.
    pub fn storage_soc(&self, storage: StorageId) -> &[f64] {
        &self.storage_soc[storage.0]
    }

    /// Occupied points per step.
    pub fn busy_points(&self) -> &[usize] {
        &self.busy_points
    }

    pub fn preload(&self) -> &[f64] {
        &self.preload
    }

    /// Sum of all vehicle power per step.
    pub fn vehicle_load(&self) -> Vec<f64> {
        (0..self.total_steps())
            .map(|step| self.point_power.iter().map(|s| s[step]).sum())
            .collect()
    }

    /// Site load per step: points, signed storage and preload.
    ///
    /// All zeros until the last step has been stored.
    pub fn load_profile(&self) -> &[f64] {
        &self.load_profile
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
