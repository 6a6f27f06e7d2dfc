//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::devices::{Battery, ElectricVehicle};
use crate::generator::{EventGenerator, EventParams};
use crate::scenario::{ScenarioError, ScenarioRealisation};
use crate::sim::infrastructure::{Infrastructure, StorageSpec, TransformerSpec};
use crate::sim::policy::{PolicyKind, SchedulingPolicy};
use crate::sim::types::{DisconnectPolicy, OpeningHours, SimConfig};

/// Only sample method implemented by [`EventGenerator`].
const SAMPLE_METHOD: &str = "independent_normal_dist";

/// Top-level scenario configuration parsed from TOML.
///
/// Missing sections fall back to the baseline scenario. Load from TOML with
/// [`ScenarioConfig::from_toml_file`] or use [`ScenarioConfig::baseline`]
/// for the built-in default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Horizon, resolution and seed.
    pub simulation: SimulationConfig,
    /// Policy and admission rules.
    pub scheduling: SchedulingConfig,
    /// Charging-event generator parameters.
    pub events: EventsConfig,
    /// Vehicle types.
    pub vehicles: Vec<VehicleConfig>,
    /// Explicit site tree. Mutually exclusive with `wallbox`.
    pub transformers: Vec<TransformerSpec>,
    /// Flat site builder.
    pub wallbox: Option<WallboxConfig>,
    /// Baseline transformer load.
    pub preload: Option<PreloadConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            scheduling: SchedulingConfig::default(),
            events: EventsConfig::default(),
            vehicles: vec![VehicleConfig::default()],
            transformers: Vec::new(),
            wallbox: None,
            preload: None,
        }
    }
}

/// Simulated horizon.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// First step, `"YYYY-MM-DD HH:MM:SS"`.
    pub start: String,
    /// Last step (inclusive).
    pub end: String,
    /// Step length, `"HH:MM:SS"`.
    pub resolution: String,
    /// Seed of the event generator.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: "2024-01-01 00:00:00".to_string(),
            end: "2024-01-01 23:45:00".to_string(),
            resolution: "00:15:00".to_string(),
            seed: 42,
        }
    }
}

/// Scheduling policy and admission rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingConfig {
    /// Policy name or alias, see [`PolicyKind::ALIASES`].
    pub policy: String,
    /// Slot length of the discrimination-free policy, `"HH:MM:SS"`.
    pub df_charging_period: String,
    /// Waiting queue size, 0 disables queueing.
    pub queue_length: usize,
    /// Disconnect at leaving time (`true`) or once the target SOC is reached.
    pub disconnect_by_time: bool,
    /// `[open, close]` in hours of day.
    pub opening_hours: Option<[f64; 2]>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            policy: "uncontrolled".to_string(),
            df_charging_period: "01:00:00".to_string(),
            queue_length: 0,
            disconnect_by_time: true,
            opening_hours: None,
        }
    }
}

/// Charging-event generator parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Must be `"independent_normal_dist"`.
    pub sample_method: String,
    /// Hourly arrival weights from Monday 00:00, wrapped.
    pub arrival_distribution: Vec<f64>,
    /// Events per pass of `arrival_distribution`.
    pub num_charging_events: usize,
    /// Mean park duration (hours).
    pub mean_park: f64,
    /// Park duration deviation (hours).
    pub std_deviation_park: f64,
    /// Mean arrival SOC.
    pub mean_soc: f64,
    /// Arrival SOC deviation.
    pub std_deviation_soc: f64,
    /// Park duration cap (hours).
    pub max_parking_time: f64,
    /// Target SOC of every vehicle.
    pub soc_target: f64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        let p = EventParams::default();
        Self {
            sample_method: SAMPLE_METHOD.to_string(),
            arrival_distribution: p.arrival_distribution,
            num_charging_events: p.num_charging_events,
            mean_park: p.mean_park,
            std_deviation_park: p.std_deviation_park,
            mean_soc: p.mean_soc,
            std_deviation_soc: p.std_deviation_soc,
            max_parking_time: p.max_parking_time,
            soc_target: p.soc_target,
        }
    }
}

impl EventsConfig {
    fn to_params(&self) -> EventParams {
        EventParams {
            arrival_distribution: self.arrival_distribution.clone(),
            num_charging_events: self.num_charging_events,
            mean_park: self.mean_park,
            std_deviation_park: self.std_deviation_park,
            mean_soc: self.mean_soc,
            std_deviation_soc: self.std_deviation_soc,
            max_parking_time: self.max_parking_time,
            soc_target: self.soc_target,
        }
    }
}

/// One vehicle type.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    pub brand: String,
    pub model: String,
    /// Share of generated events using this type.
    pub probability: f64,
    pub battery: BatteryConfig,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            brand: "Generic".to_string(),
            model: "Compact".to_string(),
            probability: 1.0,
            battery: BatteryConfig::default(),
        }
    }
}

/// Vehicle battery.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Energy content (kWh).
    pub capacity: f64,
    /// Charge power ceiling (kW).
    pub max_charge_power: f64,
    /// Smallest accepted power (kW).
    pub min_charge_power: f64,
    pub efficiency: f64,
    /// SOC at which derating starts. Set together with
    /// `max_degradation_level`.
    pub start_power_degradation: Option<f64>,
    /// Fraction of `max_charge_power` accepted at SOC 1.
    pub max_degradation_level: Option<f64>,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity: 50.0,
            max_charge_power: 11.0,
            min_charge_power: 0.0,
            efficiency: 1.0,
            start_power_degradation: None,
            max_degradation_level: None,
        }
    }
}

/// Flat site layout: identical points grouped into stations under one
/// transformer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WallboxConfig {
    pub num_cp: usize,
    /// Point ceiling (kW).
    pub power_cp: f64,
    pub num_cp_per_cs: usize,
    /// Station ceiling, defaults to the sum of its points.
    pub power_cs: Option<f64>,
    /// Transformer ceiling, defaults to the sum of its stations.
    pub power_transformer: Option<f64>,
    pub min_power_cp: f64,
    /// Storage attached to the transformer.
    pub storage: Vec<StorageSpec>,
}

impl Default for WallboxConfig {
    fn default() -> Self {
        Self {
            num_cp: 4,
            power_cp: 11.0,
            num_cp_per_cs: 2,
            power_cs: None,
            power_transformer: None,
            min_power_cp: 0.0,
            storage: Vec::new(),
        }
    }
}

/// Baseline transformer load.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreloadConfig {
    /// Load per step (kW).
    pub values: Vec<f64>,
    /// Tile `values` when shorter than the horizon.
    pub repeat: bool,
    /// Same load in every step (kW). Excludes `values`.
    pub constant: Option<f64>,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"scheduling.queue_length"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Uncontrolled charging at four 11 kW wallboxes.
    pub fn baseline() -> Self {
        Self {
            wallbox: Some(WallboxConfig::default()),
            ..Self::default()
        }
    }

    /// Office car park: weekday morning arrivals, opening hours, FCFS with a
    /// waiting queue.
    pub fn office() -> Self {
        Self {
            simulation: SimulationConfig {
                end: "2024-01-05 23:45:00".to_string(),
                ..SimulationConfig::default()
            },
            scheduling: SchedulingConfig {
                policy: "fcfs".to_string(),
                queue_length: 4,
                opening_hours: Some([6.0, 20.0]),
                ..SchedulingConfig::default()
            },
            events: EventsConfig {
                arrival_distribution: office_arrivals(),
                num_charging_events: 250,
                mean_park: 8.0,
                std_deviation_park: 1.5,
                max_parking_time: 12.0,
                ..EventsConfig::default()
            },
            vehicles: vec![
                VehicleConfig {
                    model: "Compact".to_string(),
                    probability: 0.6,
                    ..VehicleConfig::default()
                },
                VehicleConfig {
                    model: "Estate".to_string(),
                    probability: 0.4,
                    battery: BatteryConfig {
                        capacity: 77.0,
                        max_charge_power: 22.0,
                        min_charge_power: 2.0,
                        start_power_degradation: Some(0.8),
                        max_degradation_level: Some(0.3),
                        ..BatteryConfig::default()
                    },
                    ..VehicleConfig::default()
                },
            ],
            wallbox: Some(WallboxConfig {
                num_cp: 8,
                power_cp: 22.0,
                num_cp_per_cs: 2,
                power_transformer: Some(100.0),
                ..WallboxConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Undersized transformer shared round-robin.
    pub fn fair_share() -> Self {
        Self {
            scheduling: SchedulingConfig {
                policy: "discrimination_free".to_string(),
                df_charging_period: "00:30:00".to_string(),
                ..SchedulingConfig::default()
            },
            events: EventsConfig {
                num_charging_events: 30,
                ..EventsConfig::default()
            },
            wallbox: Some(WallboxConfig {
                num_cp: 8,
                power_cp: 22.0,
                num_cp_per_cs: 2,
                power_transformer: Some(44.0),
                ..WallboxConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Stationary storage behind a transformer that also carries a building
    /// load.
    pub fn storage() -> Self {
        Self {
            scheduling: SchedulingConfig {
                policy: "with_storage".to_string(),
                ..SchedulingConfig::default()
            },
            events: EventsConfig {
                num_charging_events: 30,
                ..EventsConfig::default()
            },
            wallbox: Some(WallboxConfig {
                num_cp: 6,
                power_cp: 22.0,
                num_cp_per_cs: 2,
                power_transformer: Some(80.0),
                storage: vec![StorageSpec {
                    id: "storage1".to_string(),
                    capacity: 100.0,
                    max_power: 30.0,
                    min_power: 0.0,
                    efficiency: 1.0,
                    initial_soc: 0.5,
                    min_soc: 0.1,
                }],
                ..WallboxConfig::default()
            }),
            preload: Some(PreloadConfig {
                constant: Some(20.0),
                ..PreloadConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "office", "fair_share", "storage"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "office" => Ok(Self::office()),
            "fair_share" => Ok(Self::fair_share()),
            "storage" => Ok(Self::storage()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid. Physical parameters
    /// of batteries and the site tree are checked again by their constructors
    /// in [`ScenarioConfig::build_realisation`].
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.simulation;
        let start = collect(&mut errors, parse_timestamp("simulation.start", &s.start));
        let end = collect(&mut errors, parse_timestamp("simulation.end", &s.end));
        collect(&mut errors, parse_positive_duration("simulation.resolution", &s.resolution));
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                errors.push(ConfigError::new(
                    "simulation.end",
                    "must not be before simulation.start",
                ));
            }
        }

        let sch = &self.scheduling;
        if let Err(e) = sch.policy.parse::<PolicyKind>() {
            errors.push(ConfigError::new("scheduling.policy", e.to_string()));
        }
        collect(
            &mut errors,
            parse_positive_duration("scheduling.df_charging_period", &sch.df_charging_period),
        );
        if let Some([open, close]) = sch.opening_hours {
            if let Err(e) = OpeningHours::new(open, close) {
                errors.push(ConfigError::new("scheduling.opening_hours", e.to_string()));
            }
        }

        let ev = &self.events;
        if ev.sample_method != SAMPLE_METHOD {
            errors.push(ConfigError::new(
                "events.sample_method",
                format!("must be \"{SAMPLE_METHOD}\", got \"{}\"", ev.sample_method),
            ));
        }
        if ev.arrival_distribution.is_empty() {
            errors.push(ConfigError::new("events.arrival_distribution", "must not be empty"));
        }
        if ev.arrival_distribution.iter().any(|w| !(*w >= 0.0)) {
            errors.push(ConfigError::new("events.arrival_distribution", "weights must be >= 0"));
        }
        if !(ev.mean_park > 0.0) {
            errors.push(ConfigError::new("events.mean_park", "must be > 0"));
        }
        if !(ev.max_parking_time > 0.0) {
            errors.push(ConfigError::new("events.max_parking_time", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&ev.mean_soc) {
            errors.push(ConfigError::new("events.mean_soc", "must be in [0.0, 1.0]"));
        }
        if !(0.0..=1.0).contains(&ev.soc_target) {
            errors.push(ConfigError::new("events.soc_target", "must be in [0.0, 1.0]"));
        }

        if self.vehicles.is_empty() {
            errors.push(ConfigError::new("vehicles", "at least one vehicle type is required"));
        }
        for (i, v) in self.vehicles.iter().enumerate() {
            if !(0.0..=1.0).contains(&v.probability) {
                errors.push(ConfigError::new(
                    format!("vehicles[{i}].probability"),
                    "must be in [0.0, 1.0]",
                ));
            }
            let b = &v.battery;
            if b.start_power_degradation.is_some() != b.max_degradation_level.is_some() {
                errors.push(ConfigError::new(
                    format!("vehicles[{i}].battery"),
                    "start_power_degradation and max_degradation_level must be set together",
                ));
            }
        }
        let total: f64 = self.vehicles.iter().map(|v| v.probability).sum();
        if !self.vehicles.is_empty() && (total - 1.0).abs() > 1e-3 {
            errors.push(ConfigError::new(
                "vehicles",
                format!("probabilities must sum to 1, got {total}"),
            ));
        }

        if !self.transformers.is_empty() && self.wallbox.is_some() {
            errors.push(ConfigError::new(
                "wallbox",
                "cannot be combined with [[transformers]]",
            ));
        }

        if let Some(p) = &self.preload {
            if p.constant.is_some() && !p.values.is_empty() {
                errors.push(ConfigError::new("preload", "set either values or constant"));
            }
            if p.constant.is_none() && p.values.is_empty() {
                errors.push(ConfigError::new("preload.values", "must not be empty"));
            }
        }

        errors
    }

    /// Resolves the configuration into a runnable scenario.
    ///
    /// Generates the charging events with `simulation.seed`.
    ///
    /// # Errors
    ///
    /// Returns the first validation error, or the error of the first
    /// constructor that rejects its parameters.
    pub fn build_realisation(&self) -> Result<ScenarioRealisation, ScenarioError> {
        if let Some(first) = self.validate().into_iter().next() {
            return Err(first.into());
        }

        let s = &self.simulation;
        let config = SimConfig::new(
            parse_timestamp("simulation.start", &s.start)?,
            parse_timestamp("simulation.end", &s.end)?,
            parse_positive_duration("simulation.resolution", &s.resolution)?,
        )?;

        let vehicle_types = self
            .vehicles
            .iter()
            .map(VehicleConfig::build)
            .collect::<Result<Vec<_>, _>>()?;
        let events = EventGenerator::new(self.events.to_params(), vehicle_types)?
            .generate(&config, s.seed)?;

        let infrastructure = Infrastructure::new(&self.transformer_specs()?)?;

        let sch = &self.scheduling;
        let kind: PolicyKind = sch.policy.parse()?;
        let period =
            parse_positive_duration("scheduling.df_charging_period", &sch.df_charging_period)?;
        let steps = config.total_steps();

        let mut realisation =
            ScenarioRealisation::new(config, infrastructure, SchedulingPolicy::new(kind, period))
                .with_events(events)
                .with_queue_length(sch.queue_length)
                .with_disconnect_policy(DisconnectPolicy::from_flag(sch.disconnect_by_time));
        if let Some([open, close]) = sch.opening_hours {
            realisation = realisation.with_opening_hours(OpeningHours::new(open, close)?);
        }
        if let Some(preload) = &self.preload {
            realisation = realisation.with_preload(preload.series(steps));
        }
        realisation.preload_series()?;
        Ok(realisation)
    }

    /// Site tree from `[[transformers]]`, or from `[wallbox]` (default layout
    /// when neither is given).
    fn transformer_specs(&self) -> Result<Vec<TransformerSpec>, ScenarioError> {
        if !self.transformers.is_empty() {
            return Ok(self.transformers.clone());
        }
        let w = self.wallbox.clone().unwrap_or_default();
        let mut spec = TransformerSpec::wallbox(
            w.num_cp,
            w.power_cp,
            w.num_cp_per_cs,
            w.power_cs,
            w.power_transformer,
            w.min_power_cp,
        )?;
        spec.storage = w.storage;
        Ok(vec![spec])
    }
}

impl VehicleConfig {
    fn build(&self) -> Result<Arc<ElectricVehicle>, ScenarioError> {
        let b = &self.battery;
        let battery = match (b.start_power_degradation, b.max_degradation_level) {
            (Some(knee), Some(level)) => Battery::new(
                b.capacity,
                b.max_charge_power,
                b.min_charge_power,
                b.efficiency,
                knee,
                level,
            )?,
            _ => Battery::without_degradation(
                b.capacity,
                b.max_charge_power,
                b.min_charge_power,
                b.efficiency,
            )?,
        };
        let vehicle = ElectricVehicle::new(&self.brand, &self.model, battery, self.probability)?;
        Ok(Arc::new(vehicle))
    }
}

impl PreloadConfig {
    /// Preload for `steps` steps.
    ///
    /// A shorter `values` series is tiled when `repeat` is set and returned
    /// as is otherwise.
    pub fn series(&self, steps: usize) -> Vec<f64> {
        if let Some(c) = self.constant {
            return vec![c; steps];
        }
        if self.repeat && !self.values.is_empty() && self.values.len() < steps {
            warn!(
                len = self.values.len(),
                steps, "preload series shorter than the horizon, repeating it"
            );
            return self.values.iter().copied().cycle().take(steps).collect();
        }
        self.values.clone()
    }
}

/// Weekday arrivals peaking between 07:00 and 10:00, none at weekends.
fn office_arrivals() -> Vec<f64> {
    let day: [f64; 24] = [
        0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.2, 1.0, 1.5, 1.0, 0.4, 0.2, //
        0.3, 0.3, 0.2, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    ];
    let weekend = [0.0; 24];
    let mut week = Vec::with_capacity(168);
    for d in 0..7 {
        week.extend_from_slice(if d < 5 { &day } else { &weekend });
    }
    week
}

fn collect<T>(errors: &mut Vec<ConfigError>, result: Result<T, ConfigError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

/// Parses `"YYYY-MM-DD HH:MM:SS"` or `"YYYY-MM-DDTHH:MM:SS"`.
fn parse_timestamp(field: &str, value: &str) -> Result<NaiveDateTime, ConfigError> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value.trim(), fmt).ok())
        .ok_or_else(|| {
            ConfigError::new(field, format!("expected \"YYYY-MM-DD HH:MM:SS\", got \"{value}\""))
        })
}

/// Parses a positive `"HH:MM:SS"` duration. Hours may exceed 23.
pub fn parse_duration(field: &str, value: &str) -> Result<TimeDelta, ConfigError> {
    let err = || ConfigError::new(field, format!("expected \"HH:MM:SS\", got \"{value}\""));
    let parts: Vec<&str> = value.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(err());
    };
    let h: i64 = h.parse().map_err(|_| err())?;
    let m: i64 = m.parse().map_err(|_| err())?;
    let s: i64 = s.parse().map_err(|_| err())?;
    if h < 0 || !(0..60).contains(&m) || !(0..60).contains(&s) {
        return Err(err());
    }
    Ok(TimeDelta::seconds(h * 3600 + m * 60 + s))
}

fn parse_positive_duration(field: &str, value: &str) -> Result<TimeDelta, ConfigError> {
    let d = parse_duration(field, value)?;
    if d <= TimeDelta::zero() {
        return Err(ConfigError::new(field, "must be > 00:00:00"));
    }
    Ok(d)
}
