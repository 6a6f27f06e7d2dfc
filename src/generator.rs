//! Stochastic charging-event generation.
//!
//! Arrivals follow an hourly weight profile; park duration and arrival SOC
//! are drawn from independent normal distributions. Generation is seeded, so
//! the same parameters and seed always give the same event list.

use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use rand::distr::weighted::WeightedIndex;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::devices::ElectricVehicle;
use crate::error::ValidationError;
use crate::sim::event::{ChargingEvent, EventId};
use crate::sim::types::SimConfig;

const MS_PER_HOUR: i64 = 3_600_000;

/// Parameters of the independent-normal event model.
#[derive(Debug, Clone, PartialEq)]
pub struct EventParams {
    /// Relative arrival weight per hour, starting Monday 00:00 and wrapping.
    pub arrival_distribution: Vec<f64>,
    /// Expected number of events over one pass of `arrival_distribution`.
    pub num_charging_events: usize,
    /// Mean park duration (hours).
    pub mean_park: f64,
    /// Standard deviation of the park duration (hours).
    pub std_deviation_park: f64,
    /// Mean arrival SOC.
    pub mean_soc: f64,
    /// Standard deviation of the arrival SOC.
    pub std_deviation_soc: f64,
    /// Upper bound on the park duration (hours).
    pub max_parking_time: f64,
    /// Target SOC of every event.
    pub soc_target: f64,
}

impl Default for EventParams {
    fn default() -> Self {
        Self {
            arrival_distribution: vec![1.0; 24],
            num_charging_events: 20,
            mean_park: 6.0,
            std_deviation_park: 2.0,
            mean_soc: 0.4,
            std_deviation_soc: 0.1,
            max_parking_time: 24.0,
            soc_target: 1.0,
        }
    }
}

/// Draws [`ChargingEvent`]s for a horizon.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chargepark_sim::devices::{Battery, ElectricVehicle};
/// use chargepark_sim::generator::{EventGenerator, EventParams};
/// use chargepark_sim::sim::types::SimConfig;
/// use chrono::{NaiveDate, TimeDelta};
///
/// let battery = Battery::without_degradation(50.0, 11.0, 0.0, 1.0).unwrap();
/// let ev = Arc::new(ElectricVehicle::new("Generic", "Car", battery, 1.0).unwrap());
/// let generator = EventGenerator::new(EventParams::default(), vec![ev]).unwrap();
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let cfg = SimConfig::new(start, start + TimeDelta::hours(23), TimeDelta::minutes(15)).unwrap();
/// let events = generator.generate(&cfg, 42).unwrap();
/// assert!(!events.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct EventGenerator {
    params: EventParams,
    vehicle_types: Vec<Arc<ElectricVehicle>>,
    vehicle_index: WeightedIndex<f64>,
}

impl EventGenerator {
    /// Creates a generator.
    ///
    /// # Arguments
    ///
    /// * `params` - Distribution parameters
    /// * `vehicle_types` - Vehicle types, sampled by their `probability`
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the arrival weights are empty, negative
    /// or all zero, a mean or deviation is out of range, or no vehicle type
    /// has a positive probability.
    pub fn new(
        params: EventParams,
        vehicle_types: Vec<Arc<ElectricVehicle>>,
    ) -> Result<Self, ValidationError> {
        let weights = &params.arrival_distribution;
        if weights.is_empty() {
            return Err(ValidationError::invalid("arrival_distribution", "must not be empty"));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ValidationError::invalid(
                "arrival_distribution",
                "weights must be finite and >= 0",
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(ValidationError::invalid(
                "arrival_distribution",
                "at least one weight must be > 0",
            ));
        }
        if !(params.mean_park > 0.0) {
            return Err(ValidationError::invalid("mean_park", "must be > 0"));
        }
        if !(params.max_parking_time > 0.0) {
            return Err(ValidationError::invalid("max_parking_time", "must be > 0"));
        }
        if !(params.std_deviation_park >= 0.0) {
            return Err(ValidationError::invalid("std_deviation_park", "must be >= 0"));
        }
        if !(params.std_deviation_soc >= 0.0) {
            return Err(ValidationError::invalid("std_deviation_soc", "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&params.mean_soc) {
            return Err(ValidationError::invalid("mean_soc", "must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&params.soc_target) {
            return Err(ValidationError::invalid("soc_target", "must be in [0, 1]"));
        }
        let vehicle_index = WeightedIndex::new(vehicle_types.iter().map(|v| v.probability()))
            .map_err(|_| {
                ValidationError::invalid(
                    "vehicle_types",
                    "at least one vehicle type with probability > 0 is required",
                )
            })?;
        Ok(Self {
            params,
            vehicle_types,
            vehicle_index,
        })
    }

    pub fn params(&self) -> &EventParams {
        &self.params
    }

    /// Number of events generated for `config`.
    pub fn event_count(&self, config: &SimConfig) -> usize {
        let horizon_hours = config.total_steps() as f64 * config.step_hours();
        let distribution_hours = self.params.arrival_distribution.len() as f64;
        (self.params.num_charging_events as f64 * horizon_hours / distribution_hours).round()
            as usize
    }

    /// Generates events for the horizon of `config`, sorted by arrival and
    /// numbered from 0.
    ///
    /// Arrivals fall on step timestamps. Park durations are clamped to
    /// `[resolution, max_parking_time]` and SOCs to `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Propagates a `ValidationError` from [`ChargingEvent::new`].
    pub fn generate(
        &self,
        config: &SimConfig,
        seed: u64,
    ) -> Result<Vec<ChargingEvent>, ValidationError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let steps = config.total_steps();
        let resolution_ms = config.resolution.num_milliseconds();
        let horizon_ms = steps as i64 * resolution_ms;
        let hours = (horizon_ms + MS_PER_HOUR - 1) / MS_PER_HOUR;

        let hour_weights: Vec<f64> = (0..hours)
            .map(|h| self.arrival_weight(config.start + TimeDelta::hours(h)))
            .collect();
        // weights are validated up front, so only an all-zero horizon fails
        let Ok(hour_index) = WeightedIndex::new(&hour_weights) else {
            return Ok(Vec::new());
        };

        let step_hours = config.step_hours();
        let max_park = self.params.max_parking_time.max(step_hours);
        let mut events = Vec::new();
        for _ in 0..self.event_count(config) {
            let hour = rng.sample(&hour_index);
            let offset_ms = hour as i64 * MS_PER_HOUR + rng.random_range(0..MS_PER_HOUR);
            let step = ((offset_ms / resolution_ms) as usize).min(steps - 1);
            let arrival = config.timestamp(step);

            let park_hours = (self.params.mean_park
                + gaussian_noise(&mut rng, self.params.std_deviation_park))
            .clamp(step_hours, max_park);
            let parking_time =
                TimeDelta::milliseconds((park_hours * MS_PER_HOUR as f64).round() as i64);

            let soc = (self.params.mean_soc
                + gaussian_noise(&mut rng, self.params.std_deviation_soc))
            .clamp(0.0, 1.0);

            let vehicle = self.pick_vehicle(&mut rng);
            events.push(ChargingEvent::with_parking_time(
                EventId(0),
                arrival,
                parking_time,
                soc,
                self.params.soc_target,
                vehicle,
            )?);
        }

        events.sort_by_key(ChargingEvent::arrival_time);
        Ok(events
            .into_iter()
            .enumerate()
            .map(|(i, e)| e.with_id(EventId(i)))
            .collect())
    }

    /// Weight of the hour starting at `timestamp`.
    fn arrival_weight(&self, timestamp: NaiveDateTime) -> f64 {
        let weights = &self.params.arrival_distribution;
        let hour_of_week =
            timestamp.weekday().num_days_from_monday() as usize * 24 + timestamp.hour() as usize;
        weights[hour_of_week % weights.len()]
    }

    fn pick_vehicle(&self, rng: &mut StdRng) -> Arc<ElectricVehicle> {
        Arc::clone(&self.vehicle_types[rng.sample(&self.vehicle_index)])
    }
}

/// Gaussian noise with mean 0 via the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::*;

    use super::*;
    use crate::devices::Battery;

    fn vehicle(model: &str, probability: f64) -> Arc<ElectricVehicle> {
        let battery = Battery::without_degradation(50.0, 11.0, 0.0, 1.0).unwrap();
        Arc::new(ElectricVehicle::new("Generic", model, battery, probability).unwrap())
    }

    /// Monday 2024-01-01 plus `hours`, at `minutes` resolution.
    fn horizon(hours: i64, minutes: i64) -> SimConfig {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let resolution = TimeDelta::minutes(minutes);
        SimConfig::new(start, start + TimeDelta::hours(hours) - resolution, resolution).unwrap()
    }

    fn generator(params: EventParams) -> EventGenerator {
        EventGenerator::new(params, vec![vehicle("Car", 1.0)]).unwrap()
    }

    #[test]
    fn count_scales_with_horizon() {
        let params = EventParams {
            num_charging_events: 10,
            ..EventParams::default()
        };
        let g = generator(params);
        assert_eq!(g.event_count(&horizon(24, 60)), 10);
        assert_eq!(g.event_count(&horizon(48, 15)), 20);
        assert_eq!(g.generate(&horizon(48, 15), 1).unwrap().len(), 20);
    }

    #[test]
    fn same_seed_same_events() {
        let g = generator(EventParams::default());
        let cfg = horizon(48, 15);
        let a = g.generate(&cfg, 7).unwrap();
        let b = g.generate(&cfg, 7).unwrap();
        let key = |e: &ChargingEvent| (e.arrival_time(), e.leaving_time(), e.soc().to_bits());
        assert_eq!(a.iter().map(key).collect::<Vec<_>>(), b.iter().map(key).collect::<Vec<_>>());

        let c = g.generate(&cfg, 8).unwrap();
        assert_ne!(a.iter().map(key).collect::<Vec<_>>(), c.iter().map(key).collect::<Vec<_>>());
    }

    #[test]
    fn events_sorted_and_numbered() {
        let events = generator(EventParams::default())
            .generate(&horizon(72, 30), 3)
            .unwrap();
        for (i, pair) in events.windows(2).enumerate() {
            assert!(pair[0].arrival_time() <= pair[1].arrival_time());
            assert_eq!(pair[0].id(), EventId(i));
        }
    }

    #[test]
    fn arrivals_follow_weights() {
        let mut weights = vec![0.0; 24];
        weights[8] = 1.0;
        let params = EventParams {
            arrival_distribution: weights,
            ..EventParams::default()
        };
        let events = generator(params).generate(&horizon(48, 15), 11).unwrap();
        assert!(!events.is_empty());
        assert!(events.iter().all(|e| e.arrival_time().hour() == 8));
        assert!(events.iter().all(|e| e.arrival_time().minute() % 15 == 0));
    }

    #[test]
    fn horizon_without_arrival_weight_yields_no_events() {
        // a weekly profile that only has Sunday arrivals
        let mut weights = vec![0.0; 168];
        weights[6 * 24 + 10] = 1.0;
        let params = EventParams {
            arrival_distribution: weights,
            ..EventParams::default()
        };
        let events = generator(params).generate(&horizon(48, 15), 3).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn vehicle_types_follow_probability() {
        let g = EventGenerator::new(
            EventParams::default(),
            vec![vehicle("Never", 0.0), vehicle("Always", 1.0)],
        )
        .unwrap();
        let events = g.generate(&horizon(48, 60), 5).unwrap();
        assert!(events.iter().all(|e| e.vehicle_type().model() == "Always"));
    }

    #[test]
    fn rejects_bad_params() {
        let bad = EventParams {
            arrival_distribution: vec![0.0; 24],
            ..EventParams::default()
        };
        assert!(EventGenerator::new(bad, vec![vehicle("Car", 1.0)]).is_err());
        assert!(EventGenerator::new(EventParams::default(), vec![vehicle("Car", 0.0)]).is_err());
        let bad = EventParams {
            mean_soc: 1.5,
            ..EventParams::default()
        };
        assert!(EventGenerator::new(bad, vec![vehicle("Car", 1.0)]).is_err());
    }

    proptest! {
        #[test]
        fn sampled_values_stay_in_bounds(
            seed in any::<u64>(),
            std_park in 0.0f64..20.0,
            std_soc in 0.0f64..2.0,
        ) {
            let params = EventParams {
                std_deviation_park: std_park,
                std_deviation_soc: std_soc,
                max_parking_time: 10.0,
                ..EventParams::default()
            };
            let cfg = horizon(24, 15);
            for e in generator(params).generate(&cfg, seed).unwrap() {
                let park = e.leaving_time() - e.arrival_time();
                prop_assert!(park >= cfg.resolution);
                prop_assert!(park <= TimeDelta::hours(10));
                prop_assert!((0.0..=1.0).contains(&e.soc()));
                prop_assert!(e.arrival_time() <= cfg.end);
            }
        }
    }
}
