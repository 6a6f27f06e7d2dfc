//! Resolved, time-bounded scenario handed to the engine.

use thiserror::Error;

use crate::config::ConfigError;
use crate::error::ValidationError;
use crate::sim::event::ChargingEvent;
use crate::sim::infrastructure::Infrastructure;
use crate::sim::policy::{SchedulingPolicy, UnknownPolicy};
use crate::sim::types::{DisconnectPolicy, OpeningHours, SimConfig};

/// Failure while turning configuration into a [`ScenarioRealisation`].
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Policy(#[from] UnknownPolicy),
}

/// Everything one run needs, fully resolved.
///
/// Built once and consumed by [`crate::sim::engine::Engine::new`]. Generic
/// over the policy so custom [`crate::sim::policy::Scheduler`]s can be run
/// through the same loop.
///
/// # Examples
///
/// ```
/// use chargepark_sim::scenario::ScenarioRealisation;
/// use chargepark_sim::sim::infrastructure::{Infrastructure, TransformerSpec};
/// use chargepark_sim::sim::policy::{PolicyKind, SchedulingPolicy};
/// use chargepark_sim::sim::types::SimConfig;
/// use chrono::{NaiveDate, TimeDelta};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
/// let config = SimConfig::new(start, start + TimeDelta::hours(23), TimeDelta::hours(1)).unwrap();
/// let spec = TransformerSpec::wallbox(4, 11.0, 2, None, None, 0.0).unwrap();
/// let infra = Infrastructure::new(&[spec]).unwrap();
/// let policy = SchedulingPolicy::new(PolicyKind::Fcfs, TimeDelta::hours(1));
/// let scenario = ScenarioRealisation::new(config, infra, policy).with_queue_length(3);
/// assert_eq!(scenario.queue_length, 3);
/// assert_eq!(scenario.preload_series().unwrap().len(), 24);
/// ```
#[derive(Debug, Clone)]
pub struct ScenarioRealisation<P = SchedulingPolicy> {
    /// Simulated horizon and resolution.
    pub config: SimConfig,
    /// Visits, in any order; the engine sorts them by arrival.
    pub charging_events: Vec<ChargingEvent>,
    pub infrastructure: Infrastructure,
    pub scheduling_policy: P,
    /// Daily window in which vehicles may connect. `None` means always open.
    pub opening_hours: Option<OpeningHours>,
    /// Waiting queue size. Zero disables queueing.
    pub queue_length: usize,
    pub disconnect_policy: DisconnectPolicy,
    /// Baseline load on every transformer, one value per step.
    pub transformer_preload: Option<Vec<f64>>,
}

impl<P> ScenarioRealisation<P> {
    /// Creates a scenario with no events, no queue, no preload, always open
    /// and disconnecting by time.
    pub fn new(config: SimConfig, infrastructure: Infrastructure, scheduling_policy: P) -> Self {
        Self {
            config,
            charging_events: Vec::new(),
            infrastructure,
            scheduling_policy,
            opening_hours: None,
            queue_length: 0,
            disconnect_policy: DisconnectPolicy::ByTime,
            transformer_preload: None,
        }
    }

    pub fn with_events(mut self, events: Vec<ChargingEvent>) -> Self {
        self.charging_events = events;
        self
    }

    pub fn with_opening_hours(mut self, opening_hours: OpeningHours) -> Self {
        self.opening_hours = Some(opening_hours);
        self
    }

    pub fn with_queue_length(mut self, queue_length: usize) -> Self {
        self.queue_length = queue_length;
        self
    }

    pub fn with_disconnect_policy(mut self, disconnect_policy: DisconnectPolicy) -> Self {
        self.disconnect_policy = disconnect_policy;
        self
    }

    pub fn with_preload(mut self, preload: Vec<f64>) -> Self {
        self.transformer_preload = Some(preload);
        self
    }

    /// Preload for every step of the horizon.
    ///
    /// Zeros when no preload is set. A longer series is cut to the horizon.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::SeriesTooShort` if the series does not cover
    /// every step, or `InvalidParameter` for a non-finite value.
    pub fn preload_series(&self) -> Result<Vec<f64>, ValidationError> {
        let steps = self.config.total_steps();
        let Some(preload) = &self.transformer_preload else {
            return Ok(vec![0.0; steps]);
        };
        if preload.len() < steps {
            return Err(ValidationError::SeriesTooShort {
                series: "transformer_preload",
                len: preload.len(),
                steps,
            });
        }
        if preload.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError::invalid(
                "transformer_preload",
                "values must be finite",
            ));
        }
        Ok(preload[..steps].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};

    use super::*;
    use crate::sim::infrastructure::TransformerSpec;
    use crate::sim::policy::PolicyKind;

    fn scenario() -> ScenarioRealisation {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let config =
            SimConfig::new(start, start + TimeDelta::hours(3), TimeDelta::hours(1)).unwrap();
        let infra =
            Infrastructure::new(&[TransformerSpec::wallbox(2, 11.0, 1, None, None, 0.0).unwrap()])
                .unwrap();
        ScenarioRealisation::new(
            config,
            infra,
            SchedulingPolicy::new(PolicyKind::Uncontrolled, TimeDelta::hours(1)),
        )
    }

    #[test]
    fn defaults() {
        let s = scenario();
        assert_eq!(s.queue_length, 0);
        assert_eq!(s.disconnect_policy, DisconnectPolicy::ByTime);
        assert!(s.opening_hours.is_none());
        assert_eq!(s.preload_series(), Ok(vec![0.0; 4]));
    }

    #[test]
    fn preload_must_cover_horizon() {
        let s = scenario().with_preload(vec![1.0, 2.0]);
        assert_eq!(
            s.preload_series(),
            Err(ValidationError::SeriesTooShort {
                series: "transformer_preload",
                len: 2,
                steps: 4,
            })
        );
    }

    #[test]
    fn long_preload_is_cut() {
        let s = scenario().with_preload(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(s.preload_series(), Ok(vec![1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn non_finite_preload_rejected() {
        let s = scenario().with_preload(vec![1.0, f64::NAN, 3.0, 4.0]);
        assert!(s.preload_series().is_err());
    }
}
