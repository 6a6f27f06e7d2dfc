//! Simulation engine that interleaves arrivals, queueing, departures,
//! scheduling and battery physics, one step at a time.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use tracing::{debug, info, trace};

use crate::error::{SimError, ValidationError};
use crate::scenario::ScenarioRealisation;

use super::allocation::Allocation;
use super::clock::Clock;
use super::event::ChargingEvent;
use super::infrastructure::{Infrastructure, POWER_EPSILON, PointId};
use super::occupancy::{Occupancy, PointStatus};
use super::periods::ChargingPeriods;
use super::policy::{ScheduleContext, Scheduler};
use super::queue::WaitingQueue;
use super::result::SimulationResult;
use super::types::{DisconnectPolicy, OpeningHours, SimConfig};

/// Fraction of the run between two progress reports.
const PROGRESS_INTERVAL: usize = 20;

/// Simulation engine owning the site, the policy and all run state.
///
/// Generic over `P: Scheduler` for static dispatch. Single-threaded and free
/// of randomness: the same scenario always yields the same result.
pub struct Engine<P: Scheduler> {
    config: SimConfig,
    infrastructure: Infrastructure,
    policy: P,
    events: Vec<ChargingEvent>,
    next_event: usize,
    opening_hours: Option<OpeningHours>,
    disconnect_policy: DisconnectPolicy,
    queue: WaitingQueue,
    occupancy: Occupancy,
    preload: Vec<f64>,
    charging_periods: ChargingPeriods,
    counter_rejections: usize,
    counter_arrivals: usize,
    counter_connections: usize,
    result: SimulationResult,
}

impl<P: Scheduler> Engine<P> {
    /// Creates an engine positioned before the first step.
    ///
    /// Events are sorted by arrival time, keeping the given order for equal
    /// arrivals.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the preload series does not cover the
    /// horizon.
    pub fn new(scenario: ScenarioRealisation<P>) -> Result<Self, ValidationError> {
        let preload = scenario.preload_series()?;
        let ScenarioRealisation {
            config,
            mut charging_events,
            infrastructure,
            scheduling_policy,
            opening_hours,
            queue_length,
            disconnect_policy,
            ..
        } = scenario;
        charging_events.sort_by_key(ChargingEvent::arrival_time);

        let mut occupancy = Occupancy::new(infrastructure.point_ids());
        for (id, point) in infrastructure.points() {
            if point.is_occupied() {
                occupancy.set(id, PointStatus::Busy);
            }
        }
        let result = SimulationResult::new(&infrastructure, &config, preload.clone());

        Ok(Self {
            config,
            infrastructure,
            policy: scheduling_policy,
            events: charging_events,
            next_event: 0,
            opening_hours,
            disconnect_policy,
            queue: WaitingQueue::new(queue_length),
            occupancy,
            preload,
            charging_periods: ChargingPeriods::new(),
            counter_rejections: 0,
            counter_arrivals: 0,
            counter_connections: 0,
            result,
        })
    }

    /// Runs every step of the horizon.
    ///
    /// # Errors
    ///
    /// Returns the first `SimError` raised by a storage operation or by an
    /// allocation that exceeds the capacity tree. The run stops there.
    pub fn run(self) -> Result<SimulationResult, SimError> {
        self.run_with_progress(|_| {})
    }

    /// Runs every step, reporting the completed fraction about every 5% of
    /// the horizon and once more at the end.
    ///
    /// # Errors
    ///
    /// Same as [`Engine::run`].
    pub fn run_with_progress(
        mut self,
        mut on_progress: impl FnMut(f64),
    ) -> Result<SimulationResult, SimError> {
        let mut clock = Clock::new(&self.config);
        let total = clock.total();
        let interval = (total / PROGRESS_INTERVAL).max(1);
        info!(
            start = %self.config.start,
            end = %self.config.end,
            steps = total,
            events = self.events.len(),
            points = self.occupancy.free().count() + self.occupancy.busy_count(),
            disconnect = %self.disconnect_policy,
            "simulation started"
        );

        while let Some((step, now)) = clock.tick() {
            self.step(step, now)?;
            let done = step + 1;
            if done % interval == 0 || done == total {
                let fraction = done as f64 / total as f64;
                debug!(step, progress = fraction, "progress");
                on_progress(fraction);
            }
        }
        Ok(self.finish())
    }

    /// Executes one step.
    fn step(&mut self, step: usize, now: NaiveDateTime) -> Result<(), SimError> {
        let is_last = step + 1 == self.config.total_steps();
        let open = self.opening_hours.is_none_or(|h| h.contains(now));
        let step_length = self.config.resolution;
        let preload = self.preload[step];

        // 1. Occupancy changes
        self.maintain_queue(now, open);
        self.maintain_points(now, open);
        self.handle_arrivals(now, open);

        // 2. Allocation
        let ctx = ScheduleContext {
            infrastructure: &self.infrastructure,
            occupancy: &self.occupancy,
            charging_periods: &self.charging_periods,
            step,
            timestamp: now,
            step_length,
            preload,
        };
        let allocation = self.policy.schedule(&ctx);
        self.infrastructure.check_allocation(&allocation, preload)?;

        // 3. Vehicles
        let mut realized = Allocation::new();
        for point in self.occupancy.busy() {
            let power =
                self.infrastructure
                    .charge_vehicle(point, allocation.point(point), step_length);
            if power > POWER_EPSILON {
                if let Some(vehicle) = self.infrastructure.point(point).connected() {
                    self.charging_periods.record(vehicle.id, now);
                }
            }
            realized.set_point(point, power);
        }

        // 4. Storage
        let mut soc = BTreeMap::new();
        for id in self.infrastructure.storage_ids() {
            let assigned = allocation.storage(id);
            let system = self.infrastructure.storage_system(id);
            let name = system.name().to_string();
            let transformer = system.transformer();
            let headroom = self
                .infrastructure
                .transformer_headroom(transformer, &realized, preload);

            let battery = self.infrastructure.storage_battery_mut(id);
            let outcome = if assigned < -POWER_EPSILON {
                battery.discharge(-assigned, step_length).map(|()| assigned)
            } else if assigned > POWER_EPSILON {
                battery.charge(assigned.min(headroom), step_length)
            } else {
                battery.charge(headroom, step_length)
            };
            let power = outcome.map_err(|source| SimError::Storage {
                storage: name,
                step,
                source: Box::new(source),
            })?;
            soc.insert(id, battery.soc());
            realized.set_storage(id, power);
        }

        // 5. Record
        self.result
            .store_power_charging_points(realized.points(), step, is_last);
        self.result
            .store_power_storage_systems(realized.storage_systems(), step, is_last);
        self.result.store_soc_storage_systems(&soc, step);
        self.result
            .store_busy_points(self.occupancy.busy_count(), step);
        Ok(())
    }

    fn maintain_queue(&mut self, now: NaiveDateTime, open: bool) {
        if !open {
            if !self.queue.is_empty() {
                info!(%now, dropped = self.queue.size(), "site closed, waiting queue emptied");
                self.queue.empty();
            }
            return;
        }
        let due = self.queue.next_leave().is_some_and(|t| t <= now);
        if self.disconnect_policy == DisconnectPolicy::ByTime && due {
            for event in self.queue.remove_elapsed(now) {
                trace!(event = %event.id(), %now, "left the queue uncharged");
            }
        }
    }

    fn maintain_points(&mut self, now: NaiveDateTime, open: bool) {
        let busy: Vec<PointId> = self.occupancy.busy().collect();
        for point in busy {
            let leaves = match self.infrastructure.point(point).connected() {
                _ if !open => true,
                Some(vehicle) => match self.disconnect_policy {
                    DisconnectPolicy::ByTime => vehicle.leaving_time <= now,
                    DisconnectPolicy::BySoc => vehicle.target_reached(),
                },
                None => true,
            };
            if !leaves {
                continue;
            }

            if let Some(vehicle) = self.infrastructure.disconnect_vehicle(point) {
                trace!(%point, event = %vehicle.id, soc = vehicle.soc, %now, "disconnected");
            }
            match self.queue.dequeue() {
                Some(next) => self.connect(point, &next, now),
                None => self.occupancy.set(point, PointStatus::Free),
            }
        }
    }

    fn handle_arrivals(&mut self, now: NaiveDateTime, open: bool) {
        while let Some(event) = self.events.get(self.next_event) {
            if event.arrival_time() > now {
                break;
            }
            let event = event.clone();
            self.next_event += 1;
            self.counter_arrivals += 1;

            if !open {
                self.reject(&event, now, "closed");
            } else if let Some(point) = self.occupancy.first_free() {
                self.connect(point, &event, now);
            } else if self.queue.has_capacity() {
                trace!(event = %event.id(), %now, queued = self.queue.size() + 1, "queued");
                self.queue.enqueue(event);
            } else {
                self.reject(&event, now, "queue_full");
            }
        }
    }

    fn connect(&mut self, point: PointId, event: &ChargingEvent, now: NaiveDateTime) {
        self.infrastructure.connect_vehicle(point, event);
        self.occupancy.set(point, PointStatus::Busy);
        self.counter_connections += 1;
        trace!(%point, event = %event.id(), soc = event.soc(), %now, "connected");
    }

    fn reject(&mut self, event: &ChargingEvent, now: NaiveDateTime, cause: &'static str) {
        self.counter_rejections += 1;
        debug!(event = %event.id(), %now, cause, "arrival rejected");
    }

    /// Attaches the run counters to the result and returns it.
    fn finish(mut self) -> SimulationResult {
        self.result.counter_rejections = self.counter_rejections;
        self.result.counter_arrivals = self.counter_arrivals;
        self.result.counter_connections = self.counter_connections;
        self.result.charging_periods = self.charging_periods;
        info!(
            arrivals = self.counter_arrivals,
            connections = self.counter_connections,
            rejections = self.counter_rejections,
            charged = self.result.charging_periods.len(),
            "simulation finished"
        );
        self.result
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn infrastructure(&self) -> &Infrastructure {
        &self.infrastructure
    }

    pub fn queue(&self) -> &WaitingQueue {
        &self.queue
    }

    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }
}
