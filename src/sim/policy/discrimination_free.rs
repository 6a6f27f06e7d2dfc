use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};

use super::{ScheduleContext, Scheduler, greedy_fill, idle_storage};
use crate::sim::allocation::Allocation;
use crate::sim::event::EventId;
use crate::sim::infrastructure::POWER_EPSILON;

/// Round-robin sharing in slots of `charging_period`.
///
/// A vehicle that received power in the previous step keeps priority until
/// its slot is `charging_period` old. Everyone else queues by the time they
/// last received power, vehicles that never charged first. Within that order
/// capacity is handed out greedily, so over several periods every connected
/// vehicle gets a turn regardless of when it arrived.
#[derive(Debug, Clone)]
pub struct DiscriminationFree {
    charging_period: TimeDelta,
    slot_start: BTreeMap<EventId, NaiveDateTime>,
}

impl DiscriminationFree {
    pub fn new(charging_period: TimeDelta) -> Self {
        Self {
            charging_period,
            slot_start: BTreeMap::new(),
        }
    }

    pub fn charging_period(&self) -> TimeDelta {
        self.charging_period
    }
}

impl Scheduler for DiscriminationFree {
    fn schedule(&mut self, ctx: &ScheduleContext<'_>) -> Allocation {
        let vehicles = ctx.busy_vehicles();
        self.slot_start
            .retain(|id, _| vehicles.iter().any(|(_, v)| v.id == *id));

        let previous = ctx.timestamp - ctx.step_length;
        let mut ranked: Vec<_> = vehicles
            .iter()
            .map(|&(point, v)| {
                let last = ctx.charging_periods.last_charged(v.id);
                let in_slot = match self.slot_start.get(&v.id) {
                    Some(&start) => {
                        last == Some(previous) && ctx.timestamp - start < self.charging_period
                    }
                    None => false,
                };
                let key = if in_slot {
                    (0, self.slot_start.get(&v.id).copied())
                } else {
                    (1, last)
                };
                (key, v.arrival_time, v.id, point, in_slot)
            })
            .collect();
        ranked.sort_by_key(|(key, arrival, id, point, _)| (*key, *arrival, *id, *point));

        let mut allocation = Allocation::new();
        greedy_fill(ctx, ranked.iter().map(|r| r.3), &mut allocation);
        idle_storage(ctx, &mut allocation);

        for (_, _, id, point, in_slot) in ranked {
            if allocation.point(point) > POWER_EPSILON {
                if !in_slot {
                    self.slot_start.insert(id, ctx.timestamp);
                }
            } else {
                self.slot_start.remove(&id);
            }
        }
        allocation
    }
}
