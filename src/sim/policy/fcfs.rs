use super::{ScheduleContext, Scheduler, greedy_fill, idle_storage};
use crate::sim::allocation::Allocation;

/// Vehicles are served in arrival order.
///
/// A later arrival only gets what remains once every earlier vehicle has
/// its demand met or has hit a hardware limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fcfs;

impl Scheduler for Fcfs {
    fn schedule(&mut self, ctx: &ScheduleContext<'_>) -> Allocation {
        let mut vehicles = ctx.busy_vehicles();
        vehicles.sort_by_key(|(point, v)| (v.arrival_time, v.id, *point));

        let mut allocation = Allocation::new();
        greedy_fill(ctx, vehicles.into_iter().map(|(p, _)| p), &mut allocation);
        idle_storage(ctx, &mut allocation);
        allocation
    }
}
