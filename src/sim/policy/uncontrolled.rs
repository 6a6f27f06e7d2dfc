use super::{ScheduleContext, Scheduler, greedy_fill, idle_storage};
use crate::sim::allocation::Allocation;

/// Every vehicle draws what it can, in point order.
///
/// No fairness: when the tree is saturated, lower-numbered points win.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uncontrolled;

impl Scheduler for Uncontrolled {
    fn schedule(&mut self, ctx: &ScheduleContext<'_>) -> Allocation {
        let mut allocation = Allocation::new();
        greedy_fill(ctx, ctx.occupancy.busy(), &mut allocation);
        idle_storage(ctx, &mut allocation);
        allocation
    }
}
