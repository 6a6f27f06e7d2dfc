use std::collections::{BTreeMap, BTreeSet};

use super::{ScheduleContext, Scheduler, reserve_storage_discharge, settle_storage_discharge};
use crate::sim::allocation::Allocation;
use crate::sim::infrastructure::{POWER_EPSILON, PointId, StationId, TransformerId};

/// Max-min fair allocation across the whole capacity tree.
///
/// All busy points are raised together in equal increments. A point stops
/// rising once its demand is met or any node on its path saturates. The rest
/// keep rising. While some fair share ends below its minimum power, the
/// highest-numbered such point is taken out and the fill is repeated.
/// Storage is dispatched as in [`super::WithStorage`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Optimized;

impl Scheduler for Optimized {
    fn schedule(&mut self, ctx: &ScheduleContext<'_>) -> Allocation {
        let vehicles = ctx.busy_vehicles();
        let demand: BTreeMap<PointId, f64> = vehicles
            .iter()
            .map(|&(p, v)| (p, v.demand(ctx.step_length)))
            .collect();
        let min_power: BTreeMap<PointId, f64> = vehicles
            .iter()
            .map(|&(p, v)| (p, ctx.min_power(p, v)))
            .collect();

        let mut excluded = BTreeSet::new();
        loop {
            let mut allocation = Allocation::new();
            reserve_storage_discharge(ctx, &mut allocation);
            for &p in demand.keys() {
                allocation.set_point(p, 0.0);
            }

            let active: Vec<PointId> = demand
                .iter()
                .filter(|(p, d)| **d > POWER_EPSILON && !excluded.contains(*p))
                .map(|(p, _)| *p)
                .collect();
            progressive_fill(ctx, &active, &demand, &mut allocation);

            let below_min: Vec<PointId> = active
                .iter()
                .copied()
                .filter(|p| {
                    let share = allocation.point(*p);
                    let floor = min_power[p];
                    share + POWER_EPSILON < floor && share < demand[p] - POWER_EPSILON
                })
                .collect();
            // drop the lowest-priority point and retry
            match below_min.last() {
                Some(&p) => {
                    excluded.insert(p);
                }
                None => {
                    settle_storage_discharge(ctx, &mut allocation);
                    return allocation;
                }
            }
        }
    }
}

/// Raises all `active` points in equal steps until each is frozen.
fn progressive_fill(
    ctx: &ScheduleContext<'_>,
    active: &[PointId],
    demand: &BTreeMap<PointId, f64>,
    allocation: &mut Allocation,
) {
    let infra = ctx.infrastructure;
    let mut frozen: BTreeSet<PointId> = BTreeSet::new();

    loop {
        let open: Vec<PointId> = active
            .iter()
            .copied()
            .filter(|p| !frozen.contains(p))
            .collect();
        if open.is_empty() {
            return;
        }

        let mut per_station: BTreeMap<StationId, usize> = BTreeMap::new();
        let mut per_transformer: BTreeMap<TransformerId, usize> = BTreeMap::new();
        let mut increment = f64::INFINITY;
        for &p in &open {
            let cp = infra.point(p);
            let assigned = allocation.point(p);
            increment = increment
                .min(demand[&p] - assigned)
                .min(cp.max_power() - assigned);
            *per_station.entry(cp.station()).or_default() += 1;
            *per_transformer.entry(infra.point_transformer(p)).or_default() += 1;
        }
        for (&s, &n) in &per_station {
            increment = increment.min(infra.station_headroom(s, allocation) / n as f64);
        }
        for (&t, &n) in &per_transformer {
            increment =
                increment.min(infra.transformer_headroom(t, allocation, ctx.preload) / n as f64);
        }

        if increment > POWER_EPSILON {
            for &p in &open {
                allocation.add_point(p, increment);
            }
        }

        let before = frozen.len();
        for &p in &open {
            let saturated = demand[&p] - allocation.point(p) <= POWER_EPSILON
                || infra.max_hardware_power(p, allocation, ctx.preload) <= POWER_EPSILON;
            if saturated {
                frozen.insert(p);
            }
        }
        if frozen.len() == before {
            // nothing saturated: only possible through float noise
            return;
        }
    }
}
