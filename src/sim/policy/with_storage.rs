use super::{
    ScheduleContext, Scheduler, greedy_fill, reserve_storage_discharge, settle_storage_discharge,
};
use crate::sim::allocation::Allocation;

/// Uncontrolled charging backed by stationary storage.
///
/// Vehicles see the transformer ceiling raised by whatever the storage
/// behind it can discharge this step. Storage then discharges exactly the
/// overload. Storage that is not needed gets 0 and self-charges from the
/// headroom left over.
#[derive(Debug, Clone, Copy, Default)]
pub struct WithStorage;

impl Scheduler for WithStorage {
    fn schedule(&mut self, ctx: &ScheduleContext<'_>) -> Allocation {
        let mut allocation = Allocation::new();
        reserve_storage_discharge(ctx, &mut allocation);
        greedy_fill(ctx, ctx.occupancy.busy(), &mut allocation);
        settle_storage_discharge(ctx, &mut allocation);
        allocation
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::sim::infrastructure::{PointId, StorageId};
    use crate::sim::periods::ChargingPeriods;

    #[test]
    fn storage_covers_overload() {
        let mut infra = site(30.0, 50.0, 22.0, &[2], Some(storage(100.0, 10.0, 0.5)));
        let occ = connect(
            &mut infra,
            &[(0, event(0, 1, 0.2, 22.0)), (1, event(1, 1, 0.2, 22.0))],
        );
        let periods = ChargingPeriods::new();
        let a = WithStorage.schedule(&ctx(&infra, &occ, &periods, 2, 0.0));
        assert_eq!(a.point(PointId(0)), 22.0);
        assert_eq!(a.point(PointId(1)), 18.0);
        assert!((a.storage(StorageId(0)) + 10.0).abs() < 1e-9);
        assert!(infra.check_allocation(&a, 0.0).is_ok());
    }

    #[test]
    fn discharges_only_what_is_needed() {
        let mut infra = site(30.0, 50.0, 22.0, &[2], Some(storage(100.0, 10.0, 0.5)));
        let occ = connect(
            &mut infra,
            &[(0, event(0, 1, 0.2, 22.0)), (1, event(1, 1, 0.2, 11.0))],
        );
        let periods = ChargingPeriods::new();
        let a = WithStorage.schedule(&ctx(&infra, &occ, &periods, 2, 0.0));
        assert_eq!(a.point(PointId(1)), 11.0);
        assert!((a.storage(StorageId(0)) + 3.0).abs() < 1e-9);
    }

    #[test]
    fn idle_when_grid_suffices() {
        let mut infra = site(100.0, 50.0, 22.0, &[2], Some(storage(100.0, 10.0, 0.5)));
        let occ = connect(&mut infra, &[(0, event(0, 1, 0.2, 22.0))]);
        let periods = ChargingPeriods::new();
        let a = WithStorage.schedule(&ctx(&infra, &occ, &periods, 2, 0.0));
        assert_eq!(a.storage(StorageId(0)), 0.0);
    }

    #[test]
    fn empty_storage_cannot_help() {
        let mut infra = site(30.0, 50.0, 22.0, &[2], Some(storage(100.0, 10.0, 0.0)));
        let occ = connect(
            &mut infra,
            &[(0, event(0, 1, 0.2, 22.0)), (1, event(1, 1, 0.2, 22.0))],
        );
        let periods = ChargingPeriods::new();
        let a = WithStorage.schedule(&ctx(&infra, &occ, &periods, 2, 0.0));
        assert_eq!(a.point(PointId(1)), 8.0);
        assert_eq!(a.storage(StorageId(0)), 0.0);
    }

    #[test]
    fn preload_above_ceiling_without_storage_gives_nothing() {
        let mut infra = site(30.0, 50.0, 22.0, &[1], None);
        let occ = connect(&mut infra, &[(0, event(0, 1, 0.2, 22.0))]);
        let periods = ChargingPeriods::new();
        let a = WithStorage.schedule(&ctx(&infra, &occ, &periods, 2, 40.0));
        assert_eq!(a.point(PointId(0)), 0.0);
        assert!(a.storage_systems().is_empty());
        assert!(infra.check_allocation(&a, 40.0).is_ok());
    }

    #[test]
    fn preload_above_ceiling_drains_what_storage_has() {
        let mut infra = site(30.0, 50.0, 22.0, &[1], Some(storage(100.0, 10.0, 0.5)));
        let occ = connect(&mut infra, &[(0, event(0, 1, 0.2, 22.0))]);
        let periods = ChargingPeriods::new();
        let a = WithStorage.schedule(&ctx(&infra, &occ, &periods, 2, 40.0));
        // 10 kW over the ceiling, all of the storage power goes to the preload
        assert_eq!(a.point(PointId(0)), 0.0);
        assert!((a.storage(StorageId(0)) + 10.0).abs() < 1e-9);
        assert!(infra.check_allocation(&a, 40.0).is_ok());
    }
}
