//! Power assignment produced by a scheduling policy for one step.

use std::collections::BTreeMap;

use serde::Serialize;

use super::infrastructure::{PointId, StorageId};

/// Power per charging point and per storage system for one step.
///
/// Point values are charging power (kW, >= 0). Storage values follow the
/// transformer convention: positive charges, negative discharges. A policy
/// leaves storage at 0 to let it self-charge from the remaining headroom.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Allocation {
    points: BTreeMap<PointId, f64>,
    storage: BTreeMap<StorageId, f64>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Power assigned to `point`, 0 if unassigned.
    pub fn point(&self, point: PointId) -> f64 {
        self.points.get(&point).copied().unwrap_or(0.0)
    }

    pub fn set_point(&mut self, point: PointId, power: f64) {
        self.points.insert(point, power);
    }

    pub fn add_point(&mut self, point: PointId, power: f64) {
        *self.points.entry(point).or_insert(0.0) += power;
    }

    /// Power assigned to `storage`, 0 if unassigned.
    pub fn storage(&self, storage: StorageId) -> f64 {
        self.storage.get(&storage).copied().unwrap_or(0.0)
    }

    pub fn set_storage(&mut self, storage: StorageId, power: f64) {
        self.storage.insert(storage, power);
    }

    /// Assigned point powers in point order.
    pub fn points(&self) -> &BTreeMap<PointId, f64> {
        &self.points
    }

    /// Assigned storage powers in storage order.
    pub fn storage_systems(&self) -> &BTreeMap<StorageId, f64> {
        &self.storage
    }

    /// Sum of all point powers.
    pub fn total_point_power(&self) -> f64 {
        self.points.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_reads_zero() {
        let a = Allocation::new();
        assert_eq!(a.point(PointId(3)), 0.0);
        assert_eq!(a.storage(StorageId(0)), 0.0);
    }

    #[test]
    fn add_accumulates() {
        let mut a = Allocation::new();
        a.add_point(PointId(1), 2.5);
        a.add_point(PointId(1), 1.5);
        a.set_point(PointId(0), 3.0);
        assert_eq!(a.point(PointId(1)), 4.0);
        assert_eq!(a.total_point_power(), 7.0);
        let order: Vec<_> = a.points().keys().copied().collect();
        assert_eq!(order, vec![PointId(0), PointId(1)]);
    }
}
