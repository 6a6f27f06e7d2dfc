//! Which charging points are free and which are busy.

use std::collections::BTreeMap;

use serde::Serialize;

use super::infrastructure::PointId;

/// Occupancy state of a charging point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PointStatus {
    Free,
    Busy,
}

/// Authoritative point -> status map, iterated in point order.
///
/// Owned and written only by the engine. A point is always in exactly one
/// state.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    status: BTreeMap<PointId, PointStatus>,
}

impl Occupancy {
    /// Marks every point in `points` as free.
    pub fn new(points: impl IntoIterator<Item = PointId>) -> Self {
        Self {
            status: points.into_iter().map(|p| (p, PointStatus::Free)).collect(),
        }
    }

    pub fn status(&self, point: PointId) -> Option<PointStatus> {
        self.status.get(&point).copied()
    }

    pub fn set(&mut self, point: PointId, status: PointStatus) {
        self.status.insert(point, status);
    }

    /// Lowest-numbered free point.
    pub fn first_free(&self) -> Option<PointId> {
        self.status
            .iter()
            .find(|(_, s)| **s == PointStatus::Free)
            .map(|(p, _)| *p)
    }

    pub fn free(&self) -> impl Iterator<Item = PointId> + '_ {
        self.with_status(PointStatus::Free)
    }

    pub fn busy(&self) -> impl Iterator<Item = PointId> + '_ {
        self.with_status(PointStatus::Busy)
    }

    pub fn busy_count(&self) -> usize {
        self.busy().count()
    }

    pub fn has_busy(&self) -> bool {
        self.status.values().any(|s| *s == PointStatus::Busy)
    }

    fn with_status(&self, wanted: PointStatus) -> impl Iterator<Item = PointId> + '_ {
        self.status
            .iter()
            .filter(move |(_, s)| **s == wanted)
            .map(|(p, _)| *p)
    }
}
