//! Per-event record of when a vehicle first and last received power.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::event::EventId;

/// First and most recent step in which an event drew power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChargingPeriod {
    pub first_charged: NaiveDateTime,
    pub last_charged: NaiveDateTime,
}

/// Accumulates [`ChargingPeriod`]s over a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChargingPeriods {
    periods: BTreeMap<EventId, ChargingPeriod>,
}

impl ChargingPeriods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes that `event` drew power at `timestamp`.
    pub fn record(&mut self, event: EventId, timestamp: NaiveDateTime) {
        self.periods
            .entry(event)
            .and_modify(|p| p.last_charged = timestamp)
            .or_insert(ChargingPeriod {
                first_charged: timestamp,
                last_charged: timestamp,
            });
    }

    pub fn get(&self, event: EventId) -> Option<&ChargingPeriod> {
        self.periods.get(&event)
    }

    /// Last time `event` drew power, `None` if it never did.
    pub fn last_charged(&self, event: EventId) -> Option<NaiveDateTime> {
        self.periods.get(&event).map(|p| p.last_charged)
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EventId, &ChargingPeriod)> {
        self.periods.iter()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    #[test]
    fn first_record_sets_both_ends() {
        let mut p = ChargingPeriods::new();
        p.record(EventId(4), at(3));
        let period = p.get(EventId(4)).copied().unwrap();
        assert_eq!(period.first_charged, at(3));
        assert_eq!(period.last_charged, at(3));
    }

    #[test]
    fn later_record_moves_last_only() {
        let mut p = ChargingPeriods::new();
        p.record(EventId(4), at(3));
        p.record(EventId(4), at(5));
        assert_eq!(p.get(EventId(4)).map(|x| x.first_charged), Some(at(3)));
        assert_eq!(p.last_charged(EventId(4)), Some(at(5)));
        assert_eq!(p.last_charged(EventId(9)), None);
        assert_eq!(p.len(), 1);
    }
}
