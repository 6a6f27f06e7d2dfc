//! Bounded FIFO of vehicles waiting for a free charging point.

use std::collections::VecDeque;

use chrono::NaiveDateTime;

use super::event::ChargingEvent;

/// Vehicles that arrived while every charging point was busy.
///
/// Served strictly in arrival order. The queue tracks the earliest leaving
/// time among its entries so the engine can skip scanning for departures
/// until that moment.
#[derive(Debug, Clone, Default)]
pub struct WaitingQueue {
    queue: VecDeque<ChargingEvent>,
    maxsize: usize,
    next_leave: Option<NaiveDateTime>,
}

impl WaitingQueue {
    /// Creates a queue holding at most `maxsize` events. Zero disables
    /// queueing.
    pub fn new(maxsize: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(maxsize),
            maxsize,
            next_leave: None,
        }
    }

    pub fn maxsize(&self) -> usize {
        self.maxsize
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Whether another event fits.
    pub fn has_capacity(&self) -> bool {
        self.queue.len() < self.maxsize
    }

    /// Earliest leaving time among queued events.
    pub fn next_leave(&self) -> Option<NaiveDateTime> {
        self.next_leave
    }

    /// Appends `event` if there is room and reports whether it was queued.
    pub fn enqueue(&mut self, event: ChargingEvent) -> bool {
        if !self.has_capacity() {
            return false;
        }
        let leaving = event.leaving_time();
        self.next_leave = Some(self.next_leave.map_or(leaving, |t| t.min(leaving)));
        self.queue.push_back(event);
        true
    }

    /// Removes and returns the oldest event.
    pub fn dequeue(&mut self) -> Option<ChargingEvent> {
        let head = self.queue.pop_front();
        if head.is_some() {
            self.determine_next_leaving_time();
        }
        head
    }

    /// Recomputes the earliest leaving time from the current contents.
    pub fn determine_next_leaving_time(&mut self) {
        self.next_leave = self.queue.iter().map(ChargingEvent::leaving_time).min();
    }

    /// Removes every event whose leaving time is at or before `now`.
    ///
    /// Returns the removed events in queue order.
    pub fn remove_elapsed(&mut self, now: NaiveDateTime) -> Vec<ChargingEvent> {
        let (elapsed, waiting): (VecDeque<_>, VecDeque<_>) = self
            .queue
            .drain(..)
            .partition(|event| event.leaving_time() <= now);
        self.queue = waiting;
        self.determine_next_leaving_time();
        elapsed.into()
    }

    /// Drops every queued event.
    pub fn empty(&mut self) {
        self.queue.clear();
        self.next_leave = None;
    }

    /// Queued events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChargingEvent> {
        self.queue.iter()
    }
}
