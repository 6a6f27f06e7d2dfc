//! The simulation core: time, events, site, scheduling and the run loop.

pub mod allocation;
/// Simulation clock for time-step iteration.
pub mod clock;
pub mod engine;
/// Charging events and connected-vehicle state.
pub mod event;
pub mod infrastructure;
pub mod kpi;
pub mod occupancy;
pub mod periods;
pub mod policy;
pub mod queue;
pub mod result;
pub mod types;
