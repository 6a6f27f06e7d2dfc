//! Discrete-time simulator for EV charging parks.
//!
//! A run steps a fixed horizon, admits generated charging events to a tree
//! of transformers, stations and charging points, and lets a scheduling
//! policy split the available power among connected vehicles and
//! stationary storage.

/// Read-only HTTP API over a finished run.
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod devices;
pub mod error;
pub mod generator;
pub mod io;
pub mod scenario;
/// Simulation engine, site model, scheduling and result modules.
pub mod sim;
pub mod telemetry;
