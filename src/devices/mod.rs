//! Physical models for vehicle and stationary batteries.

/// Battery capability model with SOC-dependent power derating.
pub mod battery;
/// Stateful stationary storage battery.
pub mod storage;
pub mod vehicle;

pub use battery::Battery;
pub use storage::StationaryBattery;
pub use vehicle::ElectricVehicle;
