//! Post-hoc KPI computation from simulation results.

use std::fmt;

use serde::Serialize;

use super::infrastructure::StorageId;
use super::result::SimulationResult;

/// Aggregate key performance indicators derived from a complete simulation run.
///
/// Computed post-hoc from a [`SimulationResult`] so the reported metrics
/// always agree with the stored series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiReport {
    /// Energy delivered to vehicles (kWh).
    pub energy_charged_kwh: f64,
    /// Highest site load in any step (kW).
    pub peak_load_kw: f64,
    /// Average site load (kW).
    pub mean_load_kw: f64,
    /// Mean over peak load, 0 when the peak is not positive.
    pub load_factor: f64,
    /// Storage energy throughput (kWh, sum of |power| * dt).
    pub storage_throughput_kwh: f64,
    /// Occupied point-steps over available point-steps.
    pub utilisation: f64,
    /// Arrivals seen during the run.
    pub arrivals: usize,
    /// Vehicles that were plugged in.
    pub connections: usize,
    /// Vehicles that received any energy.
    pub vehicles_served: usize,
    /// Arrivals turned away.
    pub rejections: usize,
    /// Rejections over arrivals.
    pub rejection_rate: f64,
}

impl KpiReport {
    /// Computes all KPIs from a finished run.
    ///
    /// # Arguments
    ///
    /// * `result` - Result returned by [`crate::sim::engine::Engine::run`]
    ///
    /// # Returns
    ///
    /// A `KpiReport` with all fields populated. An empty horizon yields zeros.
    pub fn from_result(result: &SimulationResult) -> Self {
        let dt_hours = result.config().step_hours();
        let steps = result.total_steps();
        let load = result.load_profile();

        let energy_charged_kwh = result.vehicle_load().iter().sum::<f64>() * dt_hours;
        let peak_load_kw = load.iter().copied().fold(0.0_f64, f64::max);
        let mean_load_kw = if steps > 0 {
            load.iter().sum::<f64>() / steps as f64
        } else {
            0.0
        };
        let load_factor = if peak_load_kw > 0.0 {
            mean_load_kw / peak_load_kw
        } else {
            0.0
        };

        let storage_throughput_kwh = (0..result.storage_names().len())
            .map(|i| {
                result
                    .storage_power(StorageId(i))
                    .iter()
                    .map(|p| p.abs())
                    .sum::<f64>()
            })
            .sum::<f64>()
            * dt_hours;

        let point_steps = result.point_names().len() * steps;
        let utilisation = if point_steps > 0 {
            result.busy_points().iter().sum::<usize>() as f64 / point_steps as f64
        } else {
            0.0
        };

        let rejection_rate = if result.counter_arrivals > 0 {
            result.counter_rejections as f64 / result.counter_arrivals as f64
        } else {
            0.0
        };

        Self {
            energy_charged_kwh,
            peak_load_kw,
            mean_load_kw,
            load_factor,
            storage_throughput_kwh,
            utilisation,
            arrivals: result.counter_arrivals,
            connections: result.counter_connections,
            vehicles_served: result.charging_periods.len(),
            rejections: result.counter_rejections,
            rejection_rate,
        }
    }
}

impl fmt::Display for KpiReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- KPI Report ---")?;
        writeln!(f, "Energy charged:        {:.2} kWh", self.energy_charged_kwh)?;
        writeln!(f, "Peak load:             {:.2} kW", self.peak_load_kw)?;
        writeln!(
            f,
            "Mean load:             {:.2} kW (load factor {:.2})",
            self.mean_load_kw, self.load_factor
        )?;
        writeln!(f, "Storage throughput:    {:.2} kWh", self.storage_throughput_kwh)?;
        writeln!(f, "Point utilisation:     {:.1}%", 100.0 * self.utilisation)?;
        writeln!(
            f,
            "Vehicles:              {} arrived, {} connected, {} charged",
            self.arrivals, self.connections, self.vehicles_served
        )?;
        write!(
            f,
            "Rejections:            {} ({:.1}%)",
            self.rejections,
            100.0 * self.rejection_rate
        )
    }
}
