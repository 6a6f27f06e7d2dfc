//! API response and query types.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::sim::kpi::KpiReport;
use crate::sim::types::SimConfig;

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Run overview: policy, horizon and KPIs.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    /// Canonical policy name.
    pub policy: String,
    /// Simulated horizon.
    pub config: SimConfig,
    /// Charging points of the site.
    pub charging_points: Vec<String>,
    /// Arrivals turned away.
    pub rejections: usize,
    /// Aggregate KPI report.
    pub kpi: KpiReport,
}

/// Site load in one step.
#[derive(Debug, Serialize)]
pub struct LoadRecord {
    /// Step index.
    pub step: usize,
    pub timestamp: NaiveDateTime,
    /// Points, storage and preload (kW).
    pub load_kw: f64,
}

/// Power series of one charging point.
#[derive(Debug, Serialize)]
pub struct ChargingPointResponse {
    pub id: String,
    /// Power per step (kW), 0 while idle.
    pub power_kw: Vec<f64>,
    /// Energy delivered over the run (kWh).
    pub energy_kwh: f64,
}

/// Optional range query parameters for the load profile endpoint.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// Start step (inclusive).
    pub from: Option<usize>,
    /// End step (inclusive).
    pub to: Option<usize>,
}

/// Error response body for 4xx errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
