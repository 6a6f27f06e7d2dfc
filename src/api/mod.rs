//! Read-only REST API over a finished run.
//!
//! Provides four GET endpoints:
//! - `/health` liveness probe
//! - `/summary` policy, horizon and KPI report
//! - `/load-profile` aggregate site load with optional step range
//! - `/charging-points/{id}` power series of one point

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use crate::sim::kpi::KpiReport;
use crate::sim::result::SimulationResult;

/// Immutable application state shared across all request handlers.
///
/// Constructed once after the run completes and wrapped in `Arc`, so no
/// locks are needed.
pub struct AppState {
    /// Name of the policy that produced the run.
    pub policy: String,
    /// Aggregate KPI report.
    pub kpi: KpiReport,
    /// Per-step series of the run.
    pub result: SimulationResult,
}

impl AppState {
    /// Builds the state, computing the KPI report from `result`.
    pub fn new(policy: impl Into<String>, result: SimulationResult) -> Self {
        Self {
            policy: policy.into(),
            kpi: KpiReport::from_result(&result),
            result,
        }
    }
}

/// Builds the axum router with all API routes.
///
/// # Arguments
///
/// * `state` - Shared application state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/summary", get(handlers::get_summary))
        .route("/load-profile", get(handlers::get_load_profile))
        .route("/charging-points/{id}", get(handlers::get_charging_point))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `addr` - Socket address to bind to
///
/// # Panics
///
/// Panics if the TCP listener cannot bind to `addr`.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
