//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{
    ChargingPointResponse, ErrorResponse, HealthResponse, LoadRecord, RangeQuery, SummaryResponse,
};

/// `GET /health` → 200 + `{"status": "ok"}`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Returns policy, horizon, point names and the KPI report.
///
/// `GET /summary` → 200 + `SummaryResponse` JSON
pub async fn get_summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    Json(SummaryResponse {
        policy: state.policy.clone(),
        config: state.result.config().clone(),
        charging_points: state.result.point_names().to_vec(),
        rejections: state.result.counter_rejections,
        kpi: state.kpi.clone(),
    })
}

/// Returns the aggregate load per step, optionally filtered by step range.
///
/// `GET /load-profile` → 200 + `Vec<LoadRecord>` JSON
/// `GET /load-profile?from=N&to=M` → filtered range (inclusive)
/// `GET /load-profile?from=10&to=5` → 400 + `ErrorResponse`
pub async fn get_load_profile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let from = query.from.unwrap_or(0);
    let to = query.to.unwrap_or(usize::MAX);

    if from > to {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("`from` ({from}) must be <= `to` ({to})"),
            }),
        ));
    }

    let records: Vec<LoadRecord> = state
        .result
        .timestamps()
        .into_iter()
        .zip(state.result.load_profile())
        .enumerate()
        .filter(|(step, _)| *step >= from && *step <= to)
        .map(|(step, (timestamp, load))| LoadRecord {
            step,
            timestamp,
            load_kw: *load,
        })
        .collect();

    Ok(Json(records))
}

/// Returns the power series of one charging point by its configured id.
///
/// `GET /charging-points/{id}` → 200 + `ChargingPointResponse` JSON
/// `GET /charging-points/unknown` → 404 + `ErrorResponse`
pub async fn get_charging_point(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Some(series) = state.result.point_power_by_name(&id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("unknown charging point \"{id}\""),
            }),
        ));
    };
    let energy_kwh = series.iter().sum::<f64>() * state.result.config().step_hours();

    Ok(Json(ChargingPointResponse {
        id,
        power_kw: series.to_vec(),
        energy_kwh,
    }))
}
