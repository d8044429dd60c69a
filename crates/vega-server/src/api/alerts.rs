use crate::api::{alert_error_response, error_response, success_id_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use vega_common::tenant::TeamId;
use vega_common::types::MetricValues;

#[derive(Deserialize)]
struct EvaluateRequest {
    values: MetricValues,
}

/// Runs one evaluation pass with freshly computed metric values and returns
/// only the alerts it produced.
async fn evaluate(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> impl IntoResponse {
    match state.engine.evaluate(&team, &req.values).await {
        Ok(alerts) => success_response(StatusCode::OK, &trace_id, alerts),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.engine.list_alerts(&team) {
        Ok(alerts) => success_response(StatusCode::OK, &trace_id, alerts),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

async fn acknowledge_alert(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.acknowledge(&team, &id) {
        Ok(true) => success_id_response(StatusCode::OK, &trace_id, id),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            "Alert not found",
        ),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

pub fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/alerts", get(list_alerts))
        .route("/v1/alerts/evaluate", post(evaluate))
        .route("/v1/alerts/{id}/acknowledge", post(acknowledge_alert))
}
