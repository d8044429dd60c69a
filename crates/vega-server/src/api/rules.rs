use crate::api::{alert_error_response, error_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use vega_common::tenant::TeamId;
use vega_common::types::RuleDraft;

async fn list_rules(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.engine.list_rules(&team) {
        Ok(rules) => success_response(StatusCode::OK, &trace_id, rules),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

/// Creates the rule when `id` is absent or unknown, updates it otherwise.
async fn save_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Json(draft): Json<RuleDraft>,
) -> impl IntoResponse {
    if draft.name.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "name must not be empty",
        );
    }
    if draft.metric.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "metric must not be empty",
        );
    }
    if !draft.threshold.is_finite() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "threshold must be a finite number",
        );
    }

    match state.engine.save_rule(&team, draft) {
        Ok(rule) => success_response(StatusCode::OK, &trace_id, rule),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    id: String,
    deleted: bool,
}

/// Deleting an unknown rule succeeds with `deleted: false`.
async fn delete_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.delete_rule(&team, &id) {
        Ok(deleted) => success_response(StatusCode::OK, &trace_id, DeleteResponse { id, deleted }),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

#[derive(Deserialize)]
struct EnableRequest {
    enabled: bool,
}

/// `data` is the updated rule, or `null` when no rule has this id.
async fn set_rule_enabled(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EnableRequest>,
) -> impl IntoResponse {
    match state.engine.toggle_rule(&team, &id, req.enabled) {
        Ok(rule) => success_response(StatusCode::OK, &trace_id, rule),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

pub fn rule_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/alert-rules", get(list_rules).post(save_rule))
        .route("/v1/alert-rules/{id}", axum::routing::delete(delete_rule))
        .route("/v1/alert-rules/{id}/enabled", put(set_rule_enabled))
}
