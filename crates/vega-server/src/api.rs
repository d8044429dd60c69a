pub mod alerts;
pub mod reports;
pub mod rules;
pub mod settings;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use vega_alert::AlertError;

/// Uniform response envelope.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 0 on success.
    pub err_code: i32,
    pub err_msg: String,
    pub trace_id: String,
    pub data: Option<T>,
}

#[derive(Serialize)]
pub struct IdResponse {
    pub id: String,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_id_response(status: StatusCode, trace_id: &str, id: String) -> Response {
    success_response(status, trace_id, IdResponse { id })
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "unauthorized" => 1002,
        "token_expired" => 1003,
        "not_found" => 1004,
        "rate_limited" => 1429,
        "internal_error" => 1500,
        "storage_error" => 1501,
        "upstream_error" => 1502,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Maps an engine failure onto the envelope: storage problems are ours,
/// evaluator problems belong to the upstream service.
pub fn alert_error_response(trace_id: &str, err: &AlertError) -> Response {
    match err {
        AlertError::Storage(e) => {
            tracing::error!(trace_id = %trace_id, error = %e, "Storage failure");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "storage_error",
                "Database error",
            )
        }
        AlertError::Evaluator(e) => {
            tracing::error!(trace_id = %trace_id, error = %e, "Evaluator failure");
            error_response(
                StatusCode::BAD_GATEWAY,
                trace_id,
                "upstream_error",
                &format!("evaluator failed: {e}"),
            )
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
    storage_status: String,
    report_generator: bool,
    rate_limit_keys: usize,
}

async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let storage_status = match state.store.tenants_with(vega_storage::keys::SCHEDULE_CONFIG) {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Storage health probe failed");
            "error"
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            storage_status: storage_status.to_string(),
            report_generator: state.pipeline.has_generator(),
            rate_limit_keys: state.limiter.key_count(),
        },
    )
}

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/v1/health", get(health))
}

/// Every route that requires a bearer token and a resolved team.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .merge(rules::rule_routes())
        .merge(alerts::alert_routes())
        .merge(reports::report_routes())
        .merge(settings::settings_routes())
}
