use crate::api::{alert_error_response, error_response, success_response};
use crate::logging::TraceId;
use crate::schedule;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use vega_common::tenant::TeamId;
use vega_common::types::{NotificationConfig, ScheduleConfig, ScheduleConfigPatch};
use vega_notify::utils::{redact_config, restore_secrets};
use vega_storage::{keys, DocumentStoreExt};

/// Credentials are masked on the way out.
async fn get_notifications(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.engine.notification_config(&team) {
        Ok(config) => success_response(StatusCode::OK, &trace_id, redact_config(&config)),
        Err(e) => alert_error_response(&trace_id, &e),
    }
}

/// Secrets that come back absent or still masked keep their stored value.
async fn put_notifications(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Json(incoming): Json<NotificationConfig>,
) -> impl IntoResponse {
    let stored = match state.engine.notification_config(&team) {
        Ok(stored) => stored,
        Err(e) => return alert_error_response(&trace_id, &e),
    };
    let config = restore_secrets(incoming, &stored);
    if let Err(e) = state.engine.set_notification_config(&team, &config) {
        return alert_error_response(&trace_id, &e);
    }
    let channels = state.engine.dispatcher().configured_channels(&config);
    tracing::info!(team = %team, channels = ?channels, "Notification config updated");
    success_response(StatusCode::OK, &trace_id, redact_config(&config))
}

fn storage_failure(trace_id: &str, e: &vega_storage::StorageError) -> Response {
    tracing::error!(trace_id = %trace_id, error = %e, "Schedule config storage failure");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        trace_id,
        "storage_error",
        "Database error",
    )
}

async fn get_schedule(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.get_as::<ScheduleConfig>(keys::SCHEDULE_CONFIG, &team) {
        Ok(config) => success_response(StatusCode::OK, &trace_id, config.unwrap_or_default()),
        Err(e) => storage_failure(&trace_id, &e),
    }
}

/// Validates the partial update, then merges it onto the stored config.
/// Nothing is written when validation fails.
async fn put_schedule(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Json(patch): Json<ScheduleConfigPatch>,
) -> impl IntoResponse {
    let validated = match schedule::validate(&patch) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &trace_id,
                "bad_request",
                &e.to_string(),
            )
        }
    };

    let existing = match state.store.get_as::<ScheduleConfig>(keys::SCHEDULE_CONFIG, &team) {
        Ok(existing) => existing.unwrap_or_default(),
        Err(e) => return storage_failure(&trace_id, &e),
    };
    let merged = validated.merge_onto(existing);
    if let Err(e) = state.store.set_as(keys::SCHEDULE_CONFIG, &team, &merged) {
        return storage_failure(&trace_id, &e);
    }
    tracing::info!(team = %team, timezone = %merged.timezone, "Schedule config updated");
    success_response(StatusCode::OK, &trace_id, merged)
}

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/settings/notifications",
            get(get_notifications).put(put_notifications),
        )
        .route("/v1/settings/schedule", get(get_schedule).put(put_schedule))
}
