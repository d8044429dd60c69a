use crate::api::{error_response, success_response};
use crate::logging::TraceId;
use crate::report::{CycleError, CycleStage};
use crate::schedule::parse_timezone;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use vega_common::tenant::TeamId;
use vega_common::types::{ChannelId, ReportType, ScheduleConfig};
use vega_storage::{keys, DocumentStoreExt};

async fn list_reports(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.pipeline.list_reports(&team) {
        Ok(reports) => success_response(StatusCode::OK, &trace_id, reports),
        Err(e) => {
            tracing::error!(trace_id = %trace_id, error = %e, "Failed to list reports");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

#[derive(Deserialize)]
struct RunRequest {
    #[serde(rename = "type")]
    report_type: ReportType,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse {
    report_id: String,
    sent_via: BTreeSet<ChannelId>,
    delivered: BTreeMap<ChannelId, bool>,
}

fn cycle_error_response(trace_id: &str, err: &CycleError) -> Response {
    tracing::error!(trace_id = %trace_id, stage = %err.stage, error = %err.source, "Report cycle failed");
    match err.stage {
        CycleStage::Gather | CycleStage::Generate => error_response(
            StatusCode::BAD_GATEWAY,
            trace_id,
            "upstream_error",
            &format!("{} stage failed: {}", err.stage, err.source),
        ),
        CycleStage::Persist => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            trace_id,
            "storage_error",
            "Database error",
        ),
    }
}

/// Runs one cycle immediately, in the tenant's configured timezone.
async fn run_report(
    Extension(trace_id): Extension<TraceId>,
    Extension(team): Extension<TeamId>,
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> impl IntoResponse {
    let schedule: ScheduleConfig = match state.store.get_as(keys::SCHEDULE_CONFIG, &team) {
        Ok(schedule) => schedule.unwrap_or_default(),
        Err(e) => {
            tracing::error!(trace_id = %trace_id, error = %e, "Failed to read schedule config");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };
    let tz = parse_timezone(&schedule.timezone).unwrap_or(chrono_tz::UTC);

    match state
        .pipeline
        .run_cycle(&team, req.report_type, Utc::now(), tz)
        .await
    {
        Ok(outcome) => success_response(
            StatusCode::OK,
            &trace_id,
            RunResponse {
                report_id: outcome.report_id,
                sent_via: outcome.sent_via,
                delivered: outcome.delivered.into_iter().collect(),
            },
        ),
        Err(e) => cycle_error_response(&trace_id, &e),
    }
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reports", get(list_reports))
        .route("/v1/reports/run", post(run_report))
}
