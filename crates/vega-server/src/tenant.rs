use crate::api::error_response;
use crate::auth::Claims;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use vega_common::tenant::TeamId;
use vega_storage::{keys, DocumentStore, DocumentStoreExt, StorageError};

/// Team owning `caller_id`'s data: the `vega_team_id` document stored under
/// the caller, or the caller itself when none is stored.
pub fn resolve_team(store: &dyn DocumentStore, caller_id: &str) -> Result<TeamId, StorageError> {
    let caller = TeamId::new(caller_id);
    let team: Option<String> = store.get_as(keys::TEAM_ID, &caller)?;
    Ok(team
        .filter(|t| !t.trim().is_empty())
        .map(TeamId::new)
        .unwrap_or(caller))
}

/// Inserts the caller's [`TeamId`] into the request extensions. Runs after
/// [`crate::auth::jwt_auth_middleware`].
pub async fn team_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let Some(caller) = req.extensions().get::<Claims>().map(|c| c.sub.clone()) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            &trace_id,
            "unauthorized",
            "missing caller identity",
        );
    };

    match resolve_team(state.store.as_ref(), &caller) {
        Ok(team) => {
            tracing::debug!(trace_id = %trace_id, caller = %caller, team = %team, "Resolved team");
            req.extensions_mut().insert(team);
            next.run(req).await
        }
        Err(e) => {
            tracing::error!(trace_id = %trace_id, caller = %caller, error = %e, "Failed to resolve team");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "failed to resolve team",
            )
        }
    }
}
