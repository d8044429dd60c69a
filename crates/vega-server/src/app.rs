use crate::state::AppState;
use crate::{api, auth, logging, rate_limit, tenant};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

fn cors_layer(allowed: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    let origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Protected routes run jwt auth, then team resolution, then the rate
/// limiter. Route layers keep `MatchedPath` available to the limiter.
pub fn build_http_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.http.cors_allowed_origins);

    let protected = api::protected_routes()
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            tenant::team_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_auth_middleware,
        ));

    api::public_routes()
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
