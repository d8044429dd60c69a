use crate::api::error_response;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Bearer token claims. `sub` is the caller id, not the team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

pub fn create_token(secret: &str, caller_id: &str, expire_secs: u64) -> anyhow::Result<String> {
    let now = u64::try_from(chrono::Utc::now().timestamp())?;
    let claims = Claims {
        sub: caller_id.to_string(),
        iat: now,
        exp: now + expire_secs,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Rejects requests without a valid HS256 bearer token and stores the
/// [`Claims`] in the request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            &trace_id,
            "unauthorized",
            "missing or invalid authorization header",
        );
    };

    match validate_token(&state.jwt_secret, token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) => {
            error_response(StatusCode::UNAUTHORIZED, &trace_id, "token_expired", "token expired")
        }
        Err(e) => {
            tracing::debug!(trace_id = %trace_id, error = %e, "Rejected bearer token");
            error_response(StatusCode::UNAUTHORIZED, &trace_id, "unauthorized", "invalid token")
        }
    }
}
