use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::ExposeSecret;

use crate::server::AppState;

pub const AUTH_HEADER: &str = "x-auth-token";

/// Shared-secret check applied to every control endpoint. Compares the
/// `x-auth-token` header against the configured secret; anything else is a
/// 401 before the handler runs.
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok());

    match presented {
        Some(token) if tokens_match(token, state.auth_token.expose_secret()) => {
            next.run(request).await
        }
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "Rejected request: bad auth token");
            unauthorized("invalid auth token")
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "Rejected request: missing auth token");
            unauthorized("missing auth token")
        }
    }
}

/// Constant-time token comparison: always folds over every byte of the
/// presented token, so the comparison duration leaks nothing about how much
/// of the secret matched.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();

    let mut diff = presented.len() ^ expected.len();
    for (i, b) in presented.iter().enumerate() {
        diff |= (b ^ expected[i % expected.len().max(1)]) as usize;
    }
    diff == 0 && !expected.is_empty()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "message": message })),
    )
        .into_response()
}
