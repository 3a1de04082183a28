use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;
use crate::state::AppState;

pub static ACCESS_TOKEN: &str = "access-token";

/// Rejects `/api` requests whose `access-token` header does not match the
/// configured token. A server without a token accepts everything.
pub async fn check_access_token(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(expected) = state.config.api_token.as_deref() {
        let provided = req
            .headers()
            .get(ACCESS_TOKEN)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            return ServerError::Unauthorized.into_response();
        }
    }
    next.run(req).await
}
