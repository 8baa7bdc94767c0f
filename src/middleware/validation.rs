// Signup input validation stage

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;

use crate::{app::AppState, handlers::auth::parse_json_body, utils::AuthError};

/// Largest signup body buffered for validation
pub const MAX_SIGNUP_BODY_BYTES: usize = 64 * 1024;

/// Run the controller's signup validation before the action; the buffered
/// body is handed on unchanged
pub async fn validate_signup_input(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match buffer_body(body, MAX_SIGNUP_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return e.into_response(),
    };

    let payload = match parse_json_body(&bytes) {
        Ok(payload) => payload,
        Err(e) => return e.into_response(),
    };

    if let Err(fields) = state.controller.validate_signup_input(&payload) {
        tracing::debug!(fields = fields.len(), "Signup input rejected");
        return AuthError::ValidationError(fields).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Collect at most `limit` bytes; stream failures are reported apart from oversize bodies
async fn buffer_body(body: Body, limit: usize) -> Result<Bytes, AuthError> {
    let mut stream = body.into_data_stream();
    let mut buffered = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| AuthError::InvalidBody(e.to_string()))?;
        if buffered.len() + chunk.len() > limit {
            return Err(AuthError::PayloadTooLarge);
        }
        buffered.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buffered))
}
