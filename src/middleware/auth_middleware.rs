// Authenticate stage for protected routes
// Verifies the bearer token and injects AuthenticatedUser into request extensions

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    app::AppState,
    middleware::auth::TokenError,
    services::SecurityEvent,
    utils::{original_path, AuthError, RequestContext},
};

/// Middleware function that validates bearer tokens and adds AuthenticatedUser to extensions
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::capture(request.headers(), request.extensions());
    let path = original_path(request.uri(), request.extensions());

    let Some(token) = ctx.bearer_token.as_deref() else {
        state
            .security_logger
            .dispatch(rejection_event("UNAUTHENTICATED_ACCESS", &ctx, &path));
        return AuthError::MissingToken.into_response();
    };

    match state.token_verifier.verify(token) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        },
        Err(TokenError::Expired) => {
            tracing::debug!(path = %path, "Rejected expired access token");
            state
                .security_logger
                .dispatch(rejection_event("EXPIRED_TOKEN_ATTEMPT", &ctx, &path));
            AuthError::TokenExpired.into_response()
        },
        Err(TokenError::Invalid(reason)) => {
            tracing::warn!("JWT validation failed: {}", reason);
            state.security_logger.dispatch(
                rejection_event("INVALID_TOKEN_ATTEMPT", &ctx, &path).detail("reason", reason),
            );
            AuthError::InvalidToken.into_response()
        },
    }
}

fn rejection_event(event_type: &str, ctx: &RequestContext, path: &str) -> SecurityEvent {
    SecurityEvent::new(event_type)
        .detail("path", path)
        .ip_address(ctx.ip_address.clone())
        .user_agent(ctx.user_agent.clone())
}
