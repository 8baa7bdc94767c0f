// OTP rate-limit stage
// In-memory keyed limiter per client IP, in front of OTP-consuming actions

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::warn;

use crate::{
    app::AppState,
    app_config::OtpRateLimitSettings,
    models::UNKNOWN_CLIENT_FIELD,
    services::SecurityEvent,
    utils::{original_path, AuthError, RequestContext},
};

pub struct OtpLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    settings: OtpRateLimitSettings,
}

impl OtpLimiter {
    pub fn new(settings: OtpRateLimitSettings) -> Self {
        let max_attempts = NonZeroU32::new(settings.max_attempts).unwrap_or(NonZeroU32::MIN);
        let window = Duration::from_secs(settings.window_seconds.max(1));

        // One attempt replenishes every window / max_attempts
        let quota = Quota::with_period(window / max_attempts.get())
            .unwrap_or_else(|| Quota::per_second(max_attempts))
            .allow_burst(max_attempts);

        Self {
            limiter: RateLimiter::keyed(quota),
            settings,
        }
    }

    pub fn settings(&self) -> OtpRateLimitSettings {
        self.settings
    }

    /// Consume one attempt for `key`, or return the seconds until the next one is allowed
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.limiter.check_key(&key.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            seconds.max(1)
        })
    }

    /// Forget keys whose quota has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}

pub async fn otp_rate_limit(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::capture(request.headers(), request.extensions());
    let key = ctx
        .ip_address
        .clone()
        .unwrap_or_else(|| UNKNOWN_CLIENT_FIELD.to_string());

    match state.otp_limiter.check(&key) {
        Ok(()) => next.run(request).await,
        Err(retry_after_seconds) => {
            let path = original_path(request.uri(), request.extensions());
            warn!(ip = %key, path = %path, "OTP rate limit exceeded");

            state.security_logger.dispatch(
                SecurityEvent::new("SUSPICIOUS_ACTIVITY")
                    .detail("reason", "otp_rate_limit_exceeded")
                    .detail("path", path)
                    .ip_address(ctx.ip_address)
                    .user_agent(ctx.user_agent),
            );

            AuthError::RateLimited {
                retry_after_seconds,
            }
            .into_response()
        },
    }
}
