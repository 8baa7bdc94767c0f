// Application state shared across handlers and route stages
use std::sync::Arc;

use crate::{
    handlers::auth::AuthController,
    middleware::{auth::TokenVerifier, rate_limit::OtpLimiter},
    services::SecurityLogger,
};

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<dyn AuthController>,
    pub token_verifier: Arc<dyn TokenVerifier>,
    pub otp_limiter: Arc<OtpLimiter>,
    pub security_logger: SecurityLogger,
}
