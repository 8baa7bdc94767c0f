// Route stages that run ahead of the controller actions

pub mod auth;
pub mod auth_middleware;
pub mod rate_limit;
pub mod validation;

pub use auth::{AuthenticatedUser, JwtTokenVerifier, TokenError, TokenVerifier};
pub use auth_middleware::auth_middleware;
pub use rate_limit::{otp_rate_limit, OtpLimiter};
pub use validation::validate_signup_input;
