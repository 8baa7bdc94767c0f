// Utility modules for the auth backend

pub mod auth_errors;
pub mod request_context;

pub use auth_errors::{AuthError, AuthErrorResponse, FieldError};
pub use request_context::{original_path, ClientIpSource, RequestContext};
