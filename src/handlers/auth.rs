// Authentication actions
// Each handler hands the request to the AuthController; the route stages in
// front of it live in crate::middleware

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use crate::{
    app::AppState,
    utils::{AuthError, FieldError, RequestContext},
};

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// What a controller action receives
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub context: RequestContext,
    /// Parsed JSON body, `Null` when the request had none
    pub body: Value,
}

impl AuthRequest {
    pub fn from_body(context: RequestContext, body: &Bytes) -> Result<Self, AuthError> {
        Ok(Self {
            context,
            body: parse_json_body(body)?,
        })
    }
}

/// Empty bodies parse as `Null`
pub fn parse_json_body(body: &Bytes) -> Result<Value, AuthError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| AuthError::InvalidJson(e.to_string()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupInput {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 320, message = "Email must be less than 320 characters"))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    #[validate(length(
        min = 1,
        max = 255,
        message = "Full name must be between 1 and 255 characters"
    ))]
    pub full_name: Option<String>,
}

/// Custom password validation - min 8 chars, must have uppercase, lowercase, number, special char
fn validate_password(password: &str) -> Result<(), validator::ValidationError> {
    let has_uppercase = password.chars().any(|c| c.is_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if password.chars().count() < 8 {
        let mut error = validator::ValidationError::new("password_too_short");
        error.message = Some("Password must be at least 8 characters".into());
        return Err(error);
    }

    if !has_uppercase || !has_lowercase || !has_digit || !has_special {
        let mut error = validator::ValidationError::new("password_complexity");
        error.message = Some(
            "Password must contain uppercase, lowercase, number and special characters".into(),
        );
        return Err(error);
    }

    Ok(())
}

/// Default signup validation used by `AuthController::validate_signup_input`
pub fn validate_signup_payload(payload: &Value) -> Result<(), Vec<FieldError>> {
    let input: SignupInput = serde_json::from_value(payload.clone()).map_err(|e| {
        vec![FieldError {
            field: "body".to_string(),
            message: e.to_string(),
        }]
    })?;

    input.validate().map_err(|errors| {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| FieldError {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        fields
    })
}

// =============================================================================
// CONTROLLER SEAM
// =============================================================================

/// Business logic behind the authentication routes
#[async_trait]
pub trait AuthController: Send + Sync {
    /// Checked by the validation stage ahead of `initiate_signup`
    fn validate_signup_input(&self, payload: &Value) -> Result<(), Vec<FieldError>> {
        validate_signup_payload(payload)
    }

    async fn initiate_signup(&self, request: AuthRequest) -> Response;

    async fn verify_signup(&self, request: AuthRequest) -> Response;

    async fn initiate_login(&self, request: AuthRequest) -> Response;

    async fn verify_login(&self, request: AuthRequest) -> Response;

    /// Only reached once the authenticate stage has set `context.user`
    async fn complete_profile(&self, request: AuthRequest) -> Response;

    async fn verify_token(&self, request: AuthRequest) -> Response;

    async fn request_password_reset(&self, request: AuthRequest) -> Response;

    async fn reset_password(&self, request: AuthRequest) -> Response;
}

/// Stand-in used when no controller is wired; answers every action with 501
pub struct UnavailableController;

impl UnavailableController {
    fn respond(action: &str) -> Response {
        tracing::debug!(action, "No auth controller configured");
        AuthError::NotImplemented.into_response()
    }
}

#[async_trait]
impl AuthController for UnavailableController {
    async fn initiate_signup(&self, _request: AuthRequest) -> Response {
        Self::respond("initiate_signup")
    }

    async fn verify_signup(&self, _request: AuthRequest) -> Response {
        Self::respond("verify_signup")
    }

    async fn initiate_login(&self, _request: AuthRequest) -> Response {
        Self::respond("initiate_login")
    }

    async fn verify_login(&self, _request: AuthRequest) -> Response {
        Self::respond("verify_login")
    }

    async fn complete_profile(&self, _request: AuthRequest) -> Response {
        Self::respond("complete_profile")
    }

    async fn verify_token(&self, _request: AuthRequest) -> Response {
        Self::respond("verify_token")
    }

    async fn request_password_reset(&self, _request: AuthRequest) -> Response {
        Self::respond("request_password_reset")
    }

    async fn reset_password(&self, _request: AuthRequest) -> Response {
        Self::respond("reset_password")
    }
}

// =============================================================================
// AUTHENTICATION HANDLERS
// =============================================================================

/// POST /signup
pub async fn initiate_signup(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.initiate_signup(request).await,
        Err(e) => e.into_response(),
    }
}

/// POST /verify
pub async fn verify_signup(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.verify_signup(request).await,
        Err(e) => e.into_response(),
    }
}

/// POST /login
pub async fn initiate_login(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.initiate_login(request).await,
        Err(e) => e.into_response(),
    }
}

/// POST /verify-login
pub async fn verify_login(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.verify_login(request).await,
        Err(e) => e.into_response(),
    }
}

/// POST /profile
pub async fn complete_profile(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.complete_profile(request).await,
        Err(e) => e.into_response(),
    }
}

/// GET /verify-token
pub async fn verify_token(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.verify_token(request).await,
        Err(e) => e.into_response(),
    }
}

/// POST /forgot-password
pub async fn request_password_reset(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.request_password_reset(request).await,
        Err(e) => e.into_response(),
    }
}

/// POST /reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    context: RequestContext,
    body: Bytes,
) -> Response {
    match AuthRequest::from_body(context, &body) {
        Ok(request) => state.controller.reset_password(request).await,
        Err(e) => e.into_response(),
    }
}
