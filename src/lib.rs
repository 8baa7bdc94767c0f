// Library exports for the auth backend
// Route table for the signup/login/OTP/password-reset flows plus the
// security event logger they report to

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

// Re-export commonly used types
pub use app::AppState;
pub use app_config::AppConfig;
pub use db::{create_diesel_pool, DieselDatabaseConfig, DieselPool};
pub use handlers::{auth_routes, AuthController, AuthRequest, UnavailableController};
pub use middleware::{AuthenticatedUser, JwtTokenVerifier, OtpLimiter, TokenVerifier};
pub use models::{NewSecurityLog, SecurityEventKind, UserId};
pub use services::{
    DieselSecurityLogStore, LogOutcome, SecurityEvent, SecurityLogStore, SecurityLogger,
};
pub use utils::{AuthError, ClientIpSource, RequestContext};

/// Mounting options for `build_router`
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub auth_route_prefix: String,
    pub cors_allowed_origins: Vec<String>,
    pub client_ip_source: ClientIpSource,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            auth_route_prefix: "/api/auth".to_string(),
            cors_allowed_origins: vec!["*".to_string()],
            client_ip_source: ClientIpSource::Peer,
        }
    }
}

impl From<&AppConfig> for RouterOptions {
    fn from(config: &AppConfig) -> Self {
        let client_ip_source = if config.server.trust_forwarded_headers {
            ClientIpSource::Forwarded
        } else {
            ClientIpSource::Peer
        };

        Self {
            auth_route_prefix: config.server.auth_route_prefix.clone(),
            cors_allowed_origins: config.cors_allowed_origins.clone(),
            client_ip_source,
        }
    }
}

/// Build the application state from configuration.
/// The controller is supplied by the embedding application.
pub async fn initialize_app_state(
    config: &AppConfig,
    controller: Arc<dyn AuthController>,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    tracing::info!("Initializing database pool...");
    let diesel_pool = create_diesel_pool(DieselDatabaseConfig::from(&config.database)).await?;

    let store = Arc::new(DieselSecurityLogStore::new(diesel_pool));

    Ok(AppState {
        controller,
        token_verifier: Arc::new(JwtTokenVerifier::new(&config.jwt)),
        otp_limiter: Arc::new(OtpLimiter::new(config.otp_rate_limit)),
        security_logger: SecurityLogger::new(store),
    })
}

/// Full HTTP surface: auth routes under the configured prefix plus /health
pub fn build_router(state: AppState, options: &RouterOptions) -> Router {
    let auth = auth_routes(&state);
    let prefix = options.auth_route_prefix.trim_end_matches('/');

    let router = Router::new().route("/health", get(health_check));
    let router = if prefix.is_empty() {
        router.merge(auth)
    } else {
        router.nest(prefix, auth)
    };

    router
        .layer(Extension(options.client_ip_source))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&options.cors_allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

// Health check handler
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    let timestamp = chrono::Utc::now().to_rfc3339();

    let (healthy, database) = match state.security_logger.store().health_check().await {
        Ok(()) => (
            true,
            serde_json::json!({
                "status": "healthy",
                "error": null
            }),
        ),
        Err(e) => (
            false,
            serde_json::json!({
                "status": "unhealthy",
                "error": format!("Database connection failed: {}", e)
            }),
        ),
    };

    let response = serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "auth-backend",
        "timestamp": timestamp,
        "components": {
            "database": database
        }
    });

    if healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
