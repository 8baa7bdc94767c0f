// Centralized configuration management for the auth backend
// All env vars are read once, at startup

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub otp_rate_limit: OtpRateLimitSettings,
    pub cors_allowed_origins: Vec<String>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub environment: Environment,
    /// Path the authentication routes are nested under
    pub auth_route_prefix: String,
    /// Take the client address from X-Forwarded-For / X-Real-IP instead of the socket peer
    pub trust_forwarded_headers: bool,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

/// JWT verification settings for the authenticate stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Quota applied to OTP-consuming routes, per client IP
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OtpRateLimitSettings {
    pub max_attempts: u32,
    pub window_seconds: u64,
}

impl Default for OtpRateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 900,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Helper function to get required env var
        let get_required = |key: &str| -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        };

        // Helper function to get optional env var with default
        let get_or_default = |key: &str, default: &str| -> String {
            env::var(key).unwrap_or_else(|_| default.to_string())
        };

        let parse_or_default = |key: &str, default: &str| -> Result<u32, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u32".to_string())
            })
        };

        let parse_u64_or_default = |key: &str, default: &str| -> Result<u64, ConfigError> {
            get_or_default(key, default).parse().map_err(|_| {
                ConfigError::InvalidValue(key.to_string(), "not a valid u64".to_string())
            })
        };

        let parse_bool_or_default = |key: &str, default: &str| -> bool {
            get_or_default(key, default).to_lowercase() == "true"
        };

        let bind_address = get_or_default("BIND_ADDRESS", "0.0.0.0:8080");
        let environment = Environment::from(get_or_default("ENVIRONMENT", "development"));
        let trust_forwarded_headers = parse_bool_or_default("TRUST_FORWARDED_HEADERS", "false");

        let auth_route_prefix = get_or_default("AUTH_ROUTE_PREFIX", "/api/auth");
        if !auth_route_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue(
                "AUTH_ROUTE_PREFIX".to_string(),
                "Prefix must start with '/'".to_string(),
            ));
        }

        let database = DatabaseConfig {
            url: get_required("DATABASE_URL")?,
            max_connections: parse_or_default("DATABASE_MAX_CONNECTIONS", "20")?,
            min_connections: parse_or_default("DATABASE_MIN_CONNECTIONS", "2")?,
            connect_timeout: parse_u64_or_default("DATABASE_CONNECT_TIMEOUT", "30")?,
            idle_timeout: parse_u64_or_default("DATABASE_IDLE_TIMEOUT", "600")?,
            max_lifetime: parse_u64_or_default("DATABASE_MAX_LIFETIME", "1800")?,
        };

        // JWT secret validation
        let access_secret = get_required("JWT_ACCESS_SECRET")?;
        if access_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "JWT_ACCESS_SECRET".to_string(),
                "Secret must be at least 32 characters long".to_string(),
            ));
        }
        let jwt = JwtConfig {
            access_secret,
            issuer: env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty()),
            audience: env::var("JWT_AUDIENCE").ok().filter(|s| !s.is_empty()),
        };

        let otp_rate_limit = OtpRateLimitSettings {
            max_attempts: parse_or_default("OTP_RATE_LIMIT_MAX_ATTEMPTS", "5")?,
            window_seconds: parse_u64_or_default("OTP_RATE_LIMIT_WINDOW_SECONDS", "900")?,
        };
        if otp_rate_limit.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "OTP_RATE_LIMIT_MAX_ATTEMPTS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        if otp_rate_limit.window_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "OTP_RATE_LIMIT_WINDOW_SECONDS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let cors_allowed_origins: Vec<String> = get_or_default("CORS_ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            server: ServerConfig {
                bind_address,
                environment,
                auth_route_prefix,
                trust_forwarded_headers,
            },
            database,
            jwt,
            otp_rate_limit,
            cors_allowed_origins,
        })
    }

    /// Check if running in development
    pub fn is_development(&self) -> bool {
        self.server.environment == Environment::Development
    }
}
