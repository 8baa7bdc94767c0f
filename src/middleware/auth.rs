// Bearer token verification for the authenticate stage

use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_config::JwtConfig;

/// Authenticated user information extracted from a verified token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: Option<String>,
    pub exp: u64,
}

/// Claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl From<AccessTokenClaims> for AuthenticatedUser {
    fn from(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            exp: claims.exp,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Token is invalid: {0}")]
    Invalid(String),
}

/// Checks bearer tokens for protected routes
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, TokenError>;
}

/// HS256 access-token verifier
pub struct JwtTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Self {
            decoding_key: DecodingKey::from_secret(config.access_secret.as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for JwtTokenVerifier {
    fn verify(&self, token: &str) -> Result<AuthenticatedUser, TokenError> {
        decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.into())
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}
