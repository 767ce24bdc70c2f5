#![allow(dead_code)]

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::core::config::Settings;

#[derive(Debug, Error)]
pub(crate) enum SecurityError {
    #[error("token encoding failed")]
    TokenEncoding,
    #[error("token rejected")]
    TokenRejected,
    #[error("unsupported jwt algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    pub(crate) exp: i64,
}

/// Compares the presented webhook token against the configured one by SHA-256
/// digest so the comparison does not short-circuit on the first differing byte.
pub(crate) fn verify_shared_token(presented: &str, configured: &str) -> bool {
    if configured.is_empty() {
        return false;
    }

    Sha256::digest(presented.as_bytes()) == Sha256::digest(configured.as_bytes())
}

pub(crate) fn verify_token(token: &str, settings: &Settings) -> Result<Claims, SecurityError> {
    let mut validation = Validation::new(algorithm_from_settings(settings)?);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.security().secret_key.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| SecurityError::TokenRejected)
}

/// Tokens are issued by the identity frontend; this service mints them only
/// for tests and local tooling.
pub(crate) fn create_access_token(
    subject: &str,
    settings: &Settings,
    expires_in: Option<Duration>,
) -> Result<String, SecurityError> {
    let algorithm = algorithm_from_settings(settings)?;
    let ttl = expires_in.unwrap_or_else(|| default_token_ttl(settings));
    let claims = Claims {
        sub: subject.to_string(),
        exp: (OffsetDateTime::now_utc() + ttl).unix_timestamp(),
    };

    encode(
        &jsonwebtoken::Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(settings.security().secret_key.as_bytes()),
    )
    .map_err(|_| SecurityError::TokenEncoding)
}

fn default_token_ttl(settings: &Settings) -> Duration {
    Duration::minutes(settings.security().access_token_expire_minutes as i64)
}

fn algorithm_from_settings(settings: &Settings) -> Result<Algorithm, SecurityError> {
    match settings.security().algorithm.as_str() {
        "HS256" => Ok(Algorithm::HS256),
        other => Err(SecurityError::UnsupportedAlgorithm(other.to_string())),
    }
}
