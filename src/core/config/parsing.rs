use std::env;
use std::str::FromStr;

use super::types::{ConfigError, Environment};

const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "https://scrollsofwisdom.com",
    "https://www.scrollsofwisdom.com",
];

pub(super) fn env_optional(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_from<T: FromStr>(field: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    parse_from(field, value)
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    parse_from(field, value)
}

/// `BACKEND_CORS_ORIGINS` accepts either a JSON array or a comma list; blank
/// or empty input falls back to the built-in origins.
pub(super) fn parse_cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let raw = match value {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(default_cors_origins()),
    };

    let items: Vec<String> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?
    } else {
        raw.split(',').map(|item| item.trim().to_string()).filter(|item| !item.is_empty()).collect()
    };

    if items.is_empty() {
        return Ok(default_cors_origins());
    }
    Ok(items)
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    let Some(raw) = value else { return Environment::Development };

    match raw.to_ascii_lowercase().as_str() {
        "production" | "prod" => Environment::Production,
        "staging" => Environment::Staging,
        "test" | "testing" => Environment::Test,
        _ => Environment::Development,
    }
}

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|item| item.to_string()).collect()
}
