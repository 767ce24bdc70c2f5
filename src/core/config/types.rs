use thiserror::Error;

/// Process configuration, loaded once at startup from the environment.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) server: ServerSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) security: SecuritySettings,
    pub(super) cors: CorsSettings,
    pub(super) database: DatabaseSettings,
    pub(super) redis: RedisSettings,
    pub(super) generation: GenerationSettings,
    pub(super) quiz: QuizSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid SCROLLS_HOST: {0:?}")]
    InvalidHost(String),
    #[error("invalid SCROLLS_PORT: {0:?}")]
    InvalidPort(String),
    #[error("could not parse {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("BACKEND_CORS_ORIGINS is neither a JSON array nor a comma list: {0:?}")]
    InvalidCors(String),
    #[error("{0} must be set when strict config is enabled")]
    MissingSecret(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Production,
    Staging,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(super) host: ServerHost,
    pub(super) port: ServerPort,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerHost(pub(super) String);

impl ServerHost {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidHost(value));
        }
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPort(pub(super) u16);

impl ServerPort {
    pub(super) fn parse(value: String) -> Result<Self, ConfigError> {
        match value.parse::<u16>() {
            Ok(port) if port != 0 => Ok(Self(port)),
            _ => Err(ConfigError::InvalidPort(value)),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
    pub(crate) api_v1_str: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SecuritySettings {
    pub(crate) secret_key: String,
    pub(crate) access_token_expire_minutes: u64,
    pub(crate) algorithm: String,
    /// Shared token the question generator must present on webhook callbacks.
    pub(crate) webhook_shared_token: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) postgres_server: String,
    pub(crate) postgres_port: u16,
    pub(crate) postgres_user: String,
    pub(crate) postgres_password: String,
    pub(crate) postgres_db: String,
    pub(crate) database_url: Option<String>,
}

impl DatabaseSettings {
    /// `DATABASE_URL` wins over the discrete `POSTGRES_*` parts.
    pub(crate) fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.postgres_user,
                self.postgres_password,
                self.postgres_server,
                self.postgres_port,
                self.postgres_db
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RedisSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) db: u16,
    pub(crate) password: String,
}

impl RedisSettings {
    pub(crate) fn redis_url(&self) -> String {
        let auth =
            if self.password.is_empty() { String::new() } else { format!(":{}@", self.password) };
        format!("redis://{}{}:{}/{}", auth, self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GenerationSettings {
    /// Base URL of the external question generator; empty disables dispatch.
    pub(crate) generator_base_url: String,
    /// Public base URL of this service, used to build the callback URL.
    pub(crate) callback_base_url: String,
    pub(crate) dispatch_timeout_seconds: u64,
    pub(crate) job_ttl_seconds: u64,
    pub(crate) job_sweep_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct QuizSettings {
    pub(crate) submit_grace_seconds: u64,
    /// TTL for the sanitized question bundle cache; 0 disables caching.
    pub(crate) bundle_cache_ttl_seconds: u64,
    pub(crate) attempt_sweep_interval_seconds: u64,
    pub(crate) attempt_sweep_grace_seconds: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}
