use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_u16,
    parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, GenerationSettings, QuizSettings,
    RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("SCROLLS_HOST", "0.0.0.0");
        let port = env_or_default("SCROLLS_PORT", "8000");

        let environment =
            parse_environment(env_optional("SCROLLS_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("SCROLLS_STRICT_CONFIG").is_some_and(|value| parse_bool(&value))
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Scrolls of Wisdom API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");
        let webhook_shared_token = env_or_default("WEBHOOK_SHARED_TOKEN", "");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "scrolls");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "scrolls_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let generator_base_url = env_or_default("GENERATOR_BASE_URL", "");
        let callback_base_url =
            env_or_default("GENERATOR_CALLBACK_BASE_URL", "http://localhost:8000");
        let dispatch_timeout_seconds = parse_u64(
            "GENERATOR_DISPATCH_TIMEOUT_SECONDS",
            env_or_default("GENERATOR_DISPATCH_TIMEOUT_SECONDS", "30"),
        )?;
        let job_ttl_seconds = parse_u64(
            "GENERATION_JOB_TTL_SECONDS",
            env_or_default("GENERATION_JOB_TTL_SECONDS", "1800"),
        )?;
        let job_sweep_interval_seconds = parse_u64(
            "GENERATION_JOB_SWEEP_INTERVAL_SECONDS",
            env_or_default("GENERATION_JOB_SWEEP_INTERVAL_SECONDS", "300"),
        )?;

        let submit_grace_seconds = parse_u64(
            "QUIZ_SUBMIT_GRACE_SECONDS",
            env_or_default("QUIZ_SUBMIT_GRACE_SECONDS", "30"),
        )?;
        let bundle_cache_ttl_seconds = parse_u64(
            "QUIZ_BUNDLE_CACHE_TTL_SECONDS",
            env_or_default("QUIZ_BUNDLE_CACHE_TTL_SECONDS", "300"),
        )?;
        let attempt_sweep_interval_seconds = parse_u64(
            "ATTEMPT_SWEEP_INTERVAL_SECONDS",
            env_or_default("ATTEMPT_SWEEP_INTERVAL_SECONDS", "300"),
        )?;
        let attempt_sweep_grace_seconds = parse_u64(
            "ATTEMPT_SWEEP_GRACE_SECONDS",
            env_or_default("ATTEMPT_SWEEP_GRACE_SECONDS", "120"),
        )?;

        let log_level = env_or_default("SCROLLS_LOG_LEVEL", "info");
        let json = env_optional("SCROLLS_LOG_JSON").is_some_and(|value| parse_bool(&value));
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").is_some_and(|value| parse_bool(&value));

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings {
                secret_key,
                access_token_expire_minutes,
                algorithm,
                webhook_shared_token,
            },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            generation: GenerationSettings {
                generator_base_url,
                callback_base_url,
                dispatch_timeout_seconds,
                job_ttl_seconds,
                job_sweep_interval_seconds,
            },
            quiz: QuizSettings {
                submit_grace_seconds,
                bundle_cache_ttl_seconds,
                attempt_sweep_interval_seconds,
                attempt_sweep_grace_seconds,
            },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn generation(&self) -> &GenerationSettings {
        &self.generation
    }

    pub(crate) fn quiz(&self) -> &QuizSettings {
        &self.quiz
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.job_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GENERATION_JOB_TTL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.generation.job_sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "GENERATION_JOB_SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.quiz.attempt_sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ATTEMPT_SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        // A grace window past the deadline should stay a grace window.
        if self.quiz.submit_grace_seconds > 600 {
            return Err(ConfigError::InvalidValue {
                field: "QUIZ_SUBMIT_GRACE_SECONDS",
                value: self.quiz.submit_grace_seconds.to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.security.webhook_shared_token.is_empty() {
            return Err(ConfigError::MissingSecret("WEBHOOK_SHARED_TOKEN"));
        }
        if self.generation.generator_base_url.is_empty() {
            return Err(ConfigError::MissingSecret("GENERATOR_BASE_URL"));
        }

        Ok(())
    }
}
