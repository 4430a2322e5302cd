use super::parsing::{
    env_flag, env_optional, env_or_default, numeric_setting, parse_cors_origins,
    parse_environment,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExamSettings, GraderSettings,
    NotifierSettings, ReviewSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort,
    ServerSettings, Settings, TelemetrySettings,
};

const DEV_SECRET_KEY: &str = "insecure-dev-secret";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("LINGVO_HOST", "0.0.0.0");
        let port = env_or_default("LINGVO_PORT", "8000");

        let environment =
            parse_environment(env_optional("LINGVO_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config = env_flag("LINGVO_STRICT_CONFIG") || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Lingvo API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = env_or_default("SECRET_KEY", DEV_SECRET_KEY);
        let access_token_expire_minutes =
            numeric_setting::<u64>("ACCESS_TOKEN_EXPIRE_MINUTES", "10080")?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = numeric_setting::<u16>("POSTGRES_PORT", "5432")?;
        let postgres_user = env_or_default("POSTGRES_USER", "lingvo");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "lingvo_db");
        let database_url = env_optional("DATABASE_URL");

        let sweep_interval_seconds = numeric_setting::<u64>("SWEEP_INTERVAL_SECONDS", "300")?;

        let review_stale_hours = numeric_setting::<u64>("REVIEW_STALE_HOURS", "12")?;
        let review_capacity = numeric_setting::<u64>("REVIEW_CAPACITY", "10")?;

        let grader_base_url = env_or_default("GRADER_BASE_URL", "");
        let grader_api_key = env_or_default("GRADER_API_KEY", "");
        let grader_timeout_seconds = numeric_setting::<u64>("GRADER_TIMEOUT_SECONDS", "60")?;
        let grader_max_retries = numeric_setting::<u32>("GRADER_MAX_RETRIES", "3")?;

        let bot_token = env_or_default("TELEGRAM_BOT_TOKEN", "");
        let reviewers_chat_id = env_or_default("TELEGRAM_REVIEWERS_CHAT_ID", "");
        let results_chat_id = env_or_default("TELEGRAM_RESULTS_CHAT_ID", "");

        let log_level = env_or_default("LOG_LEVEL", "info");
        let json = env_flag("LOG_JSON");
        let prometheus_enabled = env_flag("PROMETHEUS_ENABLED");

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            exam: ExamSettings { sweep_interval_seconds },
            review: ReviewSettings { stale_hours: review_stale_hours, capacity: review_capacity },
            grader: GraderSettings {
                base_url: grader_base_url,
                api_key: grader_api_key,
                timeout_seconds: grader_timeout_seconds,
                max_retries: grader_max_retries,
            },
            notifier: NotifierSettings { bot_token, reviewers_chat_id, results_chat_id },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
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

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn review(&self) -> &ReviewSettings {
        &self.review
    }

    pub(crate) fn grader(&self) -> &GraderSettings {
        &self.grader
    }

    pub(crate) fn notifier(&self) -> &NotifierSettings {
        &self.notifier
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.exam.sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.review.stale_hours == 0 {
            return Err(ConfigError::InvalidValue {
                field: "REVIEW_STALE_HOURS",
                value: "0".to_string(),
            });
        }

        if self.review.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "REVIEW_CAPACITY",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.security.secret_key.is_empty() || self.security.secret_key == DEV_SECRET_KEY {
            return Err(ConfigError::MissingSecret("SECRET_KEY"));
        }
        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.grader.base_url.is_empty() {
            return Err(ConfigError::MissingSecret("GRADER_BASE_URL"));
        }
        if self.grader.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("GRADER_API_KEY"));
        }

        Ok(())
    }
}
