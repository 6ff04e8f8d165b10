use std::env;

use thiserror::Error;

/// Environment-driven configuration for the session engine.
#[derive(Debug, Clone)]
pub struct Settings {
    api: ApiSettings,
    session: SessionSettings,
    telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_token: String,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
}

/// Timing knobs of the take-session. The settle delay is the wait inserted
/// between deleting stale answers and inserting replacements, to tolerate the
/// backend's asynchronous propagation; it is configurable rather than a
/// hardcoded multi-second sleep, and tests run it at zero.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub debounce_ms: u64,
    pub settle_delay_ms: u64,
    pub tick_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    pub log_level: String,
    pub json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("missing required value for {0}")]
    MissingValue(&'static str),
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let base_url = env_or_default("EDULIT_API_BASE_URL", "http://localhost:8000/api/v1");
        let api_token = env_or_default("EDULIT_API_TOKEN", "");
        let connect_timeout_seconds = parse_u64(
            "EDULIT_CONNECT_TIMEOUT_SECONDS",
            env_or_default("EDULIT_CONNECT_TIMEOUT_SECONDS", "10"),
        )?;
        let request_timeout_seconds = parse_u64(
            "EDULIT_REQUEST_TIMEOUT_SECONDS",
            env_or_default("EDULIT_REQUEST_TIMEOUT_SECONDS", "30"),
        )?;

        let debounce_ms =
            parse_u64("EDULIT_DEBOUNCE_MS", env_or_default("EDULIT_DEBOUNCE_MS", "1000"))?;
        let settle_delay_ms =
            parse_u64("EDULIT_SETTLE_DELAY_MS", env_or_default("EDULIT_SETTLE_DELAY_MS", "300"))?;
        let tick_interval_ms =
            parse_u64("EDULIT_TICK_INTERVAL_MS", env_or_default("EDULIT_TICK_INTERVAL_MS", "1000"))?;

        let log_level = env_or_default("EDULIT_LOG_LEVEL", "info");
        let json = env_optional("EDULIT_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            api: ApiSettings {
                base_url,
                api_token,
                connect_timeout_seconds,
                request_timeout_seconds,
            },
            session: SessionSettings { debounce_ms, settle_delay_ms, tick_interval_ms },
            telemetry: TelemetrySettings { log_level, json },
        };

        settings.validate()?;

        Ok(settings)
    }

    pub fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub fn session(&self) -> &SessionSettings {
        &self.session
    }

    pub fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("EDULIT_API_BASE_URL"));
        }
        if self.session.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "EDULIT_TICK_INTERVAL_MS",
                value: String::from("0"),
            });
        }
        Ok(())
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}
