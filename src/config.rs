use serde::Deserialize;
use std::time::Duration;
use config::{Config as ConfigLoader, Environment, File};
use crate::error::{AppError, Result};
use crate::utils::time::TimeUnit;

pub const DEFAULT_ENDPOINT: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // General
    pub log_level: String,
    pub log_json: bool,

    // Rate limit: `request_limit` requests per one `time_unit`
    pub time_unit: TimeUnit,
    pub request_limit: u32,

    // HTTP
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            time_unit: TimeUnit::Minutes,
            request_limit: 10,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_ms: 2_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Defaults, then an optional `crpt.toml`, then `CRPT_*` environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let config: Self = ConfigLoader::builder()
            .set_default("log_level", defaults.log_level)?
            .set_default("log_json", defaults.log_json)?
            .set_default("time_unit", defaults.time_unit.to_string())?
            .set_default("request_limit", defaults.request_limit)?
            .set_default("endpoint", defaults.endpoint)?
            .set_default("connect_timeout_ms", defaults.connect_timeout_ms)?
            .set_default("request_timeout_ms", defaults.request_timeout_ms)?
            .add_source(File::with_name("crpt").required(false))
            .add_source(Environment::with_prefix("CRPT").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_limit == 0 {
            return Err(AppError::Init("request_limit must be positive".into()));
        }

        if self.time_unit.millis_per_unit() == 0 {
            return Err(AppError::Init(format!(
                "time_unit {} is shorter than one millisecond",
                self.time_unit
            )));
        }

        let url = url::Url::parse(&self.endpoint)
            .map_err(|e| AppError::Init(format!("Invalid endpoint {}: {}", self.endpoint, e)))?;
        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(AppError::Init(format!(
                "Endpoint must be http(s), got {}",
                url.scheme()
            )));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
