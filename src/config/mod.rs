//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The generator API key is wrapped in `secrecy::SecretString`
//! to keep it out of logs.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::queue::QueueConfig;
use crate::queue::manager::{DEFAULT_CONCURRENCY, DEFAULT_COOLDOWN, DEFAULT_EVENT_CAPACITY};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub generator_url: String,
    pub api_key: Option<SecretString>,
    pub request_timeout: Option<Duration>,
    pub queue: QueueConfig,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let queue = QueueConfig {
            concurrency: parsed_var("GENQ_CONCURRENCY")?.unwrap_or(DEFAULT_CONCURRENCY),
            cooldown: parsed_var("GENQ_COOLDOWN_MS")?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_COOLDOWN),
            event_capacity: parsed_var("GENQ_EVENT_CAPACITY")?.unwrap_or(DEFAULT_EVENT_CAPACITY),
        };
        if queue.concurrency == 0 {
            return Err(Error::Config("GENQ_CONCURRENCY must be at least 1".to_string()));
        }

        Ok(Self {
            generator_url: required_var("GENQ_GENERATOR_URL")?,
            api_key: std::env::var("GENQ_API_KEY").ok().map(SecretString::from),
            request_timeout: parsed_var("GENQ_REQUEST_TIMEOUT_SECS")?.map(Duration::from_secs),
            queue,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("invalid {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
