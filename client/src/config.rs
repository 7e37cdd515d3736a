use std::{env, time::Duration};

use crate::error::{ClientError, Result};

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Configuración del cliente.
/// - En Docker: WIZARD_API_URL=http://sandbox:8080
/// - Local: default http://localhost:8080
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Lee WIZARD_API_URL, POLL_INTERVAL_MS y HTTP_TIMEOUT_SECS.
    /// Las que no estén definidas quedan con su default.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = env::var("WIZARD_API_URL") {
            config.api_url = url;
        }
        if let Some(ms) = parse_var("POLL_INTERVAL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var("HTTP_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "api_url debe ser http(s): {}",
                self.api_url
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::Config(
                "poll_interval tiene que ser mayor a cero".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var(name: &str) -> Result<Option<u64>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ClientError::Config(format!("{name} inválido: {raw:?}"))),
        Err(_) => Ok(None),
    }
}
