use crate::api::yahoo::ws::YAHOO_WS_URL;
use crate::error::StockWatchError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub websocket_uri: String,
    pub max_retries: u32,
    pub reconnection_delay_ms: u64,
    /// Capacity of the alert channel feeding the dispatcher.
    pub alert_buffer: usize,
    /// Without it alerts are only logged.
    pub email_settings: Option<EmailSettings>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSettings {
    pub from_email: String,
    pub to_email: String,
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub email_password: String,
    /// Upgrade the connection with STARTTLS before authenticating.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("from_email", &self.from_email)
            .field("to_email", &self.to_email)
            .field("smtp_server", &self.smtp_server)
            .field("smtp_port", &self.smtp_port)
            .field("email_password", &"<redacted>")
            .field("starttls", &self.starttls)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            websocket_uri: YAHOO_WS_URL.to_string(),
            max_retries: 5,
            reconnection_delay_ms: 1000,
            alert_buffer: 32,
            email_settings: None,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, StockWatchError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, StockWatchError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        debug!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, StockWatchError> {
        if !path.exists() {
            warn!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    fn validate(&self) -> Result<(), StockWatchError> {
        if self.websocket_uri.trim().is_empty() {
            return Err(StockWatchError::ConfigError(
                "websocket_uri must not be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(StockWatchError::ConfigError(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.alert_buffer == 0 {
            return Err(StockWatchError::ConfigError(
                "alert_buffer must be at least 1".to_string(),
            ));
        }
        if let Some(email) = &self.email_settings {
            for (name, value) in [
                ("from_email", &email.from_email),
                ("to_email", &email.to_email),
                ("smtp_server", &email.smtp_server),
            ] {
                if value.trim().is_empty() {
                    return Err(StockWatchError::ConfigError(format!(
                        "email_settings.{} must not be empty",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}
