//! Application settings loading from config.toml
//!
//! Settings come from a TOML file and are then overridden by environment
//! variables, so secrets such as the gateway key can stay out of the file.
//! The resulting [`Settings`] value is passed explicitly to the components that
//! need it; nothing reads global state after start-up.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Database URL, overridden by `DATABASE_URL`
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Payment gateway settings
    pub gateway: GatewayConfig,
    /// Notification fan-out settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Payment gateway connection settings.
#[derive(Deserialize, Clone)]
pub struct GatewayConfig {
    /// Merchant ID assigned by the gateway (`pg_merchant_id`)
    pub merchant_id: String,
    /// Shared secret appended to every signature
    #[serde(default)]
    pub secret_key: String,
    /// URL of the session initialisation script
    #[serde(default = "default_init_url")]
    pub init_url: String,
    /// URL of the status script
    #[serde(default = "default_status_url")]
    pub status_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl GatewayConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("merchant_id", &self.merchant_id)
            .field("secret_key", &"<redacted>")
            .field("init_url", &self.init_url)
            .field("status_url", &self.status_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Notification delivery settings.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// How many times one notification is attempted before it is dropped
    #[serde(default = "default_notify_attempts")]
    pub notify_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_notify_backoff_ms")]
    pub notify_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            notify_attempts: default_notify_attempts(),
            notify_backoff_ms: default_notify_backoff_ms(),
        }
    }
}

fn default_database_url() -> String {
    super::database::DEFAULT_DATABASE_URL.to_string()
}

fn default_init_url() -> String {
    "https://api.freedompay.kg/init_payment.php".to_string()
}

fn default_status_url() -> String {
    "https://api.freedompay.kg/g2g/status_v2".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_notify_attempts() -> u32 {
    3
}

const fn default_notify_backoff_ms() -> u64 {
    500
}

impl Settings {
    /// Parses settings from TOML text without touching the environment.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })
    }

    /// Applies `DATABASE_URL`, `FREEDOMPAY_MERCHANT_ID` and `FREEDOMPAY_SECRET_KEY`
    /// from the environment when they are set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        if let Ok(merchant_id) = std::env::var("FREEDOMPAY_MERCHANT_ID") {
            self.gateway.merchant_id = merchant_id;
        }
        if let Ok(secret) = std::env::var("FREEDOMPAY_SECRET_KEY") {
            self.gateway.secret_key = secret;
        }
        self
    }

    /// Checks the values that have no sensible default.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.merchant_id.trim().is_empty() {
            return Err(Error::Config {
                message: "gateway.merchant_id must not be empty".to_string(),
            });
        }
        if self.gateway.secret_key.is_empty() {
            return Err(Error::Config {
                message: "gateway secret key is not set (FREEDOMPAY_SECRET_KEY)".to_string(),
            });
        }
        if self.dispatch.notify_attempts == 0 {
            return Err(Error::Config {
                message: "dispatch.notify_attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Loads settings from a TOML file and applies environment overrides.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required values are missing after overrides
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    tracing::debug!("Loading settings from {}", path.display());
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;

    let settings = Settings::from_toml(&contents)?.with_env_overrides();
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from the default location (./config.toml)
pub fn load_default_settings() -> Result<Settings> {
    load_settings("config.toml")
}
