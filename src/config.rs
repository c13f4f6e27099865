//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;

/// Configuration could not be loaded or is unusable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] envy::Error),

    /// A zero validity window would issue tokens that are expired on arrival.
    #[error("{0} must be greater than zero")]
    ZeroTtl(&'static str),
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (optional): PostgreSQL connection string. Without it the
///   service keeps tokens in memory, which is only suitable for development.
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool size, defaults to 5
/// - `ATTENDANCE_TOKEN_TTL_SECS` (optional): attendance token validity, defaults to 30
/// - `REGISTRATION_TOKEN_TTL_SECS` (optional): registration token validity, defaults to 600
/// - `API_KEY_HASHES` (optional): comma-separated SHA-256 hex digests of accepted API keys.
///   Authentication is disabled when empty.
/// - `ATTENDANCE_WEBHOOK_URL` / `ATTENDANCE_WEBHOOK_SECRET` (optional): check-in notifications
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default = "default_attendance_ttl")]
    pub attendance_token_ttl_secs: u32,

    #[serde(default = "default_registration_ttl")]
    pub registration_token_ttl_secs: u32,

    #[serde(default)]
    pub api_key_hashes: Vec<String>,

    pub attendance_webhook_url: Option<String>,

    pub attendance_webhook_secret: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    5
}

/// Attendance QR codes are only valid for a short scan window.
fn default_attendance_ttl() -> u32 {
    30
}

fn default_registration_ttl() -> u32 {
    600
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Environment variable values cannot be parsed into expected types
    /// - A token validity window is zero
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: database_url -> DATABASE_URL
        envy::from_env::<Config>()?.validated()
    }

    /// Load configuration from an explicit list of key/value pairs.
    ///
    /// Keys use the same upper-case names as the environment.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter::<_, Config>(pairs)?.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.attendance_token_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl("ATTENDANCE_TOKEN_TTL_SECS"));
        }
        if self.registration_token_ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl("REGISTRATION_TOKEN_TTL_SECS"));
        }
        Ok(self)
    }

    /// The webhook target and its signing secret, when both are configured.
    pub fn attendance_webhook(&self) -> Option<(&str, &str)> {
        match (&self.attendance_webhook_url, &self.attendance_webhook_secret) {
            (Some(url), Some(secret)) => Some((url.as_str(), secret.as_str())),
            _ => None,
        }
    }
}
