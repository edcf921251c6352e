//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults suitable for local development.

use std::env;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port.
    pub port: u16,

    /// Path to the SQLite database file.
    pub database_path: String,

    /// Shared secret for verifying bearer tokens issued by the auth service.
    pub jwt_secret: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            port: env::var("KHATA_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("KHATA_PORT".to_string()))?,

            database_path: env::var("KHATA_DATABASE_PATH")
                .unwrap_or_else(|_| "./khata.db".to_string()),

            jwt_secret: env::var("KHATA_JWT_SECRET")
                // In production this MUST be set via environment variable and
                // match the auth service's signing secret.
                .unwrap_or_else(|_| "khata-dev-secret-change-in-production".to_string()),
        };

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
