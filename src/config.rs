/// Configuration management for the Eventide server
use crate::error::{AppError, AppResult};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Tracing filter used when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "eventide=debug,tower_http=debug";

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Token signing configuration
///
/// Access and refresh tokens are signed with separate secrets so a leak of
/// one does not let an attacker forge the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub algorithm: Algorithm,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_minutes: i64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Requests per second for the unauthenticated auth endpoints
    pub auth_rps: u32,
    /// Requests per second for authenticated API calls
    pub api_rps: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("EVENTIDE_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("EVENTIDE_PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let version = env::var("EVENTIDE_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("EVENTIDE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("EVENTIDE_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("eventide.sqlite"));

        let access_token_secret = env::var("EVENTIDE_ACCESS_TOKEN_SECRET")
            .map_err(|_| AppError::Validation("Access token secret required".to_string()))?;
        let refresh_token_secret = env::var("EVENTIDE_REFRESH_TOKEN_SECRET")
            .map_err(|_| AppError::Validation("Refresh token secret required".to_string()))?;
        let algorithm = parse_algorithm(
            &env::var("EVENTIDE_JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
        )?;
        let access_token_ttl_minutes = env::var("EVENTIDE_ACCESS_EXPIRE_MIN")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid access token lifetime".to_string()))?;
        let refresh_token_ttl_minutes = env::var("EVENTIDE_REFRESH_EXPIRE_MIN")
            .unwrap_or_else(|_| (60 * 24).to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid refresh token lifetime".to_string()))?;

        let rate_limit_enabled = env::var("EVENTIDE_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let auth_rps = env::var("EVENTIDE_RATE_LIMIT_AUTH_RPS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let api_rps = env::var("EVENTIDE_RATE_LIMIT_API_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let burst_size = env::var("EVENTIDE_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                access_token_secret,
                refresh_token_secret,
                algorithm,
                access_token_ttl_minutes,
                refresh_token_ttl_minutes,
            },
            rate_limit: RateLimitSettings {
                enabled: rate_limit_enabled,
                auth_rps,
                api_rps,
                burst_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        self.authentication.validate()
    }
}

impl AuthConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.access_token_secret.len() < 32 || self.refresh_token_secret.len() < 32 {
            return Err(AppError::Validation(
                "Token secrets must be at least 32 characters".to_string(),
            ));
        }

        if self.access_token_secret == self.refresh_token_secret {
            return Err(AppError::Validation(
                "Access and refresh token secrets must differ".to_string(),
            ));
        }

        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_minutes <= 0 {
            return Err(AppError::Validation(
                "Token lifetimes must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Only HMAC algorithms are supported since both keys are shared secrets
fn parse_algorithm(name: &str) -> AppResult<Algorithm> {
    let algorithm = Algorithm::from_str(name)
        .map_err(|_| AppError::Validation(format!("Unknown JWT algorithm: {}", name)))?;

    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(AppError::Validation(format!(
            "Unsupported JWT algorithm {}; use HS256, HS384 or HS512",
            name
        ))),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 8000,
            version: "0.1.0".to_string(),
        },
        storage: StorageConfig {
            data_directory: PathBuf::from("./data"),
            database: PathBuf::from(":memory:"),
        },
        authentication: AuthConfig {
            access_token_secret: "test-access-secret-key-for-testing-only".to_string(),
            refresh_token_secret: "test-refresh-secret-key-for-testing-only".to_string(),
            algorithm: Algorithm::HS256,
            access_token_ttl_minutes: 15,
            refresh_token_ttl_minutes: 60 * 24,
        },
        rate_limit: RateLimitSettings {
            enabled: false,
            auth_rps: 5,
            api_rps: 100,
            burst_size: 50,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = test_config();
        config.authentication.access_token_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_shared_secret_rejected() {
        let mut config = test_config();
        config.authentication.refresh_token_secret =
            config.authentication.access_token_secret.clone();
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("HS512").unwrap(), Algorithm::HS512);
        assert!(parse_algorithm("RS256").is_err());
        assert!(parse_algorithm("nope").is_err());
    }
}
