//! Engine configuration
//!
//! Environment-backed, with defaults that make a local mock-mode run work
//! with no environment at all.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Fallback cloud region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default scheduler cadence: every minute
pub const DEFAULT_CRON: &str = "*/1 * * * *";

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 4000;

/// Default database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:finops.db?mode=rwc";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection string
    pub database_url: String,
    /// Cloud default region
    pub aws_region: String,
    /// Scheduler cron expression
    pub scheduler_cron: String,
    /// HTTP listen port
    pub port: u16,
    /// Serve synthetic fixtures instead of calling AWS
    pub mock_mode: bool,
}

impl Config {
    /// Load configuration from the environment, applying defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| Error::config(format!("PORT must be a port number, got '{raw}'")))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            database_url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            aws_region: env_or("AWS_DEFAULT_REGION", DEFAULT_REGION),
            scheduler_cron: env_or("SCHEDULER_CRON", DEFAULT_CRON),
            port,
            mock_mode: bool_env("MOCK_MODE"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            aws_region: DEFAULT_REGION.to_string(),
            scheduler_cron: DEFAULT_CRON.to_string(),
            port: DEFAULT_PORT,
            mock_mode: false,
        }
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn bool_env(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("True")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.scheduler_cron, "*/1 * * * *");
        assert_eq!(config.port, 4000);
        assert!(!config.mock_mode);
    }
}
