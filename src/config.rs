//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects everything as environment variables; a `.env` file is
//! honoured for local development.

use std::env;

/// Default region the callable is deployed to.
pub const DEFAULT_REGION: &str = "us-west2";
/// Provisional loan period shown while scanning copies.
pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;
/// Accepted range for `LOAN_PERIOD_DAYS`.
pub const LOAN_PERIOD_DAYS_RANGE: std::ops::RangeInclusive<i64> = 1..=365;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// GCP / Firebase project ID (Firestore project, ID token audience)
    pub gcp_project_id: String,
    /// GCP project number (App Check token audience)
    pub gcp_project_number: String,
    /// Region the callable is scoped to
    pub region: String,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Days until a newly scanned copy is due
    pub loan_period_days: i64,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            gcp_project_id: "test-project".to_string(),
            gcp_project_number: "123456789".to_string(),
            region: DEFAULT_REGION.to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            port: 8080,
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            gcp_project_id: env::var("GCP_PROJECT_ID")
                .map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?,
            gcp_project_number: env::var("GCP_PROJECT_NUMBER")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GCP_PROJECT_NUMBER"))?,
            region: env::var("FUNCTIONS_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8080)?,
            loan_period_days: loan_period_days()?,
        })
    }
}

fn loan_period_days() -> Result<i64, ConfigError> {
    let days = parse_or("LOAN_PERIOD_DAYS", DEFAULT_LOAN_PERIOD_DAYS)?;
    if !LOAN_PERIOD_DAYS_RANGE.contains(&days) {
        return Err(ConfigError::Invalid("LOAN_PERIOD_DAYS", days.to_string()));
    }
    Ok(days)
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("GCP_PROJECT_ID", "library-test");
        env::set_var("GCP_PROJECT_NUMBER", " 42 ");
        env::set_var("LOAN_PERIOD_DAYS", "21");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.gcp_project_id, "library-test");
        assert_eq!(config.gcp_project_number, "42");
        assert_eq!(config.loan_period_days, 21);
        assert_eq!(config.port, 8080);

        for bad in ["two weeks", "0", "-7", "366", "9223372036854775807"] {
            env::set_var("LOAN_PERIOD_DAYS", bad);
            assert!(
                matches!(
                    Config::from_env(),
                    Err(ConfigError::Invalid("LOAN_PERIOD_DAYS", _))
                ),
                "LOAN_PERIOD_DAYS={bad} should be rejected"
            );
        }

        env::set_var("LOAN_PERIOD_DAYS", "365");
        assert_eq!(Config::from_env().unwrap().loan_period_days, 365);
        env::remove_var("LOAN_PERIOD_DAYS");
    }
}
