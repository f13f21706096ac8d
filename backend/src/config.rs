//! Configuration management for the reconciliation server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with RECON_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::DeductionOverflowPolicy;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Reconciliation engine configuration
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Upper bound for a single request, including its transaction
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct EngineConfig {
    /// What to do when discount plus sample loss exceeds the original weight
    pub deduction_overflow_policy: DeductionOverflowPolicy,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("RECON_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default(
                "engine.deduction_overflow_policy",
                DeductionOverflowPolicy::default().as_str(),
            )?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RECON_ prefix)
            .add_source(
                Environment::with_prefix("RECON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_policy_deserializes_from_snake_case() {
        let engine: EngineConfig =
            serde_json::from_str(r#"{"deduction_overflow_policy":"reject"}"#).unwrap();
        assert_eq!(engine.deduction_overflow_policy, DeductionOverflowPolicy::Reject);
    }

    #[test]
    fn test_default_policy_clamps() {
        assert_eq!(
            EngineConfig::default().deduction_overflow_policy,
            DeductionOverflowPolicy::ClampWithWarning
        );
    }
}
