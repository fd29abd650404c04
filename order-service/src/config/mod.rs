use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use service_core::error::AppError;
use service_core::retry::RetryPolicy;
use std::time::Duration;

/// Environment prefix: `ORDER__DATABASE__URL`, `ORDER__SERVER__PORT`, ...
pub const ENV_PREFIX: &str = "ORDER";

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Mongo,
    Memory,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Conflict retries before a write surfaces `concurrency_conflict`.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub default_tax_rate: Decimal,
    /// Capacity of the activity log queue.
    pub activity_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3010,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: Secret::new("mongodb://localhost:27017".to_string()),
            db_name: "order_db".to_string(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 10,
            default_tax_rate: Decimal::from(18),
            activity_buffer: 1024,
        }
    }
}

impl LifecycleConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
        )
    }
}

fn default_service_name() -> String {
    "order-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        service_core::config::load(ENV_PREFIX)
    }

    /// In-memory backend on an ephemeral port, with a retry budget sized for
    /// deliberately contended writers.
    pub fn for_tests() -> Self {
        Self {
            service_name: default_service_name(),
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            database: DatabaseConfig::default(),
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            lifecycle: LifecycleConfig {
                max_retries: 20,
                initial_backoff_ms: 1,
                ..LifecycleConfig::default()
            },
            log_level: "debug".to_string(),
            otlp_endpoint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_defaults() {
        std::env::set_var("ORDERCFGTEST__STORAGE__BACKEND", "memory");
        std::env::set_var("ORDERCFGTEST__LIFECYCLE__MAX_RETRIES", "9");
        std::env::set_var("ORDERCFGTEST__LIFECYCLE__INITIAL_BACKOFF_MS", "5");
        std::env::set_var("ORDERCFGTEST__LIFECYCLE__DEFAULT_TAX_RATE", "12");
        std::env::set_var("ORDERCFGTEST__LIFECYCLE__ACTIVITY_BUFFER", "64");
        let config: Config = service_core::config::load("ORDERCFGTEST").unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.lifecycle.max_retries, 9);
        assert_eq!(config.lifecycle.default_tax_rate, Decimal::from(12));
        assert_eq!(config.server.port, 3010);
        assert_eq!(config.log_level, "info");
    }
}
