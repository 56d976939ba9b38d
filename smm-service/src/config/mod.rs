//! Configuration module for smm-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SmmConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store_backend: StoreBackend,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown STORE_BACKEND '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Required when the Postgres backend is selected.
    pub url: Option<Secret<String>>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub reconcile_interval_secs: u64,
    pub rate_sync_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reconcile_interval_secs: 300,
            rate_sync_interval_secs: 3600,
        }
    }
}

/// Read `name`, falling back to `default` only when it is unset.
fn parsed<T: FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}'", name, raw))
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(_)) => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is not valid unicode",
            name
        ))),
    }
}

impl SmmConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let store_backend = env::var("STORE_BACKEND")
            .map(|s| s.parse())
            .unwrap_or(Ok(StoreBackend::Postgres))?;

        let database_url = env::var("DATABASE_URL").ok().map(Secret::new);
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_URL is required"
            )));
        }

        let timeout_secs = parsed("PROVIDER_TIMEOUT_SECS", 30u64)?;
        if timeout_secs == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PROVIDER_TIMEOUT_SECS must be greater than zero"
            )));
        }

        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            enabled: parsed("SCHEDULER_ENABLED", defaults.enabled)?,
            reconcile_interval_secs: parsed(
                "RECONCILE_INTERVAL_SECS",
                defaults.reconcile_interval_secs,
            )?
            .max(1),
            rate_sync_interval_secs: parsed(
                "RATE_SYNC_INTERVAL_SECS",
                defaults.rate_sync_interval_secs,
            )?
            .max(1),
        };

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "smm-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            store_backend,
            database: DatabaseConfig {
                url: database_url,
                max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parsed("DATABASE_MIN_CONNECTIONS", 2)?,
            },
            provider: ProviderConfig { timeout_secs },
            scheduler,
        })
    }

    /// In-memory configuration with the scheduler off, for tests.
    pub fn for_memory() -> Self {
        Self {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            service_name: "smm-service".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            store_backend: StoreBackend::Memory,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                min_connections: 2,
            },
            provider: ProviderConfig { timeout_secs: 30 },
            scheduler: SchedulerConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }
}
