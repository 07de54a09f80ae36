//! Typed configuration from environment variables.
//!
//! Loads once at startup. Guard and batch tuning knobs are validated and
//! clamped with a warning rather than failing, so a bad value degrades to
//! a sane default instead of taking the service down.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;
use crate::guard::GuardConfig;
use crate::registry::RegistryConfig;

/// Runtime configuration for a workreg process.
#[derive(Debug)]
pub struct Config {
    /// Store file used by the CLI backend.
    pub store_path: PathBuf,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub registry: RegistryConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    ///
    /// Recognized variables: `WORKREG_STORE_PATH`,
    /// `WORKREG_FAILURE_THRESHOLD`, `WORKREG_RECOVERY_TIMEOUT_SECS`,
    /// `WORKREG_MAX_CONCURRENT`, `WORKREG_ACQUIRE_TIMEOUT_SECS`,
    /// `WORKREG_BATCH_SIZE`, `OTEL_ENDPOINT`, `LOG_LEVEL`.
    pub fn from_env() -> Result<Self> {
        let defaults = GuardConfig::default();

        let failure_threshold = env_u32("WORKREG_FAILURE_THRESHOLD", defaults.failure_threshold);
        let failure_threshold = if failure_threshold == 0 {
            warn!("WORKREG_FAILURE_THRESHOLD < 1, resetting to 1");
            1
        } else {
            failure_threshold
        };

        let recovery_timeout = env_secs(
            "WORKREG_RECOVERY_TIMEOUT_SECS",
            defaults.recovery_timeout,
        );
        let acquire_timeout = env_secs("WORKREG_ACQUIRE_TIMEOUT_SECS", defaults.acquire_timeout);

        let mut max_concurrent = env_usize("WORKREG_MAX_CONCURRENT", defaults.max_concurrent);
        if max_concurrent < 1 {
            warn!("WORKREG_MAX_CONCURRENT < 1, resetting to 1");
            max_concurrent = 1;
        }
        if max_concurrent > 1000 {
            warn!("WORKREG_MAX_CONCURRENT > 1000, capping at 1000");
            max_concurrent = 1000;
        }

        let mut batch_size = env_usize("WORKREG_BATCH_SIZE", 50);
        if batch_size < 1 {
            warn!("WORKREG_BATCH_SIZE < 1, resetting to 1");
            batch_size = 1;
        }

        let registry = RegistryConfig {
            batch_size,
            guard: GuardConfig {
                failure_threshold,
                recovery_timeout,
                max_concurrent,
                acquire_timeout,
                ..defaults
            },
            ..RegistryConfig::default()
        };

        Ok(Self {
            store_path: std::env::var("WORKREG_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("workreg.json")),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            registry,
        })
    }
}

fn env_u32(name: &str, default: u32) -> u32 {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("invalid {name}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("invalid {name}, using default {default}");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    match std::env::var(name) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(secs) if secs >= 0.0 => Duration::from_secs_f64(secs),
            _ => {
                warn!("invalid {name}, using default {}s", default.as_secs_f64());
                default
            }
        },
        Err(_) => default,
    }
}
