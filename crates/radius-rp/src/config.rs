// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

use crate::asyncop::DEFAULT_MESSAGE_LOCK;

/// Value of `RADIUS_DATABASE_URL` selecting the in-memory store.
pub const MEMORY_DATABASE: &str = "memory";

/// Lease time added on top of the operation timeout.
pub const MESSAGE_LOCK_MARGIN: Duration = Duration::from_secs(60);

/// Resource provider configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL, or `memory` for the in-process store
    pub database_url: String,
    /// HTTP listen address
    pub http_addr: SocketAddr,
    /// Maximum async operations processed at once
    pub max_operation_concurrency: usize,
    /// Dequeue count after which an operation is failed
    pub max_operation_retry_count: u32,
    /// How often the async worker polls the queue
    pub dequeue_interval: Duration,
    /// Time limit for a single async operation
    pub async_operation_timeout: Duration,
    /// Page size for list requests without a valid `top`
    pub default_page_size: usize,
    /// Location segment of operation status IDs
    pub location: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_operation_concurrency: 10,
            max_operation_retry_count: 3,
            dequeue_interval: Duration::from_millis(200),
            async_operation_timeout: Duration::from_secs(120),
            default_page_size: 100,
            location: "global".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `RADIUS_DATABASE_URL`: SQLite URL or `memory` (default: `sqlite::memory:`)
    /// - `RADIUS_HTTP_PORT`: HTTP port (default: 8080)
    /// - `RADIUS_MAX_OPERATION_CONCURRENCY`: worker parallelism (default: 10)
    /// - `RADIUS_MAX_OPERATION_RETRY_COUNT`: max dequeue count (default: 3)
    /// - `RADIUS_DEQUEUE_INTERVAL_MS`: worker poll interval (default: 200)
    /// - `RADIUS_ASYNC_OPERATION_TIMEOUT_SECS`: per-operation timeout (default: 120)
    /// - `RADIUS_DEFAULT_PAGE_SIZE`: default list page size (default: 100)
    /// - `RADIUS_LOCATION`: operation status location (default: global)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url =
            std::env::var("RADIUS_DATABASE_URL").unwrap_or(defaults.database_url);
        if database_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "RADIUS_DATABASE_URL",
                "must not be empty",
            ));
        }

        let http_port: u16 = parse_var("RADIUS_HTTP_PORT", "8080", "must be a valid port number")?;

        let max_operation_concurrency: usize = parse_var(
            "RADIUS_MAX_OPERATION_CONCURRENCY",
            "10",
            "must be a positive integer",
        )?;
        if max_operation_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "RADIUS_MAX_OPERATION_CONCURRENCY",
                "must be a positive integer",
            ));
        }

        let max_operation_retry_count: u32 = parse_var(
            "RADIUS_MAX_OPERATION_RETRY_COUNT",
            "3",
            "must be a non-negative integer",
        )?;

        let dequeue_interval_ms: u64 = parse_var(
            "RADIUS_DEQUEUE_INTERVAL_MS",
            "200",
            "must be a number of milliseconds",
        )?;

        let timeout_secs: u64 = parse_var(
            "RADIUS_ASYNC_OPERATION_TIMEOUT_SECS",
            "120",
            "must be a number of seconds",
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "RADIUS_ASYNC_OPERATION_TIMEOUT_SECS",
                "must be a number of seconds",
            ));
        }

        let default_page_size: usize = parse_var(
            "RADIUS_DEFAULT_PAGE_SIZE",
            "100",
            "must be between 1 and 1000",
        )?;
        if !(1..=1000).contains(&default_page_size) {
            return Err(ConfigError::Invalid(
                "RADIUS_DEFAULT_PAGE_SIZE",
                "must be between 1 and 1000",
            ));
        }

        let location = std::env::var("RADIUS_LOCATION").unwrap_or(defaults.location);

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            max_operation_concurrency,
            max_operation_retry_count,
            dequeue_interval: Duration::from_millis(dequeue_interval_ms),
            async_operation_timeout: Duration::from_secs(timeout_secs),
            default_page_size,
            location,
        })
    }

    /// True when the in-memory store is selected.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case(MEMORY_DATABASE)
    }

    /// Queue lease for the default queue.
    ///
    /// Always outlasts `async_operation_timeout`, so a running operation is
    /// never handed to a second worker.
    pub fn message_lock(&self) -> Duration {
        DEFAULT_MESSAGE_LOCK.max(self.async_operation_timeout + MESSAGE_LOCK_MARGIN)
    }
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: &str,
    reason: &'static str,
) -> Result<T, ConfigError> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::Invalid(name, reason))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 8] = [
        "RADIUS_DATABASE_URL",
        "RADIUS_HTTP_PORT",
        "RADIUS_MAX_OPERATION_CONCURRENCY",
        "RADIUS_MAX_OPERATION_RETRY_COUNT",
        "RADIUS_DEQUEUE_INTERVAL_MS",
        "RADIUS_ASYNC_OPERATION_TIMEOUT_SECS",
        "RADIUS_DEFAULT_PAGE_SIZE",
        "RADIUS_LOCATION",
    ];

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn clean() -> Self {
            let mut guard = Self::new();
            for var in ALL_VARS {
                guard.remove(var);
            }
            guard
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::clean();

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.max_operation_concurrency, 10);
        assert_eq!(config.max_operation_retry_count, 3);
        assert_eq!(config.dequeue_interval, Duration::from_millis(200));
        assert_eq!(config.async_operation_timeout, Duration::from_secs(120));
        assert_eq!(config.default_page_size, 100);
        assert_eq!(config.location, "global");
        assert!(!config.uses_memory_store());
    }

    #[test]
    fn test_config_from_env_with_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("RADIUS_DATABASE_URL", "memory");
        guard.set("RADIUS_HTTP_PORT", "9443");
        guard.set("RADIUS_MAX_OPERATION_CONCURRENCY", "4");
        guard.set("RADIUS_MAX_OPERATION_RETRY_COUNT", "5");
        guard.set("RADIUS_DEQUEUE_INTERVAL_MS", "50");
        guard.set("RADIUS_ASYNC_OPERATION_TIMEOUT_SECS", "30");
        guard.set("RADIUS_DEFAULT_PAGE_SIZE", "20");
        guard.set("RADIUS_LOCATION", "westus");

        let config = Config::from_env().unwrap();

        assert!(config.uses_memory_store());
        assert_eq!(config.http_addr.port(), 9443);
        assert_eq!(config.max_operation_concurrency, 4);
        assert_eq!(config.max_operation_retry_count, 5);
        assert_eq!(config.dequeue_interval, Duration::from_millis(50));
        assert_eq!(config.async_operation_timeout, Duration::from_secs(30));
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.location, "westus");
    }

    #[test]
    fn test_message_lock_outlasts_timeout() {
        let config = Config::default();
        assert_eq!(config.message_lock(), DEFAULT_MESSAGE_LOCK);

        let config = Config {
            async_operation_timeout: Duration::from_secs(3600),
            ..Config::default()
        };
        assert_eq!(
            config.message_lock(),
            Duration::from_secs(3600) + MESSAGE_LOCK_MARGIN
        );
    }

    #[test]
    fn test_config_from_env_invalid_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("RADIUS_HTTP_PORT", "not-a-port");

        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid("RADIUS_HTTP_PORT", _))
        ));
    }

    #[test]
    fn test_config_from_env_zero_concurrency() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("RADIUS_MAX_OPERATION_CONCURRENCY", "0");

        let err = Config::from_env().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for RADIUS_MAX_OPERATION_CONCURRENCY: must be a positive integer"
        );
    }

    #[test]
    fn test_config_from_env_page_size_out_of_range() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::clean();

        guard.set("RADIUS_DEFAULT_PAGE_SIZE", "5000");

        assert!(Config::from_env().is_err());
    }
}
