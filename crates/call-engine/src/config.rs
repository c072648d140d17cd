//! Call center configuration
//!
//! Configuration follows the same pattern across the stack: plain structs
//! with sensible defaults, `with_*` builder methods for tests and embedders,
//! and a `from_env()` constructor for deployments. The environment
//! contract is `ARI_*` for the media-server connection, `REDIS_*` for the
//! shared store, `WRAP_UP_SECONDS` for the post-call agent timer and
//! `CALL_CENTER_IDS` for the tenants reconciled at startup.

use acd_ari_client::AriConfig;

use crate::error::{CallCenterError, Result};

/// Connection parameters for the shared state store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
        }
    }
}

impl RedisConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = env_var("REDIS_HOST") {
            config.host = host;
        }
        if let Some(port) = env_var("REDIS_PORT") {
            config.port = port.parse().map_err(|_| {
                CallCenterError::configuration(format!("REDIS_PORT is not a port number: {port}"))
            })?;
        }
        config.password = env_var("REDIS_PASSWORD");
        Ok(config)
    }

    /// Connection URL in the form `redis://[:password@]host:port/`.
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => format!("redis://:{}@{}:{}/", password, self.host, self.port),
            None => format!("redis://{}:{}/", self.host, self.port),
        }
    }
}

/// Top-level configuration for the routing engine and server.
#[derive(Debug, Clone, Default)]
pub struct CallCenterConfig {
    /// Media-server control connection
    pub ari: AriConfig,
    /// Shared state store connection
    pub redis: RedisConfig,
    /// Seconds an agent spends in wrap-up after a call; 0 goes straight back
    /// to available
    pub wrap_up_seconds: u64,
    /// Call centers whose queue membership is reconciled at startup
    pub call_center_ids: Vec<String>,
}

impl CallCenterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ari(mut self, ari: AriConfig) -> Self {
        self.ari = ari;
        self
    }

    pub fn with_redis(mut self, redis: RedisConfig) -> Self {
        self.redis = redis;
        self
    }

    pub fn with_wrap_up_seconds(mut self, seconds: u64) -> Self {
        self.wrap_up_seconds = seconds;
        self
    }

    pub fn from_env() -> Result<Self> {
        let ari = AriConfig::from_env().map_err(CallCenterError::from)?;
        let redis = RedisConfig::from_env()?;
        let wrap_up_seconds = match env_var("WRAP_UP_SECONDS") {
            Some(raw) => raw.parse().map_err(|_| {
                CallCenterError::configuration(format!(
                    "WRAP_UP_SECONDS is not a number of seconds: {raw}"
                ))
            })?,
            None => 0,
        };
        let call_center_ids = env_var("CALL_CENTER_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            ari,
            redis,
            wrap_up_seconds,
            call_center_ids,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
