//! ARI connection configuration
//!
//! Connection parameters for the Asterisk REST Interface: host, port,
//! credentials, and the Stasis application name this client registers as.
//! All parameters can be supplied through the environment (`ARI_HOST`,
//! `ARI_PORT`, `ARI_USERNAME`, `ARI_PASSWORD`, `ARI_APP_NAME`).

use crate::error::{AriError, Result};

/// Configuration for an [`crate::AriClient`].
#[derive(Debug, Clone)]
pub struct AriConfig {
    /// Hostname or address of the Asterisk HTTP server
    pub host: String,
    /// Port of the Asterisk HTTP server
    pub port: u16,
    /// ARI username
    pub username: String,
    /// ARI password
    pub password: String,
    /// Stasis application name to register for events
    pub app_name: String,
}

impl Default for AriConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            username: "asterisk".to_string(),
            password: "asterisk".to_string(),
            app_name: "dialer".to_string(),
        }
    }
}

impl AriConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Build a configuration from the `ARI_*` environment variables,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = env_var("ARI_HOST") {
            config.host = host;
        }
        if let Some(port) = env_var("ARI_PORT") {
            config.port = port
                .parse()
                .map_err(|_| AriError::Config(format!("ARI_PORT is not a port number: {port}")))?;
        }
        if let Some(username) = env_var("ARI_USERNAME") {
            config.username = username;
        }
        if let Some(password) = env_var("ARI_PASSWORD") {
            config.password = password;
        }
        if let Some(app_name) = env_var("ARI_APP_NAME") {
            config.app_name = app_name;
        }
        Ok(config)
    }

    /// Base URL of the REST surface, e.g. `http://pbx:8088/ari`.
    pub(crate) fn http_base(&self) -> String {
        format!("http://{}:{}/ari", self.host, self.port)
    }

    /// Websocket URL of the event feed for this application.
    pub(crate) fn ws_url(&self) -> String {
        format!(
            "ws://{}:{}/ari/events?app={}&api_key={}:{}",
            self.host, self.port, self.app_name, self.username, self.password
        )
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
