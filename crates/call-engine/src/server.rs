//! # Call center server manager
//!
//! High-level lifecycle wrapper around the routing engine: it builds the
//! store, repository and ARI client from configuration, reconciles queue
//! membership at startup, and pumps the ARI event feed through the
//! per-channel dispatcher until the control transport drops. Loss of that
//! transport is fatal by design; supervision (systemd, k8s) restarts the
//! process and the durable state lives in the store.
//!
//! ## Example
//!
//! ```no_run
//! use acd_call_engine::config::CallCenterConfig;
//! use acd_call_engine::server::CallCenterServerBuilder;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = CallCenterServerBuilder::new()
//!     .with_config(CallCenterConfig::from_env()?)
//!     .build()
//!     .await?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{error, info};

use acd_ari_client::AriClient;

use crate::config::CallCenterConfig;
use crate::error::{CallCenterError, Result};
use crate::orchestrator::{CallCenterEngine, EventDispatcher};
use crate::repository::Repository;
use crate::store::{MemoryStore, RedisStore, StateStore};

/// Builder for [`CallCenterServer`].
pub struct CallCenterServerBuilder {
    config: CallCenterConfig,
    store: Option<Arc<dyn StateStore>>,
}

impl CallCenterServerBuilder {
    pub fn new() -> Self {
        Self {
            config: CallCenterConfig::default(),
            store: None,
        }
    }

    pub fn with_config(mut self, config: CallCenterConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a pre-built store instead of connecting to Redis.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Keep all shared state in process memory. State does not survive a
    /// restart; meant for tests and demos.
    pub fn with_in_memory_store(mut self) -> Self {
        self.store = Some(Arc::new(MemoryStore::new()));
        self
    }

    pub async fn build(self) -> Result<CallCenterServer> {
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(RedisStore::connect(&self.config.redis).await?),
        };
        let repository = Repository::new(store);
        let ari = AriClient::new(self.config.ari.clone());
        let engine = CallCenterEngine::new(self.config.clone(), repository, Arc::new(ari.clone()));
        Ok(CallCenterServer {
            config: self.config,
            engine,
            ari,
        })
    }
}

impl Default for CallCenterServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running call-distribution server.
pub struct CallCenterServer {
    config: CallCenterConfig,
    engine: CallCenterEngine,
    ari: AriClient,
}

impl CallCenterServer {
    pub fn engine(&self) -> &CallCenterEngine {
        &self.engine
    }

    /// Run until the control transport to the media server drops.
    pub async fn run(&self) -> Result<()> {
        info!(
            "🚀 Starting call-distribution server (ARI app '{}')",
            self.config.ari.app_name
        );

        // Login and logout touch several store keys without a transaction;
        // put every queue's logged-in set back in line before taking calls.
        for cc in &self.config.call_center_ids {
            self.engine.repository().reconcile(cc).await?;
        }

        let mut events = self.ari.connect_events().await.map_err(CallCenterError::from)?;
        info!("✅ Ready to route calls");

        let dispatcher = EventDispatcher::new(self.engine.clone());
        while let Some(event) = events.recv().await {
            dispatcher.dispatch(event);
        }

        error!("ARI event stream closed; shutting down");
        Err(CallCenterError::Transport(
            "control transport to the media server was lost".to_string(),
        ))
    }
}
