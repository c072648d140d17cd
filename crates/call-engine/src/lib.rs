//! # acd-call-engine
//!
//! Call-distribution core of the acd stack. It receives inbound channels
//! from Asterisk over ARI, decides whether each call may be served, selects
//! an agent round-robin, bridges caller and agent, and parks calls on hold
//! music when nobody can take them.
//!
//! ## Components
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 CallCenterServer                  │  lifecycle + event pump
//! ├──────────────────────────────────────────────────┤
//! │  EventDispatcher  │        CallCenterEngine       │  per-channel workers,
//! ├───────────────────┴──────────────────────────────┤  per-call state machine
//! │  Repository  │  RoundRobinSelector  │   timing   │  data contract, agent
//! ├──────────────────────────────────────────────────┤  rotation, shift rules
//! │        StateStore  (Redis / in-memory)           │  shared durable state
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! The media server is reached exclusively through the `MediaControl` trait
//! of [`acd_ari_client`]; the shared store exclusively through
//! [`store::StateStore`]. Both seams take scripted implementations in tests,
//! so the full routing state machine runs under `cargo test` with no
//! Asterisk and no Redis.
//!
//! ## Quick start
//!
//! ```no_run
//! use acd_call_engine::prelude::*;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = CallCenterServerBuilder::new()
//!     .with_config(CallCenterConfig::from_env()?)
//!     .build()
//!     .await?;
//!
//! let engine = server.engine();
//! engine
//!     .create_queue("acme", "support", "Support", QueueStrategy::RoundRobin, "09:00-17:00;Mon-Fri")
//!     .await?;
//! engine
//!     .add_agent("acme", "alice", "Alice", "PJSIP/alice", "08:00-16:00;Mon-Fri")
//!     .await?;
//! engine.agent_login("acme", "alice", &["support".to_string()], false).await?;
//!
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod repository;
pub mod selector;
pub mod server;
pub mod store;
pub mod timing;

pub use config::{CallCenterConfig, RedisConfig};
pub use error::{CallCenterError, Result};
pub use orchestrator::{CallCenterEngine, EventDispatcher};
pub use repository::{
    AgentDetails, AgentStatus, QueueDetails, QueueStatus, QueueStrategy, Repository, StatusContext,
    WaitingCall,
};
pub use selector::RoundRobinSelector;
pub use server::{CallCenterServer, CallCenterServerBuilder};

/// Common imports for building on the engine.
pub mod prelude {
    pub use crate::config::{CallCenterConfig, RedisConfig};
    pub use crate::error::{CallCenterError, Result};
    pub use crate::orchestrator::{CallCenterEngine, CallStatus, EventDispatcher};
    pub use crate::repository::{
        AgentDetails, AgentStatus, QueueDetails, QueueStatus, QueueStrategy, Repository,
        StatusContext, WaitingCall,
    };
    pub use crate::selector::RoundRobinSelector;
    pub use crate::server::{CallCenterServer, CallCenterServerBuilder};
    pub use crate::store::{MemoryStore, RedisStore, StateStore};
    pub use acd_ari_client::{AriClient, AriConfig, AriEvent, MediaControl, OriginateParams};
}
