//! # Call routing orchestration
//!
//! The orchestrator is the heart of the routing core. It owns the per-call
//! state machine and coordinates the repository, the round-robin selector and
//! the media server to move every caller to one of three outcomes: bridged to
//! an agent, waiting in a queue, or disconnected.
//!
//! ```text
//!              StasisStart / StasisEnd / ChannelDestroyed
//!                               │
//!                      ┌────────▼────────┐
//!                      │ EventDispatcher │  one worker per channel id
//!                      └────────┬────────┘
//!                               │
//!                      ┌────────▼────────┐
//!                      │ CallCenterEngine│  per-call state machine
//!                      └──┬─────┬─────┬──┘
//!                         │     │     │
//!              Repository ▼     ▼     ▼ MediaControl
//!              (store)   Selector    (answer, originate,
//!                     (round robin)   bridge, hold music)
//! ```
//!
//! ## Caller lifecycle
//!
//! `ANSWERED → SELECTING → ORIGINATING → BRIDGING → BRIDGED`, detouring to
//! `QUEUED` whenever no agent can take the call, and ending in `TERMINATED`.
//! An originated agent leg runs its own `ORIGINATED → ANSWERED → BRIDGED →
//! GONE` lifecycle in parallel; the two are correlated through the pending
//! agent-leg table, keyed by the leg's channel id.

pub mod core;
pub mod handler;
pub mod types;

pub use self::core::{CallCenterEngine, AGENT_ANSWER_TIMEOUT_SECS, AGENT_LEG_ARG, NO_SERVICE_MEDIA};
pub use handler::EventDispatcher;
pub use types::{AgentLegContext, AgentLegStatus, CallContext, CallStatus};
