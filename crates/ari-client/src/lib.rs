//! # acd-ari-client
//!
//! Asterisk REST Interface (ARI) client for the acd stack. It is the only
//! component that speaks to the media server; everything above it consumes
//! typed events and issues typed actions.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        Routing engine        │  (acd-call-engine)
//! └──────┬───────────────▲───────┘
//!        │ MediaControl  │ AriEvent
//! ┌──────▼───────────────┴───────┐
//! │          AriClient           │
//! │  REST actions │ WS event feed│
//! └──────┬───────────────▲───────┘
//!        │ HTTP          │ websocket
//! ┌──────▼───────────────┴───────┐
//! │           Asterisk           │
//! └──────────────────────────────┘
//! ```
//!
//! The engine depends on the [`MediaControl`] trait rather than on
//! [`AriClient`] directly, so integration tests can run the full routing
//! state machine against a scripted media server.

pub mod client;
pub mod config;
pub mod error;
pub mod events;

pub use client::{AriClient, MediaControl, OriginateParams};
pub use config::AriConfig;
pub use error::{AriError, Result};
pub use events::{AriEvent, Bridge, CallerId, Channel, Variable};
