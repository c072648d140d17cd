//! Shared types for the per-call state machine

/// Routing state of a caller channel.
///
/// A channel that has entered the application but not yet been answered has
/// no context; contexts are created once answering succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// Answered, routing variables read
    Answered,
    /// An agent is being selected
    Selecting,
    /// An agent leg is being originated / is ringing
    Originating(String),
    /// Both legs are being joined into a bridge
    Bridging(String),
    /// Caller and agent share a bridge
    Bridged(String),
    /// Waiting in the queue on hold music
    Queued,
    /// Torn down; the context is about to be dropped
    Terminated,
}

/// Lifecycle of an originated agent leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentLegStatus {
    /// Origination requested; the agent's phone is ringing
    Originated,
    /// The agent answered; bridging is underway
    Answered,
    /// In the bridge with the caller
    Bridged,
    /// Destroyed or left the application
    Gone,
}

/// In-memory context of an active caller channel. Owned by the router; the
/// shared store never sees it.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub channel_id: String,
    pub call_center_id: String,
    pub queue_id: String,
    pub caller_number: String,
    pub status: CallStatus,
    /// The agent leg channel, once one exists
    pub peer_channel: Option<String>,
    pub bridge_id: Option<String>,
    /// Epoch ms of first enqueue; re-queues keep it
    pub enqueue_time: Option<i64>,
}

/// In-memory context of an originated agent leg, keyed by its channel id.
#[derive(Debug, Clone)]
pub struct AgentLegContext {
    pub channel_id: String,
    pub agent_id: String,
    pub caller_channel: String,
    pub call_center_id: String,
    pub queue_id: String,
    pub status: AgentLegStatus,
}
