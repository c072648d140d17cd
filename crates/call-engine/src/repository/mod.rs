//! Queue/agent repository over the shared store
//!
//! The repository owns the data contract of the routing core: queue and agent
//! records, per-queue logged-in sets, the FIFO waiting-call lists and the
//! round-robin pointers. It is the sole encoder/decoder of the JSON fields
//! embedded in store hashes (`timings`, `shiftTimings`, `loggedInQueues`,
//! waiting records); no other component sees raw store text.
//!
//! Invariants maintained here:
//!
//! 1. A logged-out agent has no logged-in queues and appears in no queue's
//!    logged-in set.
//! 2. A logged-in agent appears in exactly the logged-in sets named by its
//!    `loggedInQueues`.
//! 3. A caller channel appears in at most one queue's waiting list.
//! 4. A bridged call is in no queue.
//! 5. A stale round-robin pointer is tolerated and skipped by the selector.

mod agents;

pub use agents::StatusContext;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CallCenterError, Result};
use crate::store::{keys, StateStore, StoreError};
use crate::timing;

/// Distribution strategy of a queue.
///
/// Only round-robin is routable today; the other values are reserved and the
/// router refuses calls to queues that carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStrategy {
    RoundRobin,
    RingAll,
}

impl QueueStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStrategy::RoundRobin => "ROUND_ROBIN",
            QueueStrategy::RingAll => "RINGALL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ROUND_ROBIN" => Some(QueueStrategy::RoundRobin),
            "RINGALL" => Some(QueueStrategy::RingAll),
            _ => None,
        }
    }
}

/// Advisory open/closed flag on a queue.
///
/// The authoritative serve/deflect decision is the timing evaluation made on
/// every call; this flag only reflects what an administrator last set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Open,
    Closed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Open => "OPEN",
            QueueStatus::Closed => "CLOSED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(QueueStatus::Open),
            "CLOSED" => Some(QueueStatus::Closed),
            _ => None,
        }
    }
}

/// Agent lifecycle state; see the transition table on
/// [`Repository::set_agent_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    LoggedOut,
    Available,
    Ringing,
    OnCall,
    WrappingUp,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::LoggedOut => "LOGGED_OUT",
            AgentStatus::Available => "AVAILABLE",
            AgentStatus::Ringing => "RINGING",
            AgentStatus::OnCall => "ON_CALL",
            AgentStatus::WrappingUp => "WRAPPING_UP",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "LOGGED_OUT" => Some(AgentStatus::LoggedOut),
            "AVAILABLE" => Some(AgentStatus::Available),
            "RINGING" => Some(AgentStatus::Ringing),
            "ON_CALL" => Some(AgentStatus::OnCall),
            "WRAPPING_UP" => Some(AgentStatus::WrappingUp),
            _ => None,
        }
    }
}

/// A queue record as stored.
#[derive(Debug, Clone)]
pub struct QueueDetails {
    pub queue_id: String,
    pub name: String,
    /// Raw strategy value; unknown values must reach the router so it can
    /// refuse them, so this stays untyped.
    pub strategy: String,
    pub timings: String,
    pub status: QueueStatus,
}

impl QueueDetails {
    /// The typed strategy, when the stored value is a known one.
    pub fn strategy(&self) -> Option<QueueStrategy> {
        QueueStrategy::from_str(&self.strategy)
    }
}

/// An agent record as stored.
#[derive(Debug, Clone)]
pub struct AgentDetails {
    pub agent_id: String,
    pub name: String,
    /// Opaque endpoint handed to the media server when originating.
    pub endpoint: String,
    pub shift_timings: String,
    pub status: AgentStatus,
    pub logged_in_queues: Vec<String>,
}

/// One waiting call in a queue's FIFO list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingCall {
    pub channel_id: String,
    pub caller_number: String,
    /// Epoch milliseconds of first enqueue; preserved across re-queues.
    pub enqueue_time: i64,
}

/// CRUD and status transitions for queues, agents and queue membership.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn StateStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Insert a queue and record it in the queue master set.
    ///
    /// The advisory status starts `CLOSED`; the per-call timing evaluation is
    /// what actually decides service.
    pub async fn create_queue(
        &self,
        cc: &str,
        queue_id: &str,
        name: &str,
        strategy: QueueStrategy,
        timings: &str,
    ) -> Result<()> {
        require_id(cc, "call center id")?;
        require_id(queue_id, "queue id")?;

        let fields = vec![
            ("name".to_string(), name.to_string()),
            ("strategy".to_string(), strategy.as_str().to_string()),
            ("timings".to_string(), encode_json(timings)?),
            ("status".to_string(), QueueStatus::Closed.as_str().to_string()),
        ];
        self.store.hash_set_all(&keys::queue(cc, queue_id), &fields).await?;
        self.store.set_add(&keys::queues_master(cc), queue_id).await?;
        info!("Queue {} created in call center {}", queue_id, cc);
        Ok(())
    }

    /// Load a queue record.
    pub async fn get_queue_details(&self, cc: &str, queue_id: &str) -> Result<QueueDetails> {
        let fields = self.store.hash_get_all(&keys::queue(cc, queue_id)).await?;
        if fields.is_empty() {
            return Err(CallCenterError::not_found(format!("queue {queue_id}")));
        }
        Ok(QueueDetails {
            queue_id: queue_id.to_string(),
            name: field(&fields, "name"),
            strategy: field(&fields, "strategy"),
            timings: decode_json_or_default(&fields, "timings"),
            status: QueueStatus::from_str(&field(&fields, "status"))
                .unwrap_or(QueueStatus::Closed),
        })
    }

    /// All queue ids known to a call center.
    pub async fn list_queues(&self, cc: &str) -> Result<Vec<String>> {
        Ok(self.store.set_members(&keys::queues_master(cc)).await?)
    }

    /// Agent ids currently logged into a queue.
    pub async fn logged_in_agents(&self, cc: &str, queue_id: &str) -> Result<Vec<String>> {
        Ok(self.store.set_members(&keys::queue_logged_in(cc, queue_id)).await?)
    }

    /// Evaluate a queue's operating hours at `at`.
    pub async fn is_queue_active(&self, cc: &str, queue_id: &str, at: NaiveDateTime) -> Result<bool> {
        let queue = self.get_queue_details(cc, queue_id).await?;
        Ok(timing::admits(&queue.timings, at))
    }

    /// Append a waiting call at the tail of a queue.
    ///
    /// Any earlier record for the same channel is removed first, so a channel
    /// waits in at most one place.
    pub async fn add_call_to_queue(&self, cc: &str, queue_id: &str, call: &WaitingCall) -> Result<()> {
        self.remove_call_from_queue(cc, queue_id, &call.channel_id).await?;
        let encoded = serde_json::to_string(call)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        self.store.list_push_tail(&keys::queue_calls(cc, queue_id), &encoded).await?;
        Ok(())
    }

    /// Remove every waiting record for `channel_id`; returns the count removed.
    pub async fn remove_call_from_queue(
        &self,
        cc: &str,
        queue_id: &str,
        channel_id: &str,
    ) -> Result<usize> {
        let key = keys::queue_calls(cc, queue_id);
        let mut removed = 0;
        for raw in self.store.list_range(&key).await? {
            match serde_json::from_str::<WaitingCall>(&raw) {
                Ok(call) if call.channel_id == channel_id => {
                    removed += self.store.list_remove(&key, &raw).await?;
                }
                Ok(_) => {}
                Err(e) => warn!("Undecodable waiting record in queue {}: {}", queue_id, e),
            }
        }
        Ok(removed)
    }

    /// Pop the waiting call at the head of a queue.
    pub async fn get_next_call_from_queue(&self, cc: &str, queue_id: &str) -> Result<Option<WaitingCall>> {
        let Some(raw) = self.store.list_pop_head(&keys::queue_calls(cc, queue_id)).await? else {
            return Ok(None);
        };
        let call = serde_json::from_str(&raw).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(Some(call))
    }

    /// All waiting calls of a queue, head first.
    pub async fn waiting_calls(&self, cc: &str, queue_id: &str) -> Result<Vec<WaitingCall>> {
        let mut calls = Vec::new();
        for raw in self.store.list_range(&keys::queue_calls(cc, queue_id)).await? {
            match serde_json::from_str(&raw) {
                Ok(call) => calls.push(call),
                Err(e) => warn!("Undecodable waiting record in queue {}: {}", queue_id, e),
            }
        }
        Ok(calls)
    }

    /// Round-robin pointer: the agent most recently selected for a queue.
    pub async fn last_selected_agent(&self, cc: &str, queue_id: &str) -> Result<Option<String>> {
        Ok(self.store.string_get(&keys::queue_last_agent(cc, queue_id)).await?)
    }

    pub async fn set_last_selected_agent(&self, cc: &str, queue_id: &str, agent_id: &str) -> Result<()> {
        self.store
            .string_set(&keys::queue_last_agent(cc, queue_id), agent_id)
            .await?;
        Ok(())
    }
}

pub(crate) fn require_id(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CallCenterError::invalid_input(format!("{what} must not be empty")));
    }
    Ok(())
}

pub(crate) fn field(fields: &HashMap<String, String>, name: &str) -> String {
    fields.get(name).cloned().unwrap_or_default()
}

/// Encode a structured field as the JSON text stored inside a hash.
pub(crate) fn encode_json<T: Serialize>(value: T) -> Result<String> {
    serde_json::to_string(&value).map_err(|e| StoreError::Decode(e.to_string()).into())
}

/// Decode a JSON string field, tolerating records written before the field
/// was JSON-encoded.
pub(crate) fn decode_json_or_default(fields: &HashMap<String, String>, name: &str) -> String {
    let raw = field(fields, name);
    serde_json::from_str::<String>(&raw).unwrap_or(raw)
}
