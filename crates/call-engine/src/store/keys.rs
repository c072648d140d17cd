//! Key layout of the shared store
//!
//! Every key is scoped to a call center (tenant) id. The repository is the
//! only writer; nothing else builds keys by hand.

/// Set of all queue ids in a call center.
pub fn queues_master(cc: &str) -> String {
    format!("callcenter:{cc}:queues_master")
}

/// Set of all agent ids in a call center.
pub fn agents_master(cc: &str) -> String {
    format!("callcenter:{cc}:agents_master")
}

/// Hash holding a queue record: `name, strategy, timings, status`.
pub fn queue(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{cc}:queue:{queue_id}")
}

/// Hash holding an agent record:
/// `name, endpoint, shiftTimings, status, loggedInQueues`.
pub fn agent(cc: &str, agent_id: &str) -> String {
    format!("callcenter:{cc}:agent:{agent_id}")
}

/// Set of agent ids currently logged into a queue.
pub fn queue_logged_in(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{cc}:queue:{queue_id}:agents_loggedIn")
}

/// FIFO list of waiting-call JSON records for a queue.
pub fn queue_calls(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{cc}:queue:{queue_id}:calls")
}

/// Round-robin pointer: the agent id most recently selected for a queue.
pub fn queue_last_agent(cc: &str, queue_id: &str) -> String {
    format!("callcenter:{cc}:queue:{queue_id}:lastAgentRR")
}
