//! Integration tests for the call-distribution engine
//!
//! These run the full per-call state machine against the in-memory store and
//! a scripted media server, so routing, queueing and agent transitions are
//! exercised end to end without Asterisk or Redis.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use acd_ari_client::{AriError, AriEvent, CallerId, Channel, MediaControl, OriginateParams};
use acd_ari_client::Result as AriResult;
use acd_call_engine::orchestrator::{CallStatus, NO_SERVICE_MEDIA};
use acd_call_engine::prelude::*;
use acd_call_engine::store::MemoryStore;

const CC: &str = "acme";
const QUEUE: &str = "support";

/// A timing rule that never admits any instant.
const NEVER: &str = "00:00-00:00;Sun-Sat";

#[derive(Debug, Clone, PartialEq, Eq)]
enum MediaOp {
    Answer(String),
    Hangup(String),
    Play(String, String),
    StartHoldMusic(String),
    StopHoldMusic(String),
    Originate(String),
    CreateBridge(String),
    AddToBridge(String, String),
    DestroyBridge(String),
}

/// Scripted media server: records every operation, hands out channel and
/// bridge ids, and can be told to fail originations.
#[derive(Default)]
struct MockMedia {
    ops: Mutex<Vec<MediaOp>>,
    variables: Mutex<HashMap<(String, String), String>>,
    originations: Mutex<Vec<(String, String)>>,
    fail_originate: AtomicBool,
    leg_counter: AtomicUsize,
    bridge_counter: AtomicUsize,
}

impl MockMedia {
    fn set_variable(&self, channel_id: &str, name: &str, value: &str) {
        self.variables
            .lock()
            .insert((channel_id.to_string(), name.to_string()), value.to_string());
    }

    fn fail_originations(&self, fail: bool) {
        self.fail_originate.store(fail, Ordering::SeqCst);
    }

    fn ops(&self) -> Vec<MediaOp> {
        self.ops.lock().clone()
    }

    fn record(&self, op: MediaOp) {
        self.ops.lock().push(op);
    }

    /// Endpoints originated so far, in order.
    fn originated_endpoints(&self) -> Vec<String> {
        self.originations.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    /// Channel id of the most recently originated agent leg.
    fn last_leg_id(&self) -> String {
        self.originations.lock().last().expect("no origination yet").1.clone()
    }
}

#[async_trait]
impl MediaControl for MockMedia {
    async fn answer(&self, channel_id: &str) -> AriResult<()> {
        self.record(MediaOp::Answer(channel_id.to_string()));
        Ok(())
    }

    async fn hangup(&self, channel_id: &str) -> AriResult<()> {
        self.record(MediaOp::Hangup(channel_id.to_string()));
        Ok(())
    }

    async fn play_media(&self, channel_id: &str, media: &str) -> AriResult<()> {
        self.record(MediaOp::Play(channel_id.to_string(), media.to_string()));
        Ok(())
    }

    async fn start_hold_music(&self, channel_id: &str) -> AriResult<()> {
        self.record(MediaOp::StartHoldMusic(channel_id.to_string()));
        Ok(())
    }

    async fn stop_hold_music(&self, channel_id: &str) -> AriResult<()> {
        self.record(MediaOp::StopHoldMusic(channel_id.to_string()));
        Ok(())
    }

    async fn originate(&self, params: OriginateParams) -> AriResult<String> {
        if self.fail_originate.load(Ordering::SeqCst) {
            return Err(AriError::Rejected {
                status: 500,
                body: "originate refused by test".to_string(),
            });
        }
        let leg_id = format!("agent-leg-{}", self.leg_counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(MediaOp::Originate(params.endpoint.clone()));
        self.originations.lock().push((params.endpoint, leg_id.clone()));
        Ok(leg_id)
    }

    async fn create_bridge(&self) -> AriResult<String> {
        let bridge_id = format!("bridge-{}", self.bridge_counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(MediaOp::CreateBridge(bridge_id.clone()));
        Ok(bridge_id)
    }

    async fn add_to_bridge(&self, bridge_id: &str, channel_id: &str) -> AriResult<()> {
        self.record(MediaOp::AddToBridge(bridge_id.to_string(), channel_id.to_string()));
        Ok(())
    }

    async fn destroy_bridge(&self, bridge_id: &str) -> AriResult<()> {
        self.record(MediaOp::DestroyBridge(bridge_id.to_string()));
        Ok(())
    }

    async fn channel_variable(&self, channel_id: &str, name: &str) -> AriResult<Option<String>> {
        Ok(self
            .variables
            .lock()
            .get(&(channel_id.to_string(), name.to_string()))
            .cloned())
    }
}

fn test_engine(wrap_up_seconds: u64) -> (CallCenterEngine, Repository, Arc<MockMedia>) {
    let repository = Repository::new(Arc::new(MemoryStore::new()));
    let media = Arc::new(MockMedia::default());
    let config = CallCenterConfig::new().with_wrap_up_seconds(wrap_up_seconds);
    let engine = CallCenterEngine::new(config, repository.clone(), media.clone());
    (engine, repository, media)
}

fn caller_channel(channel_id: &str, number: &str) -> Channel {
    Channel {
        id: channel_id.to_string(),
        name: format!("PJSIP/trunk-{channel_id}"),
        state: "Ring".to_string(),
        caller: Some(CallerId {
            name: String::new(),
            number: number.to_string(),
        }),
    }
}

fn agent_leg_channel(channel_id: &str) -> Channel {
    Channel {
        id: channel_id.to_string(),
        name: format!("PJSIP/agent-{channel_id}"),
        state: "Ring".to_string(),
        caller: None,
    }
}

async fn caller_enters(engine: &CallCenterEngine, media: &MockMedia, channel_id: &str) {
    media.set_variable(channel_id, "CALL_CENTER_ID", CC);
    media.set_variable(channel_id, "QUEUE_ID", QUEUE);
    engine
        .handle_event(AriEvent::StasisStart {
            args: vec![],
            channel: caller_channel(channel_id, "15550001111"),
        })
        .await;
}

async fn agent_leg_enters(engine: &CallCenterEngine, leg_id: &str) {
    engine
        .handle_event(AriEvent::StasisStart {
            args: vec!["agent_leg".to_string()],
            channel: agent_leg_channel(leg_id),
        })
        .await;
}

async fn channel_leaves(engine: &CallCenterEngine, channel_id: &str) {
    engine
        .handle_event(AriEvent::StasisEnd {
            channel: Channel {
                id: channel_id.to_string(),
                name: String::new(),
                state: "Up".to_string(),
                caller: None,
            },
        })
        .await;
}

async fn add_logged_in_agent(engine: &CallCenterEngine, agent_id: &str) {
    engine
        .add_agent(CC, agent_id, agent_id, &format!("PJSIP/{agent_id}"), "24/7")
        .await
        .expect("agent creation failed");
    engine
        .agent_login(CC, agent_id, &[QUEUE.to_string()], false)
        .await
        .expect("agent login failed");
}

async fn agent_status(repository: &Repository, agent_id: &str) -> AgentStatus {
    repository
        .get_agent_details(CC, agent_id)
        .await
        .expect("agent lookup failed")
        .status
}

#[tokio::test]
async fn closed_queue_plays_no_service_and_hangs_up() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, NEVER)
        .await
        .unwrap();

    caller_enters(&engine, &media, "caller-1").await;

    let ops = media.ops();
    assert!(ops.contains(&MediaOp::Answer("caller-1".to_string())));
    assert!(ops.contains(&MediaOp::Play("caller-1".to_string(), NO_SERVICE_MEDIA.to_string())));
    assert!(ops.contains(&MediaOp::Hangup("caller-1".to_string())));
    assert!(repository.waiting_calls(CC, QUEUE).await.unwrap().is_empty());
    assert_eq!(engine.active_call_count(), 0);
}

#[tokio::test]
async fn missing_routing_variables_disconnect_silently() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();

    // No CALL_CENTER_ID / QUEUE_ID variables on this channel.
    engine
        .handle_event(AriEvent::StasisStart {
            args: vec![],
            channel: caller_channel("caller-bare", "15550001111"),
        })
        .await;

    let ops = media.ops();
    assert!(ops.contains(&MediaOp::Hangup("caller-bare".to_string())));
    assert!(!ops.iter().any(|op| matches!(op, MediaOp::Play(_, _))), "deflection is silent");
    assert!(repository.waiting_calls(CC, QUEUE).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_queue_disconnects_silently() {
    let (engine, _repository, media) = test_engine(0);

    caller_enters(&engine, &media, "caller-1").await;

    let ops = media.ops();
    assert!(ops.contains(&MediaOp::Hangup("caller-1".to_string())));
    assert!(!ops.iter().any(|op| matches!(op, MediaOp::Play(_, _))));
    assert_eq!(engine.active_call_count(), 0);
}

#[tokio::test]
async fn reserved_strategy_is_refused() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RingAll, "24/7")
        .await
        .unwrap();
    add_logged_in_agent(&engine, "alice").await;

    caller_enters(&engine, &media, "caller-1").await;

    assert!(media.ops().contains(&MediaOp::Hangup("caller-1".to_string())));
    assert!(media.originated_endpoints().is_empty());
    assert!(repository.waiting_calls(CC, QUEUE).await.unwrap().is_empty());
}

#[tokio::test]
async fn successive_calls_rotate_through_agents() {
    let (engine, _repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();
    for agent in ["alice", "bob", "carol"] {
        add_logged_in_agent(&engine, agent).await;
    }

    caller_enters(&engine, &media, "caller-1").await;
    caller_enters(&engine, &media, "caller-2").await;
    caller_enters(&engine, &media, "caller-3").await;

    assert_eq!(
        media.originated_endpoints(),
        vec!["PJSIP/alice", "PJSIP/bob", "PJSIP/carol"]
    );
}

#[tokio::test]
async fn caller_without_agents_waits_then_login_connects() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();

    // Nobody is logged in: the caller parks on hold music.
    caller_enters(&engine, &media, "caller-x").await;
    assert!(media.ops().contains(&MediaOp::StartHoldMusic("caller-x".to_string())));
    let waiting = repository.waiting_calls(CC, QUEUE).await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].channel_id, "caller-x");
    assert_eq!(engine.call_status("caller-x"), Some(CallStatus::Queued));

    // An agent logging in picks the waiting call up immediately.
    add_logged_in_agent(&engine, "alice").await;
    assert_eq!(media.originated_endpoints(), vec!["PJSIP/alice"]);
    assert!(media.ops().contains(&MediaOp::StopHoldMusic("caller-x".to_string())));
    assert!(repository.waiting_calls(CC, QUEUE).await.unwrap().is_empty());
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Ringing);

    // The agent answers; both legs land in one mixing bridge.
    let leg = media.last_leg_id();
    agent_leg_enters(&engine, &leg).await;
    let ops = media.ops();
    assert!(ops.contains(&MediaOp::Answer(leg.clone())));
    assert!(ops.contains(&MediaOp::AddToBridge("bridge-1".to_string(), "caller-x".to_string())));
    assert!(ops.contains(&MediaOp::AddToBridge("bridge-1".to_string(), leg.clone())));
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::OnCall);
    assert_eq!(
        engine.call_status("caller-x"),
        Some(CallStatus::Bridged("alice".to_string()))
    );
}

#[tokio::test]
async fn origination_failure_requeues_and_frees_agent() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();
    add_logged_in_agent(&engine, "alice").await;
    media.fail_originations(true);

    caller_enters(&engine, &media, "caller-y").await;

    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Available);
    let waiting = repository.waiting_calls(CC, QUEUE).await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].channel_id, "caller-y");
    assert!(media.ops().contains(&MediaOp::StartHoldMusic("caller-y".to_string())));
    // The rotation pointer stays on the failed pick.
    assert_eq!(
        repository.last_selected_agent(CC, QUEUE).await.unwrap(),
        Some("alice".to_string())
    );
}

#[tokio::test]
async fn abandoned_waiting_call_leaves_no_trace() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();

    caller_enters(&engine, &media, "caller-z").await;
    assert_eq!(repository.waiting_calls(CC, QUEUE).await.unwrap().len(), 1);

    channel_leaves(&engine, "caller-z").await;

    assert!(repository.waiting_calls(CC, QUEUE).await.unwrap().is_empty());
    assert_eq!(engine.active_call_count(), 0);
    // Idempotent from here on.
    assert_eq!(repository.remove_call_from_queue(CC, QUEUE, "caller-z").await.unwrap(), 0);
}

#[tokio::test]
async fn caller_abandon_while_agent_rings_frees_agent() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();
    add_logged_in_agent(&engine, "alice").await;

    caller_enters(&engine, &media, "caller-1").await;
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Ringing);
    let leg = media.last_leg_id();

    channel_leaves(&engine, "caller-1").await;

    assert!(media.ops().contains(&MediaOp::Hangup(leg)));
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Available);
    assert_eq!(engine.active_call_count(), 0);
}

#[tokio::test]
async fn agent_no_answer_requeues_caller() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();
    add_logged_in_agent(&engine, "alice").await;

    caller_enters(&engine, &media, "caller-1").await;
    let leg = media.last_leg_id();

    // The origination timeout fires: Asterisk destroys the ringing leg.
    engine
        .handle_event(AriEvent::ChannelDestroyed {
            channel: agent_leg_channel(&leg),
            cause: 19,
            cause_txt: "User alerting, no answer".to_string(),
        })
        .await;

    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Available);
    let waiting = repository.waiting_calls(CC, QUEUE).await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].channel_id, "caller-1");
    assert!(media.ops().contains(&MediaOp::StartHoldMusic("caller-1".to_string())));
}

#[tokio::test]
async fn bridged_call_end_frees_agent_without_wrap_up() {
    let (engine, repository, media) = test_engine(0);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();
    add_logged_in_agent(&engine, "alice").await;

    caller_enters(&engine, &media, "caller-1").await;
    let leg = media.last_leg_id();
    agent_leg_enters(&engine, &leg).await;
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::OnCall);

    channel_leaves(&engine, "caller-1").await;

    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Available);
    assert!(media.ops().contains(&MediaOp::DestroyBridge("bridge-1".to_string())));
    assert!(media.ops().contains(&MediaOp::Hangup(leg)));
    assert_eq!(engine.active_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn wrap_up_timer_delays_availability() {
    let (engine, repository, media) = test_engine(30);
    engine
        .create_queue(CC, QUEUE, "Support", QueueStrategy::RoundRobin, "24/7")
        .await
        .unwrap();
    add_logged_in_agent(&engine, "alice").await;

    caller_enters(&engine, &media, "caller-1").await;
    let leg = media.last_leg_id();
    agent_leg_enters(&engine, &leg).await;

    // The agent hangs up first this time.
    channel_leaves(&engine, &leg).await;
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::WrappingUp);
    assert!(media.ops().contains(&MediaOp::Hangup("caller-1".to_string())));

    // Wrap-up elapses under the paused clock.
    tokio::time::sleep(std::time::Duration::from_secs(31)).await;
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Available);
}

#[tokio::test]
async fn newly_available_agent_drains_queues_in_order() {
    let (engine, repository, media) = test_engine(0);
    for queue in ["alpha", "beta"] {
        engine
            .create_queue(CC, queue, queue, QueueStrategy::RoundRobin, "24/7")
            .await
            .unwrap();
    }

    // Two callers wait, one per queue.
    media.set_variable("caller-a", "CALL_CENTER_ID", CC);
    media.set_variable("caller-a", "QUEUE_ID", "beta");
    engine
        .handle_event(AriEvent::StasisStart {
            args: vec![],
            channel: caller_channel("caller-a", "15550001111"),
        })
        .await;
    media.set_variable("caller-b", "CALL_CENTER_ID", CC);
    media.set_variable("caller-b", "QUEUE_ID", "alpha");
    engine
        .handle_event(AriEvent::StasisStart {
            args: vec![],
            channel: caller_channel("caller-b", "15550002222"),
        })
        .await;

    // One agent serving both queues logs in: the alpha caller connects first
    // (queue ids in lexicographic order), the beta caller keeps waiting.
    engine
        .add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7")
        .await
        .unwrap();
    engine
        .agent_login(CC, "alice", &["beta".to_string(), "alpha".to_string()], false)
        .await
        .unwrap();

    assert_eq!(media.originated_endpoints(), vec!["PJSIP/alice"]);
    assert!(media.ops().contains(&MediaOp::StopHoldMusic("caller-b".to_string())));
    assert!(repository.waiting_calls(CC, "alpha").await.unwrap().is_empty());
    assert_eq!(repository.waiting_calls(CC, "beta").await.unwrap().len(), 1);
    assert_eq!(agent_status(&repository, "alice").await, AgentStatus::Ringing);
}
