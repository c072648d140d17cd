//! Core call-distribution engine
//!
//! [`CallCenterEngine`] drives the per-call state machine: callers enter from
//! the media server, queues are checked against their operating hours, agents
//! are selected round-robin, agent legs are originated and bridged, and calls
//! wait on hold music when nobody can take them. One handler per external
//! event looks up the channel's current state and applies the transition, so
//! every recovery path lives in one place instead of nested callbacks.
//!
//! Media and store failures tear down the current routing attempt only: a
//! failed origination re-parks the caller and frees the agent, a failed
//! prompt falls through to hangup, and a failed hangup on a dying channel is
//! logged and forgotten.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, error, info, warn};

use acd_ari_client::{AriEvent, Channel, MediaControl, OriginateParams};

use crate::config::CallCenterConfig;
use crate::error::{CallCenterError, Result};
use crate::repository::{
    AgentDetails, AgentStatus, QueueStrategy, Repository, StatusContext, WaitingCall,
};
use crate::selector::RoundRobinSelector;
use crate::timing;

use super::types::{AgentLegContext, AgentLegStatus, CallContext, CallStatus};

/// Media played to callers outside operating hours.
pub const NO_SERVICE_MEDIA: &str = "sound:ss-noservice";

/// App argument marking an originated agent leg.
pub const AGENT_LEG_ARG: &str = "agent_leg";

/// Seconds the media server rings an agent before abandoning the leg.
pub const AGENT_ANSWER_TIMEOUT_SECS: u32 = 15;

/// Channel variables the dialplan must set on inbound callers.
const VAR_CALL_CENTER_ID: &str = "CALL_CENTER_ID";
const VAR_QUEUE_ID: &str = "QUEUE_ID";

/// The call-distribution engine.
///
/// Cheap to clone; clones share all state. Cross-call state (queues, agents,
/// waiting calls, rotation pointers) lives in the shared store; only the
/// per-channel contexts of calls in flight are held here.
#[derive(Clone)]
pub struct CallCenterEngine {
    config: CallCenterConfig,
    repository: Repository,
    selector: RoundRobinSelector,
    media: Arc<dyn MediaControl>,
    active_calls: Arc<DashMap<String, CallContext>>,
    agent_legs: Arc<DashMap<String, AgentLegContext>>,
}

impl CallCenterEngine {
    pub fn new(
        config: CallCenterConfig,
        repository: Repository,
        media: Arc<dyn MediaControl>,
    ) -> Self {
        let selector = RoundRobinSelector::new(repository.clone());
        Self {
            config,
            repository,
            selector,
            media,
            active_calls: Arc::new(DashMap::new()),
            agent_legs: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &CallCenterConfig {
        &self.config
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Number of caller channels currently tracked.
    pub fn active_call_count(&self) -> usize {
        self.active_calls.len()
    }

    /// The routing state of a caller channel, when it is tracked.
    pub fn call_status(&self, channel_id: &str) -> Option<CallStatus> {
        self.active_calls.get(channel_id).map(|c| c.status.clone())
    }

    // ========================================================================
    // Administrative surface
    // ========================================================================

    pub async fn create_queue(
        &self,
        cc: &str,
        queue_id: &str,
        name: &str,
        strategy: QueueStrategy,
        timings: &str,
    ) -> Result<()> {
        self.repository.create_queue(cc, queue_id, name, strategy, timings).await
    }

    pub async fn add_agent(
        &self,
        cc: &str,
        agent_id: &str,
        name: &str,
        endpoint: &str,
        shift_timings: &str,
    ) -> Result<()> {
        self.repository.add_agent(cc, agent_id, name, endpoint, shift_timings).await
    }

    /// Log an agent in and immediately offer it any waiting calls.
    pub async fn agent_login(
        &self,
        cc: &str,
        agent_id: &str,
        queue_ids: &[String],
        force_login: bool,
    ) -> Result<()> {
        self.repository
            .agent_login(cc, agent_id, queue_ids, force_login, timing::local_now())
            .await?;
        self.dispatch_waiting_calls(cc, agent_id).await;
        Ok(())
    }

    pub async fn agent_logout(&self, cc: &str, agent_id: &str) -> Result<()> {
        self.repository.agent_logout(cc, agent_id).await
    }

    // ========================================================================
    // Event entry point
    // ========================================================================

    /// Apply one external channel event to the state machine.
    pub async fn handle_event(&self, event: AriEvent) {
        match event {
            AriEvent::StasisStart { args, channel } => {
                if args.iter().any(|a| a == AGENT_LEG_ARG) {
                    self.on_agent_leg_entered(channel).await;
                } else {
                    self.on_caller_entered(channel).await;
                }
            }
            AriEvent::StasisEnd { channel } => {
                self.on_channel_departed(&channel.id).await;
            }
            AriEvent::ChannelDestroyed { channel, cause_txt, .. } => {
                debug!("Channel {} destroyed ({})", channel.id, cause_txt);
                self.on_channel_departed(&channel.id).await;
            }
            AriEvent::Other => {}
        }
    }

    // ========================================================================
    // Caller entry path
    // ========================================================================

    async fn on_caller_entered(&self, channel: Channel) {
        let channel_id = channel.id.clone();
        info!("📞 Channel {} entered the routing application", channel_id);

        if !channel.is_up() {
            if let Err(e) = self.media.answer(&channel_id).await {
                warn!("Failed to answer {}: {}; dropping the call", channel_id, e);
                self.hangup_quietly(&channel_id).await;
                return;
            }
        }

        let call_center_id = match self.read_variable(&channel_id, VAR_CALL_CENTER_ID).await {
            Some(value) => value,
            None => {
                self.hangup_quietly(&channel_id).await;
                return;
            }
        };
        let queue_id = match self.read_variable(&channel_id, VAR_QUEUE_ID).await {
            Some(value) => value,
            None => {
                self.hangup_quietly(&channel_id).await;
                return;
            }
        };

        self.active_calls.insert(
            channel_id.clone(),
            CallContext {
                channel_id: channel_id.clone(),
                call_center_id: call_center_id.clone(),
                queue_id: queue_id.clone(),
                caller_number: channel.caller_number(),
                status: CallStatus::Answered,
                peer_channel: None,
                bridge_id: None,
                enqueue_time: None,
            },
        );

        // The timing rules decide service on every call; the stored OPEN or
        // CLOSED flag is advisory only.
        match self
            .repository
            .is_queue_active(&call_center_id, &queue_id, timing::local_now())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("Queue {} is closed; deflecting {}", queue_id, channel_id);
                if let Err(e) = self.media.play_media(&channel_id, NO_SERVICE_MEDIA).await {
                    // The caller may have hung up mid-prompt.
                    debug!("No-service prompt failed on {}: {}", channel_id, e);
                }
                self.drop_call(&channel_id).await;
                return;
            }
            Err(e) => {
                warn!("Queue {} could not be checked: {}; dropping {}", queue_id, e, channel_id);
                self.drop_call(&channel_id).await;
                return;
            }
        }

        let queue = match self.repository.get_queue_details(&call_center_id, &queue_id).await {
            Ok(queue) => queue,
            Err(e) => {
                warn!("Queue {} could not be loaded: {}; dropping {}", queue_id, e, channel_id);
                self.drop_call(&channel_id).await;
                return;
            }
        };

        match queue.strategy() {
            Some(QueueStrategy::RoundRobin) => {
                self.with_call(&channel_id, |c| c.status = CallStatus::Selecting);
                self.route_round_robin(&channel_id).await;
            }
            _ => {
                warn!(
                    "Queue {} uses unsupported strategy {:?}; dropping {}",
                    queue_id, queue.strategy, channel_id
                );
                self.drop_call(&channel_id).await;
            }
        }
    }

    /// One pass of the round-robin routing loop: either an agent leg starts
    /// ringing, or the caller is parked in the queue.
    async fn route_round_robin(&self, channel_id: &str) {
        let Some(context) = self.call(channel_id) else {
            return;
        };

        let selected = match self
            .selector
            .select_agent(&context.call_center_id, &context.queue_id, timing::local_now())
            .await
        {
            Ok(selected) => selected,
            Err(e) => {
                // Selection trouble reads as "no agent right now".
                warn!("Agent selection failed for queue {}: {}", context.queue_id, e);
                None
            }
        };
        let Some(agent_id) = selected else {
            debug!("No eligible agent for queue {}; parking {}", context.queue_id, channel_id);
            self.enqueue_caller(channel_id).await;
            return;
        };

        let agent = match self.repository.get_agent_details(&context.call_center_id, &agent_id).await {
            Ok(agent) if !agent.endpoint.is_empty() => agent,
            Ok(_) => {
                warn!("Selected agent {} has no endpoint; parking {}", agent_id, channel_id);
                self.enqueue_caller(channel_id).await;
                return;
            }
            Err(e) => {
                warn!("Selected agent {} could not be loaded: {}; parking {}", agent_id, e, channel_id);
                self.enqueue_caller(channel_id).await;
                return;
            }
        };

        if self.begin_origination(channel_id, &agent).await.is_err() {
            self.enqueue_caller(channel_id).await;
        }
    }

    /// Ring an agent for a caller.
    ///
    /// On success the agent is `RINGING` and the pending leg is registered;
    /// on failure the agent is `AVAILABLE` again and the caller untouched.
    async fn begin_origination(&self, caller_channel: &str, agent: &AgentDetails) -> Result<()> {
        let Some(context) = self.call(caller_channel) else {
            return Err(CallCenterError::not_found(format!("channel {caller_channel}")));
        };
        let cc = context.call_center_id.clone();

        self.repository
            .set_agent_status(
                &cc,
                &agent.agent_id,
                AgentStatus::Ringing,
                Some(StatusContext::bound_to(caller_channel)),
            )
            .await?;

        let params = OriginateParams {
            endpoint: agent.endpoint.clone(),
            caller_id: context.caller_number.clone(),
            app_args: AGENT_LEG_ARG.to_string(),
            timeout_seconds: AGENT_ANSWER_TIMEOUT_SECS,
        };
        match self.media.originate(params).await {
            Ok(leg_id) => {
                info!(
                    "📣 Ringing agent {} ({}) for caller {}",
                    agent.agent_id, agent.endpoint, caller_channel
                );
                self.agent_legs.insert(
                    leg_id.clone(),
                    AgentLegContext {
                        channel_id: leg_id.clone(),
                        agent_id: agent.agent_id.clone(),
                        caller_channel: caller_channel.to_string(),
                        call_center_id: cc,
                        queue_id: context.queue_id.clone(),
                        status: AgentLegStatus::Originated,
                    },
                );
                let agent_id = agent.agent_id.clone();
                self.with_call(caller_channel, |c| {
                    c.status = CallStatus::Originating(agent_id);
                    c.peer_channel = Some(leg_id);
                });
                Ok(())
            }
            Err(e) => {
                warn!("Origination to agent {} failed: {}", agent.agent_id, e);
                self.restore_agent(&cc, &agent.agent_id).await;
                Err(e.into())
            }
        }
    }

    /// Park a caller at the tail of its queue and start hold music.
    async fn enqueue_caller(&self, channel_id: &str) {
        let Some(context) = self.call(channel_id) else {
            return;
        };
        let record = WaitingCall {
            channel_id: channel_id.to_string(),
            caller_number: context.caller_number.clone(),
            // A re-queued call keeps its original place in time, not in line.
            enqueue_time: context.enqueue_time.unwrap_or_else(epoch_millis),
        };
        if let Err(e) = self
            .repository
            .add_call_to_queue(&context.call_center_id, &context.queue_id, &record)
            .await
        {
            error!(
                "Could not park {} in queue {}: {}; dropping the call",
                channel_id, context.queue_id, e
            );
            self.drop_call(channel_id).await;
            return;
        }
        self.with_call(channel_id, |c| {
            c.status = CallStatus::Queued;
            c.enqueue_time = Some(record.enqueue_time);
            c.peer_channel = None;
        });
        if let Err(e) = self.media.start_hold_music(channel_id).await {
            debug!("Hold music failed on {}: {}", channel_id, e);
        }
        info!("Call {} waiting in queue {}", channel_id, context.queue_id);
    }

    // ========================================================================
    // Agent leg path
    // ========================================================================

    async fn on_agent_leg_entered(&self, channel: Channel) {
        let leg_id = channel.id.clone();
        let Some(leg) = self.leg(&leg_id) else {
            warn!("Unknown agent leg {} entered; hanging up", leg_id);
            self.hangup_quietly(&leg_id).await;
            return;
        };

        // The caller may have abandoned while the agent phone rang.
        if !self.active_calls.contains_key(&leg.caller_channel) {
            info!("Caller {} gone before agent {} answered", leg.caller_channel, leg.agent_id);
            self.agent_legs.remove(&leg_id);
            self.hangup_quietly(&leg_id).await;
            self.restore_agent_and_dispatch(&leg.call_center_id, &leg.agent_id).await;
            return;
        }

        if !channel.is_up() {
            if let Err(e) = self.media.answer(&leg_id).await {
                warn!("Agent leg {} could not be answered: {}", leg_id, e);
                self.abort_agent_attempt(&leg, None).await;
                return;
            }
        }
        self.with_leg(&leg_id, |l| l.status = AgentLegStatus::Answered);

        // Join caller and agent in a mixing bridge.
        let bridge_id = match self.media.create_bridge().await {
            Ok(bridge_id) => bridge_id,
            Err(e) => {
                warn!("Bridge creation failed for caller {}: {}", leg.caller_channel, e);
                self.abort_agent_attempt(&leg, None).await;
                return;
            }
        };
        let agent_id = leg.agent_id.clone();
        let bridge = bridge_id.clone();
        self.with_call(&leg.caller_channel, |c| {
            c.status = CallStatus::Bridging(agent_id);
            c.bridge_id = Some(bridge);
        });

        for target in [leg.caller_channel.as_str(), leg_id.as_str()] {
            if let Err(e) = self.media.add_to_bridge(&bridge_id, target).await {
                warn!("Could not add {} to bridge {}: {}", target, bridge_id, e);
                self.abort_agent_attempt(&leg, Some(&bridge_id)).await;
                return;
            }
        }

        let agent_id = leg.agent_id.clone();
        let peer = leg_id.clone();
        self.with_call(&leg.caller_channel, |c| {
            c.status = CallStatus::Bridged(agent_id);
            c.peer_channel = Some(peer);
        });
        self.with_leg(&leg_id, |l| l.status = AgentLegStatus::Bridged);

        if let Err(e) = self
            .repository
            .set_agent_status(
                &leg.call_center_id,
                &leg.agent_id,
                AgentStatus::OnCall,
                Some(StatusContext::bound_to(leg.caller_channel.as_str())),
            )
            .await
        {
            warn!("Agent {} could not be marked on call: {}", leg.agent_id, e);
        }
        // A bridged call must not linger in any queue.
        if let Err(e) = self
            .repository
            .remove_call_from_queue(&leg.call_center_id, &leg.queue_id, &leg.caller_channel)
            .await
        {
            warn!("Could not clear waiting record for {}: {}", leg.caller_channel, e);
        }
        info!("🌉 Caller {} bridged to agent {}", leg.caller_channel, leg.agent_id);
    }

    /// Tear down a half-built agent connection: both legs are hung up, the
    /// bridge (if any) destroyed, the agent freed.
    async fn abort_agent_attempt(&self, leg: &AgentLegContext, bridge_id: Option<&str>) {
        if let Some(bridge_id) = bridge_id {
            self.destroy_bridge_quietly(bridge_id).await;
        }
        self.agent_legs.remove(&leg.channel_id);
        self.hangup_quietly(&leg.channel_id).await;
        if self.active_calls.remove(&leg.caller_channel).is_some() {
            self.hangup_quietly(&leg.caller_channel).await;
        }
        self.restore_agent(&leg.call_center_id, &leg.agent_id).await;
    }

    // ========================================================================
    // Departures
    // ========================================================================

    async fn on_channel_departed(&self, channel_id: &str) {
        if let Some((_, context)) = self.active_calls.remove(channel_id) {
            self.on_caller_departed(context).await;
        } else if let Some((_, leg)) = self.agent_legs.remove(channel_id) {
            self.on_agent_leg_departed(leg).await;
        } else {
            debug!("Departure of unknown channel {}", channel_id);
        }
    }

    async fn on_caller_departed(&self, context: CallContext) {
        match self
            .repository
            .remove_call_from_queue(&context.call_center_id, &context.queue_id, &context.channel_id)
            .await
        {
            Ok(0) => {}
            Ok(_) => info!("Caller {} left queue {} while waiting", context.channel_id, context.queue_id),
            Err(e) => warn!("Could not clear waiting record for {}: {}", context.channel_id, e),
        }

        match context.status {
            CallStatus::Originating(agent_id) | CallStatus::Bridging(agent_id) => {
                // The agent phone is still ringing for a caller that is gone.
                if let Some(leg_id) = &context.peer_channel {
                    self.agent_legs.remove(leg_id);
                    self.hangup_quietly(leg_id).await;
                }
                if let Some(bridge_id) = &context.bridge_id {
                    self.destroy_bridge_quietly(bridge_id).await;
                }
                self.restore_agent_and_dispatch(&context.call_center_id, &agent_id).await;
            }
            CallStatus::Bridged(agent_id) => {
                if let Some(bridge_id) = &context.bridge_id {
                    self.destroy_bridge_quietly(bridge_id).await;
                }
                if let Some(leg_id) = &context.peer_channel {
                    self.agent_legs.remove(leg_id);
                    self.hangup_quietly(leg_id).await;
                }
                self.finish_agent_call(&context.call_center_id, &agent_id).await;
            }
            _ => {}
        }
    }

    async fn on_agent_leg_departed(&self, leg: AgentLegContext) {
        match leg.status {
            AgentLegStatus::Originated | AgentLegStatus::Answered => {
                // No answer within the origination timeout, or the agent
                // dropped before the bridge came up.
                info!("Agent {} did not take caller {}", leg.agent_id, leg.caller_channel);
                self.restore_agent(&leg.call_center_id, &leg.agent_id).await;
                if self.active_calls.contains_key(&leg.caller_channel) {
                    self.with_call(&leg.caller_channel, |c| {
                        c.status = CallStatus::Selecting;
                        c.peer_channel = None;
                    });
                    self.enqueue_caller(&leg.caller_channel).await;
                }
            }
            AgentLegStatus::Bridged => {
                if let Some((_, context)) = self.active_calls.remove(&leg.caller_channel) {
                    if let Some(bridge_id) = &context.bridge_id {
                        self.destroy_bridge_quietly(bridge_id).await;
                    }
                    self.hangup_quietly(&leg.caller_channel).await;
                }
                self.finish_agent_call(&leg.call_center_id, &leg.agent_id).await;
            }
            AgentLegStatus::Gone => {}
        }
    }

    // ========================================================================
    // Agent availability
    // ========================================================================

    /// Move an agent out of `ON_CALL` when its bridged call ends: into
    /// wrap-up when configured, straight back to available otherwise.
    async fn finish_agent_call(&self, cc: &str, agent_id: &str) {
        let wrap_seconds = self.config.wrap_up_seconds;
        if wrap_seconds == 0 {
            self.restore_agent_and_dispatch(cc, agent_id).await;
            return;
        }
        match self
            .repository
            .set_agent_status(
                cc,
                agent_id,
                AgentStatus::WrappingUp,
                Some(StatusContext::wrapping_for(wrap_seconds)),
            )
            .await
        {
            Ok(()) => {
                let engine = self.clone();
                let cc = cc.to_string();
                let agent_id = agent_id.to_string();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(wrap_seconds)).await;
                    engine.restore_agent_and_dispatch(&cc, &agent_id).await;
                });
            }
            Err(e) => {
                warn!("Agent {} could not enter wrap-up: {}", agent_id, e);
                self.restore_agent_and_dispatch(cc, agent_id).await;
            }
        }
    }

    /// Put an agent back to `AVAILABLE`, tolerating the agent having logged
    /// out in the meantime.
    async fn restore_agent(&self, cc: &str, agent_id: &str) {
        match self
            .repository
            .set_agent_status(cc, agent_id, AgentStatus::Available, None)
            .await
        {
            Ok(()) => {}
            Err(CallCenterError::IllegalState(_)) => {
                debug!("Agent {} logged out meanwhile; not restoring", agent_id);
            }
            Err(e) => warn!("Agent {} could not be restored: {}", agent_id, e),
        }
    }

    async fn restore_agent_and_dispatch(&self, cc: &str, agent_id: &str) {
        self.restore_agent(cc, agent_id).await;
        self.dispatch_waiting_calls(cc, agent_id).await;
    }

    /// Serve waiting calls after an agent became available.
    ///
    /// Queues the agent serves are visited in lexicographic order; within a
    /// queue, waiting calls leave head first. Every connection goes through
    /// the selector, so rotation order holds even here.
    pub async fn dispatch_waiting_calls(&self, cc: &str, agent_id: &str) {
        let agent = match self.repository.get_agent_details(cc, agent_id).await {
            Ok(agent) => agent,
            Err(e) => {
                warn!("Newly available agent {} could not be loaded: {}", agent_id, e);
                return;
            }
        };
        if agent.status != AgentStatus::Available {
            return;
        }

        let mut queues = agent.logged_in_queues.clone();
        queues.sort();
        for queue_id in queues {
            loop {
                // Don't advance the rotation pointer unless somebody waits.
                match self.repository.waiting_calls(cc, &queue_id).await {
                    Ok(calls) if calls.is_empty() => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Queue {} waiting list unreadable: {}", queue_id, e);
                        break;
                    }
                }
                let selected = match self.selector.select_agent(cc, &queue_id, timing::local_now()).await {
                    Ok(Some(selected)) => selected,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Agent selection failed for queue {}: {}", queue_id, e);
                        break;
                    }
                };
                let next = match self.repository.get_next_call_from_queue(cc, &queue_id).await {
                    Ok(Some(call)) => call,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Queue {} head could not be popped: {}", queue_id, e);
                        break;
                    }
                };
                if !self.active_calls.contains_key(&next.channel_id) {
                    warn!("Dropping stale waiting record for {}", next.channel_id);
                    continue;
                }
                let details = match self.repository.get_agent_details(cc, &selected).await {
                    Ok(details) if !details.endpoint.is_empty() => details,
                    _ => {
                        warn!(
                            "Selected agent {} has no usable endpoint; queue {} waits",
                            selected, queue_id
                        );
                        let _ = self.repository.add_call_to_queue(cc, &queue_id, &next).await;
                        break;
                    }
                };
                if let Err(e) = self.media.stop_hold_music(&next.channel_id).await {
                    debug!("Could not stop hold music on {}: {}", next.channel_id, e);
                }
                if self.begin_origination(&next.channel_id, &details).await.is_err() {
                    // Back to the tail with its original enqueue time.
                    self.enqueue_caller(&next.channel_id).await;
                    break;
                }
            }
        }
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    async fn read_variable(&self, channel_id: &str, name: &str) -> Option<String> {
        match self.media.channel_variable(channel_id, name).await {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => {
                warn!("Channel {} carries no {}; dropping", channel_id, name);
                None
            }
            Err(e) => {
                warn!("Could not read {} from {}: {}; dropping", name, channel_id, e);
                None
            }
        }
    }

    /// Best-effort hangup. The channel is usually already tearing down when
    /// this fails, so the error is logged and swallowed.
    async fn hangup_quietly(&self, channel_id: &str) {
        if let Err(e) = self.media.hangup(channel_id).await {
            debug!("Hangup of {} failed (channel likely gone): {}", channel_id, e);
        }
    }

    async fn destroy_bridge_quietly(&self, bridge_id: &str) {
        if let Err(e) = self.media.destroy_bridge(bridge_id).await {
            debug!("Bridge {} could not be destroyed: {}", bridge_id, e);
        }
    }

    /// Terminate a caller: hang up and forget the context.
    async fn drop_call(&self, channel_id: &str) {
        self.with_call(channel_id, |c| c.status = CallStatus::Terminated);
        self.hangup_quietly(channel_id).await;
        self.active_calls.remove(channel_id);
    }

    fn call(&self, channel_id: &str) -> Option<CallContext> {
        self.active_calls.get(channel_id).map(|entry| entry.value().clone())
    }

    fn leg(&self, channel_id: &str) -> Option<AgentLegContext> {
        self.agent_legs.get(channel_id).map(|entry| entry.value().clone())
    }

    fn with_call<F: FnOnce(&mut CallContext)>(&self, channel_id: &str, apply: F) {
        if let Some(mut entry) = self.active_calls.get_mut(channel_id) {
            apply(entry.value_mut());
        }
    }

    fn with_leg<F: FnOnce(&mut AgentLegContext)>(&self, channel_id: &str, apply: F) {
        if let Some(mut entry) = self.agent_legs.get_mut(channel_id) {
            apply(entry.value_mut());
        }
    }
}

fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
