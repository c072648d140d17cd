//! Agent repository operations: CRUD, login/logout, status transitions

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::{
    decode_json_or_default, encode_json, field, require_id, AgentDetails, AgentStatus, Repository,
};
use crate::error::{CallCenterError, Result};
use crate::store::{keys, StoreError};
use crate::timing;

/// Side information carried on a status transition: the channel an agent is
/// being bound to, or the wrap-up duration it is entering.
#[derive(Debug, Clone, Default)]
pub struct StatusContext {
    pub channel_id: Option<String>,
    pub wrap_up_seconds: Option<u64>,
}

impl StatusContext {
    pub fn bound_to(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            wrap_up_seconds: None,
        }
    }

    pub fn wrapping_for(seconds: u64) -> Self {
        Self {
            channel_id: None,
            wrap_up_seconds: Some(seconds),
        }
    }
}

/// Transitions the serving lifecycle permits. Login and logout move agents
/// in and out of `LOGGED_OUT` through their own operations.
///
/// Only `AVAILABLE -> AVAILABLE` is tolerated as a self-transition (double
/// restores are harmless). `RINGING -> RINGING` and the other serving states
/// are rejected so two dispatch paths cannot book one agent twice.
fn transition_allowed(from: AgentStatus, to: AgentStatus) -> bool {
    use AgentStatus::*;
    matches!(
        (from, to),
        (Available, Available)
            | (Available, Ringing)
            | (Ringing, OnCall)
            | (Ringing, Available)
            | (OnCall, WrappingUp)
            | (OnCall, Available)
            | (WrappingUp, Available)
    )
}

impl Repository {
    /// Insert an agent and record it in the agent master set.
    ///
    /// Agents start `LOGGED_OUT` with no logged-in queues.
    pub async fn add_agent(
        &self,
        cc: &str,
        agent_id: &str,
        name: &str,
        endpoint: &str,
        shift_timings: &str,
    ) -> Result<()> {
        require_id(cc, "call center id")?;
        require_id(agent_id, "agent id")?;

        let fields = vec![
            ("name".to_string(), name.to_string()),
            ("endpoint".to_string(), endpoint.to_string()),
            ("shiftTimings".to_string(), encode_json(shift_timings)?),
            ("status".to_string(), AgentStatus::LoggedOut.as_str().to_string()),
            ("loggedInQueues".to_string(), encode_json(Vec::<String>::new())?),
        ];
        self.store().hash_set_all(&keys::agent(cc, agent_id), &fields).await?;
        self.store().set_add(&keys::agents_master(cc), agent_id).await?;
        info!("Agent {} added to call center {}", agent_id, cc);
        Ok(())
    }

    /// Load an agent record with its structured fields decoded.
    pub async fn get_agent_details(&self, cc: &str, agent_id: &str) -> Result<AgentDetails> {
        let fields = self.store().hash_get_all(&keys::agent(cc, agent_id)).await?;
        if fields.is_empty() {
            return Err(CallCenterError::not_found(format!("agent {agent_id}")));
        }
        let status_raw = field(&fields, "status");
        let status = AgentStatus::from_str(&status_raw).ok_or_else(|| {
            StoreError::Decode(format!("agent {agent_id} has unknown status {status_raw:?}"))
        })?;
        let logged_in_raw = field(&fields, "loggedInQueues");
        let logged_in_queues: Vec<String> = if logged_in_raw.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&logged_in_raw).map_err(|e| {
                StoreError::Decode(format!("agent {agent_id} loggedInQueues: {e}"))
            })?
        };
        Ok(AgentDetails {
            agent_id: agent_id.to_string(),
            name: field(&fields, "name"),
            endpoint: field(&fields, "endpoint"),
            shift_timings: decode_json_or_default(&fields, "shiftTimings"),
            status,
            logged_in_queues,
        })
    }

    /// All agent ids known to a call center.
    pub async fn list_agents(&self, cc: &str) -> Result<Vec<String>> {
        Ok(self.store().set_members(&keys::agents_master(cc)).await?)
    }

    /// Evaluate an agent's shift window at `at`.
    pub async fn is_agent_on_shift(&self, cc: &str, agent_id: &str, at: NaiveDateTime) -> Result<bool> {
        let agent = self.get_agent_details(cc, agent_id).await?;
        Ok(timing::admits(&agent.shift_timings, at))
    }

    /// Log an agent into a set of queues.
    ///
    /// Preconditions: the agent exists, is `LOGGED_OUT`, and is on shift at
    /// `at` unless `force_login` overrides the shift check.
    pub async fn agent_login(
        &self,
        cc: &str,
        agent_id: &str,
        queue_ids: &[String],
        force_login: bool,
        at: NaiveDateTime,
    ) -> Result<()> {
        let agent = self.get_agent_details(cc, agent_id).await?;
        if agent.status != AgentStatus::LoggedOut {
            return Err(CallCenterError::illegal_state(format!(
                "agent {agent_id} is already logged in ({})",
                agent.status.as_str()
            )));
        }
        if !force_login && !timing::admits(&agent.shift_timings, at) {
            return Err(CallCenterError::illegal_state(format!(
                "agent {agent_id} is off shift"
            )));
        }

        let fields = vec![
            ("status".to_string(), AgentStatus::Available.as_str().to_string()),
            ("loggedInQueues".to_string(), encode_json(queue_ids)?),
        ];
        self.store().hash_set_all(&keys::agent(cc, agent_id), &fields).await?;
        for queue_id in queue_ids {
            self.store()
                .set_add(&keys::queue_logged_in(cc, queue_id), agent_id)
                .await?;
        }
        info!("✅ Agent {} logged into queues {:?}", agent_id, queue_ids);
        Ok(())
    }

    /// Log an agent out of every queue it serves.
    pub async fn agent_logout(&self, cc: &str, agent_id: &str) -> Result<()> {
        let agent = self.get_agent_details(cc, agent_id).await?;
        if agent.status == AgentStatus::LoggedOut {
            return Err(CallCenterError::illegal_state(format!(
                "agent {agent_id} is not logged in"
            )));
        }

        for queue_id in &agent.logged_in_queues {
            self.store()
                .set_remove(&keys::queue_logged_in(cc, queue_id), agent_id)
                .await?;
        }
        let fields = vec![
            ("status".to_string(), AgentStatus::LoggedOut.as_str().to_string()),
            ("loggedInQueues".to_string(), encode_json(Vec::<String>::new())?),
        ];
        self.store().hash_set_all(&keys::agent(cc, agent_id), &fields).await?;
        info!("Agent {} logged out", agent_id);
        Ok(())
    }

    /// Transition an agent's serving status.
    ///
    /// | From        | To                      |
    /// |-------------|-------------------------|
    /// | AVAILABLE   | RINGING                 |
    /// | RINGING     | ON_CALL, AVAILABLE      |
    /// | ON_CALL     | WRAPPING_UP, AVAILABLE  |
    /// | WRAPPING_UP | AVAILABLE               |
    pub async fn set_agent_status(
        &self,
        cc: &str,
        agent_id: &str,
        status: AgentStatus,
        context: Option<StatusContext>,
    ) -> Result<()> {
        let agent = self.get_agent_details(cc, agent_id).await?;
        if !transition_allowed(agent.status, status) {
            return Err(CallCenterError::illegal_state(format!(
                "agent {agent_id} cannot move {} -> {}",
                agent.status.as_str(),
                status.as_str()
            )));
        }

        let fields = vec![("status".to_string(), status.as_str().to_string())];
        self.store().hash_set_all(&keys::agent(cc, agent_id), &fields).await?;

        match context {
            Some(StatusContext { channel_id: Some(channel), .. }) => {
                debug!("Agent {} -> {} (channel {})", agent_id, status.as_str(), channel);
            }
            Some(StatusContext { wrap_up_seconds: Some(seconds), .. }) => {
                debug!("Agent {} -> {} for {}s", agent_id, status.as_str(), seconds);
            }
            _ => debug!("Agent {} -> {}", agent_id, status.as_str()),
        }
        Ok(())
    }

    /// Rebuild every queue's logged-in set from the agent records.
    ///
    /// Login and logout touch several keys without a transaction, so a crash
    /// can leave a queue set disagreeing with its agents. Run at startup.
    pub async fn reconcile(&self, cc: &str) -> Result<()> {
        let mut desired: Vec<(String, Vec<String>)> = Vec::new();
        for agent_id in self.list_agents(cc).await? {
            match self.get_agent_details(cc, &agent_id).await {
                Ok(agent) if agent.status != AgentStatus::LoggedOut => {
                    desired.push((agent_id, agent.logged_in_queues));
                }
                Ok(_) => desired.push((agent_id, Vec::new())),
                Err(e) => {
                    warn!("Skipping unreadable agent {} during reconcile: {}", agent_id, e);
                    desired.push((agent_id, Vec::new()));
                }
            }
        }

        for queue_id in self.list_queues(cc).await? {
            let key = keys::queue_logged_in(cc, &queue_id);
            for member in self.store().set_members(&key).await? {
                let wanted = desired
                    .iter()
                    .find(|(agent_id, _)| *agent_id == member)
                    .map(|(_, queues)| queues.iter().any(|q| *q == queue_id))
                    .unwrap_or(false);
                if !wanted {
                    warn!("Reconcile: removing stray agent {} from queue {}", member, queue_id);
                    self.store().set_remove(&key, &member).await?;
                }
            }
        }

        for (agent_id, queues) in &desired {
            for queue_id in queues {
                self.store()
                    .set_add(&keys::queue_logged_in(cc, queue_id), agent_id)
                    .await?;
            }
        }
        info!("🔧 Reconciled queue membership for call center {}", cc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::{QueueStrategy, Repository};
    use super::*;
    use crate::store::MemoryStore;

    const CC: &str = "cc-test";

    fn repo() -> Repository {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    fn monday_noon() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn agent_round_trips_with_defaults() {
        let repo = repo();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();

        let agent = repo.get_agent_details(CC, "alice").await.unwrap();
        assert_eq!(agent.name, "Alice");
        assert_eq!(agent.endpoint, "PJSIP/alice");
        assert_eq!(agent.shift_timings, "24/7");
        assert_eq!(agent.status, AgentStatus::LoggedOut);
        assert!(agent.logged_in_queues.is_empty());
    }

    #[tokio::test]
    async fn missing_agent_is_not_found() {
        let err = repo().get_agent_details(CC, "ghost").await.unwrap_err();
        assert!(matches!(err, CallCenterError::NotFound(_)));
    }

    #[tokio::test]
    async fn login_makes_agent_available_in_queues() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();

        repo.agent_login(CC, "alice", &["q1".to_string()], false, monday_noon()).await.unwrap();

        let agent = repo.get_agent_details(CC, "alice").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Available);
        assert_eq!(agent.logged_in_queues, vec!["q1"]);
        assert_eq!(repo.logged_in_agents(CC, "q1").await.unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn double_login_is_illegal() {
        let repo = repo();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "alice", &[], false, monday_noon()).await.unwrap();

        let err = repo
            .agent_login(CC, "alice", &[], false, monday_noon())
            .await
            .unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));
    }

    #[tokio::test]
    async fn off_shift_login_requires_force() {
        let repo = repo();
        // Saturday-only shift; Monday noon is outside it.
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "10:00-14:00;Sat").await.unwrap();

        let err = repo
            .agent_login(CC, "alice", &[], false, monday_noon())
            .await
            .unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));

        repo.agent_login(CC, "alice", &[], true, monday_noon()).await.unwrap();
        let agent = repo.get_agent_details(CC, "alice").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Available);
    }

    #[tokio::test]
    async fn logout_clears_membership() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.create_queue(CC, "q2", "Sales", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "alice", &["q1".to_string(), "q2".to_string()], false, monday_noon())
            .await
            .unwrap();

        repo.agent_logout(CC, "alice").await.unwrap();

        let agent = repo.get_agent_details(CC, "alice").await.unwrap();
        assert_eq!(agent.status, AgentStatus::LoggedOut);
        assert!(agent.logged_in_queues.is_empty());
        assert!(repo.logged_in_agents(CC, "q1").await.unwrap().is_empty());
        assert!(repo.logged_in_agents(CC, "q2").await.unwrap().is_empty());

        let err = repo.agent_logout(CC, "alice").await.unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));
    }

    #[tokio::test]
    async fn serving_cycle_transitions() {
        let repo = repo();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "alice", &[], false, monday_noon()).await.unwrap();

        repo.set_agent_status(CC, "alice", AgentStatus::Ringing, Some(StatusContext::bound_to("chan-1")))
            .await
            .unwrap();
        repo.set_agent_status(CC, "alice", AgentStatus::OnCall, Some(StatusContext::bound_to("chan-1")))
            .await
            .unwrap();
        repo.set_agent_status(CC, "alice", AgentStatus::WrappingUp, Some(StatusContext::wrapping_for(30)))
            .await
            .unwrap();
        repo.set_agent_status(CC, "alice", AgentStatus::Available, None).await.unwrap();

        let agent = repo.get_agent_details(CC, "alice").await.unwrap();
        assert_eq!(agent.status, AgentStatus::Available);
    }

    #[tokio::test]
    async fn skipping_states_is_illegal() {
        let repo = repo();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "alice", &[], false, monday_noon()).await.unwrap();

        let err = repo
            .set_agent_status(CC, "alice", AgentStatus::OnCall, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));

        // A wrapped-up agent cannot be logged-status'd back onto a call either.
        repo.set_agent_status(CC, "alice", AgentStatus::Ringing, None).await.unwrap();
        repo.set_agent_status(CC, "alice", AgentStatus::OnCall, None).await.unwrap();
        repo.set_agent_status(CC, "alice", AgentStatus::WrappingUp, None).await.unwrap();
        let err = repo
            .set_agent_status(CC, "alice", AgentStatus::Ringing, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));
    }

    #[tokio::test]
    async fn ringing_agent_cannot_be_booked_twice() {
        let repo = repo();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.agent_login(CC, "alice", &[], false, monday_noon()).await.unwrap();
        repo.set_agent_status(CC, "alice", AgentStatus::Ringing, Some(StatusContext::bound_to("chan-1")))
            .await
            .unwrap();

        // A second routing attempt landing on the same agent must fail.
        let err = repo
            .set_agent_status(CC, "alice", AgentStatus::Ringing, Some(StatusContext::bound_to("chan-2")))
            .await
            .unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));

        // The other serving states reject self-transitions the same way.
        repo.set_agent_status(CC, "alice", AgentStatus::OnCall, None).await.unwrap();
        let err = repo
            .set_agent_status(CC, "alice", AgentStatus::OnCall, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));
        repo.set_agent_status(CC, "alice", AgentStatus::WrappingUp, None).await.unwrap();
        let err = repo
            .set_agent_status(CC, "alice", AgentStatus::WrappingUp, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CallCenterError::IllegalState(_)));

        // Double restores stay harmless.
        repo.set_agent_status(CC, "alice", AgentStatus::Available, None).await.unwrap();
        repo.set_agent_status(CC, "alice", AgentStatus::Available, None).await.unwrap();
    }

    #[tokio::test]
    async fn reconcile_restores_membership() {
        let repo = repo();
        repo.create_queue(CC, "q1", "Support", QueueStrategy::RoundRobin, "24/7").await.unwrap();
        repo.add_agent(CC, "alice", "Alice", "PJSIP/alice", "24/7").await.unwrap();
        repo.add_agent(CC, "bob", "Bob", "PJSIP/bob", "24/7").await.unwrap();
        repo.agent_login(CC, "alice", &["q1".to_string()], false, monday_noon()).await.unwrap();

        // Simulate a crash between the membership and record writes: bob is in
        // the set without serving, alice has been knocked out of it.
        repo.store().set_add(&keys::queue_logged_in(CC, "q1"), "bob").await.unwrap();
        repo.store().set_remove(&keys::queue_logged_in(CC, "q1"), "alice").await.unwrap();

        repo.reconcile(CC).await.unwrap();

        assert_eq!(repo.logged_in_agents(CC, "q1").await.unwrap(), vec!["alice"]);
    }

}
