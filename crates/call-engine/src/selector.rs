//! Round-robin agent selection
//!
//! Selection walks the queue's logged-in set, keeps the agents that are
//! `AVAILABLE`, on shift and actually serving this queue, sorts them by agent
//! id for a stable rotation order, and picks the agent after the one the
//! rotation pointer names. The pointer always advances to the selection, even
//! when that agent later fails to answer, so a dead endpoint cannot starve
//! the rest of the rotation. Stale pointers (logged-out or deleted agents)
//! are simply skipped.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::error::{CallCenterError, Result};
use crate::repository::{AgentStatus, Repository};
use crate::timing;

#[derive(Clone)]
pub struct RoundRobinSelector {
    repository: Repository,
}

impl RoundRobinSelector {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Pick the next eligible agent for a queue, or `None` when nobody can
    /// take a call right now.
    pub async fn select_agent(
        &self,
        cc: &str,
        queue_id: &str,
        at: NaiveDateTime,
    ) -> Result<Option<String>> {
        let members = self.repository.logged_in_agents(cc, queue_id).await?;

        let mut eligible = Vec::new();
        for agent_id in members {
            match self.repository.get_agent_details(cc, &agent_id).await {
                Ok(agent) => {
                    let serving = agent.logged_in_queues.iter().any(|q| q == queue_id);
                    if agent.status == AgentStatus::Available
                        && serving
                        && timing::admits(&agent.shift_timings, at)
                    {
                        eligible.push(agent_id);
                    }
                }
                Err(CallCenterError::NotFound(_)) => {
                    warn!("Queue {} logged-in set names missing agent {}", queue_id, agent_id);
                }
                Err(e) => return Err(e),
            }
        }

        if eligible.is_empty() {
            return Ok(None);
        }
        // Stable rotation order, independent of set iteration order.
        eligible.sort();

        let pointer = self.repository.last_selected_agent(cc, queue_id).await?;
        let index = match pointer.and_then(|last| eligible.iter().position(|a| *a == last)) {
            Some(last_index) => (last_index + 1) % eligible.len(),
            None => 0,
        };
        let selected = eligible[index].clone();
        self.repository
            .set_last_selected_agent(cc, queue_id, &selected)
            .await?;
        debug!("Queue {} selected agent {}", queue_id, selected);
        Ok(Some(selected))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::repository::QueueStrategy;
    use crate::store::MemoryStore;

    const CC: &str = "cc-test";
    const Q: &str = "support";

    fn noon() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    async fn setup(agents: &[&str]) -> (Repository, RoundRobinSelector) {
        let repository = Repository::new(Arc::new(MemoryStore::new()));
        repository
            .create_queue(CC, Q, "Support", QueueStrategy::RoundRobin, "24/7")
            .await
            .unwrap();
        for agent in agents {
            repository
                .add_agent(CC, agent, agent, &format!("PJSIP/{agent}"), "24/7")
                .await
                .unwrap();
            repository
                .agent_login(CC, agent, &[Q.to_string()], false, noon())
                .await
                .unwrap();
        }
        let selector = RoundRobinSelector::new(repository.clone());
        (repository, selector)
    }

    #[tokio::test]
    async fn empty_queue_selects_nobody() {
        let (_, selector) = setup(&[]).await;
        assert_eq!(selector.select_agent(CC, Q, noon()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rotation_starts_at_first_sorted_agent() {
        let (repository, selector) = setup(&["carol", "alice", "bob"]).await;

        let mut picks = Vec::new();
        for _ in 0..3 {
            picks.push(selector.select_agent(CC, Q, noon()).await.unwrap().unwrap());
        }
        assert_eq!(picks, vec!["alice", "bob", "carol"]);
        assert_eq!(
            repository.last_selected_agent(CC, Q).await.unwrap(),
            Some("carol".to_string())
        );
    }

    #[tokio::test]
    async fn non_eligible_agents_are_skipped() {
        let (repository, selector) = setup(&["alice", "bob", "carol"]).await;
        repository
            .set_agent_status(CC, "bob", AgentStatus::Ringing, None)
            .await
            .unwrap();
        repository
            .set_agent_status(CC, "bob", AgentStatus::OnCall, None)
            .await
            .unwrap();

        let mut picks = Vec::new();
        for _ in 0..4 {
            picks.push(selector.select_agent(CC, Q, noon()).await.unwrap().unwrap());
        }
        assert_eq!(picks, vec!["alice", "carol", "alice", "carol"]);
    }

    #[tokio::test]
    async fn off_shift_agents_are_not_eligible() {
        let (repository, selector) = setup(&["alice"]).await;
        repository
            .add_agent(CC, "sat-only", "Weekender", "PJSIP/sat-only", "10:00-14:00;Sat")
            .await
            .unwrap();
        repository
            .agent_login(CC, "sat-only", &[Q.to_string()], true, noon())
            .await
            .unwrap();

        // Monday noon: only alice is on shift.
        assert_eq!(
            selector.select_agent(CC, Q, noon()).await.unwrap(),
            Some("alice".to_string())
        );
        assert_eq!(
            selector.select_agent(CC, Q, noon()).await.unwrap(),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn stale_pointer_restarts_rotation() {
        let (repository, selector) = setup(&["alice", "bob"]).await;
        // Pointer names an agent that no longer serves the queue.
        repository.set_last_selected_agent(CC, Q, "departed").await.unwrap();

        assert_eq!(
            selector.select_agent(CC, Q, noon()).await.unwrap(),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn rotation_is_fair_over_many_selections() {
        let (_, selector) = setup(&["alice", "bob", "carol"]).await;

        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut previous = String::new();
        let n = 10;
        for _ in 0..n {
            let pick = selector.select_agent(CC, Q, noon()).await.unwrap().unwrap();
            assert_ne!(pick, previous, "no agent is picked twice in a row");
            *counts.entry(pick.clone()).or_default() += 1;
            previous = pick;
        }
        // n = 10 over k = 3 agents: each picked 3 or 4 times.
        for (_, count) in counts {
            assert!(count == n / 3 || count == n / 3 + 1);
        }
    }
}
