//! Agent registry with scored selection
//!
//! The registry owns every agent record the hub has ever seen. Records are
//! created on first registration and persist through offline transitions;
//! re-registration with the same id rehydrates the performance counters.
//! Iteration order is registration insertion order, which is also the
//! selection tie-break order.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};

use switchboard_core::{
    Agent, AgentId, AgentStatus, ChannelToken, DurationMs, RegistryError, TaskId, Timestamp,
};

/// Weight of capability coverage in the selection score.
pub const CAPABILITY_WEIGHT: f64 = 0.6;
/// Weight of the rolling performance score.
pub const PERFORMANCE_WEIGHT: f64 = 0.3;
/// Weight of the workload component.
pub const WORKLOAD_WEIGHT: f64 = 0.1;

/// Registration parameters for [`AgentRegistry::register`].
#[derive(Debug, Clone)]
pub struct AgentRegistration {
    pub id: AgentId,
    pub name: Option<String>,
    pub capabilities: BTreeSet<String>,
    pub channel: Option<ChannelToken>,
}

/// Score breakdown for a selected agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub agent_id: AgentId,
    pub total: f64,
    pub capability: f64,
    pub performance: f64,
    pub workload: f64,
}

/// Insertion-ordered agent store.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentId, Agent>,
    order: Vec<AgentId>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Iterate agents in registration insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Count of agents currently reachable (status != offline).
    pub fn active_count(&self) -> usize {
        self.iter().filter(|a| a.status != AgentStatus::Offline).count()
    }

    /// Register or re-register an agent.
    ///
    /// Idempotent on id: an existing record keeps its insertion position
    /// and its performance counters, but name, capabilities, and channel
    /// are overwritten, the status snaps back to online, and any stale
    /// `current_task` is cleared. If the agent was actually busy under a
    /// previous process this can orphan the old task until the conflict
    /// detector surfaces it.
    pub fn register(&mut self, reg: AgentRegistration, now: Timestamp) -> &Agent {
        let AgentRegistration {
            id,
            name,
            capabilities,
            channel,
        } = reg;

        match self.agents.entry(id.clone()) {
            Entry::Occupied(entry) => {
                let existing = entry.into_mut();
                existing.name = name.unwrap_or_else(|| id.as_str().to_string());
                existing.capabilities = capabilities;
                existing.channel = channel;
                existing.status = AgentStatus::Online;
                existing.current_task = None;
                existing.last_seen = now;
                tracing::info!(agent_id = %id, "Agent re-registered");
                existing
            }
            Entry::Vacant(entry) => {
                let agent = Agent::new(id.clone(), name, capabilities, channel, now);
                tracing::info!(
                    agent_id = %id,
                    capabilities = agent.capabilities.len(),
                    "Agent registered"
                );
                self.order.push(id);
                entry.insert(agent)
            }
        }
    }

    /// Update an agent's status and last-seen stamp.
    ///
    /// `current_task` follows provided-vs-absent semantics: `None` leaves
    /// the field untouched, `Some(x)` stores `x` verbatim. Going offline
    /// drops the channel token.
    pub fn set_status(
        &mut self,
        id: &AgentId,
        status: AgentStatus,
        current_task: Option<Option<TaskId>>,
        now: Timestamp,
    ) -> Result<&Agent, RegistryError> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| RegistryError::AgentNotFound { id: id.clone() })?;
        agent.status = status;
        agent.last_seen = now;
        if let Some(task) = current_task {
            agent.current_task = task;
        }
        if status == AgentStatus::Offline {
            agent.channel = None;
        }
        tracing::debug!(agent_id = %id, status = %status, "Agent status updated");
        Ok(agent)
    }

    /// Fold a task outcome into the agent's rolling performance counters.
    pub fn record_performance(
        &mut self,
        id: &AgentId,
        duration_ms: DurationMs,
        success: bool,
    ) -> Result<&Agent, RegistryError> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| RegistryError::AgentNotFound { id: id.clone() })?;
        if success {
            agent.record_success(duration_ms);
        } else {
            agent.record_failure();
        }
        tracing::debug!(
            agent_id = %id,
            success,
            score = agent.performance_score,
            "Agent performance updated"
        );
        Ok(agent)
    }

    /// Deterministic scored selection over online, idle agents.
    ///
    /// Returns the candidate with the highest weighted score; ties break
    /// to the earlier registration. Coverage is deliberately soft - an
    /// agent missing some required capabilities can still win when nothing
    /// better is online.
    pub fn select(&self, required: &BTreeSet<String>) -> Option<Selection> {
        let mut best: Option<Selection> = None;
        for agent in self.iter() {
            if !agent.is_available() {
                continue;
            }
            let candidate = score_agent(agent, required);
            let beats = match &best {
                Some(current) => candidate.total > current.total,
                None => true,
            };
            if beats {
                best = Some(candidate);
            }
        }
        best
    }

    /// Look up the agent bound to a transport channel, if any.
    pub fn agent_by_channel(&self, token: ChannelToken) -> Option<&Agent> {
        self.iter().find(|a| a.channel == Some(token))
    }

    /// Agents whose last interaction is older than `threshold` and that
    /// are not already offline. Used by the liveness sweep.
    pub fn stale_ids(&self, now: Timestamp, threshold: chrono::Duration) -> Vec<AgentId> {
        self.iter()
            .filter(|a| a.status != AgentStatus::Offline && now - a.last_seen > threshold)
            .map(|a| a.id.clone())
            .collect()
    }
}

/// Compute the weighted selection score for one candidate.
pub fn score_agent(agent: &Agent, required: &BTreeSet<String>) -> Selection {
    let capability = agent.capability_coverage(required);
    let performance = agent.performance_score;
    let workload = if agent.status == AgentStatus::Online { 1.0 } else { 0.5 };
    Selection {
        agent_id: agent.id.clone(),
        total: CAPABILITY_WEIGHT * capability
            + PERFORMANCE_WEIGHT * performance
            + WORKLOAD_WEIGHT * workload,
        capability,
        performance,
        workload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn caps(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn registration(id: &str, tags: &[&str]) -> AgentRegistration {
        AgentRegistration {
            id: AgentId::new(id),
            name: None,
            capabilities: caps(tags),
            channel: None,
        }
    }

    #[test]
    fn register_preserves_counters_on_rehydration() {
        let mut registry = AgentRegistry::new();
        let now = Utc::now();
        registry.register(registration("a1", &["python"]), now);
        registry
            .record_performance(&AgentId::new("a1"), 30_000, true)
            .unwrap();
        registry
            .set_status(&AgentId::new("a1"), AgentStatus::Busy, Some(Some(TaskId::random())), now)
            .unwrap();

        let agent = registry.register(registration("a1", &["rust"]), now);
        assert_eq!(agent.status, AgentStatus::Online);
        assert_eq!(agent.current_task, None);
        assert_eq!(agent.tasks_completed, 1);
        assert_eq!(agent.average_task_time, 30_000.0);
        assert!(agent.capabilities.contains("rust"));
        assert!(!agent.capabilities.contains("python"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn insertion_order_survives_reregistration() {
        let mut registry = AgentRegistry::new();
        let now = Utc::now();
        registry.register(registration("a1", &[]), now);
        registry.register(registration("a2", &[]), now);
        registry.register(registration("a1", &[]), now);
        let ids: Vec<_> = registry.iter().map(|a| a.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn offline_drops_channel_token() {
        let mut registry = AgentRegistry::new();
        let now = Utc::now();
        let token = ChannelToken::mint();
        registry.register(
            AgentRegistration {
                id: AgentId::new("a1"),
                name: None,
                capabilities: caps(&[]),
                channel: Some(token),
            },
            now,
        );
        assert!(registry.agent_by_channel(token).is_some());

        registry
            .set_status(&AgentId::new("a1"), AgentStatus::Offline, None, now)
            .unwrap();
        assert!(registry.agent_by_channel(token).is_none());
    }

    #[test]
    fn select_prefers_better_coverage() {
        let mut registry = AgentRegistry::new();
        let now = Utc::now();
        registry.register(registration("a1", &["react"]), now);
        registry.register(registration("a2", &["react", "typescript"]), now);

        let selection = registry.select(&caps(&["react", "typescript"])).unwrap();
        assert_eq!(selection.agent_id, AgentId::new("a2"));
        assert!((selection.total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn selection_scores_match_the_weighting() {
        let mut registry = AgentRegistry::new();
        let now = Utc::now();
        registry.register(registration("a1", &["react"]), now);
        let selection = registry.select(&caps(&["react", "typescript"])).unwrap();
        // 0.6 * 0.5 + 0.3 * 1.0 + 0.1 * 1.0
        assert!((selection.total - 0.70).abs() < 1e-9);
    }

    #[test]
    fn select_ties_break_to_insertion_order() {
        let mut registry = AgentRegistry::new();
        let now = Utc::now();
        registry.register(registration("later", &["python"]), now);
        registry.register(registration("earlier", &["python"]), now);
        // Equal scores; "later" registered first and must win.
        let selection = registry.select(&caps(&["python"])).unwrap();
        assert_eq!(selection.agent_id, AgentId::new("later"));
    }

    #[test]
    fn select_skips_busy_and_offline() {
        let mut registry = AgentRegistry::new();
        let now = Utc::now();
        registry.register(registration("busy", &["python"]), now);
        registry.register(registration("offline", &["python"]), now);
        registry
            .set_status(&AgentId::new("busy"), AgentStatus::Busy, Some(Some(TaskId::random())), now)
            .unwrap();
        registry
            .set_status(&AgentId::new("offline"), AgentStatus::Offline, None, now)
            .unwrap();
        assert!(registry.select(&caps(&["python"])).is_none());
    }

    #[test]
    fn empty_requirements_count_as_full_coverage() {
        let mut registry = AgentRegistry::new();
        registry.register(registration("a1", &[]), Utc::now());
        let selection = registry.select(&BTreeSet::new()).unwrap();
        assert!((selection.capability - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_ids_respect_the_threshold() {
        let mut registry = AgentRegistry::new();
        let start = Utc::now();
        registry.register(registration("old", &[]), start);
        registry.register(registration("fresh", &[]), start + chrono::Duration::minutes(10));

        let now = start + chrono::Duration::minutes(11);
        let stale = registry.stale_ids(now, chrono::Duration::minutes(5));
        assert_eq!(stale, vec![AgentId::new("old")]);

        // Already-offline agents are not re-reported.
        registry
            .set_status(&AgentId::new("old"), AgentStatus::Offline, None, start)
            .unwrap();
        assert!(registry.stale_ids(now, chrono::Duration::minutes(5)).is_empty());
    }

    #[test]
    fn unknown_agent_is_an_error() {
        let mut registry = AgentRegistry::new();
        let err = registry
            .set_status(&AgentId::new("ghost"), AgentStatus::Online, None, Utc::now())
            .unwrap_err();
        assert_eq!(err, RegistryError::AgentNotFound { id: AgentId::new("ghost") });
    }
}
