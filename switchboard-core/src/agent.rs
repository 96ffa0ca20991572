//! Agent entity and status types

use crate::{AgentId, ChannelToken, DurationMs, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Lower bound for an agent's rolling performance score.
pub const MIN_PERFORMANCE_SCORE: f64 = 0.1;
/// Upper bound for an agent's rolling performance score.
pub const MAX_PERFORMANCE_SCORE: f64 = 2.0;
/// Task duration (ms) treated as "nominal" when computing efficiency.
pub const NOMINAL_TASK_TIME_MS: f64 = 60_000.0;

// ============================================================================
// AGENT STATUS
// ============================================================================

/// Liveness/workload state of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Connected and idle, eligible for assignment
    #[default]
    Online,
    /// Working on exactly one task
    Busy,
    /// Channel closed or gone stale
    Offline,
}

impl AgentStatus {
    /// Convert to wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
        }
    }

    /// Parse from wire string representation.
    pub fn parse(s: &str) -> Result<Self, AgentStatusParseError> {
        match s.to_lowercase().as_str() {
            "online" => Ok(AgentStatus::Online),
            "busy" => Ok(AgentStatus::Busy),
            "offline" => Ok(AgentStatus::Offline),
            _ => Err(AgentStatusParseError(s.to_string())),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentStatus {
    type Err = AgentStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing an invalid agent status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatusParseError(pub String);

impl fmt::Display for AgentStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid agent status: {}", self.0)
    }
}

impl std::error::Error for AgentStatusParseError {}

// ============================================================================
// AGENT
// ============================================================================

/// A registered worker endpoint.
///
/// The hub owns the coordination view of the agent only: capabilities,
/// status, workload, and the rolling performance counters used by the
/// matcher. The agent's actual work product never passes through here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    /// Client-supplied stable identifier; primary key in the registry
    pub id: AgentId,
    /// Display label; defaults to the id
    pub name: String,
    /// Capability tags; matching is exact, case-sensitive, set-based
    pub capabilities: BTreeSet<String>,
    pub status: AgentStatus,
    /// Token for the open bidirectional channel; owned by the transport
    #[serde(skip)]
    pub channel: Option<ChannelToken>,
    /// Set exactly while `status == Busy`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<TaskId>,
    /// Most recent interaction with the hub
    pub last_seen: Timestamp,
    /// Rolling score in `[0.1, 2.0]`, starts at 1.0
    pub performance_score: f64,
    pub tasks_completed: u64,
    /// Rolling task time in milliseconds, heavily weighted to recent samples
    pub average_task_time: f64,
}

impl Agent {
    /// Create a freshly registered agent.
    pub fn new(
        id: AgentId,
        name: Option<String>,
        capabilities: BTreeSet<String>,
        channel: Option<ChannelToken>,
        now: Timestamp,
    ) -> Self {
        let name = name.unwrap_or_else(|| id.as_str().to_string());
        Self {
            id,
            name,
            capabilities,
            status: AgentStatus::Online,
            channel,
            current_task: None,
            last_seen: now,
            performance_score: 1.0,
            tasks_completed: 0,
            average_task_time: 0.0,
        }
    }

    /// Whether the matcher may consider this agent.
    pub fn is_available(&self) -> bool {
        self.status == AgentStatus::Online && self.current_task.is_none()
    }

    /// Fraction of `required` covered by this agent's capabilities.
    ///
    /// Coverage, not containment: a partially-qualified agent scores below
    /// 1.0 but stays selectable. Empty requirements count as full coverage.
    pub fn capability_coverage(&self, required: &BTreeSet<String>) -> f64 {
        if required.is_empty() {
            return 1.0;
        }
        let matched = required
            .iter()
            .filter(|cap| self.capabilities.contains(*cap))
            .count();
        matched as f64 / required.len() as f64
    }

    /// Required capabilities this agent does not provide, in order.
    pub fn missing_capabilities(&self, required: &BTreeSet<String>) -> Vec<String> {
        required
            .iter()
            .filter(|cap| !self.capabilities.contains(*cap))
            .cloned()
            .collect()
    }

    /// Fold a successful task completion into the rolling counters.
    ///
    /// The average is the original half-weighted recurrence
    /// `(prev + sample) / 2`, not a true moving mean. Efficiency maps a
    /// one-minute task to 1.0 and blends in at 10%.
    pub fn record_success(&mut self, duration_ms: DurationMs) {
        self.tasks_completed += 1;
        let sample = duration_ms as f64;
        self.average_task_time = if self.tasks_completed == 1 {
            sample
        } else {
            (self.average_task_time + sample) / 2.0
        };
        let efficiency = (NOMINAL_TASK_TIME_MS / sample)
            .clamp(MIN_PERFORMANCE_SCORE, MAX_PERFORMANCE_SCORE);
        self.performance_score = (0.9 * self.performance_score + 0.1 * efficiency)
            .clamp(MIN_PERFORMANCE_SCORE, MAX_PERFORMANCE_SCORE);
    }

    /// Fold a task failure into the rolling score.
    pub fn record_failure(&mut self) {
        self.performance_score = (0.8 * self.performance_score).max(MIN_PERFORMANCE_SCORE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn agent(tags: &[&str]) -> Agent {
        Agent::new(
            AgentId::new("a1"),
            None,
            caps(tags),
            None,
            chrono::Utc::now(),
        )
    }

    #[test]
    fn status_roundtrip() {
        for status in [AgentStatus::Online, AgentStatus::Busy, AgentStatus::Offline] {
            assert_eq!(AgentStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(AgentStatus::parse("sleeping").is_err());
    }

    #[test]
    fn name_defaults_to_id() {
        let a = agent(&["python"]);
        assert_eq!(a.name, "a1");
        assert_eq!(a.status, AgentStatus::Online);
        assert!((a.performance_score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn coverage_is_a_fraction() {
        let a = agent(&["python", "backend"]);
        assert_eq!(a.capability_coverage(&caps(&["python"])), 1.0);
        assert_eq!(a.capability_coverage(&caps(&["python", "sql"])), 0.5);
        assert_eq!(a.capability_coverage(&caps(&[])), 1.0);
        assert_eq!(a.missing_capabilities(&caps(&["python", "sql"])), vec!["sql"]);
    }

    #[test]
    fn coverage_is_case_sensitive() {
        let a = agent(&["Python"]);
        assert_eq!(a.capability_coverage(&caps(&["python"])), 0.0);
    }

    #[test]
    fn first_success_sets_average_directly() {
        let mut a = agent(&[]);
        a.record_success(30_000);
        assert_eq!(a.tasks_completed, 1);
        assert_eq!(a.average_task_time, 30_000.0);
    }

    #[test]
    fn later_successes_blend_half_and_half() {
        let mut a = agent(&[]);
        a.record_success(30_000);
        a.record_success(60_000);
        assert_eq!(a.average_task_time, 45_000.0);
    }

    #[test]
    fn nominal_duration_keeps_score_at_one() {
        let mut a = agent(&[]);
        a.record_success(60_000);
        assert!((a.performance_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn fast_tasks_raise_the_score() {
        let mut a = agent(&[]);
        a.record_success(10_000);
        // efficiency clamps at 2.0: 0.9 * 1.0 + 0.1 * 2.0
        assert!((a.performance_score - 1.1).abs() < 1e-9);
    }

    #[test]
    fn zero_duration_clamps_efficiency() {
        let mut a = agent(&[]);
        a.record_success(0);
        assert!((a.performance_score - 1.1).abs() < 1e-9);
    }

    #[test]
    fn failures_decay_toward_the_floor() {
        let mut a = agent(&[]);
        for _ in 0..32 {
            a.record_failure();
        }
        assert_eq!(a.performance_score, MIN_PERFORMANCE_SCORE);
    }

    #[test]
    fn channel_is_not_serialized() {
        let mut a = agent(&["python"]);
        a.channel = Some(ChannelToken::mint());
        let json = serde_json::to_string(&a).unwrap();
        assert!(!json.contains("channel"));
        assert!(json.contains("\"performanceScore\":1.0"));
    }
}
