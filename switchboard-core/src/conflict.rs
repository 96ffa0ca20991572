//! Coordination conflict types

use crate::{AgentId, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a statically detectable coordination anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// A busy agent bound to more than one live task. The single-assignment
    /// invariant rules this out in normal operation; detection exists to
    /// surface violations (e.g. re-registration orphaning a task).
    ResourceContention,
    /// A cycle in the task dependency graph; nothing inside can ever run.
    DependencyDeadlock,
    /// An assigned agent whose capabilities do not cover the requirement.
    /// The matcher scores coverage, not containment, so this is expected
    /// whenever no fully-qualified agent was available.
    CapabilityMismatch,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::ResourceContention => "resource_contention",
            ConflictKind::DependencyDeadlock => "dependency_deadlock",
            ConflictKind::CapabilityMismatch => "capability_mismatch",
        }
    }

    /// Severity is fixed per class.
    pub fn severity(&self) -> Severity {
        match self {
            ConflictKind::ResourceContention => Severity::Medium,
            ConflictKind::DependencyDeadlock => Severity::High,
            ConflictKind::CapabilityMismatch => Severity::Low,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How urgently a conflict needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One detector finding. Pure description of current state; holding one
/// does not imply anything was remediated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    pub task_ids: Vec<TaskId>,
    pub agent_ids: Vec<AgentId>,
    pub severity: Severity,
    pub suggested_resolution: String,
}

impl Conflict {
    pub fn new(
        kind: ConflictKind,
        task_ids: Vec<TaskId>,
        agent_ids: Vec<AgentId>,
        suggested_resolution: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            task_ids,
            agent_ids,
            severity: kind.severity(),
            suggested_resolution: suggested_resolution.into(),
        }
    }
}
