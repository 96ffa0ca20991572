//! Task entity, lifecycle states, and assignment record

use crate::{AgentId, DurationMs, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PRIORITY
// ============================================================================

/// Task priority as declared by the producer.
///
/// Accepted, stored, and deliberately ignored by the matcher. Sorting
/// assignment by priority would be a behavior change; any priority-aware
/// matcher must be introduced explicitly rather than smuggled in here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TASK STATUS
// ============================================================================

/// Lifecycle state of a task.
///
/// ```text
/// pending -> assigned -> in_progress -> completed
///               |             |
///               +---------> failed
/// ```
///
/// No reverse transitions; `completed` and `failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse from wire string representation.
    pub fn parse(s: &str) -> Result<Self, TaskStatusParseError> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "assigned" => Ok(TaskStatus::Assigned),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(TaskStatusParseError(s.to_string())),
        }
    }

    /// Check if this is an absorbing state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Assigned, InProgress)
                | (Assigned, Completed)
                | (Assigned, Failed)
                | (InProgress, Completed)
                | (InProgress, Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing an invalid task status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid task status: {}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ============================================================================
// TASK
// ============================================================================

/// A unit of work tracked by the coordinator.
///
/// Tasks are created on demand and never deleted; terminal tasks are kept
/// for history and so later tasks can resolve their dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub required_capabilities: BTreeSet<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<AgentId>,
    /// Tasks that must be `completed` before this one may leave `pending`.
    /// Order is preserved from the producer; duplicates are dropped.
    pub dependencies: Vec<TaskId>,
    /// Completion percentage in `[0, 100]`, non-decreasing over the lifetime
    pub progress: u8,
    /// Producer's estimate, stored for observers; the matcher ignores it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<DurationMs>,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl Task {
    /// Create a new pending task. Dependency duplicates are dropped while
    /// preserving first-occurrence order.
    pub fn new(
        description: String,
        required_capabilities: BTreeSet<String>,
        priority: TaskPriority,
        dependencies: Vec<TaskId>,
        estimated_duration: Option<DurationMs>,
        now: Timestamp,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let dependencies = dependencies
            .into_iter()
            .filter(|dep| seen.insert(dep.as_uuid()))
            .collect();
        Self {
            id: TaskId::random(),
            description,
            required_capabilities,
            priority,
            status: TaskStatus::Pending,
            assigned_agent: None,
            dependencies,
            progress: 0,
            estimated_duration,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Raise progress to `value` (clamped to 100). Progress never decreases.
    pub fn raise_progress(&mut self, value: i64) {
        let clamped = value.clamp(0, 100) as u8;
        self.progress = self.progress.max(clamped);
    }

    /// Milliseconds between start and completion; zero when the task was
    /// completed without ever entering `in_progress`.
    pub fn duration_ms(&self) -> DurationMs {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                (completed - started).num_milliseconds().max(0)
            }
            _ => 0,
        }
    }
}

// ============================================================================
// ASSIGNMENT
// ============================================================================

/// The (task, agent) binding that exists while a task is assigned or
/// in progress. At most one per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub assigned_at: Timestamp,
    /// Human-readable explanation of why the matcher picked this agent
    pub reason: String,
}
