//! Task coordinator
//!
//! Owns every task and its lifecycle: creation, dependency-gated
//! assignment through the registry, progress recording, and the
//! re-examination of pending work whenever a task completes. Tasks are
//! never deleted; terminal records stay around for history and so later
//! tasks can resolve their dependencies.

use std::collections::{BTreeSet, HashMap};

use switchboard_core::{
    Agent, AgentStatus, Assignment, CoordinationError, DurationMs, Task, TaskId, TaskPriority,
    TaskStatus, Timestamp,
};

use crate::registry::{AgentRegistry, Selection};

/// Parameters for creating a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub description: String,
    pub required_capabilities: BTreeSet<String>,
    pub priority: TaskPriority,
    pub dependencies: Vec<TaskId>,
    pub estimated_duration: Option<DurationMs>,
}

impl TaskSpec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required_capabilities: BTreeSet::new(),
            priority: TaskPriority::default(),
            dependencies: Vec::new(),
            estimated_duration: None,
        }
    }

    pub fn with_capabilities<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_dependencies(mut self, deps: Vec<TaskId>) -> Self {
        self.dependencies = deps;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// Progress/status update for [`TaskCoordinator::update_progress`].
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub progress: Option<i64>,
    pub status: Option<TaskStatus>,
    pub message: Option<String>,
}

/// What happened when assignment was attempted on a pending task.
#[derive(Debug, Clone)]
pub enum AssignmentDecision {
    /// The task moved to `assigned` and the agent to `busy`.
    Assigned {
        assignment: Assignment,
        selection: Selection,
    },
    /// Unmet dependencies; the task stays pending. Not an error.
    BlockedOnDependencies { unmet: Vec<TaskId> },
    /// No online, idle agent; the task stays pending. Not an error.
    NoAgentAvailable,
}

/// Result of a progress update, with the snapshots the event layer needs.
#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    /// Task state after the update
    pub task: Task,
    pub previous_status: TaskStatus,
    /// Agent freed by a terminal transition, after its performance update
    pub freed_agent: Option<Agent>,
    pub message: Option<String>,
}

impl ProgressOutcome {
    /// Whether this update completed the task (and pending work should be
    /// re-examined).
    pub fn completed_now(&self) -> bool {
        self.task.status == TaskStatus::Completed
            && self.previous_status != TaskStatus::Completed
    }
}

/// Insertion-ordered task store plus the live assignment map.
#[derive(Debug, Default)]
pub struct TaskCoordinator {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
    assignments: HashMap<TaskId, Assignment>,
}

impl TaskCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Iterate tasks in creation insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// The live assignment record for a task, if it is currently bound.
    pub fn assignment(&self, id: &TaskId) -> Option<&Assignment> {
        self.assignments.get(id)
    }

    pub fn completed_count(&self) -> usize {
        self.iter().filter(|t| t.status == TaskStatus::Completed).count()
    }

    /// Create a new pending task.
    pub fn create_task(&mut self, spec: TaskSpec, now: Timestamp) -> Result<&Task, CoordinationError> {
        if spec.description.trim().is_empty() {
            return Err(CoordinationError::EmptyDescription);
        }
        let task = Task::new(
            spec.description,
            spec.required_capabilities,
            spec.priority,
            spec.dependencies,
            spec.estimated_duration,
            now,
        );
        let id = task.id;
        tracing::info!(task_id = %id, "Task created");
        self.order.push(id);
        Ok(self.tasks.entry(id).or_insert(task))
    }

    /// Dependencies of `id` that are not yet completed. Dangling
    /// dependency ids (tasks that were never created) are unmet forever.
    pub fn unmet_dependencies(&self, id: &TaskId) -> Result<Vec<TaskId>, CoordinationError> {
        let task = self
            .tasks
            .get(id)
            .ok_or(CoordinationError::TaskNotFound { id: *id })?;
        Ok(task
            .dependencies
            .iter()
            .filter(|dep| {
                self.tasks
                    .get(dep)
                    .map(|t| t.status != TaskStatus::Completed)
                    .unwrap_or(true)
            })
            .copied()
            .collect())
    }

    /// Attempt to bind the best-qualified available agent to a pending task.
    ///
    /// Blocked dependencies and an empty candidate pool are ordinary
    /// outcomes, not errors; only a missing task or a non-pending status is.
    pub fn assign_optimal(
        &mut self,
        id: &TaskId,
        registry: &mut AgentRegistry,
        now: Timestamp,
    ) -> Result<AssignmentDecision, CoordinationError> {
        let (status, required) = {
            let task = self
                .tasks
                .get(id)
                .ok_or(CoordinationError::TaskNotFound { id: *id })?;
            (task.status, task.required_capabilities.clone())
        };
        if status != TaskStatus::Pending {
            return Err(CoordinationError::NotPending { id: *id, status });
        }

        let unmet = self.unmet_dependencies(id)?;
        if !unmet.is_empty() {
            tracing::debug!(task_id = %id, unmet = unmet.len(), "Task blocked on dependencies");
            return Ok(AssignmentDecision::BlockedOnDependencies { unmet });
        }

        let Some(selection) = registry.select(&required) else {
            tracing::debug!(task_id = %id, "No viable agent for task");
            return Ok(AssignmentDecision::NoAgentAvailable);
        };

        let reason = format!(
            "{} scored {:.2} ({:.0}% capability coverage, performance {:.2})",
            selection.agent_id, selection.total, selection.capability * 100.0, selection.performance
        );
        let assignment = Assignment {
            task_id: *id,
            agent_id: selection.agent_id.clone(),
            assigned_at: now,
            reason,
        };

        let task = self
            .tasks
            .get_mut(id)
            .ok_or(CoordinationError::TaskNotFound { id: *id })?;
        task.status = TaskStatus::Assigned;
        task.assigned_agent = Some(selection.agent_id.clone());
        // The agent came out of select() a moment ago; losing it here is
        // an invariant violation, logged and surfaced by the detector.
        if let Err(err) =
            registry.set_status(&selection.agent_id, AgentStatus::Busy, Some(Some(*id)), now)
        {
            tracing::error!(agent_id = %selection.agent_id, error = %err, "Selected agent vanished");
        }
        self.assignments.insert(*id, assignment.clone());

        tracing::info!(task_id = %id, agent_id = %selection.agent_id, score = selection.total, "Task assigned");
        Ok(AssignmentDecision::Assigned { assignment, selection })
    }

    /// Record progress and/or a status transition on a task.
    ///
    /// Progress is clamped to `[0, 100]` and never decreases. Permitted
    /// transitions are `assigned -> in_progress` and
    /// `{assigned, in_progress} -> completed | failed`; completion forces
    /// progress to 100, stamps the completion time, and feeds the measured
    /// duration into the agent's performance counters before freeing it.
    pub fn update_progress(
        &mut self,
        id: &TaskId,
        update: ProgressUpdate,
        registry: &mut AgentRegistry,
        now: Timestamp,
    ) -> Result<ProgressOutcome, CoordinationError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or(CoordinationError::TaskNotFound { id: *id })?;
        let previous_status = task.status;
        if previous_status.is_terminal() {
            return Err(CoordinationError::TerminalTask { id: *id, status: previous_status });
        }

        if let Some(progress) = update.progress {
            task.raise_progress(progress);
        }

        let mut freed_agent = None;
        if let Some(next) = update.status {
            if next != previous_status {
                // Pending -> Assigned is legal in the state machine but
                // belongs to assign_optimal, not to client updates.
                let permitted =
                    previous_status.can_transition_to(next) && next != TaskStatus::Assigned;
                if !permitted {
                    return Err(CoordinationError::InvalidTransition {
                        id: *id,
                        from: previous_status,
                        to: next,
                    });
                }

                match next {
                    TaskStatus::InProgress => {
                        task.status = TaskStatus::InProgress;
                        if task.started_at.is_none() {
                            task.started_at = Some(now);
                        }
                    }
                    TaskStatus::Completed => {
                        task.status = TaskStatus::Completed;
                        task.completed_at = Some(now);
                        task.progress = 100;
                        let duration = task.duration_ms();
                        freed_agent =
                            free_agent(registry, task.assigned_agent.clone(), duration, true, now);
                        self.assignments.remove(id);
                    }
                    TaskStatus::Failed => {
                        task.status = TaskStatus::Failed;
                        task.completed_at = Some(now);
                        freed_agent =
                            free_agent(registry, task.assigned_agent.clone(), 0, false, now);
                        self.assignments.remove(id);
                    }
                    // `permitted` rules the rest out
                    TaskStatus::Pending | TaskStatus::Assigned => {}
                }
            }
        }

        let task = self
            .tasks
            .get(id)
            .ok_or(CoordinationError::TaskNotFound { id: *id })?;
        tracing::debug!(
            task_id = %id,
            progress = task.progress,
            status = %task.status,
            "Task progress updated"
        );
        Ok(ProgressOutcome {
            task: task.clone(),
            previous_status,
            freed_agent,
            message: update.message,
        })
    }

    /// Tasks currently pending, in creation order.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
            .collect()
    }
}

/// Record the task outcome against its agent and return it to the idle
/// pool. A vanished agent is an invariant violation worth logging, never a
/// reason to fail the task transition itself.
fn free_agent(
    registry: &mut AgentRegistry,
    agent_id: Option<switchboard_core::AgentId>,
    duration_ms: DurationMs,
    success: bool,
    now: Timestamp,
) -> Option<Agent> {
    let agent_id = agent_id?;
    if let Err(err) = registry.record_performance(&agent_id, duration_ms, success) {
        tracing::error!(agent_id = %agent_id, error = %err, "Assigned agent missing from registry");
        return None;
    }
    match registry.set_status(&agent_id, AgentStatus::Online, Some(None), now) {
        Ok(agent) => Some(agent.clone()),
        Err(err) => {
            tracing::error!(agent_id = %agent_id, error = %err, "Failed to free agent");
            None
        }
    }
}
