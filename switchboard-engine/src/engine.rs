//! Engine facade
//!
//! Binds the registry, the coordinator, and the event log into the single
//! logical coordinator the transports talk to. Every mutating operation
//! returns the coordination events it produced, already appended to the
//! history ring, for the caller to fan out to its subscribers.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::json;

use switchboard_core::{
    Agent, AgentId, AgentStatus, Assignment, ChannelToken, Conflict, CoordinationError,
    CoordinationEvent, EventKind, RegistryError, Task, TaskId, Timestamp,
};

use crate::coordinator::{
    AssignmentDecision, ProgressOutcome, ProgressUpdate, TaskCoordinator, TaskSpec,
};
use crate::detect;
use crate::log::EventLog;
use crate::registry::{AgentRegistration, AgentRegistry};

/// Coarse phase of the whole task board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectPhase {
    /// No tasks yet
    Initializing,
    /// Work outstanding
    Active,
    /// Every task completed
    Completed,
}

/// Aggregate counts served to `get_project_status` and `/api/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    pub status: ProjectPhase,
    /// `round(100 * completed / total)`, zero when no tasks
    pub progress: u8,
    pub active_agents: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
}

/// Result of creating a task and immediately attempting assignment.
#[derive(Debug, Clone)]
pub struct TaskSubmission {
    /// Task snapshot after the assignment attempt
    pub task: Task,
    pub decision: AssignmentDecision,
    pub events: Vec<CoordinationEvent>,
}

/// The matching-assignment-progress-conflict engine plus its event ring.
#[derive(Debug, Default)]
pub struct Engine {
    registry: AgentRegistry,
    coordinator: TaskCoordinator,
    log: EventLog,
}

impl Engine {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            registry: AgentRegistry::new(),
            coordinator: TaskCoordinator::new(),
            log: EventLog::new(event_capacity),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &TaskCoordinator {
        &self.coordinator
    }

    pub fn events(&self) -> &EventLog {
        &self.log
    }

    /// Append to the history ring and hand the event back for broadcast.
    fn emit(&mut self, event: CoordinationEvent) -> CoordinationEvent {
        self.log.append(event.clone());
        event
    }

    // ========================================================================
    // AGENT OPERATIONS
    // ========================================================================

    /// Register (or re-register) an agent and emit the join events.
    pub fn register_agent(
        &mut self,
        reg: AgentRegistration,
        now: Timestamp,
    ) -> (Agent, Vec<CoordinationEvent>) {
        let agent = self.registry.register(reg, now).clone();
        let events = vec![
            self.emit(agent_registered_event(&agent, now)),
            self.emit(agent_joined_event(&agent, now)),
        ];
        (agent, events)
    }

    /// Client-driven status change.
    pub fn set_agent_status(
        &mut self,
        id: &AgentId,
        status: AgentStatus,
        current_task: Option<Option<TaskId>>,
        now: Timestamp,
    ) -> Result<(Agent, Vec<CoordinationEvent>), RegistryError> {
        let agent = self.registry.set_status(id, status, current_task, now)?.clone();
        let events = vec![self.emit(agent_status_event(&agent, now))];
        Ok((agent, events))
    }

    /// React to a closed bidirectional channel: the owning agent (if any)
    /// goes offline, its token is dropped, and in-flight assignments stay
    /// untouched so the task state is preserved for later inspection.
    pub fn channel_closed(&mut self, token: ChannelToken, now: Timestamp) -> Vec<CoordinationEvent> {
        let Some(agent_id) = self.registry.agent_by_channel(token).map(|a| a.id.clone()) else {
            return Vec::new();
        };
        match self.registry.set_status(&agent_id, AgentStatus::Offline, None, now) {
            Ok(agent) => {
                let agent = agent.clone();
                tracing::info!(agent_id = %agent_id, "Channel closed; agent offline");
                vec![self.emit(agent_status_event(&agent, now))]
            }
            Err(err) => {
                tracing::warn!(agent_id = %agent_id, error = %err, "Disconnect for unknown agent");
                Vec::new()
            }
        }
    }

    /// Liveness sweep: agents silent for longer than `threshold` go
    /// offline. The only time-driven mutation in the hub.
    pub fn sweep_stale(&mut self, now: Timestamp, threshold: Duration) -> Vec<CoordinationEvent> {
        let mut events = Vec::new();
        for agent_id in self.registry.stale_ids(now, threshold) {
            match self.registry.set_status(&agent_id, AgentStatus::Offline, None, now) {
                Ok(agent) => {
                    let agent = agent.clone();
                    tracing::info!(agent_id = %agent_id, "Agent went stale; marked offline");
                    events.push(self.emit(agent_status_event(&agent, now)));
                }
                Err(err) => {
                    tracing::warn!(agent_id = %agent_id, error = %err, "Stale sweep lost an agent")
                }
            }
        }
        events
    }

    // ========================================================================
    // TASK OPERATIONS
    // ========================================================================

    /// Create a task and immediately attempt assignment.
    pub fn submit_task(
        &mut self,
        spec: TaskSpec,
        now: Timestamp,
    ) -> Result<TaskSubmission, CoordinationError> {
        let created = self.coordinator.create_task(spec, now)?.clone();
        let id = created.id;
        let mut events = vec![self.emit(task_created_event(&created, now))];

        let decision = self.coordinator.assign_optimal(&id, &mut self.registry, now)?;
        let task = self.coordinator.get(&id).cloned().unwrap_or(created);
        match &decision {
            AssignmentDecision::Assigned { assignment, .. } => {
                events.push(self.emit(task_assigned_event(assignment, &task, now)));
                if let Some(agent) = self.registry.get(&assignment.agent_id).cloned() {
                    events.push(self.emit(agent_status_event(&agent, now)));
                }
            }
            AssignmentDecision::BlockedOnDependencies { unmet } => {
                let reason = format!("Waiting on {} incomplete dependencies", unmet.len());
                events.push(self.emit(task_pending_event(&task, &reason, now)));
            }
            AssignmentDecision::NoAgentAvailable => {
                events.push(self.emit(task_pending_event(
                    &task,
                    "No qualified agent available",
                    now,
                )));
            }
        }

        Ok(TaskSubmission { task, decision, events })
    }

    /// Record progress and/or a lifecycle transition on a task. A
    /// completion re-examines all pending tasks.
    pub fn update_progress(
        &mut self,
        id: &TaskId,
        update: ProgressUpdate,
        now: Timestamp,
    ) -> Result<(ProgressOutcome, Vec<CoordinationEvent>), CoordinationError> {
        let outcome = self
            .coordinator
            .update_progress(id, update, &mut self.registry, now)?;

        let mut events = Vec::new();
        if let Some(agent) = outcome.freed_agent.clone() {
            let success = outcome.task.status == switchboard_core::TaskStatus::Completed;
            events.push(self.emit(agent_performance_event(&agent, success, now)));
            events.push(self.emit(agent_status_event(&agent, now)));
        }
        events.push(self.emit(task_progress_event(EventKind::TaskProgressUpdated, &outcome, now)));
        events.push(self.emit(task_progress_event(EventKind::TaskProgress, &outcome, now)));

        if outcome.completed_now() {
            events.extend(self.process_pending(now));
        }
        Ok((outcome, events))
    }

    /// Attempt assignment for every pending task, in creation order.
    /// Individual failures are logged, never fatal.
    pub fn process_pending(&mut self, now: Timestamp) -> Vec<CoordinationEvent> {
        let mut events = Vec::new();
        for id in self.coordinator.pending_ids() {
            match self.coordinator.assign_optimal(&id, &mut self.registry, now) {
                Ok(AssignmentDecision::Assigned { assignment, .. }) => {
                    let Some(task) = self.coordinator.get(&id).cloned() else {
                        continue;
                    };
                    events.push(self.emit(task_assigned_event(&assignment, &task, now)));
                    if let Some(agent) = self.registry.get(&assignment.agent_id).cloned() {
                        events.push(self.emit(agent_status_event(&agent, now)));
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(task_id = %id, error = %err, "Pending pass failed on task")
                }
            }
        }
        events
    }

    // ========================================================================
    // CONFLICTS
    // ========================================================================

    /// Pure scan of current state for the three conflict classes.
    pub fn detect_conflicts(&self) -> Vec<Conflict> {
        detect::detect(&self.registry, &self.coordinator)
    }

    /// Emit `conflicts_detected` for a non-empty finding set.
    pub fn record_conflicts(
        &mut self,
        conflicts: &[Conflict],
        now: Timestamp,
    ) -> Option<CoordinationEvent> {
        if conflicts.is_empty() {
            return None;
        }
        tracing::warn!(count = conflicts.len(), "Conflicts detected");
        Some(self.emit(
            CoordinationEvent::new(EventKind::ConflictsDetected, now).with_payload(json!({
                "conflicts": conflicts,
                "count": conflicts.len(),
            })),
        ))
    }

    /// Announce the intended remedy for one conflict. The remediation
    /// itself is not performed here; see the resolver in the API layer.
    pub fn begin_conflict_resolution(
        &mut self,
        conflict: &Conflict,
        now: Timestamp,
    ) -> CoordinationEvent {
        self.emit(
            CoordinationEvent::new(EventKind::ConflictResolutionStarted, now).with_payload(json!({
                "conflict": conflict,
                "resolution": conflict.suggested_resolution,
            })),
        )
    }

    /// Announce that the resolution window for one conflict has elapsed.
    pub fn finish_conflict_resolution(
        &mut self,
        conflict: &Conflict,
        now: Timestamp,
    ) -> CoordinationEvent {
        self.emit(
            CoordinationEvent::new(EventKind::ConflictResolved, now)
                .with_payload(json!({ "conflict": conflict })),
        )
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    /// Aggregate board status.
    pub fn project_status(&self) -> ProjectStatus {
        let total_tasks = self.coordinator.len();
        let completed_tasks = self.coordinator.completed_count();
        let status = if total_tasks == 0 {
            ProjectPhase::Initializing
        } else if completed_tasks == total_tasks {
            ProjectPhase::Completed
        } else {
            ProjectPhase::Active
        };
        let progress = if total_tasks == 0 {
            0
        } else {
            (100.0 * completed_tasks as f64 / total_tasks as f64).round() as u8
        };
        ProjectStatus {
            status,
            progress,
            active_agents: self.registry.active_count(),
            total_tasks,
            completed_tasks,
        }
    }
}

// ============================================================================
// EVENT BUILDERS
// ============================================================================

fn agent_registered_event(agent: &Agent, now: Timestamp) -> CoordinationEvent {
    CoordinationEvent::new(EventKind::AgentRegistered, now)
        .with_agent(agent.id.clone())
        .with_payload(json!({ "success": true, "agent": agent }))
}

fn agent_joined_event(agent: &Agent, now: Timestamp) -> CoordinationEvent {
    CoordinationEvent::new(EventKind::AgentJoined, now)
        .with_agent(agent.id.clone())
        .with_payload(json!({
            "name": agent.name,
            "capabilities": agent.capabilities,
        }))
}

fn agent_status_event(agent: &Agent, now: Timestamp) -> CoordinationEvent {
    CoordinationEvent::new(EventKind::AgentStatusUpdated, now)
        .with_agent(agent.id.clone())
        .with_payload(json!({
            "status": agent.status,
            "currentTask": agent.current_task,
        }))
}

fn agent_performance_event(agent: &Agent, success: bool, now: Timestamp) -> CoordinationEvent {
    CoordinationEvent::new(EventKind::AgentPerformanceUpdated, now)
        .with_agent(agent.id.clone())
        .with_payload(json!({
            "performanceScore": agent.performance_score,
            "tasksCompleted": agent.tasks_completed,
            "averageTaskTime": agent.average_task_time,
            "success": success,
        }))
}

fn task_created_event(task: &Task, now: Timestamp) -> CoordinationEvent {
    CoordinationEvent::new(EventKind::TaskCreated, now)
        .with_task(task.id)
        .with_payload(json!({ "task": task }))
}

fn task_assigned_event(assignment: &Assignment, task: &Task, now: Timestamp) -> CoordinationEvent {
    CoordinationEvent::new(EventKind::TaskAssigned, now)
        .with_task(task.id)
        .with_agent(assignment.agent_id.clone())
        .with_payload(json!({
            "task": task,
            "reason": assignment.reason,
        }))
}

fn task_pending_event(task: &Task, reason: &str, now: Timestamp) -> CoordinationEvent {
    CoordinationEvent::new(EventKind::TaskPending, now)
        .with_task(task.id)
        .with_payload(json!({
            "task": task,
            "reason": reason,
        }))
}

fn task_progress_event(
    kind: EventKind,
    outcome: &ProgressOutcome,
    now: Timestamp,
) -> CoordinationEvent {
    let mut event = CoordinationEvent::new(kind, now)
        .with_task(outcome.task.id)
        .with_payload(json!({
            "progress": outcome.task.progress,
            "status": outcome.task.status,
            "message": outcome.message,
        }));
    if let Some(agent_id) = outcome.task.assigned_agent.clone() {
        event = event.with_agent(agent_id);
    }
    event
}
