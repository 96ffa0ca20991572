//! Hub state shared across transports
//!
//! One [`Engine`] behind a single `RwLock` is the whole coordination
//! state. Every inbound message mutates under the write lock, which is
//! also where the engine appends to its history ring and where the
//! broadcast-channel send happens - a non-blocking in-memory append, so
//! the ring and the live feed agree on one total order. Actual socket
//! writes run in each subscriber's own task after the lock is long
//! gone, so a slow observer can never back-pressure a mutation. Direct
//! replies and relays go through a per-channel indirection table owned
//! here by the transport layer - the registry never touches a socket.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use switchboard_core::{
    Agent, AgentId, AgentStatus, ChannelToken, Conflict, CoordinationEvent, EventKind, Task,
    TaskId,
};
use switchboard_engine::{
    AgentRegistration, Engine, ProgressOutcome, ProgressUpdate, ProjectStatus, TaskSpec,
    TaskSubmission,
};

use crate::config::HubConfig;
use crate::error::ApiResult;

/// Direct-reply queue bound per channel. A peer that falls this far
/// behind on targeted messages is disconnected rather than allowed to
/// grow an unbounded queue.
pub const DIRECT_QUEUE_BOUND: usize = 256;

/// Shared hub state: the engine, the broadcast fan-out, and the
/// channel indirection table.
pub struct Hub {
    engine: RwLock<Engine>,
    events_tx: broadcast::Sender<CoordinationEvent>,
    peers: RwLock<HashMap<ChannelToken, mpsc::Sender<Value>>>,
    config: HubConfig,
}

impl Hub {
    pub fn new(config: HubConfig) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(16));
        Arc::new(Self {
            engine: RwLock::new(Engine::new(config.event_capacity)),
            events_tx,
            peers: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Subscribe to the live event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.events_tx.subscribe()
    }

    /// Fan events out to every subscriber. Non-blocking; with no
    /// receivers the events are simply dropped (the ring still has them).
    fn publish(&self, events: Vec<CoordinationEvent>) {
        for event in events {
            tracing::debug!(event_type = event.kind.as_str(), "Broadcast event");
            let _ = self.events_tx.send(event);
        }
    }

    /// Broadcast an event without recording it in the history ring.
    /// Used for the channel-level `agent_status_update` echo.
    pub fn broadcast_transient(&self, event: CoordinationEvent) {
        let _ = self.events_tx.send(event);
    }

    // ========================================================================
    // CHANNEL INDIRECTION TABLE
    // ========================================================================

    /// Attach a connected channel's outgoing queue.
    pub fn register_peer(&self, token: ChannelToken, sender: mpsc::Sender<Value>) {
        self.peers.write().insert(token, sender);
    }

    /// Send a targeted message to one channel. A full queue kicks the
    /// peer: its sender is dropped and the connection loop winds down.
    pub fn send_to_peer(&self, token: ChannelToken, message: Value) {
        let sender = match self.peers.read().get(&token) {
            Some(sender) => sender.clone(),
            None => return,
        };
        if sender.try_send(message).is_err() {
            tracing::warn!(%token, "Peer queue full or closed; disconnecting");
            self.peers.write().remove(&token);
        }
    }

    /// Relay a message to every channel except its origin. Relayed chat
    /// is never persisted.
    pub fn relay_from(&self, origin: ChannelToken, message: Value) {
        let targets: Vec<(ChannelToken, mpsc::Sender<Value>)> = self
            .peers
            .read()
            .iter()
            .filter(|(token, _)| **token != origin)
            .map(|(token, sender)| (*token, sender.clone()))
            .collect();
        let mut kicked = Vec::new();
        for (token, sender) in targets {
            if sender.try_send(message.clone()).is_err() {
                tracing::warn!(%token, "Peer queue full during relay; disconnecting");
                kicked.push(token);
            }
        }
        if !kicked.is_empty() {
            let mut peers = self.peers.write();
            for token in kicked {
                peers.remove(&token);
            }
        }
    }

    /// Tear down a channel: drop its queue, mark the owning agent
    /// offline, and leave any in-flight assignment untouched.
    pub fn channel_closed(&self, token: ChannelToken) {
        self.peers.write().remove(&token);
        let mut engine = self.engine.write();
        let events = engine.channel_closed(token, Utc::now());
        self.publish(events);
    }

    // ========================================================================
    // COORDINATION OPERATIONS
    // ========================================================================

    /// Register (or re-register) an agent.
    pub fn register_agent(&self, reg: AgentRegistration) -> Agent {
        let mut engine = self.engine.write();
        let (agent, events) = engine.register_agent(reg, Utc::now());
        self.publish(events);
        agent
    }

    /// Client-driven agent status change.
    pub fn set_agent_status(
        &self,
        id: &AgentId,
        status: AgentStatus,
        current_task: Option<Option<TaskId>>,
    ) -> ApiResult<Agent> {
        let mut engine = self.engine.write();
        let (agent, events) = engine.set_agent_status(id, status, current_task, Utc::now())?;
        self.publish(events);
        Ok(agent)
    }

    /// Create a task and immediately attempt assignment.
    pub fn submit_task(&self, spec: TaskSpec) -> ApiResult<TaskSubmission> {
        let mut engine = self.engine.write();
        let submission = engine.submit_task(spec, Utc::now())?;
        self.publish(submission.events.clone());
        Ok(submission)
    }

    /// Record progress and/or a lifecycle transition.
    pub fn update_progress(&self, id: &TaskId, update: ProgressUpdate) -> ApiResult<ProgressOutcome> {
        let mut engine = self.engine.write();
        let (outcome, events) = engine.update_progress(id, update, Utc::now())?;
        self.publish(events);
        Ok(outcome)
    }

    /// Run the conflict detector and, for non-empty findings, emit
    /// `conflicts_detected`. The caller decides whether to spawn the
    /// resolution announcements (see the resolve module).
    pub fn detect_conflicts(&self) -> Vec<Conflict> {
        let mut engine = self.engine.write();
        let conflicts = engine.detect_conflicts();
        if let Some(event) = engine.record_conflicts(&conflicts, Utc::now()) {
            self.publish(vec![event]);
        }
        conflicts
    }

    /// Announce that resolution of one conflict has begun.
    pub fn begin_resolution(&self, conflict: &Conflict) {
        let mut engine = self.engine.write();
        let event = engine.begin_conflict_resolution(conflict, Utc::now());
        self.publish(vec![event]);
    }

    /// Announce that the resolution window for one conflict has elapsed.
    pub fn finish_resolution(&self, conflict: &Conflict) {
        let mut engine = self.engine.write();
        let event = engine.finish_conflict_resolution(conflict, Utc::now());
        self.publish(vec![event]);
    }

    /// One liveness sweep pass.
    pub fn sweep(&self) {
        let threshold = chrono::Duration::seconds(self.config.stale_after.as_secs() as i64);
        let mut engine = self.engine.write();
        let events = engine.sweep_stale(Utc::now(), threshold);
        self.publish(events);
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    pub fn agents(&self) -> Vec<Agent> {
        self.engine.read().registry().iter().cloned().collect()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.engine.read().coordinator().iter().cloned().collect()
    }

    /// (agent count, task count) for the health snapshot.
    pub fn counts(&self) -> (usize, usize) {
        let engine = self.engine.read();
        (engine.registry().len(), engine.coordinator().len())
    }

    pub fn project_status(&self) -> ProjectStatus {
        self.engine.read().project_status()
    }

    /// Replay from the history ring, optionally filtered by kind.
    pub fn recent_events(&self, limit: usize, kind: Option<EventKind>) -> Vec<CoordinationEvent> {
        let engine = self.engine.read();
        match kind {
            Some(kind) => engine.events().by_type(kind, limit),
            None => engine.events().recent(limit),
        }
    }
}
