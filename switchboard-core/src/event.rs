//! Coordination event types
//!
//! Every mutation on the registry or the coordinator produces one of these
//! events. They are appended to the bounded history ring and fanned out to
//! every connected channel and observer stream.

use crate::{AgentId, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// EVENT KIND
// ============================================================================

/// Wire discriminator for coordination events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AgentRegistered,
    AgentJoined,
    AgentStatusUpdated,
    AgentStatusUpdate,
    AgentPerformanceUpdated,
    AgentMessage,
    TaskCreated,
    TaskAssigned,
    TaskPending,
    TaskProgressUpdated,
    TaskProgress,
    ProjectStatusUpdate,
    ConflictsDetected,
    ConflictResolutionStarted,
    ConflictResolved,
    DemoAgentConnecting,
    RegistrationError,
    TaskError,
}

impl EventKind {
    /// Wire name of the event type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AgentRegistered => "agent_registered",
            EventKind::AgentJoined => "agent_joined",
            EventKind::AgentStatusUpdated => "agent_status_updated",
            EventKind::AgentStatusUpdate => "agent_status_update",
            EventKind::AgentPerformanceUpdated => "agent_performance_updated",
            EventKind::AgentMessage => "agent_message",
            EventKind::TaskCreated => "task_created",
            EventKind::TaskAssigned => "task_assigned",
            EventKind::TaskPending => "task_pending",
            EventKind::TaskProgressUpdated => "task_progress_updated",
            EventKind::TaskProgress => "task_progress",
            EventKind::ProjectStatusUpdate => "project_status_update",
            EventKind::ConflictsDetected => "conflicts_detected",
            EventKind::ConflictResolutionStarted => "conflict_resolution_started",
            EventKind::ConflictResolved => "conflict_resolved",
            EventKind::DemoAgentConnecting => "demo_agent_connecting",
            EventKind::RegistrationError => "registration_error",
            EventKind::TaskError => "task_error",
        }
    }

    /// Parse from wire name.
    pub fn parse(s: &str) -> Result<Self, EventKindParseError> {
        match s {
            "agent_registered" => Ok(EventKind::AgentRegistered),
            "agent_joined" => Ok(EventKind::AgentJoined),
            "agent_status_updated" => Ok(EventKind::AgentStatusUpdated),
            "agent_status_update" => Ok(EventKind::AgentStatusUpdate),
            "agent_performance_updated" => Ok(EventKind::AgentPerformanceUpdated),
            "agent_message" => Ok(EventKind::AgentMessage),
            "task_created" => Ok(EventKind::TaskCreated),
            "task_assigned" => Ok(EventKind::TaskAssigned),
            "task_pending" => Ok(EventKind::TaskPending),
            "task_progress_updated" => Ok(EventKind::TaskProgressUpdated),
            "task_progress" => Ok(EventKind::TaskProgress),
            "project_status_update" => Ok(EventKind::ProjectStatusUpdate),
            "conflicts_detected" => Ok(EventKind::ConflictsDetected),
            "conflict_resolution_started" => Ok(EventKind::ConflictResolutionStarted),
            "conflict_resolved" => Ok(EventKind::ConflictResolved),
            "demo_agent_connecting" => Ok(EventKind::DemoAgentConnecting),
            "registration_error" => Ok(EventKind::RegistrationError),
            "task_error" => Ok(EventKind::TaskError),
            _ => Err(EventKindParseError(s.to_string())),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing an invalid event kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventKindParseError(pub String);

impl fmt::Display for EventKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown event type: {}", self.0)
    }
}

impl std::error::Error for EventKindParseError {}

// ============================================================================
// COORDINATION EVENT
// ============================================================================

/// One broadcast event with its ring-buffer metadata.
///
/// `agent_id` and `task_id` are the typed associations used by history
/// queries; the payload map carries the wire fields for the event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub timestamp: Timestamp,
}

impl CoordinationEvent {
    pub fn new(kind: EventKind, now: Timestamp) -> Self {
        Self {
            kind,
            agent_id: None,
            task_id: None,
            payload: Map::new(),
            timestamp: now,
        }
    }

    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_task(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Attach the wire payload. Non-object values are stored under `"data"`.
    pub fn with_payload(mut self, payload: Value) -> Self {
        match payload {
            Value::Object(map) => self.payload = map,
            other => {
                self.payload.insert("data".to_string(), other);
            }
        }
        self
    }

    /// Flatten into the message actually written to channels and streams:
    /// the payload fields at top level plus `type`, `timestamp`, and the
    /// id associations (payload fields win on collision).
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".to_string(), Value::String(self.kind.as_str().to_string()));
        if let Some(agent_id) = &self.agent_id {
            map.insert("agentId".to_string(), Value::String(agent_id.to_string()));
        }
        if let Some(task_id) = &self.task_id {
            map.insert("taskId".to_string(), Value::String(task_id.to_string()));
        }
        map.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        for (key, value) in &self.payload {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn kind_roundtrip() {
        for kind in [
            EventKind::AgentRegistered,
            EventKind::AgentJoined,
            EventKind::TaskAssigned,
            EventKind::ConflictsDetected,
            EventKind::DemoAgentConnecting,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(EventKind::parse("tea_break").is_err());
    }

    #[test]
    fn kind_serde_matches_wire_names() {
        let json = serde_json::to_string(&EventKind::TaskProgressUpdated).unwrap();
        assert_eq!(json, "\"task_progress_updated\"");
    }

    #[test]
    fn wire_shape_carries_payload_at_top_level() {
        let event = CoordinationEvent::new(EventKind::TaskAssigned, Utc::now())
            .with_agent(AgentId::new("a1"))
            .with_task(TaskId::nil())
            .with_payload(json!({"reason": "best coverage"}));
        let wire = event.to_wire();
        assert_eq!(wire["type"], "task_assigned");
        assert_eq!(wire["agentId"], "a1");
        assert_eq!(wire["reason"], "best coverage");
        assert!(wire["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn payload_fields_win_over_associations() {
        let event = CoordinationEvent::new(EventKind::TaskAssigned, Utc::now())
            .with_agent(AgentId::new("from_association"))
            .with_payload(json!({"agentId": "from_payload"}));
        assert_eq!(event.to_wire()["agentId"], "from_payload");
    }

    #[test]
    fn scalar_payload_is_wrapped() {
        let event = CoordinationEvent::new(EventKind::AgentMessage, Utc::now())
            .with_payload(json!("hello"));
        assert_eq!(event.payload["data"], "hello");
    }
}
