//! Bidirectional channel protocol
//!
//! Inbound messages are JSON objects dispatched by their `type` field.
//! Field names are camelCase on the wire (`agentId`,
//! `requiredCapabilities`); unknown fields are ignored, and
//! `task_progress` is accepted as a legacy alias for
//! `update_task_progress`. Parsing is two-phase - type first, then the
//! typed payload - so a malformed message can be answered with the error
//! event matching its declared type.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use switchboard_core::{AgentStatus, EventKind, TaskId, TaskPriority, TaskStatus};

// ============================================================================
// INBOUND PAYLOADS
// ============================================================================

/// `register_agent`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgentPayload {
    pub agent_id: String,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// `create_task`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub description: String,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
}

/// `update_task_progress` (alias `task_progress`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressPayload {
    pub task_id: TaskId,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `agent_status`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusPayload {
    pub agent_id: String,
    pub status: AgentStatus,
    #[serde(default)]
    pub current_task: Option<TaskId>,
}

/// `agent_message` - relayed to all other channels, never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessagePayload {
    pub sender: String,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One parsed inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    RegisterAgent(RegisterAgentPayload),
    CreateTask(CreateTaskPayload),
    UpdateTaskProgress(UpdateProgressPayload),
    AgentStatus(AgentStatusPayload),
    AgentMessage(AgentMessagePayload),
    GetProjectStatus,
    GetAgentRegistry,
    GetTasks,
}

impl ClientMessage {
    /// Parse one channel frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
        let message_type = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_string();

        let parsed = match message_type.as_str() {
            "register_agent" => {
                serde_json::from_value::<RegisterAgentPayload>(value).map(Self::RegisterAgent)
            }
            "create_task" => {
                serde_json::from_value::<CreateTaskPayload>(value).map(Self::CreateTask)
            }
            "update_task_progress" | "task_progress" => {
                serde_json::from_value::<UpdateProgressPayload>(value)
                    .map(Self::UpdateTaskProgress)
            }
            "agent_status" => {
                serde_json::from_value::<AgentStatusPayload>(value).map(Self::AgentStatus)
            }
            "agent_message" => {
                serde_json::from_value::<AgentMessagePayload>(value).map(Self::AgentMessage)
            }
            "get_project_status" => return Ok(Self::GetProjectStatus),
            "get_agent_registry" => return Ok(Self::GetAgentRegistry),
            "get_tasks" => return Ok(Self::GetTasks),
            other => return Err(ProtocolError::UnknownType(other.to_string())),
        };
        parsed.map_err(|e| ProtocolError::InvalidPayload {
            message_type,
            reason: e.to_string(),
        })
    }
}

// ============================================================================
// PROTOCOL ERRORS
// ============================================================================

/// Channel-level protocol error. Answered with a typed error event on the
/// same channel; never a disconnect.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    #[error("Malformed JSON: {0}")]
    InvalidJson(String),

    #[error("Message has no type field")]
    MissingType,

    #[error("Unsupported message type: {0}")]
    UnknownType(String),

    #[error("Invalid {message_type} payload: {reason}")]
    InvalidPayload { message_type: String, reason: String },
}

impl ProtocolError {
    /// Which error event answers this failure: agent-scoped messages get
    /// `registration_error`, task-scoped ones `task_error`.
    pub fn error_kind(&self) -> EventKind {
        match self {
            ProtocolError::InvalidPayload { message_type, .. } => match message_type.as_str() {
                "register_agent" | "agent_status" | "agent_message" => EventKind::RegistrationError,
                _ => EventKind::TaskError,
            },
            _ => EventKind::TaskError,
        }
    }
}
