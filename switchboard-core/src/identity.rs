//! Identity types for Switchboard entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for task timing values.
pub type DurationMs = i64;

// ============================================================================
// TASK ID
// ============================================================================

/// Type-safe ID for task entities.
///
/// Task IDs are assigned by the hub on creation and are 128-bit random
/// values, so producers cannot collide even when racing task creation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new random task ID.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a nil (all zeros) ID.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = TaskIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self).map_err(|source| TaskIdParseError {
            input: s.to_string(),
            source,
        })
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Error type for parsing task IDs from strings.
#[derive(Debug, Clone)]
pub struct TaskIdParseError {
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for TaskIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to parse task ID from '{}': {}", self.input, self.source)
    }
}

impl std::error::Error for TaskIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// ============================================================================
// AGENT ID
// ============================================================================

/// Stable agent identifier supplied by the client on registration.
///
/// Unlike task IDs these are opaque strings chosen by the agent process
/// (e.g. "code_reviewer_1"), so the hub treats them as verbatim keys.
/// Matching is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// CHANNEL TOKEN
// ============================================================================

/// Opaque handle tying an agent record to an open bidirectional channel.
///
/// The transport layer mints one token per connection and owns the actual
/// socket; the registry stores only the token and routes outgoing messages
/// through the transport's indirection table. Dropping the table entry on
/// channel close is what drives the agent's `offline` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelToken(Uuid);

impl ChannelToken {
    /// Mint a fresh token for a new connection.
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ChannelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_unique() {
        let a = TaskId::random();
        let b = TaskId::random();
        assert_ne!(a, b);
    }

    #[test]
    fn task_id_roundtrips_through_display() {
        let id = TaskId::random();
        let parsed: TaskId = id.to_string().parse().expect("valid UUID should parse");
        assert_eq!(id, parsed);
    }

    #[test]
    fn task_id_parse_error_keeps_input() {
        let result: Result<TaskId, _> = "not-a-uuid".parse();
        let err = result.unwrap_err();
        assert_eq!(err.input, "not-a-uuid");
    }

    #[test]
    fn task_id_serializes_as_bare_uuid() {
        let id = TaskId::nil();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn agent_id_serializes_transparently() {
        let id = AgentId::new("builder_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"builder_1\"");
        let back: AgentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn channel_tokens_are_unique() {
        assert_ne!(ChannelToken::mint(), ChannelToken::mint());
    }
}
