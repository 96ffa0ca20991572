//! Error types for hub operations

use crate::{AgentId, TaskId, TaskStatus};
use thiserror::Error;

/// Agent registry errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Agent not registered: {id}")]
    AgentNotFound { id: AgentId },
}

/// Task coordination errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinationError {
    #[error("Task not found: {id}")]
    TaskNotFound { id: TaskId },

    #[error("Task description must not be empty")]
    EmptyDescription,

    #[error("Task {id} is {status}, not pending; cannot assign")]
    NotPending { id: TaskId, status: TaskStatus },

    #[error("Invalid status transition for task {id}: {from} -> {to}")]
    InvalidTransition {
        id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task {id} is {status}; terminal tasks cannot be updated")]
    TerminalTask { id: TaskId, status: TaskStatus },
}

/// Master error type for hub operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HubError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),
}

/// Result type alias for hub operations.
pub type HubResult<T> = Result<T, HubError>;
