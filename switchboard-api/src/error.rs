//! Error Types for the Switchboard API
//!
//! Structured errors for the HTTP surface. Channel-level protocol errors
//! are answered with typed error events instead (see the ws module); this
//! type covers the snapshot endpoints and startup failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use switchboard_core::{CoordinationError, HubError, RegistryError};

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request contains invalid input data
    InvalidInput,
    /// Required field is missing from request
    MissingField,
    /// Requested agent does not exist
    AgentNotFound,
    /// Requested task does not exist
    TaskNotFound,
    /// Operation conflicts with current task state
    StateConflict,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::MissingField => StatusCode::BAD_REQUEST,
            ErrorCode::AgentNotFound | ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
            ErrorCode::StateConflict => StatusCode::CONFLICT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn agent_not_found(agent_id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::AgentNotFound,
            format!("Agent {} not found", agent_id),
        )
    }

    pub fn task_not_found(task_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TaskNotFound, format!("Task {} not found", task_id))
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StateConflict, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::AgentNotFound { id } => ApiError::agent_not_found(id),
        }
    }
}

impl From<CoordinationError> for ApiError {
    fn from(err: CoordinationError) -> Self {
        match &err {
            CoordinationError::TaskNotFound { id } => ApiError::task_not_found(id),
            CoordinationError::EmptyDescription => {
                ApiError::missing_field("description")
            }
            CoordinationError::NotPending { .. }
            | CoordinationError::InvalidTransition { .. }
            | CoordinationError::TerminalTask { .. } => {
                ApiError::state_conflict(err.to_string())
            }
        }
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::Registry(e) => e.into(),
            HubError::Coordination(e) => e.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::{TaskId, TaskStatus};

    #[test]
    fn status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::TaskNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::StateConflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn coordination_errors_map_to_codes() {
        let err: ApiError = CoordinationError::TaskNotFound { id: TaskId::nil() }.into();
        assert_eq!(err.code, ErrorCode::TaskNotFound);

        let err: ApiError = CoordinationError::EmptyDescription.into();
        assert_eq!(err.code, ErrorCode::MissingField);

        let err: ApiError = CoordinationError::TerminalTask {
            id: TaskId::nil(),
            status: TaskStatus::Completed,
        }
        .into();
        assert_eq!(err.code, ErrorCode::StateConflict);
    }

    #[test]
    fn serializes_with_screaming_code() {
        let err = ApiError::invalid_input("bad");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INVALID_INPUT"));
    }
}
