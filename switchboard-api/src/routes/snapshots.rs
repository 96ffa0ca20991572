//! Read-only coordination snapshots
//!
//! `GET /api/agents`, `GET /api/tasks`, `GET /api/status`, and the
//! event-history replay at `GET /api/events`. All of these read under the
//! shared lock and never mutate.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use switchboard_core::{Agent, EventKind, Task};
use switchboard_engine::ProjectStatus;

use crate::error::{ApiError, ApiResult};
use crate::hub::Hub;

/// GET /api/agents - every known agent, registration order.
pub async fn list_agents(State(hub): State<Arc<Hub>>) -> Json<Vec<Agent>> {
    Json(hub.agents())
}

/// GET /api/tasks - every known task, creation order.
pub async fn list_tasks(State(hub): State<Arc<Hub>>) -> Json<Vec<Task>> {
    Json(hub.tasks())
}

/// GET /api/status - the project aggregate.
pub async fn project_status(State(hub): State<Arc<Hub>>) -> Json<ProjectStatus> {
    Json(hub.project_status())
}

/// Query parameters for the event replay.
#[derive(Debug, Deserialize)]
pub struct EventHistoryQuery {
    /// Maximum events to return; defaults to the full ring.
    pub limit: Option<usize>,
    /// Restrict to one event type (wire name, e.g. `task_assigned`).
    #[serde(rename = "type")]
    pub event_type: Option<String>,
}

/// GET /api/events - late-joiner replay from the history ring, oldest
/// first, in the exact order live observers saw the events.
pub async fn event_history(
    State(hub): State<Arc<Hub>>,
    Query(query): Query<EventHistoryQuery>,
) -> ApiResult<Json<Vec<Value>>> {
    let kind = match &query.event_type {
        Some(name) => Some(
            EventKind::parse(name)
                .map_err(|e| ApiError::invalid_input(e.to_string()))?,
        ),
        None => None,
    };
    let limit = query.limit.unwrap_or(usize::MAX);
    let events = hub.recent_events(limit, kind);
    Ok(Json(events.iter().map(|e| e.to_wire()).collect()))
}
