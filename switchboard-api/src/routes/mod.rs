//! HTTP route assembly

pub mod conflicts;
pub mod health;
pub mod snapshots;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::hub::Hub;
use crate::sse;
use crate::ws;

/// Build the full router: the bidirectional channel, the observer
/// stream, and the read-only snapshot endpoints.
pub fn create_api_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/ws", get(ws::ws_handler))
        .route("/events", get(sse::sse_handler))
        .route("/api/agents", get(snapshots::list_agents))
        .route("/api/tasks", get(snapshots::list_tasks))
        .route("/api/status", get(snapshots::project_status))
        .route("/api/events", get(snapshots::event_history))
        .route("/api/conflicts", get(conflicts::detect_conflicts))
        .with_state(hub)
}
