//! On-demand conflict detection
//!
//! `GET /api/conflicts` runs the detector over current state, reports
//! the findings, and kicks off the resolution announcements for each
//! one. Detection itself never mutates coordination state; the only side
//! effects are events.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use switchboard_core::Conflict;

use crate::hub::Hub;
use crate::resolve;

/// Conflict scan response.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
    pub count: usize,
}

/// GET /api/conflicts
pub async fn detect_conflicts(State(hub): State<Arc<Hub>>) -> Json<ConflictReport> {
    let conflicts = hub.detect_conflicts();
    resolve::spawn_resolutions(hub.clone(), conflicts.clone());
    Json(ConflictReport {
        count: conflicts.len(),
        conflicts,
    })
}
