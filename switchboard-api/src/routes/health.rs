//! Health Check Endpoint
//!
//! `GET /health` returns a liveness snapshot with coordination counts.
//! No authentication.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use switchboard_core::Timestamp;

use crate::hub::Hub;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: Timestamp,
    /// Known agents (all statuses)
    pub agents: usize,
    /// Known tasks (all states)
    pub tasks: usize,
}

/// GET /health
pub async fn health(State(hub): State<Arc<Hub>>) -> Json<HealthResponse> {
    let (agents, tasks) = hub.counts();
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        agents,
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_shape() {
        let response = HealthResponse {
            status: "ok",
            timestamp: Utc::now(),
            agents: 2,
            tasks: 5,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["agents"], 2);
        assert_eq!(json["tasks"], 5);
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
