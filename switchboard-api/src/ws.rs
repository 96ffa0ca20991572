//! Bidirectional event channel
//!
//! Agents and task producers connect here. Each connection runs in its
//! own task and multiplexes three streams: inbound frames (dispatched by
//! message type), targeted replies from the hub's indirection table, and
//! the global broadcast feed. Dispatch itself is synchronous - the
//! mutation lock is never held across an await - and all socket writes
//! happen after the hub has released it.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use switchboard_core::{AgentId, ChannelToken, CoordinationEvent, EventKind};
use switchboard_engine::{AgentRegistration, ProgressUpdate, TaskSpec};

use crate::hub::{Hub, DIRECT_QUEUE_BOUND};
use crate::protocol::{ClientMessage, ProtocolError};

/// WebSocket upgrade handler for `GET /ws`. No authentication; every
/// transport in the hub is open by design.
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Run one channel for its whole lifetime.
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let token = ChannelToken::mint();
    info!(%token, "Channel connected");

    let (direct_tx, mut direct_rx) = mpsc::channel::<Value>(DIRECT_QUEUE_BOUND);
    hub.register_peer(token, direct_tx);

    let (mut sink, mut stream) = socket.split();
    let mut broadcasts = hub.subscribe();

    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let replies = dispatch(&hub, token, text.as_str());
                    if send_all(&mut sink, replies).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    debug!(%token, "Client sent close frame");
                    break;
                }
                // Pings are answered by axum; binary frames are ignored.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%token, error = %e, "Channel receive error");
                    break;
                }
                None => break,
            },
            direct = direct_rx.recv() => match direct {
                Some(message) => {
                    if send_json(&mut sink, &message).await.is_err() {
                        break;
                    }
                }
                // The hub dropped our queue (kicked for slowness).
                None => {
                    warn!(%token, "Direct queue closed; disconnecting");
                    break;
                }
            },
            event = broadcasts.recv() => match event {
                Ok(event) => {
                    if send_json(&mut sink, &event.to_wire()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%token, skipped, "Channel lagged; broadcast events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    hub.channel_closed(token);
    info!(%token, "Channel disconnected");
}

async fn send_all(
    sink: &mut SplitSink<WebSocket, Message>,
    messages: Vec<Value>,
) -> Result<(), axum::Error> {
    for message in messages {
        send_json(sink, &message).await?;
    }
    Ok(())
}

async fn send_json(
    sink: &mut SplitSink<WebSocket, Message>,
    value: &Value,
) -> Result<(), axum::Error> {
    sink.send(Message::Text(value.to_string().into())).await
}

/// Apply one inbound frame and return the replies owed on this channel.
/// Broadcast side effects go through the hub; state errors come back as
/// typed error events, never a disconnect.
fn dispatch(hub: &Hub, token: ChannelToken, text: &str) -> Vec<Value> {
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(%token, error = %err, "Protocol error on channel");
            return vec![error_event(&err)];
        }
    };

    match message {
        ClientMessage::RegisterAgent(payload) => {
            let agent = hub.register_agent(AgentRegistration {
                id: AgentId::new(payload.agent_id),
                name: payload.name,
                capabilities: payload.capabilities.into_iter().collect(),
                channel: Some(token),
            });
            vec![json!({
                "type": "agent_registered",
                "success": true,
                "agentId": agent.id,
                "agent": agent,
                "timestamp": Utc::now().to_rfc3339(),
            })]
        }
        ClientMessage::CreateTask(payload) => {
            let spec = TaskSpec {
                description: payload.description,
                required_capabilities: payload.required_capabilities.into_iter().collect(),
                priority: payload.priority,
                dependencies: payload.dependencies,
                estimated_duration: payload.estimated_duration,
            };
            match hub.submit_task(spec) {
                Ok(submission) => vec![json!({
                    "type": "task_created",
                    "success": true,
                    "task": submission.task,
                    "timestamp": Utc::now().to_rfc3339(),
                })],
                Err(err) => {
                    warn!(%token, error = %err, "Task creation failed");
                    vec![task_error(err.message)]
                }
            }
        }
        ClientMessage::UpdateTaskProgress(payload) => {
            let update = ProgressUpdate {
                progress: payload.progress,
                status: payload.status,
                message: payload.message,
            };
            match hub.update_progress(&payload.task_id, update) {
                // The broadcast feed already carries task_progress.
                Ok(_) => Vec::new(),
                Err(err) => {
                    warn!(%token, task_id = %payload.task_id, error = %err, "Progress update rejected");
                    vec![task_error(err.message)]
                }
            }
        }
        ClientMessage::AgentStatus(payload) => {
            let agent_id = AgentId::new(payload.agent_id);
            match hub.set_agent_status(&agent_id, payload.status, payload.current_task.map(Some)) {
                Ok(agent) => {
                    hub.broadcast_transient(
                        CoordinationEvent::new(EventKind::AgentStatusUpdate, Utc::now())
                            .with_agent(agent.id.clone())
                            .with_payload(json!({ "status": agent.status })),
                    );
                    Vec::new()
                }
                Err(err) => {
                    warn!(%token, agent_id = %agent_id, error = %err, "Status update rejected");
                    vec![registration_error(err.message)]
                }
            }
        }
        ClientMessage::AgentMessage(payload) => {
            let timestamp = payload
                .timestamp
                .unwrap_or_else(|| Utc::now().to_rfc3339());
            hub.relay_from(
                token,
                json!({
                    "type": "agent_message",
                    "sender": payload.sender,
                    "message": payload.message,
                    "timestamp": timestamp,
                }),
            );
            Vec::new()
        }
        ClientMessage::GetProjectStatus => {
            let status = hub.project_status();
            let mut frame = match serde_json::to_value(&status) {
                Ok(Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            frame.insert("type".to_string(), json!("project_status_update"));
            frame.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
            vec![Value::Object(frame)]
        }
        // Bootstrap replays: one frame per known entity, on this channel
        // only.
        ClientMessage::GetAgentRegistry => hub
            .agents()
            .into_iter()
            .map(|agent| {
                json!({
                    "type": "agent_registered",
                    "success": true,
                    "agentId": agent.id,
                    "agent": agent,
                    "timestamp": Utc::now().to_rfc3339(),
                })
            })
            .collect(),
        ClientMessage::GetTasks => hub
            .tasks()
            .into_iter()
            .map(|task| {
                json!({
                    "type": "task_assigned",
                    "agentId": task.assigned_agent,
                    "task": task,
                    "timestamp": Utc::now().to_rfc3339(),
                })
            })
            .collect(),
    }
}

fn error_event(err: &ProtocolError) -> Value {
    json!({
        "type": err.error_kind().as_str(),
        "message": err.to_string(),
        "timestamp": Utc::now().to_rfc3339(),
    })
}

fn task_error(message: String) -> Value {
    json!({
        "type": "task_error",
        "message": message,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

fn registration_error(message: String) -> Value {
    json!({
        "type": "registration_error",
        "message": message,
        "timestamp": Utc::now().to_rfc3339(),
    })
}
