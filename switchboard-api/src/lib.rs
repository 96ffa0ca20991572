//! Switchboard API - Transport Layer
//!
//! Exposes the coordination engine over three surfaces: a bidirectional
//! WebSocket channel for agents and task producers, a push-only SSE
//! stream for observers, and read-only HTTP snapshots. The hub is a
//! single logical coordinator; all transports funnel mutations through
//! one lock and fan events out afterwards.

pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod resolve;
pub mod routes;
pub mod sse;
pub mod sweep;
pub mod ws;

pub use config::HubConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use hub::Hub;
pub use protocol::{ClientMessage, ProtocolError};
pub use routes::create_api_router;
