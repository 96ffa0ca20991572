//! Hub Configuration
//!
//! Configuration is loaded from environment variables with development
//! defaults; nothing is required to start a local hub.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default event ring / broadcast channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1_000;
/// Default liveness sweep interval.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
/// Default staleness threshold before an agent is marked offline.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 300;

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Bind address (`SWITCHBOARD_BIND`, default `0.0.0.0`)
    pub bind: String,
    /// Listen port (`PORT` or `SWITCHBOARD_PORT`, default 8080)
    pub port: u16,
    /// Event history ring and broadcast buffer size
    /// (`SWITCHBOARD_EVENT_CAPACITY`, default 1000)
    pub event_capacity: usize,
    /// How often the liveness sweep runs
    /// (`SWITCHBOARD_SWEEP_INTERVAL_SECS`, default 60)
    pub sweep_interval: Duration,
    /// Silence after which a non-offline agent is marked offline
    /// (`SWITCHBOARD_STALE_AFTER_SECS`, default 300)
    pub stale_after: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }
}

impl HubConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults above for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind = std::env::var("SWITCHBOARD_BIND").unwrap_or(defaults.bind);
        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("SWITCHBOARD_PORT").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);
        let event_capacity = std::env::var("SWITCHBOARD_EVENT_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.event_capacity);
        let sweep_interval = std::env::var("SWITCHBOARD_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);
        let stale_after = std::env::var("SWITCHBOARD_STALE_AFTER_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.stale_after);

        Self {
            bind,
            port,
            event_capacity,
            sweep_interval,
            stale_after,
        }
    }

    /// Resolve the listen address.
    pub fn socket_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
    }
}
