//! Liveness sweep
//!
//! The only time-driven mutation in the hub: every sweep interval, any
//! non-offline agent whose last interaction is older than the staleness
//! threshold is marked offline and the status event is broadcast.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::hub::Hub;

/// Spawn the background sweep task. Runs until the process exits.
pub fn spawn(hub: Arc<Hub>) -> JoinHandle<()> {
    let interval = hub.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; a sweep over a fresh registry
        // is a no-op.
        loop {
            ticker.tick().await;
            hub.sweep();
        }
    })
}
