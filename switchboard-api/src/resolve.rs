//! Conflict resolution announcements
//!
//! The hub does not remediate conflicts. For each finding it announces
//! `conflict_resolution_started` with the suggested remedy, waits a
//! bounded, type-dependent window, and announces `conflict_resolved`.
//! Actual remediation (redistributing tasks, breaking cycles) is left to
//! operators watching the feed.

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::{Conflict, ConflictKind};

use crate::hub::Hub;

/// How long the resolution window stays open, by conflict class.
pub fn resolution_delay(kind: ConflictKind) -> Duration {
    match kind {
        ConflictKind::DependencyDeadlock => Duration::from_millis(3_000),
        ConflictKind::ResourceContention => Duration::from_millis(2_500),
        ConflictKind::CapabilityMismatch => Duration::from_millis(2_000),
    }
}

/// Announce the resolution window for each conflict on its own task.
pub fn spawn_resolutions(hub: Arc<Hub>, conflicts: Vec<Conflict>) {
    for conflict in conflicts {
        let hub = hub.clone();
        tokio::spawn(async move {
            hub.begin_resolution(&conflict);
            tokio::time::sleep(resolution_delay(conflict.kind)).await;
            hub.finish_resolution(&conflict);
        });
    }
}
