//! Switchboard Engine - Coordination Core
//!
//! The matching-assignment-progress-conflict engine behind the hub:
//! agent registry with scored selection, task coordinator with a
//! dependency-gated state machine, conflict detector, and the bounded
//! event history ring. Everything here is synchronous and I/O-free;
//! callers pass `now` explicitly, which keeps every coordination law
//! testable without a clock.
//!
//! The API layer wraps an [`Engine`] in a lock, applies one inbound
//! message at a time, and fans the returned events out to transports
//! after releasing the lock.

mod coordinator;
mod detect;
mod engine;
mod log;
mod registry;

pub use coordinator::{
    AssignmentDecision, ProgressOutcome, ProgressUpdate, TaskCoordinator, TaskSpec,
};
pub use detect::{detect, find_dependency_cycles};
pub use engine::{Engine, ProjectPhase, ProjectStatus, TaskSubmission};
pub use log::{EventLog, DEFAULT_EVENT_CAPACITY};
pub use registry::{
    score_agent, AgentRegistration, AgentRegistry, Selection, CAPABILITY_WEIGHT,
    PERFORMANCE_WEIGHT, WORKLOAD_WEIGHT,
};
