//! Conflict detector
//!
//! Pure inspection of current registry + coordinator state. Nothing here
//! mutates; remediation is a separate (and currently event-only) concern.

use std::collections::{HashMap, HashSet};

use switchboard_core::{AgentStatus, Conflict, ConflictKind, TaskId, TaskStatus};

use crate::coordinator::TaskCoordinator;
use crate::registry::AgentRegistry;

/// Run all three conflict scans and collect the findings.
pub fn detect(registry: &AgentRegistry, coordinator: &TaskCoordinator) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    conflicts.extend(detect_resource_contention(registry, coordinator));
    conflicts.extend(detect_dependency_deadlocks(coordinator));
    conflicts.extend(detect_capability_mismatches(registry, coordinator));
    conflicts
}

/// A busy agent named as `assigned_agent` by more than one non-terminal
/// task. The single-assignment invariant forbids this; the scan exists to
/// catch violations (e.g. a re-registration that orphaned a task).
fn detect_resource_contention(
    registry: &AgentRegistry,
    coordinator: &TaskCoordinator,
) -> Vec<Conflict> {
    let mut by_agent: HashMap<&switchboard_core::AgentId, Vec<TaskId>> = HashMap::new();
    for task in coordinator.iter() {
        if task.status.is_terminal() {
            continue;
        }
        if let Some(agent_id) = &task.assigned_agent {
            by_agent.entry(agent_id).or_default().push(task.id);
        }
    }

    registry
        .iter()
        .filter(|agent| agent.status == AgentStatus::Busy)
        .filter_map(|agent| {
            let tasks = by_agent.get(&agent.id)?;
            if tasks.len() <= 1 {
                return None;
            }
            Some(Conflict::new(
                ConflictKind::ResourceContention,
                tasks.clone(),
                vec![agent.id.clone()],
                format!(
                    "Agent {} holds {} live tasks; redistribute the excess to available agents",
                    agent.id,
                    tasks.len()
                ),
            ))
        })
        .collect()
}

/// Cycles in the directed graph whose edges run from a task to each of its
/// dependencies.
fn detect_dependency_deadlocks(coordinator: &TaskCoordinator) -> Vec<Conflict> {
    let graph: Vec<(TaskId, Vec<TaskId>)> = coordinator
        .iter()
        .map(|task| (task.id, task.dependencies.clone()))
        .collect();
    find_dependency_cycles(&graph)
        .into_iter()
        .map(|cycle| {
            let listing = cycle
                .iter()
                .map(TaskId::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            Conflict::new(
                ConflictKind::DependencyDeadlock,
                cycle,
                Vec::new(),
                format!("Break the dependency cycle {listing} by removing one edge"),
            )
        })
        .collect()
}

/// Find every dependency cycle in a task graph.
///
/// Depth-first traversal with an explicit recursion stack; each cycle is
/// reported once, in traversal order, as the node sequence along the back
/// edge. Self-dependencies come out as one-node cycles. Edges to ids
/// absent from the node list are dangling and cannot close a cycle.
pub fn find_dependency_cycles(graph: &[(TaskId, Vec<TaskId>)]) -> Vec<Vec<TaskId>> {
    let edges: HashMap<TaskId, &Vec<TaskId>> =
        graph.iter().map(|(id, deps)| (*id, deps)).collect();
    let mut cycles = Vec::new();
    let mut visited: HashSet<TaskId> = HashSet::new();

    for (id, _) in graph {
        if visited.contains(id) {
            continue;
        }
        let mut path: Vec<TaskId> = Vec::new();
        let mut on_path: HashSet<TaskId> = HashSet::new();
        walk(*id, &edges, &mut visited, &mut path, &mut on_path, &mut cycles);
    }
    cycles
}

fn walk(
    id: TaskId,
    edges: &HashMap<TaskId, &Vec<TaskId>>,
    visited: &mut HashSet<TaskId>,
    path: &mut Vec<TaskId>,
    on_path: &mut HashSet<TaskId>,
    cycles: &mut Vec<Vec<TaskId>>,
) {
    if on_path.contains(&id) {
        // Back edge: the cycle is the path suffix starting at `id`.
        if let Some(pos) = path.iter().position(|t| *t == id) {
            cycles.push(path[pos..].to_vec());
        }
        return;
    }
    if visited.contains(&id) {
        return;
    }
    let Some(deps) = edges.get(&id) else {
        // Dangling dependency target; blocks forever but cannot cycle.
        return;
    };

    path.push(id);
    on_path.insert(id);
    for dep in deps.iter() {
        walk(*dep, edges, visited, path, on_path, cycles);
    }
    path.pop();
    on_path.remove(&id);
    visited.insert(id);
}

/// Assigned or in-progress tasks whose agent does not cover the required
/// capability set. Expected whenever the matcher settled for partial
/// coverage; the resolution names the missing tags.
fn detect_capability_mismatches(
    registry: &AgentRegistry,
    coordinator: &TaskCoordinator,
) -> Vec<Conflict> {
    coordinator
        .iter()
        .filter(|task| {
            matches!(task.status, TaskStatus::Assigned | TaskStatus::InProgress)
        })
        .filter_map(|task| {
            let agent_id = task.assigned_agent.as_ref()?;
            let agent = registry.get(agent_id)?;
            let missing = agent.missing_capabilities(&task.required_capabilities);
            if missing.is_empty() {
                return None;
            }
            Some(Conflict::new(
                ConflictKind::CapabilityMismatch,
                vec![task.id],
                vec![agent_id.clone()],
                format!(
                    "Reassign task to an agent providing: {}",
                    missing.join(", ")
                ),
            ))
        })
        .collect()
}
