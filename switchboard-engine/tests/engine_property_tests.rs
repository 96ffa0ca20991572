//! Property-based tests for the coordination laws
//!
//! Exercises the engine under arbitrary operation sequences and checks
//! the invariants that must hold after every fully-processed mutation:
//! single assignment, status consistency, progress monotonicity, the
//! dependency barrier, terminal absorption, selection determinism and
//! optimality, and event replay.

use std::collections::HashMap;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use switchboard_core::{
    AgentId, AgentStatus, CoordinationEvent, EventKind, TaskId, TaskStatus, Timestamp,
};
use switchboard_engine::{
    score_agent, AgentRegistration, Engine, EventLog, ProgressUpdate, TaskSpec,
};

const CAPABILITY_UNIVERSE: [&str; 4] = ["python", "rust", "sql", "react"];

fn caps_from_mask(mask: u8) -> Vec<String> {
    CAPABILITY_UNIVERSE
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, tag)| tag.to_string())
        .collect()
}

fn base_time() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

// ============================================================================
// OPERATION SEQUENCES
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Register { caps_mask: u8 },
    Submit { caps_mask: u8, dep_picks: Vec<u8> },
    Update { task_pick: u8, progress: Option<i64>, status_pick: u8 },
    Sweep { minutes: u8 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..16).prop_map(|caps_mask| Op::Register { caps_mask }),
        ((0u8..16), prop::collection::vec(0u8..8, 0..3))
            .prop_map(|(caps_mask, dep_picks)| Op::Submit { caps_mask, dep_picks }),
        ((0u8..12), prop::option::of(-10i64..150), (0u8..6)).prop_map(
            |(task_pick, progress, status_pick)| Op::Update { task_pick, progress, status_pick }
        ),
        (0u8..10).prop_map(|minutes| Op::Sweep { minutes }),
    ]
}

fn status_from_pick(pick: u8) -> Option<TaskStatus> {
    match pick {
        0 => Some(TaskStatus::InProgress),
        1 => Some(TaskStatus::Completed),
        2 => Some(TaskStatus::Failed),
        3 => Some(TaskStatus::Assigned),
        _ => None,
    }
}

/// Cross-check every engine-level invariant that must hold at quiescence.
fn assert_invariants(engine: &Engine) -> Result<(), TestCaseError> {
    // Single assignment + status consistency (invariants 1 and 2).
    let mut live_tasks_per_agent: HashMap<AgentId, usize> = HashMap::new();
    for task in engine.coordinator().iter() {
        if matches!(task.status, TaskStatus::Assigned | TaskStatus::InProgress) {
            let agent_id = task
                .assigned_agent
                .clone()
                .ok_or_else(|| TestCaseError::fail("live task without assigned agent"))?;
            prop_assert!(
                engine.registry().get(&agent_id).is_some(),
                "live task names an unregistered agent"
            );
            *live_tasks_per_agent.entry(agent_id).or_default() += 1;
        }
    }
    for agent in engine.registry().iter() {
        let live = live_tasks_per_agent.get(&agent.id).copied().unwrap_or(0);
        prop_assert!(live <= 1, "agent {} holds {} live tasks", agent.id, live);
        // Disconnect deliberately leaves the binding on an offline agent,
        // so the busy/current_task equivalence applies to reachable agents.
        if agent.status != AgentStatus::Offline {
            prop_assert_eq!(
                agent.status == AgentStatus::Busy,
                agent.current_task.is_some(),
                "busy flag out of sync with current_task for {}",
                &agent.id
            );
            prop_assert_eq!(
                agent.status == AgentStatus::Busy,
                live == 1,
                "busy flag out of sync with live task count for {}",
                &agent.id
            );
        }
        // Performance score stays in range no matter the history.
        prop_assert!((0.1..=2.0).contains(&agent.performance_score));
    }
    // At most one assignment record per task, only for live tasks.
    for task in engine.coordinator().iter() {
        let record = engine.coordinator().assignment(&task.id);
        if matches!(task.status, TaskStatus::Assigned | TaskStatus::InProgress) {
            prop_assert!(record.is_some());
        } else {
            prop_assert!(record.is_none());
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Invariants 1-5 under arbitrary operation sequences.
    #[test]
    fn prop_invariants_hold_after_every_operation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut engine = Engine::new(64);
        let mut now = base_time();
        let mut agent_seq = 0u32;
        let mut task_ids: Vec<TaskId> = Vec::new();
        let mut last_progress: HashMap<TaskId, u8> = HashMap::new();
        let mut terminal: HashMap<TaskId, TaskStatus> = HashMap::new();

        for op in ops {
            now += Duration::seconds(7);
            let mut produced: Vec<CoordinationEvent> = Vec::new();
            match op {
                Op::Register { caps_mask } => {
                    agent_seq += 1;
                    let (_, events) = engine.register_agent(
                        AgentRegistration {
                            id: AgentId::new(format!("agent-{agent_seq}")),
                            name: None,
                            capabilities: caps_from_mask(caps_mask).into_iter().collect(),
                            channel: None,
                        },
                        now,
                    );
                    produced = events;
                }
                Op::Submit { caps_mask, dep_picks } => {
                    let deps: Vec<TaskId> = dep_picks
                        .iter()
                        .filter_map(|pick| task_ids.get(*pick as usize).copied())
                        .collect();
                    let spec = TaskSpec::new("generated work")
                        .with_capabilities(caps_from_mask(caps_mask))
                        .with_dependencies(deps);
                    let submission = engine.submit_task(spec, now).unwrap();
                    task_ids.push(submission.task.id);
                    last_progress.insert(submission.task.id, submission.task.progress);
                    produced = submission.events;
                }
                Op::Update { task_pick, progress, status_pick } => {
                    let Some(id) = task_ids.get(task_pick as usize).copied() else {
                        continue;
                    };
                    let update = ProgressUpdate {
                        progress,
                        status: status_from_pick(status_pick),
                        message: None,
                    };
                    match engine.update_progress(&id, update, now) {
                        Ok((_, events)) => produced = events,
                        // Rejected updates must leave state untouched.
                        Err(_) => {}
                    }
                }
                Op::Sweep { minutes } => {
                    produced = engine.sweep_stale(now, Duration::minutes(minutes as i64 + 1));
                }
            }

            // Dependency barrier: at the instant of assignment every
            // declared dependency is completed (law 4).
            for event in &produced {
                if event.kind == EventKind::TaskAssigned {
                    let id = event.task_id.ok_or_else(|| TestCaseError::fail("assigned without task id"))?;
                    let task = engine.coordinator().get(&id)
                        .ok_or_else(|| TestCaseError::fail("assigned unknown task"))?;
                    for dep in &task.dependencies {
                        let dep_task = engine.coordinator().get(dep)
                            .ok_or_else(|| TestCaseError::fail("assigned task with dangling dependency"))?;
                        prop_assert_eq!(dep_task.status, TaskStatus::Completed);
                    }
                }
            }

            // Progress monotonicity and terminal absorption (laws 3 and 5).
            for id in &task_ids {
                let task = engine.coordinator().get(id)
                    .ok_or_else(|| TestCaseError::fail("task vanished"))?;
                let previous = last_progress.insert(*id, task.progress).unwrap_or(0);
                prop_assert!(task.progress >= previous, "progress went backwards");
                if task.status == TaskStatus::Completed {
                    prop_assert_eq!(task.progress, 100);
                }
                if let Some(frozen) = terminal.get(id) {
                    prop_assert_eq!(task.status, *frozen, "terminal state was left");
                } else if task.status.is_terminal() {
                    terminal.insert(*id, task.status);
                }
            }

            assert_invariants(&engine)?;
        }
    }

    /// Laws 6 and 7: selection is deterministic and returns the maximum
    /// weighted score among online, idle agents, ties to insertion order.
    #[test]
    fn prop_selection_is_deterministic_and_optimal(
        caps_masks in prop::collection::vec(0u8..16, 1..8),
        warmups in prop::collection::vec(
            ((0u8..16), (1_000i64..200_000), any::<bool>()),
            0..12,
        ),
        busy_count in 0usize..3,
        required_mask in 0u8..16,
    ) {
        let mut engine = Engine::new(16);
        let now = base_time();
        for (i, caps_mask) in caps_masks.iter().enumerate() {
            engine.register_agent(
                AgentRegistration {
                    id: AgentId::new(format!("agent-{i}")),
                    name: None,
                    capabilities: caps_from_mask(*caps_mask).into_iter().collect(),
                    channel: None,
                },
                now,
            );
        }
        // Shape performance scores through real task outcomes; whichever
        // agent wins each warmup accumulates its history organically.
        for (caps_mask, duration, success) in &warmups {
            let spec = TaskSpec::new("warmup").with_capabilities(caps_from_mask(*caps_mask));
            let submission = engine.submit_task(spec, now).unwrap();
            if submission.task.status != TaskStatus::Assigned {
                continue;
            }
            engine
                .update_progress(
                    &submission.task.id,
                    ProgressUpdate { status: Some(TaskStatus::InProgress), ..Default::default() },
                    now,
                )
                .ok();
            engine
                .update_progress(
                    &submission.task.id,
                    ProgressUpdate {
                        status: Some(if *success { TaskStatus::Completed } else { TaskStatus::Failed }),
                        ..Default::default()
                    },
                    now + Duration::milliseconds(*duration),
                )
                .ok();
        }
        // Take a few agents out of the candidate pool.
        for _ in 0..busy_count {
            engine.submit_task(TaskSpec::new("occupier"), now).unwrap();
        }

        let required: std::collections::BTreeSet<String> =
            caps_from_mask(required_mask).into_iter().collect();

        // Determinism: repeated calls agree.
        let first = engine.registry().select(&required);
        let second = engine.registry().select(&required);
        prop_assert_eq!(
            first.as_ref().map(|s| s.agent_id.clone()),
            second.as_ref().map(|s| s.agent_id.clone())
        );

        // Optimality: brute force over the candidate pool.
        let mut expected: Option<(AgentId, f64)> = None;
        for agent in engine.registry().iter() {
            if !agent.is_available() {
                continue;
            }
            let score = score_agent(agent, &required);
            let beats = match &expected {
                Some((_, best)) => score.total > *best,
                None => true,
            };
            if beats {
                expected = Some((agent.id.clone(), score.total));
            }
        }
        match (first, expected) {
            (Some(selection), Some((id, total))) => {
                prop_assert_eq!(selection.agent_id, id);
                prop_assert!((selection.total - total).abs() < 1e-12);
            }
            (None, None) => {}
            (got, want) => {
                return Err(TestCaseError::fail(format!(
                    "selection mismatch: got {:?}, want {:?}",
                    got.map(|s| s.agent_id),
                    want.map(|(id, _)| id)
                )));
            }
        }
    }

    /// Law 8: the ring replays the last N events in insertion order.
    #[test]
    fn prop_event_replay_matches_live_order(
        kinds in prop::collection::vec(0u8..4, 1..120),
        window in 1usize..60,
    ) {
        let mut log = EventLog::new(50);
        let mut mirror: Vec<CoordinationEvent> = Vec::new();
        let now = base_time();
        for (seq, pick) in kinds.iter().enumerate() {
            let kind = match pick {
                0 => EventKind::TaskCreated,
                1 => EventKind::TaskAssigned,
                2 => EventKind::AgentJoined,
                _ => EventKind::TaskProgress,
            };
            let event = CoordinationEvent::new(kind, now)
                .with_payload(serde_json::json!({ "seq": seq }));
            log.append(event.clone());
            mirror.push(event);
            if mirror.len() > 50 {
                mirror.remove(0);
            }
        }

        // A late joiner replaying recent(n) sees exactly what a live
        // observer saw, in the same order.
        let replay = log.recent(window);
        let expected: Vec<_> = mirror.iter().rev().take(window).rev().cloned().collect();
        prop_assert_eq!(replay, expected);

        let assigned = log.by_type(EventKind::TaskAssigned, window);
        let filtered_assigned: Vec<_> = mirror
            .iter()
            .filter(|e| e.kind == EventKind::TaskAssigned)
            .collect();
        let expected_assigned: Vec<_> = filtered_assigned
            .iter()
            .rev()
            .take(window)
            .rev()
            .map(|e| (*e).clone())
            .collect();
        prop_assert_eq!(assigned, expected_assigned);
    }
}
