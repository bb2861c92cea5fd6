mod common;

use chrono::Utc;
use common::step;
use retail_pipeline::constants::steps::CHAIN;
use retail_pipeline::error::PipelineError;
use retail_pipeline::orchestration::{TaskGraph, TaskGraphExecutor};
use retail_pipeline::state_machine::{RunState, StepState};
use retail_pipeline::test_helpers::{journal_step_ids, InvocationJournal, ScriptedStep};
use std::sync::Arc;
use std::time::Duration;

fn linear_chain(units: &[Arc<ScriptedStep>], retries: u32) -> TaskGraph {
    let definitions = CHAIN
        .iter()
        .zip(units)
        .enumerate()
        .map(|(i, (id, unit))| {
            let deps: Vec<&str> = if i == 0 { vec![] } else { vec![CHAIN[i - 1]] };
            step(id, &deps, Arc::clone(unit) as _, retries)
        })
        .collect();
    TaskGraph::new(definitions).unwrap()
}

fn recording_units(journal: &InvocationJournal) -> Vec<Arc<ScriptedStep>> {
    CHAIN
        .iter()
        .map(|_| Arc::new(ScriptedStep::always_succeeds().recording(Arc::clone(journal))))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_linear_chain_runs_in_dependency_order() {
    let journal = InvocationJournal::default();
    let executor = TaskGraphExecutor::new("retail_etl_pipeline", linear_chain(&recording_units(&journal), 2));

    let mut active = executor.start_run(Utc::now()).unwrap();
    while !active.run().state.is_terminal() {
        let outcome = active.advance().await.unwrap();
        assert!(outcome.started.len() <= 1, "a linear chain advances one step per pass");
    }

    assert_eq!(active.run().state, RunState::Success);
    assert_eq!(journal_step_ids(&journal), CHAIN);

    for pair in CHAIN.windows(2) {
        let upstream = active.run().instance(pair[0]).unwrap();
        let downstream = active.run().instance(pair[1]).unwrap();
        assert!(
            downstream.first_entered(StepState::Running).unwrap()
                >= upstream.last_entered(StepState::Success).unwrap()
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_step_stops_after_retry_limit_plus_one() {
    let mut units: Vec<Arc<ScriptedStep>> = CHAIN
        .iter()
        .map(|_| Arc::new(ScriptedStep::always_succeeds()))
        .collect();
    units[2] = Arc::new(ScriptedStep::always_fails());
    let executor = TaskGraphExecutor::new("retail_etl_pipeline", linear_chain(&units, 2));

    let started = tokio::time::Instant::now();
    let summary = executor.trigger(Utc::now()).await.unwrap();

    assert_eq!(summary.state, RunState::Failed);
    assert_eq!(units[2].attempts(), 3);
    // Two fixed five-minute delays between three attempts
    assert!(started.elapsed() >= Duration::from_secs(600));

    let failure = summary.failure.clone().expect("failed run reports its failure");
    assert_eq!(failure.step_id.as_str(), CHAIN[2]);
    assert_eq!(failure.attempts, 3);
    let skipped: Vec<&str> = failure.skipped.iter().map(|s| s.as_str()).collect();
    assert_eq!(skipped, &CHAIN[3..]);

    for (id, unit) in CHAIN.iter().zip(&units).skip(3) {
        assert_eq!(unit.attempts(), 0);
        assert_eq!(summary.step(id).unwrap().state, StepState::Pending);
    }
    assert_eq!(summary.step(CHAIN[2]).unwrap().state, StepState::Failed);
    assert!(!executor.registry().is_busy());
}

#[tokio::test(start_paused = true)]
async fn test_start_run_while_running_is_rejected_without_side_effects() {
    let executor = TaskGraphExecutor::new(
        "retail_etl_pipeline",
        TaskGraph::new(vec![step("load", &[], Arc::new(ScriptedStep::always_succeeds()), 2)]).unwrap(),
    );

    let active = executor.start_run(Utc::now()).unwrap();
    let before = active.run().clone();

    let err = executor.start_run(Utc::now()).err().unwrap();
    assert_eq!(
        err,
        PipelineError::ConcurrencyViolation {
            active_run_id: active.run_id()
        }
    );
    assert_eq!(active.run(), &before);
    assert_eq!(active.run().state, RunState::Running);

    let summary = active.run_to_completion().await.unwrap();
    assert!(summary.succeeded());
    assert!(executor.start_run(Utc::now()).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_consumes_a_retry() {
    let slow = Arc::new(ScriptedStep::always_succeeds().with_delay(Duration::from_secs(2 * 3600)));
    let executor = TaskGraphExecutor::new(
        "retail_etl_pipeline",
        TaskGraph::new(vec![step("load", &[], Arc::clone(&slow) as _, 1)]).unwrap(),
    );

    let summary = executor.trigger(Utc::now()).await.unwrap();
    assert_eq!(summary.state, RunState::Failed);
    assert_eq!(slow.attempts(), 2);
    let failure = summary.failure.unwrap();
    assert_eq!(failure.attempts, 2);
    assert!(failure.error.contains("timeout"));
}

#[tokio::test(start_paused = true)]
async fn test_flaky_step_recovers_on_same_instance() {
    let flaky = Arc::new(ScriptedStep::fails_n_times(1));
    let executor = TaskGraphExecutor::new(
        "retail_etl_pipeline",
        TaskGraph::new(vec![
            step("load", &[], Arc::clone(&flaky) as _, 2),
            step("deps", &["load"], Arc::new(ScriptedStep::always_succeeds()), 2),
        ])
        .unwrap(),
    );

    let mut active = executor.start_run(Utc::now()).unwrap();
    active.advance().await.unwrap();

    let instance = active.run().instance("load").unwrap();
    assert_eq!(instance.state, StepState::Success);
    assert_eq!(instance.attempts, 2);
    assert_eq!(instance.retries_remaining, 1);
    let path: Vec<StepState> = instance.transitions.iter().map(|t| t.to_state).collect();
    assert_eq!(
        path,
        vec![
            StepState::Running,
            StepState::Retrying,
            StepState::Running,
            StepState::Success
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_non_retryable_error_fails_immediately() {
    let misconfigured = Arc::new(ScriptedStep::failing_with(PipelineError::Configuration(
        "invalid destination table name".to_string(),
    )));
    let executor = TaskGraphExecutor::new(
        "retail_etl_pipeline",
        TaskGraph::new(vec![step("load", &[], Arc::clone(&misconfigured) as _, 2)]).unwrap(),
    );

    let summary = executor.trigger(Utc::now()).await.unwrap();
    assert_eq!(summary.state, RunState::Failed);
    assert_eq!(misconfigured.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_diamond_graph_uses_general_dependency_rule() {
    let journal = InvocationJournal::default();
    let unit = || Arc::new(ScriptedStep::always_succeeds().recording(Arc::clone(&journal)));
    let graph = TaskGraph::new(vec![
        step("join", &["left", "right"], unit(), 0),
        step("root", &[], unit(), 0),
        step("left", &["root"], unit(), 0),
        step("right", &["root"], unit(), 0),
    ])
    .unwrap();
    let executor = TaskGraphExecutor::new("diamond", graph);

    let mut active = executor.start_run(Utc::now()).unwrap();
    let first = active.advance().await.unwrap();
    assert_eq!(first.started.len(), 1);
    let second = active.advance().await.unwrap();
    let second: Vec<&str> = second.started.iter().map(|s| s.as_str()).collect();
    assert_eq!(second, vec!["left", "right"]);
    let third = active.advance().await.unwrap();
    assert_eq!(third.run_state, RunState::Success);

    assert_eq!(journal_step_ids(&journal), vec!["root", "left", "right", "join"]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_in_diamond_skips_only_dependents() {
    let right = Arc::new(ScriptedStep::always_succeeds());
    let graph = TaskGraph::new(vec![
        step("root", &[], Arc::new(ScriptedStep::always_succeeds()), 0),
        step("left", &["root"], Arc::new(ScriptedStep::always_fails()), 0),
        step("right", &["root"], Arc::clone(&right) as _, 0),
        step("join", &["left", "right"], Arc::new(ScriptedStep::always_succeeds()), 0),
    ])
    .unwrap();
    let executor = TaskGraphExecutor::new("diamond", graph);

    let summary = executor.trigger(Utc::now()).await.unwrap();
    let failure = summary.failure.unwrap();
    assert_eq!(failure.step_id.as_str(), "left");
    assert_eq!(failure.attempts, 1);
    let skipped: Vec<&str> = failure.skipped.iter().map(|s| s.as_str()).collect();
    assert_eq!(skipped, vec!["join"]);
    // The run failed before the sibling got its turn
    assert_eq!(right.attempts(), 0);
}
