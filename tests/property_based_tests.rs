mod common;

use chrono::Utc;
use common::step;
use proptest::prelude::*;
use retail_pipeline::loader::partition;
use retail_pipeline::orchestration::{TaskGraph, TaskGraphExecutor};
use retail_pipeline::state_machine::{RunState, StepState};
use retail_pipeline::test_helpers::ScriptedStep;
use std::sync::Arc;

proptest! {
    /// Property: batches cover every record and only the last one may be short
    #[test]
    fn batch_sizes_sum_to_total(total in 0usize..20_000, batch_size in 1usize..8_192) {
        let records = vec![0u8; total];
        let sizes: Vec<usize> = partition(&records, batch_size).map(<[u8]>::len).collect();

        prop_assert_eq!(sizes.iter().sum::<usize>(), total);
        if let Some((last, full)) = sizes.split_last() {
            prop_assert!(full.iter().all(|&s| s == batch_size));
            let expected_last = if total % batch_size == 0 { batch_size } else { total % batch_size };
            prop_assert_eq!(*last, expected_last);
        } else {
            prop_assert_eq!(total, 0);
        }
    }

    /// Property: an always-failing step makes exactly retries + 1 attempts
    #[test]
    fn retry_bound_is_exact(retries in 0u32..6) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let unit = Arc::new(ScriptedStep::always_fails());
        let graph = TaskGraph::new(vec![step("load", &[], unit.clone(), retries)]).unwrap();
        let executor = TaskGraphExecutor::new("retail_etl_pipeline", graph);
        let summary = runtime.block_on(executor.trigger(Utc::now())).unwrap();

        prop_assert_eq!(summary.state, RunState::Failed);
        prop_assert_eq!(unit.attempts(), retries + 1);
        prop_assert_eq!(summary.step("load").unwrap().state, StepState::Failed);
        prop_assert_eq!(summary.failure.unwrap().attempts, retries + 1);
    }

    /// Property: a step that recovers within its retries lets the run succeed
    #[test]
    fn recovery_within_retries_succeeds(retries in 0u32..5, failures in 0u32..5) {
        prop_assume!(failures <= retries);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        let unit = Arc::new(ScriptedStep::fails_n_times(failures));
        let graph = TaskGraph::new(vec![step("load", &[], unit.clone(), retries)]).unwrap();
        let executor = TaskGraphExecutor::new("retail_etl_pipeline", graph);
        let summary = runtime.block_on(executor.trigger(Utc::now())).unwrap();

        prop_assert_eq!(summary.state, RunState::Success);
        prop_assert_eq!(unit.attempts(), failures + 1);
    }
}
