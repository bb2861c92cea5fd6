//! # Run Scheduler
//!
//! Fires pipeline runs on a cron cadence. Only future ticks fire: missed
//! intervals are never backfilled and ticks before the start boundary are
//! ignored. A tick that lands while a run is active is dropped, not queued.

use crate::error::{PipelineError, Result};
use crate::logging::log_error;
use crate::orchestration::executor::TaskGraphExecutor;
use crate::orchestration::types::RunSummary;
use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::FutureExt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// What happened on a cadence tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Started { run_id: Uuid },
    /// Another run held the slot; the tick was discarded
    Dropped { active_run_id: Uuid },
}

/// Parse a cron expression. Five-field expressions get a leading seconds field of `0`.
pub fn parse_cadence(expression: &str) -> Result<Schedule> {
    let trimmed = expression.trim();
    let normalized = if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| {
        PipelineError::Configuration(format!("invalid cron expression '{expression}': {e}"))
    })
}

pub struct RunScheduler {
    schedule: Schedule,
    start_boundary: DateTime<Utc>,
    executor: Arc<TaskGraphExecutor>,
    last_tick: Option<DateTime<Utc>>,
    in_flight: Option<JoinHandle<Result<RunSummary>>>,
}

impl RunScheduler {
    pub fn new(
        cron_expression: &str,
        start_boundary: DateTime<Utc>,
        executor: Arc<TaskGraphExecutor>,
    ) -> Result<Self> {
        Ok(Self {
            schedule: parse_cadence(cron_expression)?,
            start_boundary,
            executor,
            last_tick: None,
            in_flight: None,
        })
    }

    pub fn executor(&self) -> &Arc<TaskGraphExecutor> {
        &self.executor
    }

    /// Next tick strictly after `now` (and after the last fired tick) that is not
    /// before the start boundary
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut from = now;
        if let Some(last) = self.last_tick {
            from = from.max(last);
        }
        // `after` is exclusive, so step back one second to admit a tick exactly on the boundary
        let boundary_floor = self.start_boundary - chrono::Duration::seconds(1);
        from = from.max(boundary_floor);
        self.schedule
            .after(&from)
            .find(|tick| *tick >= self.start_boundary)
    }

    /// Try to start a run for `logical_date`; a busy slot drops the tick
    pub fn on_tick(&mut self, logical_date: DateTime<Utc>) -> Result<TickOutcome> {
        self.last_tick = Some(self.last_tick.map_or(logical_date, |t| t.max(logical_date)));

        match self.executor.start_run(logical_date) {
            Ok(active) => {
                let run_id = active.run_id();
                info!(
                    run_id = %run_id,
                    logical_date = %logical_date,
                    "Cadence tick started pipeline run"
                );
                if let Some(previous) = self.in_flight.take() {
                    Self::report_previous(previous);
                }
                self.in_flight = Some(tokio::spawn(active.run_to_completion()));
                Ok(TickOutcome::Started { run_id })
            }
            Err(PipelineError::ConcurrencyViolation { active_run_id }) => {
                warn!(
                    active_run_id = %active_run_id,
                    logical_date = %logical_date,
                    "Run already active, dropping cadence tick"
                );
                Ok(TickOutcome::Dropped { active_run_id })
            }
            Err(e) => Err(e),
        }
    }

    /// Log the outcome of a superseded run. A handle that is still winding down
    /// is awaited on a detached task. Returns the outcome when it was already available.
    fn report_previous(handle: JoinHandle<Result<RunSummary>>) -> Option<Result<RunSummary>> {
        if !handle.is_finished() {
            debug!("Previous run still winding down, reporting its outcome when it ends");
            tokio::spawn(async move {
                Self::log_outcome(&handle.await.map_err(PipelineError::from).and_then(|r| r));
            });
            return None;
        }

        let outcome = handle
            .now_or_never()?
            .map_err(PipelineError::from)
            .and_then(|r| r);
        Self::log_outcome(&outcome);
        Some(outcome)
    }

    fn log_outcome(outcome: &Result<RunSummary>) {
        match outcome {
            Ok(summary) => info!(
                run_id = %summary.run_id,
                state = %summary.state,
                "Previous pipeline run finished"
            ),
            Err(e) => log_error("run_scheduler", "run_to_completion", &e.to_string(), None),
        }
    }

    /// Await the most recently started run, if any
    pub async fn wait_for_in_flight(&mut self) -> Option<Result<RunSummary>> {
        let handle = self.in_flight.take()?;
        Some(handle.await.map_err(PipelineError::from).and_then(|r| r))
    }

    /// Fire ticks until `shutdown` flips to `true` (or its sender goes away), then
    /// wait for any in-flight run to finish
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            start_boundary = %self.start_boundary,
            pipeline_id = %self.executor.pipeline_id(),
            "Run scheduler started"
        );

        while !*shutdown.borrow() {
            let now = Utc::now();
            let Some(next_tick) = self.next_fire_after(now) else {
                info!("Cadence has no future ticks, stopping scheduler");
                break;
            };
            let wait = (next_tick - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_tick = %next_tick, wait_secs = wait.as_secs(), "Waiting for next cadence tick");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = self.on_tick(next_tick) {
                        error!(logical_date = %next_tick, error = %e, "Failed to start pipeline run");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Run scheduler stopping");
        if let Some(result) = self.wait_for_in_flight().await {
            match result {
                Ok(summary) => info!(
                    run_id = %summary.run_id,
                    state = %summary.state,
                    "In-flight run finished before shutdown"
                ),
                Err(e) => error!(error = %e, "In-flight run ended with an error"),
            }
        }
        Ok(())
    }
}
