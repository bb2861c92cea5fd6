//! # Run Registry
//!
//! Single-slot registry enforcing that at most one pipeline run is `running`.
//! Acquisition is an atomic check-and-set under one lock; the returned
//! [`RunSlot`] releases the slot when dropped, so a run that ends by any path
//! (success, failure, panic unwinding) frees it.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// The run currently holding the slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRunInfo {
    pub run_id: Uuid,
    pub logical_date: DateTime<Utc>,
    pub acquired_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    slot: Arc<Mutex<Option<ActiveRunInfo>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for `run_id`, or fail with `ConcurrencyViolation` naming the holder
    pub fn try_acquire(&self, run_id: Uuid, logical_date: DateTime<Utc>) -> Result<RunSlot> {
        let mut slot = self.slot.lock();
        if let Some(active) = slot.as_ref() {
            return Err(PipelineError::ConcurrencyViolation {
                active_run_id: active.run_id,
            });
        }

        *slot = Some(ActiveRunInfo {
            run_id,
            logical_date,
            acquired_at: Utc::now(),
        });
        debug!(run_id = %run_id, "Run slot acquired");

        Ok(RunSlot {
            slot: Arc::clone(&self.slot),
            run_id,
        })
    }

    pub fn active_run(&self) -> Option<ActiveRunInfo> {
        self.slot.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Ownership of the run slot; dropping it releases the slot
#[derive(Debug)]
pub struct RunSlot {
    slot: Arc<Mutex<Option<ActiveRunInfo>>>,
    run_id: Uuid,
}

impl RunSlot {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|a| a.run_id == self.run_id) {
            *slot = None;
            debug!(run_id = %self.run_id, "Run slot released");
        }
    }
}
