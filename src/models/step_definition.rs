use crate::constants::retry::{
    DEFAULT_EXECUTION_TIMEOUT, DEFAULT_RETRIES, DEFAULT_RETRY_DELAY,
};
use crate::orchestration::step_unit::StepUnit;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifier of a step, unique within a task graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StepId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Per-step retry, delay and timeout settings. The delay is fixed between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one fails
    pub retries: u32,
    pub retry_delay: Duration,
    /// Upper bound on a single attempt
    pub execution_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, retry_delay: Duration, execution_timeout: Duration) -> Self {
        Self {
            retries,
            retry_delay,
            execution_timeout,
        }
    }

    /// Total number of attempts a step can make before it fails
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }
}

/// Static description of one unit of work and its dependency/retry configuration.
///
/// Built once at process start and shared immutably by every run.
#[derive(Clone)]
pub struct StepDefinition {
    pub id: StepId,
    pub description: String,
    /// Steps that must reach `success` before this one may start
    pub dependencies: BTreeSet<StepId>,
    pub retry_policy: RetryPolicy,
    pub unit: Arc<dyn StepUnit>,
}

impl StepDefinition {
    pub fn new(id: impl Into<StepId>, unit: Arc<dyn StepUnit>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            dependencies: BTreeSet::new(),
            retry_policy: RetryPolicy::default(),
            unit,
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<StepId>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("retry_policy", &self.retry_policy)
            .field("unit", &self.unit.kind())
            .finish()
    }
}
