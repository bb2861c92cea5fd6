//! # Viable Step Discovery
//!
//! Determines which task instances of a run may start: an instance is viable
//! when it is still `pending` and every step it depends on has reached
//! `success`. The rule is evaluated against the general dependency graph, so a
//! linear chain yields at most one viable step per pass while a diamond can
//! yield several.

use crate::models::{PipelineRun, StepId};
use crate::orchestration::task_graph::TaskGraph;
use crate::state_machine::StepState;
use tracing::debug;

pub struct ViableStepDiscovery<'a> {
    graph: &'a TaskGraph,
}

impl<'a> ViableStepDiscovery<'a> {
    pub fn new(graph: &'a TaskGraph) -> Self {
        Self { graph }
    }

    /// Viable steps of `run`, in topological order
    pub fn find_viable_steps(&self, run: &PipelineRun) -> Vec<StepId> {
        let viable: Vec<StepId> = self
            .graph
            .topological_order()
            .into_iter()
            .filter(|step_id| self.is_viable(run, step_id))
            .collect();

        debug!(
            run_id = %run.run_id,
            viable_count = viable.len(),
            "Discovered viable steps"
        );
        viable
    }

    fn is_viable(&self, run: &PipelineRun, step_id: &StepId) -> bool {
        let Some(instance) = run.instance(step_id.as_str()) else {
            return false;
        };
        if instance.state != StepState::Pending {
            return false;
        }
        let Some(definition) = self.graph.definition(step_id.as_str()) else {
            return false;
        };
        definition.dependencies.iter().all(|dependency| {
            run.instance(dependency.as_str())
                .is_some_and(|d| d.state.satisfies_dependencies())
        })
    }
}
