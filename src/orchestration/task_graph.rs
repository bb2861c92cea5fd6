//! # Task Graph
//!
//! Validated dependency graph of step definitions: adjacency from each step
//! identifier to its set of prerequisite identifiers. Construction rejects
//! duplicate identifiers, unknown or self dependencies and cycles, so every
//! graph the executor sees is a DAG.

use crate::error::{PipelineError, Result};
use crate::models::{StepDefinition, StepId};
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug, Clone)]
pub struct TaskGraph {
    definitions: Vec<StepDefinition>,
    index: HashMap<StepId, usize>,
    /// Reverse edges: step -> steps that list it as a dependency
    dependents: HashMap<StepId, BTreeSet<StepId>>,
}

impl TaskGraph {
    pub fn new(definitions: Vec<StepDefinition>) -> Result<Self> {
        if definitions.is_empty() {
            return Err(PipelineError::InvalidGraph(
                "a task graph needs at least one step".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(definitions.len());
        for (position, definition) in definitions.iter().enumerate() {
            if index.insert(definition.id.clone(), position).is_some() {
                return Err(PipelineError::InvalidGraph(format!(
                    "duplicate step id {}",
                    definition.id
                )));
            }
        }

        let mut dependents: HashMap<StepId, BTreeSet<StepId>> = HashMap::new();
        for definition in &definitions {
            for dependency in &definition.dependencies {
                if dependency == &definition.id {
                    return Err(PipelineError::InvalidGraph(format!(
                        "step {} depends on itself",
                        definition.id
                    )));
                }
                if !index.contains_key(dependency) {
                    return Err(PipelineError::InvalidGraph(format!(
                        "step {} depends on unknown step {dependency}",
                        definition.id
                    )));
                }
                dependents
                    .entry(dependency.clone())
                    .or_default()
                    .insert(definition.id.clone());
            }
        }

        let graph = Self {
            definitions,
            index,
            dependents,
        };

        let order = graph.topological_order();
        if order.len() != graph.definitions.len() {
            let cyclic: Vec<String> = graph
                .definitions
                .iter()
                .filter(|d| !order.contains(&d.id))
                .map(|d| d.id.to_string())
                .collect();
            return Err(PipelineError::InvalidGraph(format!(
                "dependency cycle among steps: {}",
                cyclic.join(", ")
            )));
        }

        Ok(graph)
    }

    pub fn definitions(&self) -> &[StepDefinition] {
        &self.definitions
    }

    pub fn definition(&self, step_id: &str) -> Option<&StepDefinition> {
        self.index.get(step_id).map(|&i| &self.definitions[i])
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Kahn's algorithm; ties broken by definition order. Omits steps on a cycle.
    pub fn topological_order(&self) -> Vec<StepId> {
        let mut in_degree: Vec<usize> = self
            .definitions
            .iter()
            .map(|d| d.dependencies.len())
            .collect();
        let mut ready: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(self.definitions.len());
        while let Some(position) = ready.pop_front() {
            let id = &self.definitions[position].id;
            order.push(id.clone());
            if let Some(children) = self.dependents.get(id) {
                let mut unlocked: Vec<usize> = Vec::new();
                for child in children {
                    let child_position = self.index[child];
                    in_degree[child_position] -= 1;
                    if in_degree[child_position] == 0 {
                        unlocked.push(child_position);
                    }
                }
                unlocked.sort_unstable();
                ready.extend(unlocked);
            }
        }
        order
    }

    /// Every step that depends on `step_id` directly or through other steps, in definition order
    pub fn transitive_dependents(&self, step_id: &str) -> Vec<StepId> {
        let mut seen: BTreeSet<&StepId> = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([step_id]);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.dependents.get(current) {
                for child in children {
                    if seen.insert(child) {
                        queue.push_back(child.as_str());
                    }
                }
            }
        }

        self.definitions
            .iter()
            .filter(|d| seen.contains(&d.id))
            .map(|d| d.id.clone())
            .collect()
    }
}
