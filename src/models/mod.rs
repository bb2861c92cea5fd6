pub mod pipeline_run;
pub mod record;
pub mod step_definition;
pub mod task_instance;

// Re-export core models for easy access
pub use pipeline_run::PipelineRun;
pub use record::Record;
pub use step_definition::{RetryPolicy, StepDefinition, StepId};
pub use task_instance::{StepTransition, TaskInstance};
