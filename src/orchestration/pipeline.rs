//! # Retail Pipeline Definition
//!
//! The concrete task graph this crate ships: a full-refresh load of the retail
//! export followed by the transform tool's install, run, test and docs steps.
//!
//! ```text
//! load_csv_to_warehouse -> transform_install_dependencies -> transform_run_staging
//!   -> transform_test_staging -> transform_run_analytics -> transform_test_analytics
//!   -> transform_generate_docs
//! ```

use crate::config::PipelineConfig;
use crate::constants::steps;
use crate::error::Result;
use crate::loader::{BatchLoader, SourceReader, Warehouse};
use crate::models::StepDefinition;
use crate::orchestration::step_unit::{BatchLoadStep, ExternalProcessStep};
use crate::orchestration::task_graph::TaskGraph;
use std::sync::Arc;

/// Transform-tool steps: id, arguments, description
const TRANSFORM_STEPS: [(&str, &str, &str); 6] = [
    (
        steps::INSTALL_DEPENDENCIES,
        "deps",
        "Install the transform project's package dependencies",
    ),
    (
        steps::RUN_STAGING,
        "run --models staging",
        "Build the staging models that clean and standardize the raw table",
    ),
    (
        steps::TEST_STAGING,
        "test --models staging",
        "Run data quality tests on the staging models",
    ),
    (
        steps::RUN_ANALYTICS,
        "run --models analytics",
        "Build the dimensional analytics models (customers, products, sales)",
    ),
    (
        steps::TEST_ANALYTICS,
        "test --models analytics",
        "Check key uniqueness, relationships and integrity of the analytics models",
    ),
    (
        steps::GENERATE_DOCS,
        "docs generate",
        "Regenerate lineage and catalog documentation",
    ),
];

/// Step definitions of the retail chain, in execution order
pub fn retail_step_definitions<W>(config: &PipelineConfig, warehouse: W) -> Vec<StepDefinition>
where
    W: Warehouse + 'static,
{
    let policy = config.retry.policy();
    let loader_config = &config.loader;

    let reader = SourceReader::new(loader_config.encoding, loader_config.delimiter as u8);
    let loader = BatchLoader::new(warehouse, loader_config.batch_size).with_reader(reader);
    let load = StepDefinition::new(
        steps::LOAD_CSV_TO_WAREHOUSE,
        Arc::new(BatchLoadStep::new(
            loader,
            loader_config.source_path.clone(),
            loader_config.destination_table.clone(),
        )),
    )
    .with_description(format!(
        "Full-refresh load of {} into {}",
        loader_config.source_path.display(),
        loader_config.destination_table
    ))
    .with_retry_policy(policy);

    let mut definitions = vec![load];
    let mut previous = steps::LOAD_CSV_TO_WAREHOUSE;
    for (id, args, description) in TRANSFORM_STEPS {
        let unit = ExternalProcessStep::new(format!("{} {args}", config.transform.program))
            .in_dir(config.transform.project_dir.clone());
        definitions.push(
            StepDefinition::new(id, Arc::new(unit))
                .depends_on(previous)
                .with_description(description)
                .with_retry_policy(policy),
        );
        previous = id;
    }
    definitions
}

/// Validated task graph of the retail chain
pub fn build_retail_graph<W>(config: &PipelineConfig, warehouse: W) -> Result<TaskGraph>
where
    W: Warehouse + 'static,
{
    TaskGraph::new(retail_step_definitions(config, warehouse))
}
