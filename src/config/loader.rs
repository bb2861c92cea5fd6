//! Configuration Loader
//!
//! Environment-aware configuration loading. A TOML file (optional unless named
//! explicitly) provides the base values and `RETAIL_PIPELINE__SECTION__KEY`
//! environment variables override them.

use super::error::{ConfigResult, ConfigurationError};
use super::PipelineConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/retail-pipeline.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "RETAIL_PIPELINE_CONFIG";

/// Prefix of per-key environment overrides
pub const ENV_OVERRIDE_PREFIX: &str = "RETAIL_PIPELINE";

#[derive(Debug)]
pub struct ConfigManager {
    config: PipelineConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from `path`, or from the default location if it exists
    pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        let (file, required) = match path {
            Some(path) => (path, true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        debug!(
            "Loading configuration for environment '{}' from {} (required: {})",
            environment,
            file.display(),
            required
        );

        let config = Self::build(&file, required)?;
        config.validate()?;

        info!(
            environment = %environment,
            pipeline_id = %config.pipeline_id,
            cron = %config.schedule.cron,
            destination_table = %config.loader.destination_table,
            database_url = %config.warehouse.redacted_database_url(),
            "Configuration loaded successfully"
        );

        let config_path = (required || file.exists()).then_some(file);
        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_path,
        }))
    }

    fn build(file: &Path, required: bool) -> ConfigResult<PipelineConfig> {
        let source_name = file.display().to_string();
        Config::builder()
            .add_source(
                File::from(file)
                    .format(FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                Environment::with_prefix(ENV_OVERRIDE_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_error(&source_name, e))?
            .try_deserialize::<PipelineConfig>()
            .map_err(|e| ConfigurationError::load_error(source_name, e))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was read from, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("RETAIL_PIPELINE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
