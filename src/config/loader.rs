//! Configuration Loader
//!
//! Environment-aware loading: defaults, then the base YAML file, then the
//! environment-specific YAML file, then `QUEUE_ENGINE__*` variables.

use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::EngineConfig;

const CONFIG_FILE_STEM: &str = "queue-engine";
const ENV_PREFIX: &str = "QUEUE_ENGINE";
const ENV_SEPARATOR: &str = "__";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: EngineConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    /// Useful for tests that should not touch process-wide variables.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let explicit = config_dir.is_some();
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);
        if explicit && !config_directory.is_dir() {
            return Err(ConfigurationError::MissingDirectory(
                config_directory.display().to_string(),
            ));
        }

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading queue engine configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            job_queue = %config.queues.job_queue_name,
            channel_capacity = config.events.channel_capacity,
            "🔧 CONFIG: Queue engine configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Configuration built from defaults only
    pub fn from_defaults() -> Arc<ConfigManager> {
        Arc::new(ConfigManager {
            config: EngineConfig::default(),
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Current environment from `QUEUE_ENGINE_ENV`, then `APP_ENV`, falling
    /// back to `development`
    pub fn detect_environment() -> String {
        std::env::var("QUEUE_ENGINE_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        std::env::var("QUEUE_ENGINE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge_config(directory: &Path, environment: &str) -> ConfigResult<EngineConfig> {
        let base = directory.join(CONFIG_FILE_STEM);
        let overlay = directory.join(format!("{CONFIG_FILE_STEM}.{environment}"));

        let config = Config::builder()
            .add_source(Config::try_from(&EngineConfig::default())?)
            .add_source(File::with_name(&base.to_string_lossy()).required(false))
            .add_source(File::with_name(&overlay.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
