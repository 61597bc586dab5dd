//! Layered configuration loading
//!
//! Sources are merged in order: built-in defaults, an optional file (format
//! inferred from its extension) and environment variables such as
//! `ORCHESTRATOR__CACHE__DEFAULT_TTL_SECONDS=600`.

use super::error::ConfigResult;
use super::OrchestratorConfig;
use config::{Config, Environment, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "ORCHESTRATOR";

/// Detect the deployment environment from `ORCHESTRATOR_ENV` or `APP_ENV`
pub fn detect_environment() -> String {
    std::env::var("ORCHESTRATOR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: OrchestratorConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the standard environment prefix
    pub fn load(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Load configuration reading overrides from `<prefix>__SECTION__KEY`
    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> ConfigResult<Arc<ConfigManager>> {
        let environment = detect_environment();
        debug!(environment = %environment, ?path, env_prefix, "Loading orchestrator configuration");

        let mut builder = Config::builder().add_source(Config::try_from(&OrchestratorConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: OrchestratorConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        info!(
            environment = %environment,
            source = ?path,
            cache_ttl_seconds = config.cache.default_ttl_seconds,
            max_concurrent_steps = config.execution.max_concurrent_steps,
            "✅ Orchestrator configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_path: path.map(Path::to_path_buf),
        }))
    }

    /// Wrap an already-built configuration
    pub fn from_config(config: OrchestratorConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: detect_environment(),
            source_path: None,
        }))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
