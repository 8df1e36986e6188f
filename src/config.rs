//! Run configuration: a YAML document with `execution:`/`observability:`
//! top-level keys, loaded via `serde` + `serde_yaml`.
//!
//! Generalized from a one-env-var-per-field loader into a single YAML
//! document — individual fields can still be overridden by an environment
//! variable of the same name. Hot-reload, merging across multiple sources,
//! and config versioning are out of scope here; see DESIGN.md.

use std::env;
use std::path::Path;

use serde::Deserialize;

use crate::errors::EngineError;

/// Drain/force-cancel timing and thread-pool sizing for the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub drain_timeout_secs: u64,
    pub force_timeout_secs: u64,
    /// `true` selects `ThreadStrategy::Cpu` as the task's default when the
    /// task itself reports `Auto`.
    pub default_thread_pool: DefaultThreadPool,
    /// `None` means auto-size to `available_parallelism()`.
    pub platform_thread_pool_size: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 5,
            force_timeout_secs: 10,
            default_thread_pool: DefaultThreadPool::Io,
            platform_thread_pool_size: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultThreadPool {
    Io,
    Cpu,
}

/// Logging/tracing/metrics toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub tracing_enabled: bool,
    pub metrics_enabled: bool,
    pub structured_logging: bool,
    pub otlp_endpoint: Option<String>,
    pub tracing_sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            tracing_enabled: true,
            metrics_enabled: true,
            structured_logging: false,
            otlp_endpoint: None,
            tracing_sample_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ConfigFile {
    pub fn from_yaml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: ConfigFile = serde_yaml::from_str(contents)
            .map_err(|e| EngineError::validation(format!("invalid config YAML: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::validation(format!("failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    /// Environment variables narrowly override individual fields —
    /// `EXECUTION_DRAIN_TIMEOUT_SECS`, `EXECUTION_FORCE_TIMEOUT_SECS`,
    /// `OBSERVABILITY_TRACING_ENABLED`, `OBSERVABILITY_METRICS_ENABLED` —
    /// rather than exposing the whole config surface through the environment.
    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u64>("EXECUTION_DRAIN_TIMEOUT_SECS") {
            self.execution.drain_timeout_secs = v;
        }
        if let Some(v) = env_parse::<u64>("EXECUTION_FORCE_TIMEOUT_SECS") {
            self.execution.force_timeout_secs = v;
        }
        if let Some(v) = env_parse::<bool>("OBSERVABILITY_TRACING_ENABLED") {
            self.observability.tracing_enabled = v;
        }
        if let Some(v) = env_parse::<bool>("OBSERVABILITY_METRICS_ENABLED") {
            self.observability.metrics_enabled = v;
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.execution.drain_timeout_secs >= self.execution.force_timeout_secs {
            return Err(EngineError::validation(
                "execution.drain_timeout_secs must be less than execution.force_timeout_secs",
            ));
        }
        if !(0.0..=1.0).contains(&self.observability.tracing_sample_rate) {
            return Err(EngineError::validation(
                "observability.tracing_sample_rate must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
