//! Kernel configuration: environment-driven, nested by subsystem, mirroring
//! the shape each component's tunable parameters already take.

use crate::error::{BrainError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Default path `load()` checks for an optional TOML override file.
pub const CONFIG_FILE: &str = "brain-kernel.toml";

/// Top-level kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    pub classifier: ClassifierConfig,
    pub executor: ExecutorConfig,
    pub branch: BranchConfig,
    pub critique: CritiqueConfig,
    pub resource_monitor: ResourceMonitorConfig,
    pub outcome_logger: OutcomeLoggerConfig,
}

impl KernelConfig {
    /// Load configuration from an optional TOML file (default path
    /// `brain-kernel.toml`), then apply environment-variable overrides on
    /// top (and `.env` if present). Anything neither the file nor the
    /// environment sets keeps its subsystem default.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let base = Self::from_file(Path::new(CONFIG_FILE))?;
        Ok(base.with_env_overrides())
    }

    /// Read `path` as TOML if it exists, falling back to defaults
    /// otherwise; a missing file is not an error.
    fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "no kernel config file found, using defaults");
            return Ok(Self::default());
        }

        info!(path = %path.display(), "loading kernel config");
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BrainError::config(format!("failed to parse {}: {e}", path.display())))
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parsed("BRAIN_CLASSIFIER_CACHE_CAPACITY") {
            self.classifier.cache_capacity = v;
        }
        if let Some(v) = env_parsed("BRAIN_CLASSIFIER_VECTOR_THRESHOLD") {
            self.classifier.vector_threshold = v;
        }
        if let Some(v) = env_parsed("BRAIN_DEFAULT_PHASE_TIMEOUT_MS") {
            self.executor.default_phase_timeout_ms = v;
        }
        if let Some(v) = env_parsed("BRAIN_MAX_REPLANS") {
            self.executor.max_replans = v;
        }
        if let Some(v) = env_parsed("BRAIN_MAX_BRANCHES") {
            self.branch.max_branches = v;
        }
        if let Some(v) = env_parsed("BRAIN_PRUNE_THRESHOLD") {
            self.branch.prune_threshold = v;
        }
        if let Some(v) = env_parsed("BRAIN_CRITIQUE_MAX_RETRIES") {
            self.critique.max_retries = v;
        }
        if let Some(v) = env_parsed("BRAIN_CRITIQUE_MIN_CONFIDENCE") {
            self.critique.min_confidence = v;
        }
        if let Some(v) = env_parsed("BRAIN_RESOURCE_POLL_INTERVAL_SECS") {
            self.resource_monitor.poll_interval_secs = v;
        }
        if let Some(v) = env_parsed("BRAIN_OUTCOME_LOG_CAPACITY") {
            self.outcome_logger.capacity = v;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.classifier.vector_threshold < 0.0 || self.classifier.vector_threshold > 1.0 {
            return Err(BrainError::config("classifier.vector_threshold must be in [0, 1]"));
        }
        if self.branch.prune_threshold < 0.0 || self.branch.prune_threshold > 1.0 {
            return Err(BrainError::config("branch.prune_threshold must be in [0, 1]"));
        }
        if self.branch.max_branches == 0 {
            return Err(BrainError::config("branch.max_branches must be at least 1"));
        }
        if self.executor.default_phase_timeout_ms == 0 {
            return Err(BrainError::config("executor.default_phase_timeout_ms must be nonzero"));
        }
        Ok(())
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig::default(),
            executor: ExecutorConfig::default(),
            branch: BranchConfig::default(),
            critique: CritiqueConfig::default(),
            resource_monitor: ResourceMonitorConfig::default(),
            outcome_logger: OutcomeLoggerConfig::default(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub cache_capacity: usize,
    pub vector_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            cache_capacity: crate::classifier::cache::DEFAULT_CAPACITY,
            vector_threshold: crate::classifier::VECTOR_TIER_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub default_phase_timeout_ms: u64,
    pub max_replans: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_phase_timeout_ms: crate::strategy::DEFAULT_PHASE_TIMEOUT_MS,
            max_replans: crate::executor::MAX_REPLANS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    pub max_branches: usize,
    pub prune_threshold: f64,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            max_branches: crate::executor::branch::DEFAULT_MAX_BRANCHES,
            prune_threshold: crate::executor::branch::DEFAULT_PRUNE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueConfig {
    pub max_retries: u32,
    pub min_confidence: f64,
}

impl Default for CritiqueConfig {
    fn default() -> Self {
        Self {
            max_retries: crate::critique::DEFAULT_MAX_RETRIES,
            min_confidence: crate::critique::DEFAULT_MIN_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMonitorConfig {
    pub poll_interval_secs: u64,
}

impl Default for ResourceMonitorConfig {
    fn default() -> Self {
        Self { poll_interval_secs: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeLoggerConfig {
    pub capacity: usize,
}

impl Default for OutcomeLoggerConfig {
    fn default() -> Self {
        Self {
            capacity: crate::outcome_logger::DEFAULT_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = KernelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.branch.max_branches, 3);
        assert_eq!(config.critique.max_retries, 3);
    }

    #[test]
    fn out_of_range_threshold_fails_validation() {
        let mut config = KernelConfig::default();
        config.classifier.vector_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_branches_fails_validation() {
        let mut config = KernelConfig::default();
        config.branch.max_branches = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_phase_timeout_fails_validation_even_with_replans_enabled() {
        let mut config = KernelConfig::default();
        config.executor.default_phase_timeout_ms = 0;
        assert!(config.executor.max_replans > 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_replans_alone_is_valid() {
        let mut config = KernelConfig::default();
        config.executor.max_replans = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = KernelConfig::from_file(Path::new("does-not-exist.toml")).unwrap();
        assert_eq!(config.branch.max_branches, BranchConfig::default().max_branches);
    }

    #[test]
    fn present_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("brain-kernel.toml");
        std::fs::write(
            &path,
            r#"
            [classifier]
            cache_capacity = 64
            vector_threshold = 0.8

            [executor]
            default_phase_timeout_ms = 1000
            max_replans = 1

            [branch]
            max_branches = 5
            prune_threshold = 0.4

            [critique]
            max_retries = 2
            min_confidence = 0.6

            [resource_monitor]
            poll_interval_secs = 10

            [outcome_logger]
            capacity = 50
            "#,
        )
        .unwrap();

        let config = KernelConfig::from_file(&path).unwrap();
        assert_eq!(config.classifier.cache_capacity, 64);
        assert_eq!(config.branch.max_branches, 5);
    }

    #[test]
    fn env_override_wins_over_file_default() {
        std::env::set_var("BRAIN_MAX_BRANCHES", "7");
        let config = KernelConfig::default().with_env_overrides();
        std::env::remove_var("BRAIN_MAX_BRANCHES");
        assert_eq!(config.branch.max_branches, 7);
    }
}
