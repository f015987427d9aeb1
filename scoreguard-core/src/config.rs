//! Configuration types for scoreguard services
//!
//! Every tunable the pipeline consults lives here: cache bounds, recovery
//! attempt ceilings, the performance sample window and its recommendation
//! thresholds, and batch concurrency defaults. All sections deserialize
//! with `#[serde(default)]` so partial configuration files work.

use crate::error::{Result, ScoreGuardError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for scoreguard services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreGuardConfig {
    /// Validator cache configuration
    pub cache: CacheConfig,

    /// Error recovery configuration
    pub recovery: RecoveryConfig,

    /// Performance tracking configuration
    pub performance: PerformanceConfig,

    /// Batch processing configuration
    pub batch: BatchConfig,
}

impl ScoreGuardConfig {
    /// Check every tunable for validity
    ///
    /// # Errors
    ///
    /// Returns `ScoreGuardError::Configuration` naming the first invalid
    /// tunable found.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_validators == 0 {
            return Err(ScoreGuardError::config("cache.max_validators must be positive"));
        }
        if self.cache.ttl.is_zero() {
            return Err(ScoreGuardError::config("cache.ttl must be positive"));
        }
        if self.recovery.max_attempts == 0 {
            return Err(ScoreGuardError::config(
                "recovery.max_attempts must be positive",
            ));
        }
        if self.performance.sample_capacity == 0 {
            return Err(ScoreGuardError::config(
                "performance.sample_capacity must be positive",
            ));
        }
        if self.performance.analysis_window == 0 {
            return Err(ScoreGuardError::config(
                "performance.analysis_window must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.performance.min_hit_rate) {
            return Err(ScoreGuardError::config(
                "performance.min_hit_rate must be in [0, 1]",
            ));
        }
        if self.batch.default_concurrency == 0 {
            return Err(ScoreGuardError::config(
                "batch.default_concurrency must be positive",
            ));
        }
        Ok(())
    }
}

/// Compiled-validator cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of compiled validators kept resident
    pub max_validators: usize,

    /// Time since last use after which a cached validator is stale
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_validators: 100,
            ttl: Duration::from_secs(600),
        }
    }
}

/// Error recovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Maximum recovery attempts per session
    pub max_attempts: u32,

    /// Questions assumed per submitted file when synthesizing a batch
    pub questions_per_file: usize,

    /// Question count assumed when no context hints are available
    pub default_question_count: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            questions_per_file: 5,
            default_question_count: 10,
        }
    }
}

/// Performance tracking and recommendation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Capacity of the rolling sample buffer
    pub sample_capacity: usize,

    /// Number of most-recent samples a recommendation considers
    pub analysis_window: usize,

    /// Mean validation time above which large batches should parallelize
    #[serde(with = "humantime_serde")]
    pub slow_validation: Duration,

    /// Overhead percentage above which cache tuning is suggested
    pub max_overhead_pct: f64,

    /// Cache hit rate below which TTL extension or pre-warming is suggested
    pub min_hit_rate: f64,

    /// Optimal batch size above which a larger configured batch is suggested
    pub batch_size_high: usize,

    /// Optimal batch size below which a smaller configured batch is suggested
    pub batch_size_low: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            sample_capacity: 1000,
            analysis_window: 100,
            slow_validation: Duration::from_millis(100),
            max_overhead_pct: 15.0,
            min_hit_rate: 0.70,
            batch_size_high: 20,
            batch_size_low: 5,
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrency used when the caller does not specify one
    pub default_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_concurrency: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() -> anyhow::Result<()> {
        let config = ScoreGuardConfig::default();
        config.validate()?;
        assert_eq!(config.recovery.max_attempts, 3);
        assert_eq!(config.performance.sample_capacity, 1000);
        assert_eq!(config.batch.default_concurrency, 5);
        Ok(())
    }

    #[test]
    fn test_partial_deserialization() -> anyhow::Result<()> {
        let config: ScoreGuardConfig = serde_json::from_str(
            r#"{"cache": {"max_validators": 8, "ttl": "30s"}}"#,
        )?;
        assert_eq!(config.cache.max_validators, 8);
        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.recovery.max_attempts, 3);
        Ok(())
    }

    #[test]
    fn test_invalid_tunables_rejected() {
        let mut config = ScoreGuardConfig::default();
        config.batch.default_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = ScoreGuardConfig::default();
        config.performance.min_hit_rate = 1.5;
        assert!(config.validate().is_err());
    }
}
