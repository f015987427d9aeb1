//! Performance tracking and optimization advice
//!
//! Wraps validation calls with wall-clock timing, keeps a bounded rolling
//! history of samples, and turns that history into actionable tuning
//! advice: optimal batch size, cache health, overhead ratio.

use crate::validator::{self, CompiledValidatorCache};
use parking_lot::Mutex;
use scoreguard_core::config::PerformanceConfig;
use scoreguard_core::types::{RecordKind, ValidationOutcome};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// One timing sample, read-only once appended
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSample {
    /// Record kind validated
    pub kind: RecordKind,
    /// Batch-size hint supplied by the caller, if any
    pub batch_size: Option<usize>,
    /// Wall-clock duration of cache lookup plus validation
    pub validation_ms: f64,
    /// Whether the compiled validator came from a live cache entry
    pub from_cache: bool,
    /// Whether the value was accepted
    pub succeeded: bool,
}

/// Estimator for total processing time of one request, in milliseconds
///
/// Used as the denominator of the overhead percentage. The default
/// assumes 100 ms of downstream work per batched item, or a flat 1000 ms
/// when no batch size is known; install a custom estimator when real
/// figures are available.
pub type ProcessingTimeEstimator = Arc<dyn Fn(Option<usize>) -> f64 + Send + Sync>;

/// Default processing-time baseline: `batch_size x 100ms`, else 1000 ms
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_processing_estimate(batch_size: Option<usize>) -> f64 {
    match batch_size {
        Some(size) => size as f64 * 100.0,
        None => 1000.0,
    }
}

/// Optimization advice derived from recent samples
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    /// Number of samples the report is based on
    pub sample_count: usize,
    /// Mean validation time over the analysis window
    pub mean_validation_ms: f64,
    /// Mean validation overhead as a percentage of estimated total time
    pub mean_overhead_pct: f64,
    /// Cache hit rate: hits over hits plus distinct insertions
    pub cache_hit_rate: f64,
    /// Batch size with the lowest observed per-item time
    pub optimal_batch_size: Option<usize>,
    /// Human-readable recommendations
    pub notes: Vec<String>,
}

/// Performance tracker wrapping cache lookups and validation calls
pub struct PerformanceTracker {
    config: PerformanceConfig,
    cache: Arc<CompiledValidatorCache>,
    samples: Mutex<VecDeque<PerformanceSample>>,
    estimator: ProcessingTimeEstimator,
}

impl PerformanceTracker {
    /// Create a tracker over a shared validator cache
    #[must_use]
    pub fn new(config: PerformanceConfig, cache: Arc<CompiledValidatorCache>) -> Self {
        let capacity = config.sample_capacity;
        Self {
            config,
            cache,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            estimator: Arc::new(default_processing_estimate),
        }
    }

    /// Replace the processing-time estimator
    #[must_use]
    pub fn with_estimator(mut self, estimator: ProcessingTimeEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Validate a value with timing, recording a sample
    ///
    /// Times the whole operation: cache lookup (compiling on miss) plus
    /// instruction execution plus outcome assembly.
    pub fn tracked_validate(
        &self,
        value: &JsonValue,
        kind: RecordKind,
        batch_size_hint: Option<usize>,
    ) -> (ValidationOutcome, PerformanceSample) {
        let start = Instant::now();

        let lookup = self.cache.get_or_compile(kind);
        let outcome = validator::outcome_for(&lookup.validator, value);

        let sample = PerformanceSample {
            kind,
            batch_size: batch_size_hint,
            validation_ms: start.elapsed().as_secs_f64() * 1000.0,
            from_cache: lookup.from_cache,
            succeeded: outcome.accepted,
        };
        self.push_sample(sample.clone());

        (outcome, sample)
    }

    fn push_sample(&self, sample: PerformanceSample) {
        let mut samples = self.samples.lock();
        if samples.len() >= self.config.sample_capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Number of samples currently held
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.lock().len()
    }

    /// Drop all recorded samples
    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    /// Derive tuning advice from the most recent samples
    #[must_use]
    pub fn recommend(&self) -> OptimizationReport {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return OptimizationReport {
                sample_count: 0,
                mean_validation_ms: 0.0,
                mean_overhead_pct: 0.0,
                cache_hit_rate: 0.0,
                optimal_batch_size: None,
                notes: vec!["no performance data available".to_string()],
            };
        }

        let window: Vec<&PerformanceSample> = samples
            .iter()
            .rev()
            .take(self.config.analysis_window)
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let count = window.len() as f64;
        let mean_validation_ms =
            window.iter().map(|s| s.validation_ms).sum::<f64>() / count;
        let mean_overhead_pct = window
            .iter()
            .map(|s| s.validation_ms / (self.estimator)(s.batch_size) * 100.0)
            .sum::<f64>()
            / count;
        let cache_hit_rate = self.cache.stats().hit_rate();
        let optimal_batch_size = Self::optimal_batch_size(&window);

        let mut notes = Vec::new();
        let slow_ms = self.config.slow_validation.as_secs_f64() * 1000.0;
        if mean_validation_ms > slow_ms {
            notes.push(format!(
                "mean validation time {mean_validation_ms:.1}ms exceeds {slow_ms:.0}ms; \
                 consider parallelizing large batches"
            ));
        }
        if mean_overhead_pct > self.config.max_overhead_pct {
            notes.push(format!(
                "validation overhead {mean_overhead_pct:.1}% exceeds {:.0}%; \
                 consider cache tuning",
                self.config.max_overhead_pct
            ));
        }
        if cache_hit_rate < self.config.min_hit_rate {
            notes.push(format!(
                "cache hit rate {:.0}% is below {:.0}%; \
                 consider extending the TTL or pre-warming",
                cache_hit_rate * 100.0,
                self.config.min_hit_rate * 100.0
            ));
        }
        if let Some(optimal) = optimal_batch_size {
            if optimal > self.config.batch_size_high {
                notes.push(format!(
                    "optimal batch size {optimal} is above {}; \
                     consider increasing the configured batch size",
                    self.config.batch_size_high
                ));
            } else if optimal < self.config.batch_size_low {
                notes.push(format!(
                    "optimal batch size {optimal} is below {}; \
                     consider decreasing the configured batch size",
                    self.config.batch_size_low
                ));
            }
        }
        if notes.is_empty() {
            notes.push("performance is optimal".to_string());
        }

        OptimizationReport {
            sample_count: window.len(),
            mean_validation_ms,
            mean_overhead_pct,
            cache_hit_rate,
            optimal_batch_size,
            notes,
        }
    }

    /// Group samples by batch-size hint and pick the size with the lowest
    /// per-item time; ties prefer the smaller size
    fn optimal_batch_size(window: &[&PerformanceSample]) -> Option<usize> {
        let mut groups: BTreeMap<usize, (f64, u32)> = BTreeMap::new();
        for sample in window {
            if let Some(size) = sample.batch_size.filter(|&s| s > 0) {
                #[allow(clippy::cast_precision_loss)]
                let per_item = sample.validation_ms / size as f64;
                let (sum, n) = groups.entry(size).or_insert((0.0, 0));
                *sum += per_item;
                *n += 1;
            }
        }

        let mut best: Option<(usize, f64)> = None;
        // Ascending key order plus strict comparison keeps the smaller
        // size on a tie
        for (size, (sum, n)) in groups {
            let mean = sum / f64::from(n);
            if best.is_none_or(|(_, best_mean)| mean < best_mean) {
                best = Some((size, mean));
            }
        }
        best.map(|(size, _)| size)
    }
}
