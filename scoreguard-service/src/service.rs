//! Enhanced validation facade
//!
//! The only component external collaborators talk to. A single payload
//! runs validation with performance tracking and escalates to recovery on
//! failure; a collection of payloads runs the single-item path under
//! bounded concurrency and aggregates a summary. The facade owns the
//! cache, tracker and orchestrator as explicit instances; there is no
//! global state.

use crate::metrics::{BatchLogEntry, MetricsSink, TracingMetricsSink, ValidationLogEntry};
use crate::performance::{OptimizationReport, PerformanceTracker};
use crate::recovery::{FailureKind, RecoveryFailure, RecoveryOrchestrator, RecoveryStats};
use crate::validator::{CacheStats, CompiledValidatorCache};
use chrono::Utc;
use futures::future::join_all;
use scoreguard_core::config::ScoreGuardConfig;
use scoreguard_core::error::{Result, ScoreGuardError};
use scoreguard_core::types::{RecordKind, RecordPayload, RequestContext};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Instant;

/// Version stamped into every result's metadata
pub const VALIDATION_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Metadata attached to every validation result
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// Wall-clock processing time for this item
    pub processing_time_ms: f64,
    /// Recovery attempts made, zero on the direct path
    pub retry_count: u32,
    /// Whether the compiled validator came from the cache
    pub used_cache: bool,
    /// Whether recovery produced the result
    pub recovery_used: bool,
    /// Version of the validation pipeline
    pub validation_version: &'static str,
}

/// Result of validating one payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancedResult {
    /// Whether an accepted value was produced
    pub success: bool,
    /// The validated or recovered payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RecordPayload>,
    /// Violations and error messages on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Processing metadata
    pub metadata: ResultMetadata,
}

/// One input item for batch validation
#[derive(Debug, Clone)]
pub struct BatchItemInput {
    /// Raw model output text
    pub raw_text: String,
    /// Caller-assigned identifier, attached to the result entry
    pub id: Option<String>,
}

impl BatchItemInput {
    /// Create an item without an identifier
    #[must_use]
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            id: None,
        }
    }

    /// Create an item with an identifier
    #[must_use]
    pub fn with_id(raw_text: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            id: Some(id.into()),
        }
    }
}

/// Options for one batch call
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Peak concurrency; defaults to the configured value
    pub concurrency: Option<usize>,
    /// Batch-size hint for performance sampling; defaults to the item count
    pub batch_size_hint: Option<usize>,
    /// Context applied to every item
    pub context: Option<RequestContext>,
}

/// One entry of a batch result, the item result plus its identifier
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntryResult {
    /// The caller-assigned identifier, when one was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The item's validation result
    #[serde(flatten)]
    pub result: EnhancedResult,
}

/// Aggregate summary of one batch call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Items processed
    pub total_items: usize,
    /// Items that produced an accepted value
    pub succeeded: usize,
    /// Items that exhausted recovery
    pub failed: usize,
    /// Sum of per-item processing time
    pub total_processing_time_ms: f64,
    /// Mean per-item processing time
    pub average_processing_time_ms: f64,
    /// Fraction of items that needed recovery
    pub recovery_rate: f64,
}

/// Result of one batch call
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// Per-item results in input order
    pub results: Vec<BatchEntryResult>,
    /// Aggregate summary
    pub summary: BatchSummary,
}

/// The public validation facade
pub struct EnhancedValidationService {
    config: ScoreGuardConfig,
    cache: Arc<CompiledValidatorCache>,
    tracker: Arc<PerformanceTracker>,
    recovery: Arc<RecoveryOrchestrator>,
    sink: Arc<dyn MetricsSink>,
}

impl Default for EnhancedValidationService {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedValidationService {
    /// Create a service with default configuration and the tracing sink
    #[must_use]
    pub fn new() -> Self {
        Self::assemble(ScoreGuardConfig::default(), Arc::new(TracingMetricsSink))
    }

    /// Create a service from configuration
    ///
    /// # Errors
    ///
    /// Returns `ScoreGuardError::Configuration` when a tunable is invalid.
    pub fn with_config(config: ScoreGuardConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, Arc::new(TracingMetricsSink)))
    }

    /// Create a service from configuration with a custom metrics sink
    ///
    /// # Errors
    ///
    /// Returns `ScoreGuardError::Configuration` when a tunable is invalid.
    pub fn with_config_and_sink(
        config: ScoreGuardConfig,
        sink: Arc<dyn MetricsSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, sink))
    }

    fn assemble(config: ScoreGuardConfig, sink: Arc<dyn MetricsSink>) -> Self {
        let cache = Arc::new(CompiledValidatorCache::new(&config.cache));
        let tracker = Arc::new(PerformanceTracker::new(
            config.performance.clone(),
            Arc::clone(&cache),
        ));
        let recovery = Arc::new(RecoveryOrchestrator::new(config.recovery.clone()));
        Self {
            config,
            cache,
            tracker,
            recovery,
            sink,
        }
    }

    /// Validate a single raw payload
    ///
    /// Parse failures and schema violations escalate through recovery and
    /// are never surfaced directly; the only hard failure a caller sees is
    /// `RecoveryExhausted`.
    ///
    /// # Errors
    ///
    /// Returns `ScoreGuardError::RecoveryExhausted` when no strategy
    /// produced an acceptable value.
    pub async fn validate_one(
        &self,
        raw_text: &str,
        kind: RecordKind,
        context: Option<RequestContext>,
    ) -> Result<EnhancedResult> {
        let context = context.unwrap_or_default();
        let started = Instant::now();

        match serde_json::from_str::<JsonValue>(raw_text) {
            Ok(value) => {
                let (outcome, sample) =
                    self.tracker
                        .tracked_validate(&value, kind, context.batch_size_hint);

                if outcome.accepted {
                    let result = EnhancedResult {
                        success: true,
                        data: outcome.value,
                        errors: None,
                        metadata: ResultMetadata {
                            processing_time_ms: elapsed_ms(started),
                            retry_count: 0,
                            used_cache: sample.from_cache,
                            recovery_used: false,
                            validation_version: VALIDATION_VERSION,
                        },
                    };
                    self.emit_validation(kind, &result, None, &context).await;
                    return Ok(result);
                }

                self.escalate(
                    raw_text,
                    kind,
                    context,
                    FailureKind::SchemaViolation,
                    Some(value),
                    outcome.violations,
                    sample.from_cache,
                    started,
                )
                .await
            }
            Err(parse_error) => {
                tracing::debug!(kind = %kind, error = %parse_error, "payload did not parse");
                self.escalate(
                    raw_text,
                    kind,
                    context,
                    FailureKind::MalformedJson,
                    None,
                    Vec::new(),
                    false,
                    started,
                )
                .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn escalate(
        &self,
        raw_text: &str,
        kind: RecordKind,
        context: RequestContext,
        failure_kind: FailureKind,
        parsed: Option<JsonValue>,
        violations: Vec<String>,
        used_cache: bool,
        started: Instant,
    ) -> Result<EnhancedResult> {
        let failure = RecoveryFailure {
            kind,
            failure: failure_kind,
            raw_text: raw_text.to_string(),
            parsed,
            violations,
            context: context.clone(),
        };

        let (session, recovered) = self.recovery.recover(&failure);
        self.sink.record_recovery(&session).await;

        match recovered {
            Ok(payload) => {
                let result = EnhancedResult {
                    success: true,
                    data: Some(payload),
                    errors: None,
                    metadata: ResultMetadata {
                        processing_time_ms: elapsed_ms(started),
                        retry_count: session.attempt_count,
                        used_cache,
                        recovery_used: true,
                        validation_version: VALIDATION_VERSION,
                    },
                };
                self.emit_validation(kind, &result, None, &context).await;
                Ok(result)
            }
            Err(error) => {
                let failed = EnhancedResult {
                    success: false,
                    data: None,
                    errors: Some(error.violations().to_vec()),
                    metadata: ResultMetadata {
                        processing_time_ms: elapsed_ms(started),
                        retry_count: session.attempt_count,
                        used_cache,
                        recovery_used: true,
                        validation_version: VALIDATION_VERSION,
                    },
                };
                self.emit_validation(kind, &failed, Some(error.to_string()), &context)
                    .await;
                Err(error)
            }
        }
    }

    async fn emit_validation(
        &self,
        kind: RecordKind,
        result: &EnhancedResult,
        error_message: Option<String>,
        context: &RequestContext,
    ) {
        self.sink
            .record_validation(ValidationLogEntry {
                operation_type: "single_validation",
                validation_type: kind,
                success: result.success,
                error_message,
                processing_time_ms: result.metadata.processing_time_ms,
                retry_count: result.metadata.retry_count,
                session_id: context.session_id.clone(),
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Validate a collection of raw payloads under bounded concurrency
    ///
    /// Items are partitioned into chunks of the requested concurrency;
    /// every item in a chunk runs concurrently and the whole chunk
    /// completes before the next begins. Results keep input order and
    /// carry the caller's item identifiers. One item exhausting recovery
    /// becomes a failed entry; it never fails the batch call.
    ///
    /// # Errors
    ///
    /// Returns `ScoreGuardError::Configuration` when the requested
    /// concurrency is zero.
    pub async fn validate_batch(
        &self,
        items: Vec<BatchItemInput>,
        kind: RecordKind,
        options: BatchOptions,
    ) -> Result<BatchOutcome> {
        let concurrency = options
            .concurrency
            .unwrap_or(self.config.batch.default_concurrency);
        if concurrency == 0 {
            return Err(ScoreGuardError::config("concurrency must be positive"));
        }

        let batch_started = Instant::now();
        let total_items = items.len();
        let hint = options.batch_size_hint.unwrap_or(total_items);
        let mut item_context = options.context.unwrap_or_default();
        item_context.batch_size_hint = Some(hint);

        let mut results: Vec<BatchEntryResult> = Vec::with_capacity(total_items);
        for chunk in items.chunks(concurrency) {
            let chunk_futures = chunk.iter().map(|item| {
                let context = item_context.clone();
                async move {
                    let item_started = Instant::now();
                    match self
                        .validate_one(&item.raw_text, kind, Some(context))
                        .await
                    {
                        Ok(result) => BatchEntryResult {
                            id: item.id.clone(),
                            result,
                        },
                        // Failure as value: an exhausted item never
                        // aborts its siblings
                        Err(error) => BatchEntryResult {
                            id: item.id.clone(),
                            result: failed_entry(&error, item_started),
                        },
                    }
                }
            });
            results.extend(join_all(chunk_futures).await);
        }

        let summary = summarize(&results);
        self.emit_batch(&summary, concurrency, batch_started).await;

        Ok(BatchOutcome { results, summary })
    }

    async fn emit_batch(&self, summary: &BatchSummary, concurrency: usize, started: Instant) {
        #[allow(clippy::cast_precision_loss)]
        let system_load = concurrency as f64 / num_cpus::get() as f64;
        #[allow(clippy::cast_precision_loss)]
        let success_rate = if summary.total_items == 0 {
            0.0
        } else {
            summary.succeeded as f64 / summary.total_items as f64
        };

        self.sink
            .record_batch(BatchLogEntry {
                operation_type: "batch_validation",
                batch_size: summary.total_items,
                total_processing_time_ms: elapsed_ms(started),
                validation_time_ms: summary.total_processing_time_ms,
                success_rate,
                system_load,
                optimization_notes: self.tracker.recommend().notes,
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Snapshot of the validator cache statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Snapshot of the recovery statistics
    #[must_use]
    pub fn recovery_stats(&self) -> RecoveryStats {
        self.recovery.stats()
    }

    /// Current optimization advice
    #[must_use]
    pub fn recommend(&self) -> OptimizationReport {
        self.tracker.recommend()
    }

    /// Pre-compile validators for every record kind
    pub fn warm_cache(&self) {
        self.cache.warm(&RecordKind::ALL);
    }

    /// The configuration the service was built with
    #[must_use]
    pub fn config(&self) -> &ScoreGuardConfig {
        &self.config
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn failed_entry(error: &ScoreGuardError, started: Instant) -> EnhancedResult {
    let retry_count = match error {
        ScoreGuardError::RecoveryExhausted { attempts, .. } => *attempts,
        _ => 0,
    };
    let mut errors = vec![error.to_string()];
    errors.extend(error.violations().iter().cloned());

    EnhancedResult {
        success: false,
        data: None,
        errors: Some(errors),
        metadata: ResultMetadata {
            processing_time_ms: elapsed_ms(started),
            retry_count,
            used_cache: false,
            recovery_used: true,
            validation_version: VALIDATION_VERSION,
        },
    }
}

fn summarize(results: &[BatchEntryResult]) -> BatchSummary {
    let total_items = results.len();
    let succeeded = results.iter().filter(|r| r.result.success).count();
    let recovered = results
        .iter()
        .filter(|r| r.result.metadata.recovery_used)
        .count();
    let total_processing_time_ms: f64 = results
        .iter()
        .map(|r| r.result.metadata.processing_time_ms)
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let (average_processing_time_ms, recovery_rate) = if total_items == 0 {
        (0.0, 0.0)
    } else {
        (
            total_processing_time_ms / total_items as f64,
            recovered as f64 / total_items as f64,
        )
    };

    BatchSummary {
        total_items,
        succeeded,
        failed: total_items - succeeded,
        total_processing_time_ms,
        average_processing_time_ms,
        recovery_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_zero_concurrency_is_a_configuration_error() {
        let service = EnhancedValidationService::new();
        let result = service
            .validate_batch(
                vec![BatchItemInput::new("{}")],
                RecordKind::Single,
                BatchOptions {
                    concurrency: Some(0),
                    ..BatchOptions::default()
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(ScoreGuardError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_summary() -> anyhow::Result<()> {
        let service = EnhancedValidationService::new();
        let outcome = service
            .validate_batch(Vec::new(), RecordKind::Single, BatchOptions::default())
            .await?;

        assert_eq!(outcome.summary.total_items, 0);
        assert_eq!(outcome.summary.recovery_rate, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let mut config = ScoreGuardConfig::default();
        config.recovery.max_attempts = 0;
        assert!(EnhancedValidationService::with_config(config).is_err());
    }
}
