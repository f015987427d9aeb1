//! Metrics sink collaborator interface
//!
//! The core emits one structured entry per validation and per batch but
//! never stores them; persistence and aggregation belong to the
//! collaborator behind [`MetricsSink`]. The default sink forwards entries
//! as structured tracing events.

use crate::recovery::RecoverySession;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scoreguard_core::types::RecordKind;
use serde::Serialize;

/// Structured entry for one validation call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationLogEntry {
    /// Operation name, e.g. `single_validation`
    pub operation_type: &'static str,
    /// Record kind validated
    pub validation_type: RecordKind,
    /// Whether the call produced an accepted value
    pub success: bool,
    /// Error message when the call hard-failed
    pub error_message: Option<String>,
    /// Wall-clock processing time
    pub processing_time_ms: f64,
    /// Recovery attempts made, zero on the direct path
    pub retry_count: u32,
    /// Caller session identifier, when supplied
    pub session_id: Option<String>,
    /// When the entry was emitted
    pub timestamp: DateTime<Utc>,
}

/// Structured entry for one batch call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLogEntry {
    /// Operation name, e.g. `batch_validation`
    pub operation_type: &'static str,
    /// Number of items in the batch
    pub batch_size: usize,
    /// Wall-clock duration of the whole batch call
    pub total_processing_time_ms: f64,
    /// Sum of per-item validation time
    pub validation_time_ms: f64,
    /// Fraction of items that succeeded
    pub success_rate: f64,
    /// Requested concurrency relative to logical CPUs
    pub system_load: f64,
    /// Current optimizer recommendations
    pub optimization_notes: Vec<String>,
    /// When the entry was emitted
    pub timestamp: DateTime<Utc>,
}

/// Collaborator that persists or aggregates metrics entries
///
/// Implementations must tolerate being called concurrently from every
/// in-flight validation.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Record one validation entry
    async fn record_validation(&self, entry: ValidationLogEntry);

    /// Record one batch entry
    async fn record_batch(&self, entry: BatchLogEntry);

    /// Record one finalized recovery session
    async fn record_recovery(&self, session: &RecoverySession);
}

/// Default sink emitting structured tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

#[async_trait]
impl MetricsSink for TracingMetricsSink {
    async fn record_validation(&self, entry: ValidationLogEntry) {
        tracing::info!(
            target: "scoreguard::metrics",
            operation = entry.operation_type,
            kind = %entry.validation_type,
            success = entry.success,
            error = entry.error_message.as_deref().unwrap_or(""),
            processing_ms = entry.processing_time_ms,
            retries = entry.retry_count,
            session = entry.session_id.as_deref().unwrap_or(""),
            "validation completed"
        );
    }

    async fn record_batch(&self, entry: BatchLogEntry) {
        tracing::info!(
            target: "scoreguard::metrics",
            operation = entry.operation_type,
            batch_size = entry.batch_size,
            total_ms = entry.total_processing_time_ms,
            validation_ms = entry.validation_time_ms,
            success_rate = entry.success_rate,
            system_load = entry.system_load,
            notes = %entry.optimization_notes.join("; "),
            "batch completed"
        );
    }

    async fn record_recovery(&self, session: &RecoverySession) {
        tracing::info!(
            target: "scoreguard::metrics",
            session = %session.id,
            failure = %session.failure_kind,
            strategy = %session.strategy_name,
            attempts = session.attempt_count,
            succeeded = session.succeeded.unwrap_or(false),
            total_ms = session.total_ms.unwrap_or(0.0),
            "recovery session finalized"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_entry_serializes_camel_case() -> anyhow::Result<()> {
        let entry = ValidationLogEntry {
            operation_type: "single_validation",
            validation_type: RecordKind::Single,
            success: true,
            error_message: None,
            processing_time_ms: 1.25,
            retry_count: 0,
            session_id: Some("session-1".to_string()),
            timestamp: Utc::now(),
        };

        let value = serde_json::to_value(&entry)?;
        assert_eq!(value["operationType"], "single_validation");
        assert_eq!(value["processingTimeMs"], 1.25);
        assert_eq!(value["retryCount"], 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_entries() {
        let sink = TracingMetricsSink;
        sink.record_batch(BatchLogEntry {
            operation_type: "batch_validation",
            batch_size: 6,
            total_processing_time_ms: 12.0,
            validation_time_ms: 4.0,
            success_rate: 1.0,
            system_load: 0.5,
            optimization_notes: vec!["performance is optimal".to_string()],
            timestamp: Utc::now(),
        })
        .await;
    }
}
