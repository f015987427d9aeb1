//! End-to-end tests for the enhanced validation facade

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use scoreguard_core::config::ScoreGuardConfig;
use scoreguard_core::types::{RecordKind, RecordPayload, RequestContext};
use scoreguard_service::{
    BatchItemInput, BatchLogEntry, BatchOptions, EnhancedValidationService, MetricsSink,
    RecoverySession, ValidationLogEntry, RECOVERY_FALLBACK_MARKER,
};
use std::sync::{Arc, Mutex};

const VALID_SINGLE: &str =
    r#"{"questionNumber":1,"isCorrect":true,"pointsEarned":1,"confidence":0.9}"#;

#[tokio::test]
async fn test_valid_single_passes_without_recovery() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();

    let result = service
        .validate_one(VALID_SINGLE, RecordKind::Single, None)
        .await?;

    assert!(result.success);
    assert!(!result.metadata.recovery_used);
    assert_eq!(result.metadata.retry_count, 0);
    match result.data {
        Some(RecordPayload::Single(item)) => {
            assert_eq!(item.points_earned, 1.0);
            assert_eq!(item.confidence, 0.9);
        }
        other => panic!("expected single payload, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_fenced_incomplete_payload_recovers_on_second_attempt() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();

    let result = service
        .validate_one(
            "```json\n{\"isCorrect\":true}\n```",
            RecordKind::Single,
            None,
        )
        .await?;

    assert!(result.success);
    assert!(result.metadata.recovery_used);
    assert_eq!(result.metadata.retry_count, 2);
    match result.data {
        Some(RecordPayload::Single(item)) => {
            assert!(item.is_correct);
            assert_eq!(item.points_earned, 0.0);
            assert_eq!(item.confidence, 0.5);
        }
        other => panic!("expected single payload, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_unsalvageable_payload_falls_back_to_flagged_placeholder() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();

    let result = service
        .validate_one("complete nonsense, not even json", RecordKind::Single, None)
        .await?;

    assert!(result.success);
    assert!(result.metadata.recovery_used);
    match result.data {
        Some(RecordPayload::Single(item)) => {
            let reasoning = item.reasoning.expect("placeholder carries reasoning");
            assert!(reasoning.contains(RECOVERY_FALLBACK_MARKER));
            assert_eq!(item.points_earned, 0.0);
        }
        other => panic!("expected single payload, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();

    let first = service
        .validate_one(VALID_SINGLE, RecordKind::Single, None)
        .await?;
    let second = service
        .validate_one(VALID_SINGLE, RecordKind::Single, None)
        .await?;

    assert!(!first.metadata.used_cache);
    assert!(second.metadata.used_cache);
    assert_eq!(service.cache_stats().hits, 1);
    Ok(())
}

#[tokio::test]
async fn test_batch_of_six_with_concurrency_five() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();
    let items: Vec<BatchItemInput> = (0..6).map(|_| BatchItemInput::new(VALID_SINGLE)).collect();

    let outcome = service
        .validate_batch(
            items,
            RecordKind::Single,
            BatchOptions {
                concurrency: Some(5),
                ..BatchOptions::default()
            },
        )
        .await?;

    assert_eq!(outcome.summary.total_items, 6);
    assert_eq!(outcome.summary.succeeded, 6);
    assert_eq!(outcome.summary.failed, 0);
    assert_eq!(outcome.summary.recovery_rate, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_batch_preserves_order_and_identity() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();
    // Item "a" needs recovery and therefore finishes its internal work
    // slower than the immediately valid "b"
    let items = vec![
        BatchItemInput::with_id("```json\n{\"isCorrect\":true}\n```", "a"),
        BatchItemInput::with_id(VALID_SINGLE, "b"),
    ];

    let outcome = service
        .validate_batch(
            items,
            RecordKind::Single,
            BatchOptions {
                concurrency: Some(1),
                ..BatchOptions::default()
            },
        )
        .await?;

    let ids: Vec<Option<&str>> = outcome
        .results
        .iter()
        .map(|entry| entry.id.as_deref())
        .collect();
    assert_eq!(ids, vec![Some("a"), Some("b")]);
    assert!(outcome.results[0].result.metadata.recovery_used);
    assert!(!outcome.results[1].result.metadata.recovery_used);
    Ok(())
}

#[tokio::test]
async fn test_exhausted_item_does_not_fail_the_batch() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();
    // A zero question count makes even fallback synthesis invalid for
    // batch records, so the middle item exhausts recovery
    let context = RequestContext {
        question_count: Some(0),
        ..RequestContext::default()
    };
    let valid_batch =
        format!("{{\"items\":[{VALID_SINGLE}]}}");
    let items = vec![
        BatchItemInput::with_id(valid_batch.clone(), "ok-1"),
        BatchItemInput::with_id("{\"wrong\": true}", "broken"),
        BatchItemInput::with_id(valid_batch, "ok-2"),
    ];

    let outcome = service
        .validate_batch(
            items,
            RecordKind::Batch,
            BatchOptions {
                concurrency: Some(2),
                context: Some(context),
                ..BatchOptions::default()
            },
        )
        .await?;

    assert_eq!(outcome.summary.total_items, 3);
    assert_eq!(outcome.summary.succeeded, 2);
    assert_eq!(outcome.summary.failed, 1);

    let broken = &outcome.results[1];
    assert_eq!(broken.id.as_deref(), Some("broken"));
    assert!(!broken.result.success);
    assert_eq!(broken.result.metadata.retry_count, 3);
    assert!(broken.result.errors.as_ref().is_some_and(|e| !e.is_empty()));
    Ok(())
}

#[derive(Default)]
struct CapturingSink {
    validations: Mutex<Vec<ValidationLogEntry>>,
    batches: Mutex<Vec<BatchLogEntry>>,
    recoveries: Mutex<Vec<String>>,
}

#[async_trait]
impl MetricsSink for CapturingSink {
    async fn record_validation(&self, entry: ValidationLogEntry) {
        self.validations
            .lock()
            .expect("sink lock should not be poisoned")
            .push(entry);
    }

    async fn record_batch(&self, entry: BatchLogEntry) {
        self.batches
            .lock()
            .expect("sink lock should not be poisoned")
            .push(entry);
    }

    async fn record_recovery(&self, session: &RecoverySession) {
        self.recoveries
            .lock()
            .expect("sink lock should not be poisoned")
            .push(session.strategy_name.clone());
    }
}

#[tokio::test]
async fn test_metrics_sink_receives_every_entry() -> anyhow::Result<()> {
    let sink = Arc::new(CapturingSink::default());
    let service = EnhancedValidationService::with_config_and_sink(
        ScoreGuardConfig::default(),
        Arc::clone(&sink) as Arc<dyn MetricsSink>,
    )?;

    let items = vec![
        BatchItemInput::new(VALID_SINGLE),
        BatchItemInput::new("```json\n{\"isCorrect\":true}\n```"),
    ];
    service
        .validate_batch(items, RecordKind::Single, BatchOptions::default())
        .await?;

    let validations = sink
        .validations
        .lock()
        .expect("sink lock should not be poisoned");
    assert_eq!(validations.len(), 2);
    assert!(validations.iter().all(|entry| entry.success));

    let batches = sink.batches.lock().expect("sink lock should not be poisoned");
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].batch_size, 2);
    assert!(batches[0].system_load > 0.0);

    let recoveries = sink
        .recoveries
        .lock()
        .expect("sink lock should not be poisoned");
    assert_eq!(recoveries.as_slice(), ["schema_correction"]);
    Ok(())
}

#[tokio::test]
async fn test_recovery_stats_accumulate_across_calls() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();

    service
        .validate_one("```json\n{\"isCorrect\":true}\n```", RecordKind::Single, None)
        .await?;
    service
        .validate_one("not json at all", RecordKind::Single, None)
        .await?;

    let stats = service.recovery_stats();
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.exhausted, 0);
    assert_eq!(stats.by_strategy["schema_correction"].successes, 1);
    assert_eq!(stats.by_strategy["fallback_synthesis"].successes, 1);
    Ok(())
}

#[tokio::test]
async fn test_warmed_cache_serves_first_validation() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();
    service.warm_cache();

    let result = service
        .validate_one(VALID_SINGLE, RecordKind::Single, None)
        .await?;
    assert!(result.metadata.used_cache);
    Ok(())
}

#[tokio::test]
async fn test_optimizer_reports_after_batch() -> anyhow::Result<()> {
    let service = EnhancedValidationService::new();

    let report = service.recommend();
    assert_eq!(report.notes, vec!["no performance data available".to_string()]);

    let items: Vec<BatchItemInput> = (0..10).map(|_| BatchItemInput::new(VALID_SINGLE)).collect();
    service
        .validate_batch(items, RecordKind::Single, BatchOptions::default())
        .await?;

    let report = service.recommend();
    assert_eq!(report.sample_count, 10);
    assert_eq!(report.optimal_batch_size, Some(10));
    assert!(report.mean_validation_ms >= 0.0);
    Ok(())
}
