//! Escalating error recovery for failed validations
//!
//! Given a raw malformed payload and the record kind it was meant to
//! match, the orchestrator walks an ordered list of recovery strategies,
//! validating each candidate value, until one is accepted or the attempt
//! ceiling is reached. Every escalation is tracked as a recovery session
//! that is finalized exactly once and handed back to the caller for the
//! metrics sink; nothing is retained here afterward.

pub mod strategies;

pub use strategies::{
    cleanup_raw_text, default_strategies, DirectRetryStrategy, FailureKind,
    FallbackSynthesisStrategy, RecoveryFailure, RecoveryStrategy, SchemaCorrectionStrategy,
    RECOVERY_FALLBACK_MARKER,
};

use crate::validator;
use dashmap::DashMap;
use scoreguard_core::config::RecoveryConfig;
use scoreguard_core::error::{Result, ScoreGuardError};
use scoreguard_core::types::RecordPayload;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use uuid::Uuid;

/// Bookkeeping for one escalation from failure to success or exhaustion
///
/// Mutated once per attempt, finalized exactly once, then immutable.
#[derive(Debug, Clone, Serialize)]
pub struct RecoverySession {
    /// Session identifier
    pub id: Uuid,
    /// Caller session the failed request belonged to, if known
    pub source_request_id: Option<String>,
    /// How the payload originally failed
    pub failure_kind: FailureKind,
    /// Name of the strategy that succeeded, or the last one tried
    pub strategy_name: String,
    /// Number of strategies attempted
    pub attempt_count: u32,
    /// Set exactly once at finalization
    pub succeeded: Option<bool>,
    /// Total elapsed time across all attempts plus bookkeeping
    pub total_ms: Option<f64>,
    /// One note per attempt, for diagnostics
    pub notes: SmallVec<[String; 4]>,
}

impl RecoverySession {
    fn new(failure: &RecoveryFailure) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_request_id: failure.context.session_id.clone(),
            failure_kind: failure.failure,
            strategy_name: String::new(),
            attempt_count: 0,
            succeeded: None,
            total_ms: None,
            notes: SmallVec::new(),
        }
    }

    fn finalize(&mut self, succeeded: bool, started: Instant) {
        self.succeeded = Some(succeeded);
        self.total_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
    }
}

#[derive(Default)]
struct StrategyCounters {
    attempts: AtomicU64,
    successes: AtomicU64,
}

/// Per-strategy recovery statistics
#[derive(Debug, Clone, Serialize)]
pub struct StrategyStats {
    /// Attempts made by this strategy
    pub attempts: u64,
    /// Attempts that produced an accepted value
    pub successes: u64,
}

/// Aggregate recovery statistics across all sessions
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoveryStats {
    /// Sessions started
    pub sessions: u64,
    /// Sessions that ended exhausted
    pub exhausted: u64,
    /// Attempt and success counts keyed by strategy name
    pub by_strategy: HashMap<String, StrategyStats>,
}

/// Orchestrator walking the strategy list for each failed payload
pub struct RecoveryOrchestrator {
    config: RecoveryConfig,
    strategies: Vec<Box<dyn RecoveryStrategy>>,
    counters: DashMap<&'static str, StrategyCounters>,
    sessions: AtomicU64,
    exhausted: AtomicU64,
}

impl RecoveryOrchestrator {
    /// Create an orchestrator with the built-in strategy set
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        let strategies = default_strategies(&config);
        Self::with_strategies(config, strategies)
    }

    /// Create an orchestrator with a custom strategy set
    ///
    /// Strategies are sorted by priority once here and iterated in that
    /// order for every session.
    #[must_use]
    pub fn with_strategies(
        config: RecoveryConfig,
        mut strategies: Vec<Box<dyn RecoveryStrategy>>,
    ) -> Self {
        strategies.sort_by_key(|s| s.priority());
        Self {
            config,
            strategies,
            counters: DashMap::new(),
            sessions: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
        }
    }

    /// Attempt to recover a failed payload
    ///
    /// Walks the strategy list in priority order. Each applicable strategy
    /// gets one independently timed attempt: produce a candidate, validate
    /// it, accept or move on. Returns the finalized session along with
    /// either the recovered payload or `RecoveryExhausted` carrying every
    /// intermediate violation.
    pub fn recover(&self, failure: &RecoveryFailure) -> (RecoverySession, Result<RecordPayload>) {
        let started = Instant::now();
        let mut session = RecoverySession::new(failure);
        let mut all_violations = failure.violations.clone();

        self.sessions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            session = %session.id,
            kind = %failure.kind,
            failure = %failure.failure,
            "starting recovery session"
        );

        for strategy in &self.strategies {
            if session.attempt_count >= self.config.max_attempts {
                break;
            }
            if !strategy.can_handle(failure) {
                continue;
            }

            session.attempt_count += 1;
            session.strategy_name = strategy.name().to_string();
            self.counter(strategy.name())
                .attempts
                .fetch_add(1, Ordering::Relaxed);

            let attempt_started = Instant::now();
            match strategy.attempt(failure) {
                Ok(Some(candidate)) => {
                    let outcome = validator::validate(&candidate, failure.kind);
                    let attempt_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;

                    if outcome.accepted {
                        session.notes.push(format!(
                            "{}: accepted in {attempt_ms:.2}ms",
                            strategy.name()
                        ));
                        session.finalize(true, started);
                        self.counter(strategy.name())
                            .successes
                            .fetch_add(1, Ordering::Relaxed);
                        tracing::info!(
                            session = %session.id,
                            strategy = strategy.name(),
                            attempts = session.attempt_count,
                            "recovery succeeded"
                        );

                        let payload = outcome
                            .value
                            .expect("accepted outcome always carries a payload");
                        return (session, Ok(payload));
                    }

                    session.notes.push(format!(
                        "{}: rejected with {} violations in {attempt_ms:.2}ms",
                        strategy.name(),
                        outcome.violations.len()
                    ));
                    all_violations.extend(outcome.violations);
                }
                Ok(None) => {
                    session
                        .notes
                        .push(format!("{}: produced no candidate", strategy.name()));
                }
                Err(err) => {
                    session
                        .notes
                        .push(format!("{}: failed: {err}", strategy.name()));
                    all_violations.push(format!("{}: {err}", strategy.name()));
                }
            }
        }

        session.finalize(false, started);
        self.exhausted.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            session = %session.id,
            attempts = session.attempt_count,
            "recovery exhausted"
        );

        let error = ScoreGuardError::recovery_exhausted(session.attempt_count, all_violations);
        (session, Err(error))
    }

    fn counter(&self, name: &'static str) -> dashmap::mapref::one::RefMut<'_, &'static str, StrategyCounters> {
        self.counters.entry(name).or_default()
    }

    /// Snapshot of per-strategy and aggregate recovery statistics
    #[must_use]
    pub fn stats(&self) -> RecoveryStats {
        let mut by_strategy = HashMap::new();
        for entry in &self.counters {
            by_strategy.insert(
                (*entry.key()).to_string(),
                StrategyStats {
                    attempts: entry.value().attempts.load(Ordering::Relaxed),
                    successes: entry.value().successes.load(Ordering::Relaxed),
                },
            );
        }
        RecoveryStats {
            sessions: self.sessions.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            by_strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scoreguard_core::types::{RecordKind, RequestContext};

    fn orchestrator() -> RecoveryOrchestrator {
        RecoveryOrchestrator::new(RecoveryConfig::default())
    }

    fn failure_for(kind: RecordKind, raw: &str) -> RecoveryFailure {
        RecoveryFailure {
            kind,
            failure: FailureKind::MalformedJson,
            raw_text: raw.to_string(),
            parsed: None,
            violations: Vec::new(),
            context: RequestContext::default(),
        }
    }

    #[test]
    fn test_direct_retry_fixes_fenced_payload() {
        let orchestrator = orchestrator();
        let failure = failure_for(
            RecordKind::Single,
            "```json\n{\"questionNumber\":1,\"isCorrect\":true,\"pointsEarned\":1,\"confidence\":0.9}\n```",
        );

        let (session, result) = orchestrator.recover(&failure);
        assert!(result.is_ok());
        assert_eq!(session.attempt_count, 1);
        assert_eq!(session.strategy_name, "direct_retry");
        assert_eq!(session.succeeded, Some(true));
        assert!(session.total_ms.is_some());
    }

    #[test]
    fn test_escalation_reaches_exactly_strategy_two() {
        let orchestrator = orchestrator();
        // Parses after cleanup but misses required fields, which only the
        // correction strategy injects
        let failure = failure_for(RecordKind::Single, "```json\n{\"isCorrect\":true}\n```");

        let (session, result) = orchestrator.recover(&failure);
        let payload = result.expect("correction should recover this payload");

        assert_eq!(session.attempt_count, 2);
        assert_eq!(session.strategy_name, "schema_correction");
        match payload {
            RecordPayload::Single(item) => {
                assert!(item.is_correct);
                assert_eq!(item.points_earned, 0.0);
                assert_eq!(item.confidence, 0.5);
            }
            other => panic!("expected single payload, got {other:?}"),
        }
    }

    #[test]
    fn test_fallback_synthesis_flags_placeholder() {
        let orchestrator = orchestrator();
        let failure = failure_for(RecordKind::Single, "{\"unexpected\": 1}");

        let (session, result) = orchestrator.recover(&failure);
        let payload = result.expect("fallback always produces a valid single");

        assert_eq!(session.attempt_count, 3);
        assert_eq!(session.strategy_name, "fallback_synthesis");
        match payload {
            RecordPayload::Single(item) => {
                let reasoning = item.reasoning.expect("placeholder carries reasoning");
                assert!(reasoning.contains(RECOVERY_FALLBACK_MARKER));
                assert_eq!(item.points_earned, 0.0);
            }
            other => panic!("expected single payload, got {other:?}"),
        }
    }

    #[test]
    fn test_exhaustion_after_max_attempts() {
        let orchestrator = orchestrator();
        // Parseable, so every strategy gets its attempt; a zero question
        // count makes even synthesis produce an empty, invalid batch
        let mut failure = failure_for(RecordKind::Batch, "{\"wrong\": true}");
        failure.context.question_count = Some(0);

        let (session, result) = orchestrator.recover(&failure);

        assert_eq!(session.succeeded, Some(false));
        assert_eq!(session.attempt_count, 3);
        match result {
            Err(ScoreGuardError::RecoveryExhausted { attempts, violations }) => {
                assert_eq!(attempts, 3);
                assert!(!violations.is_empty());
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_stats_count_attempts_and_successes() {
        let orchestrator = orchestrator();
        let failure = failure_for(RecordKind::Single, "```json\n{\"isCorrect\":true}\n```");
        let _ = orchestrator.recover(&failure);

        let stats = orchestrator.stats();
        assert_eq!(stats.sessions, 1);
        assert_eq!(stats.exhausted, 0);
        assert_eq!(stats.by_strategy["direct_retry"].attempts, 1);
        assert_eq!(stats.by_strategy["direct_retry"].successes, 0);
        assert_eq!(stats.by_strategy["schema_correction"].successes, 1);
    }
}
