//! # scoreguard Service
//!
//! Resilient validation service for JSON produced by LLM scoring calls.
//!
//! The service guarantees that only schema-conformant, semantically
//! bounded data reaches downstream logic, without surfacing a hard
//! failure to the caller when a reasonable substitute can be synthesized.
//!
//! ## Overview
//!
//! - **Schema validation**: pure membership test over the three record
//!   shapes, reporting every field-level violation found
//! - **Compiled-validator cache**: bounded, LRU-swept, lazily expired
//! - **Escalating recovery**: text cleanup, structural patches, flagged
//!   fallback synthesis, capped at a configurable attempt ceiling
//! - **Performance feedback**: rolling timing history turned into tuning
//!   advice (batch size, cache health, overhead ratio)
//! - **Bounded-concurrency batches**: chunked execution that preserves
//!   item order and isolates item failures
//!
//! ## Quick Start
//!
//! ```rust
//! use scoreguard_core::types::RecordKind;
//! use scoreguard_service::EnhancedValidationService;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = EnhancedValidationService::new();
//!
//!     let result = service
//!         .validate_one(
//!             r#"{"questionNumber":1,"isCorrect":true,"pointsEarned":1,"confidence":0.9}"#,
//!             RecordKind::Single,
//!             None,
//!         )
//!         .await?;
//!
//!     assert!(result.success);
//!     assert!(!result.metadata.recovery_used);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Schema validation and the compiled-validator cache
pub mod validator;

/// Performance tracking and optimization advice
pub mod performance;

/// Escalating error recovery
pub mod recovery;

/// Metrics sink collaborator interface
pub mod metrics;

/// The enhanced validation facade
pub mod service;

pub use metrics::{BatchLogEntry, MetricsSink, TracingMetricsSink, ValidationLogEntry};
pub use performance::{
    default_processing_estimate, OptimizationReport, PerformanceSample, PerformanceTracker,
    ProcessingTimeEstimator,
};
pub use recovery::{
    FailureKind, RecoveryFailure, RecoveryOrchestrator, RecoverySession, RecoveryStats,
    RecoveryStrategy, RECOVERY_FALLBACK_MARKER,
};
pub use service::{
    BatchEntryResult, BatchItemInput, BatchOptions, BatchOutcome, BatchSummary, EnhancedResult,
    EnhancedValidationService, ResultMetadata,
};
pub use validator::{validate, CacheStats, CompiledValidator, CompiledValidatorCache};
