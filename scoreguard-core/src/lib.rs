//! # scoreguard Core
//!
//! Core types for validating LLM-produced scoring JSON.
//!
//! This crate provides the building blocks shared across the scoreguard
//! pipeline: the three record shapes the system understands, the error
//! taxonomy, and the configuration surface.
//!
//! ## Design Principles
//!
//! - **Structural validation only**: record types bound each field
//!   independently; cross-field business rules belong downstream
//! - **Explicit errors**: every failure mode is a named variant, and only
//!   recovery exhaustion ever reaches a caller as a hard failure
//! - **Externalized tunables**: no behavioral constant is compiled in

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Error types for scoreguard operations
pub mod error;

/// Record types and validation outcomes
pub mod types;

/// Configuration types for scoreguard services
pub mod config;

/// Commonly used imports
pub mod prelude;

pub use error::{Result, ScoreGuardError};
pub use types::{
    AnalysisRecord, BatchRecord, LetterGrade, RecordKind, RecordPayload, RequestContext,
    ScoredItem, SkillBreakdown, ValidationOutcome,
};
