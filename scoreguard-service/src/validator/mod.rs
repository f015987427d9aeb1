//! Schema validation for LLM-produced scoring records
//!
//! The validator is a pure membership test: given a parsed JSON value and
//! the record kind it is supposed to match, it reports conformance plus
//! every field-level violation found. Clamping, patching and synthesis are
//! recovery concerns and never happen here.

pub mod cache;
pub mod compiled;

pub use cache::{CacheLookup, CacheStats, CompiledValidatorCache, ValidatorCacheKey};
pub use compiled::{CompiledValidator, ExpectedType, ValidationInstruction};

use scoreguard_core::types::{RecordKind, RecordPayload, ValidationOutcome};
use serde_json::Value as JsonValue;

/// Validate a parsed value against the schema for a record kind
///
/// Pure and synchronous; compiles the kind's validator on the fly. Hot
/// paths go through [`CompiledValidatorCache`] instead and call
/// [`outcome_for`] with the cached validator.
#[must_use]
pub fn validate(value: &JsonValue, kind: RecordKind) -> ValidationOutcome {
    outcome_for(&CompiledValidator::compile(kind), value)
}

/// Run a compiled validator and assemble the outcome
#[must_use]
pub fn outcome_for(compiled: &CompiledValidator, value: &JsonValue) -> ValidationOutcome {
    let violations = compiled.check(value);
    if !violations.is_empty() {
        tracing::debug!(
            kind = %compiled.kind,
            count = violations.len(),
            "validation rejected value"
        );
        return ValidationOutcome::rejected(violations);
    }

    match RecordPayload::from_value(compiled.kind, value.clone()) {
        Ok(payload) => ValidationOutcome::accepted(payload),
        // Unreachable once the instruction pass is clean; surfaced as a
        // violation rather than a panic if the two ever drift
        Err(err) => ValidationOutcome::rejected(vec![format!("$: {err}")]),
    }
}
