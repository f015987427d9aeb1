//! Recovery strategies, ordered by priority
//!
//! Each strategy is one attempt at coercing a malformed payload into a
//! value the schema validator will accept. Strategies are registered once
//! at orchestrator construction, sorted by priority, and tried in order:
//! text cleanup first, kind-specific structural patches second, fallback
//! synthesis last.

use once_cell::sync::Lazy;
use regex::Regex;
use scoreguard_core::config::RecoveryConfig;
use scoreguard_core::error::Result;
use scoreguard_core::types::{RecordKind, RequestContext};
use serde_json::{json, Value as JsonValue};

/// Marker embedded in every synthesized placeholder so downstream
/// consumers can always tell a fallback from a genuine result
pub const RECOVERY_FALLBACK_MARKER: &str = "recovery fallback";

/// Why a payload entered recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The raw text did not parse as JSON
    MalformedJson,
    /// The text parsed but failed the schema
    SchemaViolation,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::MalformedJson => f.write_str("malformed_json"),
            FailureKind::SchemaViolation => f.write_str("schema_violation"),
        }
    }
}

/// Everything a strategy may consult about the failed request
#[derive(Debug, Clone)]
pub struct RecoveryFailure {
    /// Record kind the payload was supposed to match
    pub kind: RecordKind,
    /// How the payload failed
    pub failure: FailureKind,
    /// The raw text as received, untouched
    pub raw_text: String,
    /// The parsed value, when the text parsed but failed the schema
    pub parsed: Option<JsonValue>,
    /// Violations from the failed validation, when any
    pub violations: Vec<String>,
    /// Caller-supplied context, used for synthesis hints
    pub context: RequestContext,
}

/// One ordered attempt at producing an acceptable value
///
/// `attempt` returns `Ok(None)` when the strategy has nothing to offer
/// for this failure; the orchestrator validates any candidate it does
/// return and moves on if validation still rejects it.
pub trait RecoveryStrategy: Send + Sync {
    /// Stable strategy name, recorded on the session
    fn name(&self) -> &'static str;

    /// Priority; lower runs earlier
    fn priority(&self) -> u8;

    /// Whether this strategy applies to the failure at all
    fn can_handle(&self, failure: &RecoveryFailure) -> bool;

    /// Produce a candidate value, or nothing
    ///
    /// # Errors
    ///
    /// Returns an error when the strategy's own production fails; the
    /// orchestrator records it and escalates.
    fn attempt(&self, failure: &RecoveryFailure) -> Result<Option<JsonValue>>;
}

/// The built-in strategy set, sorted by priority
#[must_use]
pub fn default_strategies(config: &RecoveryConfig) -> Vec<Box<dyn RecoveryStrategy>> {
    let mut strategies: Vec<Box<dyn RecoveryStrategy>> = vec![
        Box::new(DirectRetryStrategy),
        Box::new(SchemaCorrectionStrategy),
        Box::new(FallbackSynthesisStrategy::new(config.clone())),
    ];
    strategies.sort_by_key(|s| s.priority());
    strategies
}

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:[jJ][sS][oO][nN])?\s*(.*?)\s*```")
        .expect("code fence pattern is valid")
});

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern is valid"));

/// Strip common LLM formatting noise from raw model output
///
/// Removes code-fence wrappers, trailing commas before closing brackets,
/// and irregular leading/trailing whitespace. Does not attempt structural
/// repair; that is the next strategy's job.
#[must_use]
pub fn cleanup_raw_text(raw: &str) -> String {
    let unfenced = match CODE_FENCE.captures(raw) {
        Some(captures) => captures
            .get(1)
            .map_or_else(|| raw.to_string(), |m| m.as_str().to_string()),
        None => raw.to_string(),
    };
    let without_commas = TRAILING_COMMA.replace_all(&unfenced, "$1");
    without_commas.trim().to_string()
}

/// Parse the failure's text after cleanup, falling back to the already
/// parsed value when present
fn best_parsed_value(failure: &RecoveryFailure) -> Option<JsonValue> {
    if let Some(parsed) = &failure.parsed {
        return Some(parsed.clone());
    }
    serde_json::from_str(&cleanup_raw_text(&failure.raw_text)).ok()
}

/// Strategy 1: strip formatting noise and re-parse
pub struct DirectRetryStrategy;

impl RecoveryStrategy for DirectRetryStrategy {
    fn name(&self) -> &'static str {
        "direct_retry"
    }

    fn priority(&self) -> u8 {
        1
    }

    fn can_handle(&self, _failure: &RecoveryFailure) -> bool {
        true
    }

    fn attempt(&self, failure: &RecoveryFailure) -> Result<Option<JsonValue>> {
        let cleaned = cleanup_raw_text(&failure.raw_text);
        Ok(serde_json::from_str(&cleaned).ok())
    }
}

/// Strategy 2: kind-specific structural patches
pub struct SchemaCorrectionStrategy;

impl SchemaCorrectionStrategy {
    fn patch_single(value: &JsonValue) -> Option<JsonValue> {
        let object = value.as_object()?;
        // Only worth patching when the model at least judged correctness
        if !object.contains_key("isCorrect") {
            return None;
        }

        let mut patched = object.clone();
        patched
            .entry("questionNumber")
            .or_insert_with(|| json!(1));
        patched.entry("pointsEarned").or_insert_with(|| json!(0.0));
        patched.entry("confidence").or_insert_with(|| json!(0.5));
        Some(JsonValue::Object(patched))
    }

    fn patch_batch(value: &JsonValue) -> Option<JsonValue> {
        // A bare array is the items list missing its envelope; anything
        // else has no structural patch at this level
        match value {
            JsonValue::Array(_) => Some(json!({ "items": value })),
            _ => None,
        }
    }

    fn patch_analysis(value: &JsonValue) -> Option<JsonValue> {
        let object = value.as_object()?;
        let mut patched = object.clone();
        patched.entry("overallScore").or_insert_with(|| json!(0.0));
        patched.entry("letterGrade").or_insert_with(|| json!("F"));
        Some(JsonValue::Object(patched))
    }
}

impl RecoveryStrategy for SchemaCorrectionStrategy {
    fn name(&self) -> &'static str {
        "schema_correction"
    }

    fn priority(&self) -> u8 {
        2
    }

    fn can_handle(&self, failure: &RecoveryFailure) -> bool {
        failure.parsed.is_some()
            || serde_json::from_str::<JsonValue>(&cleanup_raw_text(&failure.raw_text)).is_ok()
    }

    fn attempt(&self, failure: &RecoveryFailure) -> Result<Option<JsonValue>> {
        let Some(value) = best_parsed_value(failure) else {
            return Ok(None);
        };

        let patched = match failure.kind {
            RecordKind::Single => Self::patch_single(&value),
            RecordKind::Batch => Self::patch_batch(&value),
            RecordKind::Analysis => Self::patch_analysis(&value),
        };
        Ok(patched)
    }
}

/// Strategy 3: synthesize an explicitly flagged placeholder
pub struct FallbackSynthesisStrategy {
    config: RecoveryConfig,
}

impl FallbackSynthesisStrategy {
    /// Create the strategy with its synthesis tunables
    #[must_use]
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    fn placeholder_item(question_number: usize) -> JsonValue {
        json!({
            "questionNumber": question_number,
            "isCorrect": false,
            "pointsEarned": 0.0,
            "confidence": 0.0,
            "reasoning": format!(
                "{RECOVERY_FALLBACK_MARKER}: original response could not be validated"
            )
        })
    }

    /// Question count inferred from context: explicit count, then file
    /// count times the per-file figure, then the configured default
    fn inferred_question_count(&self, context: &RequestContext) -> usize {
        context
            .question_count
            .or_else(|| {
                context
                    .file_count
                    .map(|files| files * self.config.questions_per_file)
            })
            .unwrap_or(self.config.default_question_count)
    }
}

impl RecoveryStrategy for FallbackSynthesisStrategy {
    fn name(&self) -> &'static str {
        "fallback_synthesis"
    }

    fn priority(&self) -> u8 {
        3
    }

    fn can_handle(&self, _failure: &RecoveryFailure) -> bool {
        true
    }

    fn attempt(&self, failure: &RecoveryFailure) -> Result<Option<JsonValue>> {
        let value = match failure.kind {
            RecordKind::Single => Self::placeholder_item(1),
            RecordKind::Batch => {
                let count = self.inferred_question_count(&failure.context);
                let items: Vec<JsonValue> =
                    (1..=count).map(Self::placeholder_item).collect();
                json!({ "items": items })
            }
            RecordKind::Analysis => json!({
                "overallScore": 0.0,
                "letterGrade": "F",
                "earned": 0.0,
                "possible": 0.0,
                "feedback": format!(
                    "{RECOVERY_FALLBACK_MARKER}: the model response could not be \
                     validated or repaired; this placeholder carries no real scores"
                )
            }),
        };
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failure(kind: RecordKind, raw: &str) -> RecoveryFailure {
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
    fn test_cleanup_strips_code_fences() {
        let cleaned = cleanup_raw_text("```json\n{\"isCorrect\":true}\n```");
        assert_eq!(cleaned, "{\"isCorrect\":true}");

        let cleaned = cleanup_raw_text("```\n{\"a\":1}\n```");
        assert_eq!(cleaned, "{\"a\":1}");
    }

    #[test]
    fn test_cleanup_strips_trailing_commas() {
        let cleaned = cleanup_raw_text("{\"a\": 1, \"b\": [1, 2,],}");
        assert_eq!(cleaned, "{\"a\": 1, \"b\": [1, 2]}");
    }

    #[test]
    fn test_direct_retry_parses_fenced_json() -> anyhow::Result<()> {
        let strategy = DirectRetryStrategy;
        let candidate = strategy.attempt(&failure(
            RecordKind::Single,
            "```json\n{\"questionNumber\":1,\"isCorrect\":true,\"pointsEarned\":1,\"confidence\":0.9}\n```",
        ))?;
        assert!(candidate.is_some());
        Ok(())
    }

    #[test]
    fn test_schema_correction_injects_single_defaults() -> anyhow::Result<()> {
        let strategy = SchemaCorrectionStrategy;
        let candidate = strategy
            .attempt(&failure(RecordKind::Single, "{\"isCorrect\":true}"))?
            .expect("should produce a patched value");

        assert_eq!(candidate["pointsEarned"], 0.0);
        assert_eq!(candidate["confidence"], 0.5);
        assert_eq!(candidate["questionNumber"], 1);
        assert_eq!(candidate["isCorrect"], true);
        Ok(())
    }

    #[test]
    fn test_schema_correction_skips_single_without_correct_flag() -> anyhow::Result<()> {
        let strategy = SchemaCorrectionStrategy;
        let candidate = strategy.attempt(&failure(RecordKind::Single, "{\"notes\":\"hi\"}"))?;
        assert!(candidate.is_none());
        Ok(())
    }

    #[test]
    fn test_schema_correction_wraps_bare_array() -> anyhow::Result<()> {
        let strategy = SchemaCorrectionStrategy;
        let candidate = strategy
            .attempt(&failure(
                RecordKind::Batch,
                "[{\"questionNumber\":1,\"isCorrect\":true,\"pointsEarned\":1,\"confidence\":0.9}]",
            ))?
            .expect("should wrap the array");
        assert!(candidate["items"].is_array());
        Ok(())
    }

    #[test]
    fn test_fallback_batch_size_inference() {
        let strategy = FallbackSynthesisStrategy::new(RecoveryConfig::default());

        let mut context = RequestContext::default();
        assert_eq!(strategy.inferred_question_count(&context), 10);

        context.file_count = Some(3);
        assert_eq!(strategy.inferred_question_count(&context), 15);

        context.question_count = Some(7);
        assert_eq!(strategy.inferred_question_count(&context), 7);
    }

    #[test]
    fn test_fallback_values_carry_the_marker() -> anyhow::Result<()> {
        let strategy = FallbackSynthesisStrategy::new(RecoveryConfig::default());

        let single = strategy
            .attempt(&failure(RecordKind::Single, "garbage"))?
            .expect("fallback always produces a value");
        let reasoning = single["reasoning"].as_str().expect("reasoning is set");
        assert!(reasoning.contains(RECOVERY_FALLBACK_MARKER));

        let analysis = strategy
            .attempt(&failure(RecordKind::Analysis, "garbage"))?
            .expect("fallback always produces a value");
        let feedback = analysis["feedback"].as_str().expect("feedback is set");
        assert!(feedback.contains(RECOVERY_FALLBACK_MARKER));
        assert_eq!(analysis["letterGrade"], "F");
        Ok(())
    }

    #[test]
    fn test_strategies_sorted_by_priority() {
        let strategies = default_strategies(&RecoveryConfig::default());
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["direct_retry", "schema_correction", "fallback_synthesis"]
        );
    }
}
