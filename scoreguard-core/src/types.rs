//! Record types and validation outcomes for scoreguard
//!
//! These are the three fixed JSON shapes the core understands, as emitted
//! by an LLM scoring call: a single scored item, a batch of scored items,
//! and an aggregate analysis record. Wire format is camelCase JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the three fixed record shapes a payload is expected to match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A single scored item
    Single,
    /// A batch of scored items
    Batch,
    /// An aggregate analysis record
    Analysis,
}

impl RecordKind {
    /// All record kinds, in a stable order
    pub const ALL: [RecordKind; 3] = [RecordKind::Single, RecordKind::Batch, RecordKind::Analysis];

    /// Stable name used in cache keys and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Single => "single",
            RecordKind::Batch => "batch",
            RecordKind::Analysis => "analysis",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letter grade for an analysis record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    /// 90-100
    A,
    /// 80-89
    B,
    /// 70-79
    C,
    /// 60-69
    D,
    /// Below 60
    F,
}

impl LetterGrade {
    /// Permitted wire values, for violation messages
    pub const PERMITTED: [&'static str; 5] = ["A", "B", "C", "D", "F"];
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        };
        f.write_str(s)
    }
}

/// One scored question, the atomic unit of the single-record schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScoredItem {
    /// Question ordinal, 1-based
    pub question_number: u32,
    /// Whether the answer was judged correct
    pub is_correct: bool,
    /// Points awarded, non-negative
    pub points_earned: f64,
    /// Model confidence in [0, 1]
    pub confidence: f64,
    /// Free-text rationale for the score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Skill tags associated with the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_tags: Option<Vec<String>>,
}

/// A batch of scored items with optional run metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BatchRecord {
    /// Scored items, at least one
    pub items: Vec<ScoredItem>,
    /// Caller-assigned batch identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Wall-clock duration of the upstream call, non-negative
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<f64>,
    /// Model that produced the batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

/// Per-skill score breakdown inside an analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SkillBreakdown {
    /// Skill name
    pub name: String,
    /// Skill score in [0, 100]
    pub score: f64,
    /// Points earned for this skill, non-negative
    pub earned: f64,
    /// Points possible for this skill, non-negative
    pub possible: f64,
}

/// Aggregate analysis of a scored submission
///
/// The schema deliberately does not enforce `earned <= possible`: that is
/// a business-rule consistency check left to the downstream scoring layer.
/// Structural validation only bounds each field independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AnalysisRecord {
    /// Overall score in [0, 100]
    pub overall_score: f64,
    /// Letter grade
    pub letter_grade: LetterGrade,
    /// Total points earned, non-negative
    pub earned: f64,
    /// Total points possible, non-negative
    pub possible: f64,
    /// Free-text feedback for the submitter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// Per-skill breakdowns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_breakdowns: Option<Vec<SkillBreakdown>>,
}

/// Caller-supplied context for one validation request
///
/// Identification fields tag metrics entries and never influence
/// validation. The question-count hints steer fallback synthesis when a
/// batch payload has to be manufactured from nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    /// Caller session identifier, for metrics tagging
    pub session_id: Option<String>,
    /// Model that produced the payload, for metrics tagging
    pub model_id: Option<String>,
    /// Sampling temperature of the upstream call, for metrics tagging
    pub temperature: Option<f64>,
    /// Expected batch size, used for performance sampling
    pub batch_size_hint: Option<usize>,
    /// Explicit number of questions in the submission
    pub question_count: Option<usize>,
    /// Number of submitted files, when the question count is unknown
    pub file_count: Option<usize>,
}

/// A validated payload, typed by its record kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordPayload {
    /// A single scored item
    Single(ScoredItem),
    /// A batch of scored items
    Batch(BatchRecord),
    /// An aggregate analysis record
    Analysis(AnalysisRecord),
}

impl RecordPayload {
    /// Deserialize a JSON value into the typed payload for `kind`
    ///
    /// # Errors
    ///
    /// Returns the underlying serde error when the value does not match
    /// the record shape. Callers that have already run the instruction
    /// pass will not see this fail.
    pub fn from_value(
        kind: RecordKind,
        value: serde_json::Value,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(match kind {
            RecordKind::Single => RecordPayload::Single(serde_json::from_value(value)?),
            RecordKind::Batch => RecordPayload::Batch(serde_json::from_value(value)?),
            RecordKind::Analysis => RecordPayload::Analysis(serde_json::from_value(value)?),
        })
    }

    /// The record kind this payload belongs to
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::Single(_) => RecordKind::Single,
            RecordPayload::Batch(_) => RecordKind::Batch,
            RecordPayload::Analysis(_) => RecordKind::Analysis,
        }
    }
}

/// Outcome of one validation call, never mutated after creation
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    /// Whether the value conforms to the schema for its kind
    pub accepted: bool,
    /// The typed payload, present when accepted
    pub value: Option<RecordPayload>,
    /// Field-level violation messages with JSON paths, all of them
    pub violations: Vec<String>,
}

impl ValidationOutcome {
    /// Build an accepted outcome
    #[must_use]
    pub fn accepted(value: RecordPayload) -> Self {
        Self {
            accepted: true,
            value: Some(value),
            violations: Vec::new(),
        }
    }

    /// Build a rejected outcome carrying every violation found
    #[must_use]
    pub fn rejected(violations: Vec<String>) -> Self {
        Self {
            accepted: false,
            value: None,
            violations,
        }
    }

    /// One-line summary of the outcome
    #[must_use]
    pub fn summary(&self) -> String {
        if self.accepted {
            "Validation passed".to_string()
        } else {
            format!("Validation failed with {} violations", self.violations.len())
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for violation in &self.violations {
            writeln!(f, "  {violation}")?;
        }
        Ok(())
    }
}
