//! Compiled validators for the three record shapes
//!
//! Each record kind compiles once into a flat list of validation
//! instructions. Executing the list against a JSON value collects every
//! violation found, with JSON-path locations, so recovery heuristics can
//! target specific defects.

use scoreguard_core::types::{LetterGrade, RecordKind};
use serde_json::Value as JsonValue;
use std::fmt::Write as _;

/// Expected JSON type for a field check
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ExpectedType {
    /// Any JSON string
    String,
    /// Any JSON number
    Number,
    /// An integer >= 1
    PositiveInteger,
    /// A JSON boolean
    Boolean,
    /// An array of strings
    StringArray,
}

impl ExpectedType {
    fn describe(self) -> &'static str {
        match self {
            ExpectedType::String => "string",
            ExpectedType::Number => "number",
            ExpectedType::PositiveInteger => "positive integer",
            ExpectedType::Boolean => "boolean",
            ExpectedType::StringArray => "array of strings",
        }
    }
}

/// Compiled validation instruction
///
/// Field checks other than `CheckRequired` apply only when the field is
/// present; a missing required field is reported exactly once.
#[derive(Debug, Clone, serde::Serialize)]
pub enum ValidationInstruction {
    /// The field must be present
    CheckRequired {
        /// Field name to check
        field: String,
    },

    /// The field, when present, must have the expected type
    CheckType {
        /// Field name to check
        field: String,
        /// Expected type
        expected: ExpectedType,
    },

    /// The field, when present and numeric, must fall in the inclusive range
    CheckRange {
        /// Field name to check
        field: String,
        /// Inclusive minimum
        min: Option<f64>,
        /// Inclusive maximum
        max: Option<f64>,
    },

    /// The field, when present, must be one of the permitted strings
    CheckEnum {
        /// Field name to check
        field: String,
        /// Permitted wire values
        permitted: Vec<&'static str>,
    },

    /// The field, when present, must be a non-empty array
    CheckNonEmptyArray {
        /// Field name to check
        field: String,
    },

    /// Every key of the object must be in the declared set
    CheckNoExtraKeys {
        /// Declared field names
        allowed: Vec<&'static str>,
    },

    /// Apply nested instructions to each element of an array field
    CheckEach {
        /// Array field name
        field: String,
        /// Instructions applied to each element
        element_instructions: Vec<ValidationInstruction>,
    },
}

/// Compiled validator for one record kind
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompiledValidator {
    /// Record kind this validator checks
    pub kind: RecordKind,
    /// Flat instruction list executed in order
    pub instructions: Vec<ValidationInstruction>,
}

impl CompiledValidator {
    /// Compile the validator for a record kind
    #[must_use]
    pub fn compile(kind: RecordKind) -> Self {
        let instructions = match kind {
            RecordKind::Single => scored_item_instructions(),
            RecordKind::Batch => batch_record_instructions(),
            RecordKind::Analysis => analysis_record_instructions(),
        };
        Self { kind, instructions }
    }

    /// Execute the instruction list, collecting every violation found
    #[must_use]
    pub fn check(&self, value: &JsonValue) -> Vec<String> {
        let mut violations = Vec::new();
        execute(&self.instructions, value, "$", &mut violations);
        violations
    }
}

fn scored_item_instructions() -> Vec<ValidationInstruction> {
    use ValidationInstruction::{CheckNoExtraKeys, CheckRange, CheckRequired, CheckType};
    vec![
        CheckNoExtraKeys {
            allowed: vec![
                "questionNumber",
                "isCorrect",
                "pointsEarned",
                "confidence",
                "reasoning",
                "skillTags",
            ],
        },
        CheckRequired {
            field: "questionNumber".into(),
        },
        CheckType {
            field: "questionNumber".into(),
            expected: ExpectedType::PositiveInteger,
        },
        CheckRequired {
            field: "isCorrect".into(),
        },
        CheckType {
            field: "isCorrect".into(),
            expected: ExpectedType::Boolean,
        },
        CheckRequired {
            field: "pointsEarned".into(),
        },
        CheckType {
            field: "pointsEarned".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "pointsEarned".into(),
            min: Some(0.0),
            max: None,
        },
        CheckRequired {
            field: "confidence".into(),
        },
        CheckType {
            field: "confidence".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "confidence".into(),
            min: Some(0.0),
            max: Some(1.0),
        },
        CheckType {
            field: "reasoning".into(),
            expected: ExpectedType::String,
        },
        CheckType {
            field: "skillTags".into(),
            expected: ExpectedType::StringArray,
        },
    ]
}

fn batch_record_instructions() -> Vec<ValidationInstruction> {
    use ValidationInstruction::{
        CheckEach, CheckNoExtraKeys, CheckNonEmptyArray, CheckRange, CheckRequired, CheckType,
    };
    vec![
        CheckNoExtraKeys {
            allowed: vec!["items", "batchId", "elapsedMs", "modelId"],
        },
        CheckRequired {
            field: "items".into(),
        },
        CheckNonEmptyArray {
            field: "items".into(),
        },
        CheckEach {
            field: "items".into(),
            element_instructions: scored_item_instructions(),
        },
        CheckType {
            field: "batchId".into(),
            expected: ExpectedType::String,
        },
        CheckType {
            field: "elapsedMs".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "elapsedMs".into(),
            min: Some(0.0),
            max: None,
        },
        CheckType {
            field: "modelId".into(),
            expected: ExpectedType::String,
        },
    ]
}

fn analysis_record_instructions() -> Vec<ValidationInstruction> {
    use ValidationInstruction::{
        CheckEach, CheckEnum, CheckNoExtraKeys, CheckRange, CheckRequired, CheckType,
    };
    vec![
        CheckNoExtraKeys {
            allowed: vec![
                "overallScore",
                "letterGrade",
                "earned",
                "possible",
                "feedback",
                "skillBreakdowns",
            ],
        },
        CheckRequired {
            field: "overallScore".into(),
        },
        CheckType {
            field: "overallScore".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "overallScore".into(),
            min: Some(0.0),
            max: Some(100.0),
        },
        CheckRequired {
            field: "letterGrade".into(),
        },
        CheckEnum {
            field: "letterGrade".into(),
            permitted: LetterGrade::PERMITTED.to_vec(),
        },
        CheckRequired {
            field: "earned".into(),
        },
        CheckType {
            field: "earned".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "earned".into(),
            min: Some(0.0),
            max: None,
        },
        CheckRequired {
            field: "possible".into(),
        },
        CheckType {
            field: "possible".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "possible".into(),
            min: Some(0.0),
            max: None,
        },
        CheckType {
            field: "feedback".into(),
            expected: ExpectedType::String,
        },
        CheckEach {
            field: "skillBreakdowns".into(),
            element_instructions: skill_breakdown_instructions(),
        },
    ]
}

fn skill_breakdown_instructions() -> Vec<ValidationInstruction> {
    use ValidationInstruction::{CheckNoExtraKeys, CheckRange, CheckRequired, CheckType};
    vec![
        CheckNoExtraKeys {
            allowed: vec!["name", "score", "earned", "possible"],
        },
        CheckRequired {
            field: "name".into(),
        },
        CheckType {
            field: "name".into(),
            expected: ExpectedType::String,
        },
        CheckRequired {
            field: "score".into(),
        },
        CheckType {
            field: "score".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "score".into(),
            min: Some(0.0),
            max: Some(100.0),
        },
        CheckRequired {
            field: "earned".into(),
        },
        CheckType {
            field: "earned".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "earned".into(),
            min: Some(0.0),
            max: None,
        },
        CheckRequired {
            field: "possible".into(),
        },
        CheckType {
            field: "possible".into(),
            expected: ExpectedType::Number,
        },
        CheckRange {
            field: "possible".into(),
            min: Some(0.0),
            max: None,
        },
    ]
}

fn execute(
    instructions: &[ValidationInstruction],
    value: &JsonValue,
    path: &str,
    violations: &mut Vec<String>,
) {
    let Some(object) = value.as_object() else {
        violations.push(format!(
            "{path}: expected object, got {}",
            value_type_name(value)
        ));
        return;
    };

    for instruction in instructions {
        match instruction {
            ValidationInstruction::CheckRequired { field } => {
                if !object.contains_key(field.as_str()) {
                    violations.push(format!("{path}.{field}: required field is missing"));
                }
            }
            ValidationInstruction::CheckType { field, expected } => {
                if let Some(found) = object.get(field.as_str()) {
                    check_type(found, *expected, &field_path(path, field), violations);
                }
            }
            ValidationInstruction::CheckRange { field, min, max } => {
                if let Some(found) = object.get(field.as_str()) {
                    if let Some(n) = found.as_f64() {
                        check_range(n, *min, *max, &field_path(path, field), violations);
                    }
                }
            }
            ValidationInstruction::CheckEnum { field, permitted } => {
                if let Some(found) = object.get(field.as_str()) {
                    match found.as_str() {
                        Some(s) if permitted.contains(&s) => {}
                        Some(s) => violations.push(format!(
                            "{}: '{s}' is not one of {}",
                            field_path(path, field),
                            permitted.join(", ")
                        )),
                        None => violations.push(format!(
                            "{}: expected string, got {}",
                            field_path(path, field),
                            value_type_name(found)
                        )),
                    }
                }
            }
            ValidationInstruction::CheckNonEmptyArray { field } => {
                if let Some(found) = object.get(field.as_str()) {
                    match found.as_array() {
                        Some(arr) if arr.is_empty() => violations.push(format!(
                            "{}: array must contain at least one element",
                            field_path(path, field)
                        )),
                        Some(_) => {}
                        None => violations.push(format!(
                            "{}: expected array, got {}",
                            field_path(path, field),
                            value_type_name(found)
                        )),
                    }
                }
            }
            ValidationInstruction::CheckNoExtraKeys { allowed } => {
                for key in object.keys() {
                    if !allowed.contains(&key.as_str()) {
                        violations.push(format!(
                            "{}: unexpected field",
                            field_path(path, key)
                        ));
                    }
                }
            }
            ValidationInstruction::CheckEach {
                field,
                element_instructions,
            } => {
                if let Some(JsonValue::Array(elements)) = object.get(field.as_str()) {
                    for (index, element) in elements.iter().enumerate() {
                        let mut element_path = field_path(path, field);
                        let _ = write!(element_path, "[{index}]");
                        execute(element_instructions, element, &element_path, violations);
                    }
                }
            }
        }
    }
}

fn check_type(value: &JsonValue, expected: ExpectedType, path: &str, violations: &mut Vec<String>) {
    let ok = match expected {
        ExpectedType::String => value.is_string(),
        ExpectedType::Number => value.is_number(),
        ExpectedType::Boolean => value.is_boolean(),
        ExpectedType::PositiveInteger => value.as_u64().is_some_and(|n| n >= 1),
        ExpectedType::StringArray => value
            .as_array()
            .is_some_and(|arr| arr.iter().all(JsonValue::is_string)),
    };
    if !ok {
        violations.push(format!(
            "{path}: expected {}, got {}",
            expected.describe(),
            value_rendering(value)
        ));
    }
}

fn check_range(
    n: f64,
    min: Option<f64>,
    max: Option<f64>,
    path: &str,
    violations: &mut Vec<String>,
) {
    let below = min.is_some_and(|m| n < m);
    let above = max.is_some_and(|m| n > m);
    if below || above {
        let bounds = match (min, max) {
            (Some(lo), Some(hi)) => format!("[{lo}, {hi}]"),
            (Some(lo), None) => format!("[{lo}, ..]"),
            (None, Some(hi)) => format!("[.., {hi}]"),
            (None, None) => String::new(),
        };
        violations.push(format!("{path}: value {n} out of range {bounds}"));
    }
}

fn field_path(path: &str, field: &str) -> String {
    format!("{path}.{field}")
}

fn value_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Render a scalar for a violation message, falling back to the type name
fn value_rendering(value: &JsonValue) -> String {
    match value {
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) if s.len() <= 32 => format!("'{s}'"),
        other => value_type_name(other).to_string(),
    }
}
