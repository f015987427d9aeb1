//! Error types for scoreguard operations

use thiserror::Error;

/// Main error type for scoreguard operations
#[derive(Error, Debug)]
pub enum ScoreGuardError {
    /// Raw text does not parse as JSON
    #[error("Malformed JSON: {message}")]
    MalformedJson {
        /// Error message from the parser
        message: String,
        /// Byte offset in the input if available
        offset: Option<usize>,
    },

    /// Parsed value fails the schema for its record kind
    #[error("Schema violation: {}", violations.join("; "))]
    SchemaViolation {
        /// Field-level violation messages
        violations: Vec<String>,
    },

    /// All recovery strategies failed to produce an acceptable value
    #[error("Recovery exhausted after {attempts} attempts")]
    RecoveryExhausted {
        /// Number of recovery attempts made
        attempts: u32,
        /// Violations accumulated across every attempt
        violations: Vec<String>,
    },

    /// Invalid tunable, e.g. non-positive concurrency
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Collaborator integration errors
    #[error("Service error: {0}")]
    Service(String),
}

/// Result type alias for scoreguard operations
pub type Result<T> = std::result::Result<T, ScoreGuardError>;

impl ScoreGuardError {
    /// Create a malformed-JSON error
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJson {
            message: message.into(),
            offset: None,
        }
    }

    /// Create a malformed-JSON error with a byte offset
    #[must_use]
    pub fn malformed_at(message: impl Into<String>, offset: usize) -> Self {
        Self::MalformedJson {
            message: message.into(),
            offset: Some(offset),
        }
    }

    /// Create a schema-violation error
    #[must_use]
    pub fn schema_violation(violations: Vec<String>) -> Self {
        Self::SchemaViolation { violations }
    }

    /// Create a recovery-exhausted error
    #[must_use]
    pub fn recovery_exhausted(attempts: u32, violations: Vec<String>) -> Self {
        Self::RecoveryExhausted {
            attempts,
            violations,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a service error
    #[must_use]
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }

    /// Whether this error is recoverable by strategy escalation
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedJson { .. } | Self::SchemaViolation { .. }
        )
    }

    /// Violations carried by this error, if any
    #[must_use]
    pub fn violations(&self) -> &[String] {
        match self {
            Self::SchemaViolation { violations } | Self::RecoveryExhausted { violations, .. } => {
                violations
            }
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for ScoreGuardError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: err.to_string(),
            offset: None,
        }
    }
}
