//! Commonly used imports for working with scoreguard

pub use crate::config::{
    BatchConfig, CacheConfig, PerformanceConfig, RecoveryConfig, ScoreGuardConfig,
};
pub use crate::error::{Result, ScoreGuardError};
pub use crate::types::{
    AnalysisRecord, BatchRecord, LetterGrade, RecordKind, RecordPayload, RequestContext,
    ScoredItem, SkillBreakdown, ValidationOutcome,
};
