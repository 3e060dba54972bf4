use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::grading::GradeResult;
use crate::model::ids::{AttemptId, LearnerId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("unknown assessment type: {0}")]
    UnknownKind(String),

    #[error("knowledge check attempts must reference a module")]
    MissingModule,

    #[error("final assessment attempts cannot reference a module")]
    UnexpectedModule,

    #[error("attempt must contain at least one question")]
    NoQuestions,

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("percentage {0} is outside 0..=100")]
    InvalidPercentage(u8),

    #[error("progress cycle must be >= 1")]
    InvalidCycle,
}

//
// ─── KIND / TARGET ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    KnowledgeCheck,
    FinalAssessment,
}

impl AssessmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AssessmentKind::KnowledgeCheck => "knowledge_check",
            AssessmentKind::FinalAssessment => "final_assessment",
        }
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssessmentKind {
    type Err = AttemptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "knowledge_check" => Ok(AssessmentKind::KnowledgeCheck),
            "final_assessment" => Ok(AssessmentKind::FinalAssessment),
            other => Err(AttemptError::UnknownKind(other.to_owned())),
        }
    }
}

/// What an attempt was submitted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssessmentTarget {
    KnowledgeCheck(ModuleId),
    Final,
}

impl AssessmentTarget {
    /// Rebuilds a target from its stored (kind, module) pair.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` when the module reference does not fit the kind.
    pub fn from_parts(
        kind: AssessmentKind,
        module_id: Option<ModuleId>,
    ) -> Result<Self, AttemptError> {
        match (kind, module_id) {
            (AssessmentKind::KnowledgeCheck, Some(module)) => Ok(Self::KnowledgeCheck(module)),
            (AssessmentKind::KnowledgeCheck, None) => Err(AttemptError::MissingModule),
            (AssessmentKind::FinalAssessment, None) => Ok(Self::Final),
            (AssessmentKind::FinalAssessment, Some(_)) => Err(AttemptError::UnexpectedModule),
        }
    }

    #[must_use]
    pub fn kind(self) -> AssessmentKind {
        match self {
            AssessmentTarget::KnowledgeCheck(_) => AssessmentKind::KnowledgeCheck,
            AssessmentTarget::Final => AssessmentKind::FinalAssessment,
        }
    }

    #[must_use]
    pub fn module_id(self) -> Option<ModuleId> {
        match self {
            AssessmentTarget::KnowledgeCheck(module) => Some(module),
            AssessmentTarget::Final => None,
        }
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// Immutable record of one assessment submission.
///
/// Attempt history is the only authority on whether a learner passed an
/// assessment. Records are append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssessmentAttempt {
    id: Option<AttemptId>,
    learner_id: LearnerId,
    target: AssessmentTarget,
    total_questions: u32,
    correct_count: u32,
    percentage: u8,
    passed: bool,
    time_taken_secs: u32,
    cycle: u32,
    submitted_at: DateTime<Utc>,
}

impl AssessmentAttempt {
    /// Builds an unsaved attempt from a grading result.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidCycle` if `cycle` is zero, or count errors
    /// for an inconsistent grade.
    pub fn from_grade(
        learner_id: LearnerId,
        target: AssessmentTarget,
        grade: &GradeResult,
        time_taken_secs: u32,
        cycle: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        Self::from_persisted(
            None,
            learner_id,
            target,
            grade.total_count,
            grade.correct_count,
            grade.percentage,
            grade.passed,
            time_taken_secs,
            cycle,
            submitted_at,
        )
    }

    /// Rehydrates an attempt from storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError` if counts, percentage or cycle are out of range.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: Option<AttemptId>,
        learner_id: LearnerId,
        target: AssessmentTarget,
        total_questions: u32,
        correct_count: u32,
        percentage: u8,
        passed: bool,
        time_taken_secs: u32,
        cycle: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if total_questions == 0 {
            return Err(AttemptError::NoQuestions);
        }
        if correct_count > total_questions {
            return Err(AttemptError::CorrectExceedsTotal {
                correct: correct_count,
                total: total_questions,
            });
        }
        if percentage > 100 {
            return Err(AttemptError::InvalidPercentage(percentage));
        }
        if cycle == 0 {
            return Err(AttemptError::InvalidCycle);
        }
        Ok(Self {
            id,
            learner_id,
            target,
            total_questions,
            correct_count,
            percentage,
            passed,
            time_taken_secs,
            cycle,
            submitted_at,
        })
    }

    /// Returns the same attempt with its storage id filled in.
    #[must_use]
    pub fn with_id(mut self, id: AttemptId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn id(&self) -> Option<AttemptId> {
        self.id
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn target(&self) -> AssessmentTarget {
        self.target
    }

    #[must_use]
    pub fn kind(&self) -> AssessmentKind {
        self.target.kind()
    }

    #[must_use]
    pub fn module_id(&self) -> Option<ModuleId> {
        self.target.module_id()
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.passed
    }

    #[must_use]
    pub fn time_taken_secs(&self) -> u32 {
        self.time_taken_secs
    }

    #[must_use]
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// True for a passing knowledge check of `module`.
    #[must_use]
    pub fn is_passing_knowledge_check(&self, module: ModuleId) -> bool {
        self.passed && self.target == AssessmentTarget::KnowledgeCheck(module)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
