//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use awareness_core::gate::GateError;
use awareness_core::grading::GradeError;
use awareness_core::lifecycle::LifecycleError;
use awareness_core::model::{
    AttemptError, LearnerError, LearnerId, ModuleError, ModuleId, PasswordPolicyError,
    QuestionError, QuestionId, SimulationError, SimulationKind, SurveyError,
};
use awareness_core::policy::PolicyError;
use awareness_core::selection::SelectionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `QuestionBank`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BankError {
    #[error("module {0} has no questions configured")]
    NoQuestions(ModuleId),
    #[error("module {module} has no question set {set_number}")]
    SetNotFound { module: ModuleId, set_number: u32 },
    #[error("the final assessment pool is empty")]
    EmptyFinalPool,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the gating, progress and assessment services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("submission is missing answers for {} question(s)", missing.len())]
    IncompleteSubmission { missing: Vec<QuestionId> },

    #[error("access denied until module {blocking_module} is completed")]
    AccessDenied { blocking_module: ModuleId },

    #[error("final assessment attempts exhausted ({used} of {max})")]
    AttemptLimitExceeded { used: u32, max: u32 },

    #[error("progress was reset while the submission was in flight")]
    ProgressReset,

    #[error("inconsistent progress state: {0}")]
    Consistency(String),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<BankError> for AssessmentError {
    fn from(err: BankError) -> Self {
        match err {
            BankError::Storage(e) => AssessmentError::Storage(e),
            other => AssessmentError::NotFound(other.to_string()),
        }
    }
}

impl From<GradeError> for AssessmentError {
    fn from(err: GradeError) -> Self {
        match err {
            GradeError::IncompleteSubmission { missing } => {
                AssessmentError::IncompleteSubmission { missing }
            }
            other => AssessmentError::Consistency(other.to_string()),
        }
    }
}

impl From<GateError> for AssessmentError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::UnknownModule(module) => AssessmentError::NotFound(format!("module {module}")),
            other => AssessmentError::Consistency(other.to_string()),
        }
    }
}

impl From<LifecycleError> for AssessmentError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::AttemptLimitExceeded { used, max } => {
                AssessmentError::AttemptLimitExceeded { used, max }
            }
            other => AssessmentError::Consistency(other.to_string()),
        }
    }
}

impl From<ModuleError> for AssessmentError {
    fn from(err: ModuleError) -> Self {
        AssessmentError::Consistency(format!("stored course is invalid: {err}"))
    }
}

/// Errors emitted by `SurveyService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SurveyServiceError {
    #[error("learner {0} not found")]
    UnknownLearner(LearnerId),
    #[error("the survey opens after passing the final assessment")]
    NotEligible,
    #[error("survey already submitted")]
    AlreadySubmitted,
    #[error(transparent)]
    Survey(#[from] SurveyError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SimulationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimulationServiceError {
    #[error("learner {0} not found")]
    UnknownLearner(LearnerId),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LearnerService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LearnerServiceError {
    #[error("username or email already registered")]
    AlreadyRegistered,
    #[error(transparent)]
    WeakPassword(#[from] PasswordPolicyError),
    #[error(transparent)]
    Learner(#[from] LearnerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while loading or seeding the course catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("module {module}: set {set_number} is outside 1-9 or holds more than 99 questions")]
    SetOutOfRange { module: ModuleId, set_number: u32 },
    #[error("module {module}: question {position} must have exactly four options")]
    OptionCount { module: ModuleId, position: usize },
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error("module {module}: simulation {kind} belongs to module {expected}")]
    SimulationMismatch {
        module: ModuleId,
        kind: SimulationKind,
        expected: ModuleId,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while loading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_onto_assessment_errors() {
        let missing = vec![QuestionId::new(3)];
        let err = AssessmentError::from(GradeError::IncompleteSubmission {
            missing: missing.clone(),
        });
        assert!(matches!(err, AssessmentError::IncompleteSubmission { missing: m } if m == missing));

        let err = AssessmentError::from(GateError::UnknownModule(ModuleId::new(9)));
        assert!(matches!(err, AssessmentError::NotFound(what) if what == "module 9"));

        let err = AssessmentError::from(LifecycleError::AttemptLimitExceeded { used: 3, max: 3 });
        assert!(matches!(
            err,
            AssessmentError::AttemptLimitExceeded { used: 3, max: 3 }
        ));
    }

    #[test]
    fn bank_errors_other_than_storage_read_as_not_found() {
        let err = AssessmentError::from(BankError::NoQuestions(ModuleId::new(4)));
        assert!(matches!(err, AssessmentError::NotFound(_)));
        let err = AssessmentError::from(BankError::Storage(StorageError::Conflict));
        assert!(matches!(err, AssessmentError::Storage(StorageError::Conflict)));
    }
}
