use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use awareness_core::lifecycle::FinalOutcome;
use awareness_core::model::{
    AssessmentAttempt, AssessmentTarget, AttemptId, FeedbackSurvey, Learner, LearnerId,
    LearnerProfile, Module, ModuleId, ModuleProgress, QuestionSet, SimulationResult,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── COMMIT SHAPES ─────────────────────────────────────────────────────────────
//

/// Everything one graded knowledge check writes.
#[derive(Debug, Clone)]
pub struct KnowledgeCheckCommit {
    /// Unsaved attempt, stamped with the cycle the caller read.
    pub attempt: AssessmentAttempt,
    /// Progress row after the grade was applied.
    pub progress: ModuleProgress,
    /// Percentage to add to the learner totals when this grade completed the
    /// module for the first time in the cycle.
    pub first_completion_score: Option<u8>,
}

/// What a committed final attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalAttemptCommit {
    pub attempt_id: AttemptId,
    pub outcome: FinalOutcome,
    /// Cycle the learner moved into when the attempt triggered a reset.
    pub new_cycle: Option<u32>,
}

//
// ─── REPOSITORIES ──────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait LearnerRepository: Send + Sync {
    /// Registers a learner in cycle 1 and returns it with its new id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the username or email is taken.
    async fn create_learner(
        &self,
        profile: &LearnerProfile,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Learner, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the learner does not exist.
    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_username(&self, username: &str) -> Result<Option<Learner>, StorageError>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist or update a module.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the module cannot be stored.
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// All modules ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_modules(&self) -> Result<Vec<Module>, StorageError>;
}

#[async_trait]
pub trait QuestionBankRepository: Send + Sync {
    /// Stores a question set, replacing any set with the same number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the module does not exist, or
    /// `StorageError::Conflict` if a question id belongs to another set.
    async fn upsert_question_set(&self, set: &QuestionSet) -> Result<(), StorageError>;

    /// Sets of a module ordered by set number. Empty when none are configured.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn question_sets(&self, module: ModuleId) -> Result<Vec<QuestionSet>, StorageError>;
}

#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Attempt history of a learner across every cycle, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn attempts_for_learner(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<AssessmentAttempt>, StorageError>;

    /// Number of attempts against `target` within `cycle`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_attempts(
        &self,
        learner: LearnerId,
        target: AssessmentTarget,
        cycle: u32,
    ) -> Result<u32, StorageError>;

    /// Whether a passing attempt against `target` exists. `None` searches
    /// every cycle.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn has_passing_attempt(
        &self,
        learner: LearnerId,
        target: AssessmentTarget,
        cycle: Option<u32>,
    ) -> Result<bool, StorageError>;

    /// Modules with a passing knowledge check within `cycle`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn passed_modules(
        &self,
        learner: LearnerId,
        cycle: u32,
    ) -> Result<BTreeSet<ModuleId>, StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_progress(
        &self,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<Option<ModuleProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_progress(&self, learner: LearnerId) -> Result<Vec<ModuleProgress>, StorageError>;

    /// Persists a visit or time-spent update.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(&self, progress: &ModuleProgress) -> Result<(), StorageError>;
}

/// Transactional write paths of graded submissions.
#[async_trait]
pub trait AssessmentPersistence: Send + Sync {
    /// Appends the attempt, stores the progress row and bumps the learner
    /// totals atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the learner moved to another cycle
    /// since the attempt was stamped. Nothing is written in that case.
    async fn commit_knowledge_check(
        &self,
        commit: KnowledgeCheckCommit,
    ) -> Result<AttemptId, StorageError>;

    /// Counts the cycle's final attempts, appends this one and performs the
    /// reset when the cap is reached without a pass, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the cycle changed since the attempt
    /// was stamped or the cycle already used every attempt. Nothing is
    /// written in that case.
    async fn commit_final_attempt(
        &self,
        attempt: AssessmentAttempt,
        max_attempts: u32,
    ) -> Result<FinalAttemptCommit, StorageError>;
}

#[async_trait]
pub trait SurveyRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the learner already submitted one.
    async fn insert_survey(&self, survey: &FeedbackSurvey) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_survey(&self, learner: LearnerId) -> Result<Option<FeedbackSurvey>, StorageError>;
}

#[async_trait]
pub trait SimulationRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn record_simulation(&self, result: &SimulationResult) -> Result<i64, StorageError>;

    /// Results of a learner, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn simulations_for(&self, learner: LearnerId)
    -> Result<Vec<SimulationResult>, StorageError>;
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub learners: Arc<dyn LearnerRepository>,
    pub course: Arc<dyn CourseRepository>,
    pub questions: Arc<dyn QuestionBankRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub assessments: Arc<dyn AssessmentPersistence>,
    pub surveys: Arc<dyn SurveyRepository>,
    pub simulations: Arc<dyn SimulationRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wires every trait object to clones of one backend.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: LearnerRepository
            + CourseRepository
            + QuestionBankRepository
            + AttemptRepository
            + ProgressRepository
            + AssessmentPersistence
            + SurveyRepository
            + SimulationRepository
            + Clone
            + 'static,
    {
        Self {
            learners: Arc::new(repo.clone()),
            course: Arc::new(repo.clone()),
            questions: Arc::new(repo.clone()),
            attempts: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            assessments: Arc::new(repo.clone()),
            surveys: Arc::new(repo.clone()),
            simulations: Arc::new(repo),
        }
    }
}
