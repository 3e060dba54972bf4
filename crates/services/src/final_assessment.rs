use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use awareness_core::grading::GradeResult;
use awareness_core::lifecycle::{FinalOutcome, FinalState};
use awareness_core::model::{AssessmentAttempt, AssessmentTarget, AttemptId, LearnerId};
use awareness_core::time::Clock;
use storage::repository::{
    AssessmentPersistence, AttemptRepository, LearnerRepository, StorageError,
};

use crate::error::AssessmentError;
use crate::locks::{SubmissionKey, SubmissionLocks};
use crate::progress_tracker::{load_learner, stale_cycle};

/// Outcome of one final-assessment submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalSubmission {
    pub attempt_id: AttemptId,
    #[serde(flatten)]
    pub outcome: FinalOutcome,
    pub percentage: u8,
    /// Cycle the learner restarts in after an exhausting failure.
    pub new_cycle: Option<u32>,
}

/// Attempt counting, pass detection and the exhaustion reset of the final
/// assessment.
#[derive(Clone)]
pub struct FinalAssessmentLifecycle {
    clock: Clock,
    max_attempts: u32,
    learners: Arc<dyn LearnerRepository>,
    attempts: Arc<dyn AttemptRepository>,
    assessments: Arc<dyn AssessmentPersistence>,
    locks: Arc<SubmissionLocks>,
}

impl FinalAssessmentLifecycle {
    #[must_use]
    pub fn new(
        clock: Clock,
        max_attempts: u32,
        learners: Arc<dyn LearnerRepository>,
        attempts: Arc<dyn AttemptRepository>,
        assessments: Arc<dyn AssessmentPersistence>,
    ) -> Self {
        Self {
            clock,
            max_attempts,
            learners,
            attempts,
            assessments,
            locks: Arc::new(SubmissionLocks::new()),
        }
    }

    #[must_use]
    pub fn with_locks(mut self, locks: Arc<SubmissionLocks>) -> Self {
        self.locks = locks;
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Final attempts used in the learner's current cycle.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn attempts_used(&self, learner_id: LearnerId) -> Result<u32, AssessmentError> {
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        Ok(self
            .attempts
            .count_attempts(learner_id, AssessmentTarget::Final, learner.cycle())
            .await?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn state(&self, learner_id: LearnerId) -> Result<FinalState, AssessmentError> {
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        let cycle = learner.cycle();
        let used = self
            .attempts
            .count_attempts(learner_id, AssessmentTarget::Final, cycle)
            .await?;
        let passed = self
            .attempts
            .has_passing_attempt(learner_id, AssessmentTarget::Final, Some(cycle))
            .await?;
        Ok(FinalState::from_history(used, passed, self.max_attempts))
    }

    /// Whether the learner ever passed, in any cycle.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Storage` on backend failures.
    pub async fn has_passed(&self, learner_id: LearnerId) -> Result<bool, AssessmentError> {
        Ok(self
            .attempts
            .has_passing_attempt(learner_id, AssessmentTarget::Final, None)
            .await?)
    }

    /// Records a graded attempt taken in `cycle`. The count, insert and any
    /// reset happen in one storage transaction.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::ProgressReset` when the learner has left
    /// `cycle`, or `AssessmentError::AttemptLimitExceeded` when the cycle
    /// already used every attempt without passing.
    pub async fn submit(
        &self,
        learner_id: LearnerId,
        cycle: u32,
        grade: &GradeResult,
        time_taken_secs: u32,
    ) -> Result<FinalSubmission, AssessmentError> {
        let _guard = self
            .locks
            .acquire(SubmissionKey::final_assessment(learner_id))
            .await;

        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        if learner.cycle() != cycle {
            return Err(stale_cycle(learner_id, cycle, learner.cycle()));
        }
        let attempt = AssessmentAttempt::from_grade(
            learner_id,
            AssessmentTarget::Final,
            grade,
            time_taken_secs,
            cycle,
            self.clock.now(),
        )?;

        let commit = match self
            .assessments
            .commit_final_attempt(attempt, self.max_attempts)
            .await
        {
            Ok(commit) => commit,
            Err(StorageError::Conflict) => {
                let learner = load_learner(self.learners.as_ref(), learner_id).await?;
                if learner.cycle() != cycle {
                    return Err(stale_cycle(learner_id, cycle, learner.cycle()));
                }
                let used = self.attempts_used(learner_id).await?;
                error!(
                    learner = %learner_id,
                    used,
                    max = self.max_attempts,
                    "final assessment submission rejected after attempts were exhausted"
                );
                return Err(AssessmentError::AttemptLimitExceeded {
                    used,
                    max: self.max_attempts,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(cycle) = commit.new_cycle {
            info!(
                learner = %learner_id,
                cycle,
                "final attempts exhausted, course progress reset"
            );
        }
        Ok(FinalSubmission {
            attempt_id: commit.attempt_id,
            outcome: commit.outcome,
            percentage: grade.percentage,
            new_cycle: commit.new_cycle,
        })
    }
}
