use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use awareness_core::grading::GradeResult;
use awareness_core::model::{
    AssessmentAttempt, AssessmentTarget, AttemptId, Learner, LearnerId, LearnerTotals, ModuleId,
    ModuleProgress,
};
use awareness_core::time::Clock;
use storage::repository::{
    AssessmentPersistence, AttemptRepository, KnowledgeCheckCommit, LearnerRepository,
    ProgressRepository, StorageError,
};

use crate::error::AssessmentError;
use crate::locks::{SubmissionKey, SubmissionLocks};

/// Outcome of a recorded knowledge check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCheck {
    pub attempt_id: AttemptId,
    pub progress: ModuleProgress,
    /// The grade completed the module for the first time in this cycle.
    pub first_completion: bool,
}

/// Owns module progress. Completion is always derived from attempt history
/// of the learner's current cycle; progress rows only carry display state.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    learners: Arc<dyn LearnerRepository>,
    attempts: Arc<dyn AttemptRepository>,
    progress: Arc<dyn ProgressRepository>,
    assessments: Arc<dyn AssessmentPersistence>,
    locks: Arc<SubmissionLocks>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        learners: Arc<dyn LearnerRepository>,
        attempts: Arc<dyn AttemptRepository>,
        progress: Arc<dyn ProgressRepository>,
        assessments: Arc<dyn AssessmentPersistence>,
    ) -> Self {
        Self {
            clock,
            learners,
            attempts,
            progress,
            assessments,
            locks: Arc::new(SubmissionLocks::new()),
        }
    }

    /// Shares a lock table with other services writing the same learners.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<SubmissionLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// The learner's current progress cycle. Callers read it before their
    /// access check and hand it to the write, so a reset in between is
    /// detected at commit time.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn current_cycle(&self, learner_id: LearnerId) -> Result<u32, AssessmentError> {
        Ok(load_learner(self.learners.as_ref(), learner_id).await?.cycle())
    }

    /// Persists a graded knowledge check taken in `cycle`: the attempt, the
    /// progress row and, on first completion in the cycle, the learner totals.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner,
    /// `AssessmentError::ProgressReset` if the learner has left `cycle`
    /// before the write landed, or storage errors.
    pub async fn record_knowledge_check(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
        cycle: u32,
        grade: &GradeResult,
        time_taken_secs: u32,
    ) -> Result<RecordedCheck, AssessmentError> {
        let _guard = self
            .locks
            .acquire(SubmissionKey::knowledge_check(learner_id, module))
            .await;

        let now = self.clock.now();
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        if learner.cycle() != cycle {
            return Err(stale_cycle(learner_id, cycle, learner.cycle()));
        }
        let target = AssessmentTarget::KnowledgeCheck(module);
        let already_passed = self
            .attempts
            .has_passing_attempt(learner_id, target, Some(cycle))
            .await?;

        let mut progress = self.stored_row(learner_id, module).await?;
        if !already_passed {
            progress = reconcile(progress, false);
        }
        let applied = progress.apply_grade(grade.percentage, grade.passed, now);
        let first_completion = grade.passed && !already_passed;
        if applied.first_completion != first_completion {
            warn!(
                learner = %learner_id,
                module = %module,
                "progress row lagged behind attempt history"
            );
        }

        let attempt = AssessmentAttempt::from_grade(
            learner_id,
            target,
            grade,
            time_taken_secs,
            cycle,
            now,
        )?;
        let commit = KnowledgeCheckCommit {
            attempt,
            progress: progress.clone(),
            first_completion_score: first_completion.then_some(grade.percentage),
        };
        let attempt_id = match self.assessments.commit_knowledge_check(commit).await {
            Ok(id) => id,
            Err(StorageError::Conflict) => {
                let current = self.current_cycle(learner_id).await?;
                return Err(stale_cycle(learner_id, cycle, current));
            }
            Err(e) => return Err(e.into()),
        };

        if first_completion {
            info!(
                learner = %learner_id,
                module = %module,
                score = grade.percentage,
                "module completed"
            );
        }
        Ok(RecordedCheck {
            attempt_id,
            progress,
            first_completion,
        })
    }

    /// A module counts as completed only if a passing knowledge check exists
    /// in the learner's current cycle.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn is_module_completed(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
    ) -> Result<bool, AssessmentError> {
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        Ok(self
            .attempts
            .has_passing_attempt(
                learner_id,
                AssessmentTarget::KnowledgeCheck(module),
                Some(learner.cycle()),
            )
            .await?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn completed_modules(
        &self,
        learner_id: LearnerId,
    ) -> Result<BTreeSet<ModuleId>, AssessmentError> {
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        Ok(self
            .attempts
            .passed_modules(learner_id, learner.cycle())
            .await?)
    }

    /// Knowledge-check attempts on `module` in the learner's current cycle.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn knowledge_check_attempts(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
    ) -> Result<u32, AssessmentError> {
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        Ok(self
            .attempts
            .count_attempts(
                learner_id,
                AssessmentTarget::KnowledgeCheck(module),
                learner.cycle(),
            )
            .await?)
    }

    /// Records a content visit. Creates the row on first visit and moves it
    /// to in-progress; a completed row is left alone.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn start_module(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
    ) -> Result<ModuleProgress, AssessmentError> {
        let _guard = self
            .locks
            .acquire(SubmissionKey::knowledge_check(learner_id, module))
            .await;
        load_learner(self.learners.as_ref(), learner_id).await?;

        let mut progress = self.stored_row(learner_id, module).await?;
        if progress.mark_in_progress(self.clock.now()) {
            self.progress.upsert_progress(&progress).await?;
        }
        Ok(progress)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn record_time_spent(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
        secs: u64,
    ) -> Result<ModuleProgress, AssessmentError> {
        let _guard = self
            .locks
            .acquire(SubmissionKey::knowledge_check(learner_id, module))
            .await;
        load_learner(self.learners.as_ref(), learner_id).await?;

        let mut progress = self.stored_row(learner_id, module).await?;
        progress.add_time_spent(secs);
        self.progress.upsert_progress(&progress).await?;
        Ok(progress)
    }

    /// Progress row as reported to the learner. A completed row without a
    /// passing attempt behind it is shown as in progress.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn module_progress(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
    ) -> Result<ModuleProgress, AssessmentError> {
        let completed = self.is_module_completed(learner_id, module).await?;
        let row = self.stored_row(learner_id, module).await?;
        Ok(reconcile(row, completed))
    }

    /// Every stored progress row of the learner, reconciled.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn list_progress(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<ModuleProgress>, AssessmentError> {
        let completed = self.completed_modules(learner_id).await?;
        let rows = self.progress.list_progress(learner_id).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let backed = completed.contains(&row.module_id());
                reconcile(row, backed)
            })
            .collect())
    }

    /// Totals re-derived from the first passing knowledge check of every
    /// module in the current cycle.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn recompute_totals(
        &self,
        learner_id: LearnerId,
    ) -> Result<LearnerTotals, AssessmentError> {
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        let history = self.attempts.attempts_for_learner(learner_id).await?;

        let mut seen = BTreeSet::new();
        let totals = history
            .iter()
            .filter(|a| a.cycle() == learner.cycle() && a.passed())
            .filter_map(|a| match a.target() {
                AssessmentTarget::KnowledgeCheck(module) => Some((module, a.percentage())),
                AssessmentTarget::Final => None,
            })
            .filter(|(module, _)| seen.insert(*module))
            .fold(LearnerTotals::default(), |totals, (_, pct)| {
                totals.with_first_completion(pct)
            });
        Ok(totals)
    }

    async fn stored_row(
        &self,
        learner_id: LearnerId,
        module: ModuleId,
    ) -> Result<ModuleProgress, AssessmentError> {
        Ok(self
            .progress
            .get_progress(learner_id, module)
            .await?
            .unwrap_or_else(|| ModuleProgress::new(learner_id, module)))
    }
}

fn reconcile(row: ModuleProgress, backed: bool) -> ModuleProgress {
    if row.is_completed() && !backed {
        warn!(
            learner = %row.learner_id(),
            module = %row.module_id(),
            "progress row marked completed without a passing attempt"
        );
        return row.without_unbacked_completion();
    }
    row
}

pub(crate) fn stale_cycle(learner: LearnerId, taken_in: u32, current: u32) -> AssessmentError {
    info!(
        learner = %learner,
        taken_in,
        current,
        "submission from a reset progress cycle rejected"
    );
    AssessmentError::ProgressReset
}

pub(crate) async fn load_learner(
    learners: &dyn LearnerRepository,
    id: LearnerId,
) -> Result<Learner, AssessmentError> {
    learners.get_learner(id).await.map_err(|e| match e {
        StorageError::NotFound => AssessmentError::NotFound(format!("learner {id}")),
        other => other.into(),
    })
}
