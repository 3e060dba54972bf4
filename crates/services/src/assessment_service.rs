use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use awareness_core::grading::{Answers, GradeResult, Grader};
use awareness_core::model::{
    AssessmentKind, AttemptId, LearnerId, ModuleId, ModuleProgress, Question, QuestionId,
    QuestionSet,
};
use awareness_core::policy::AssessmentPolicy;
use awareness_core::selection::{AttemptSelector, Selection};

use crate::error::AssessmentError;
use crate::final_assessment::{FinalAssessmentLifecycle, FinalSubmission};
use crate::gatekeeper::GateKeeper;
use crate::progress_tracker::ProgressTracker;
use crate::question_bank::QuestionBank;

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Graded and persisted knowledge check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeCheckOutcome {
    pub attempt_id: AttemptId,
    pub grade: GradeResult,
    pub first_completion: bool,
}

/// Graded and persisted final assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalAssessmentOutcome {
    pub grade: GradeResult,
    pub submission: FinalSubmission,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Starts and submits knowledge checks and the final assessment.
///
/// Submissions read the learner's cycle before the gate check and are
/// written into that cycle only, so work that passed the gate before a reset
/// is rejected with `ProgressReset` instead of landing in the new cycle.
#[derive(Clone)]
pub struct AssessmentService {
    policy: AssessmentPolicy,
    bank: QuestionBank,
    gate: GateKeeper,
    tracker: ProgressTracker,
    lifecycle: FinalAssessmentLifecycle,
    rng: Arc<Mutex<StdRng>>,
}

impl AssessmentService {
    #[must_use]
    pub fn new(
        policy: AssessmentPolicy,
        bank: QuestionBank,
        gate: GateKeeper,
        tracker: ProgressTracker,
        lifecycle: FinalAssessmentLifecycle,
    ) -> Self {
        Self {
            policy,
            bank,
            gate,
            tracker,
            lifecycle,
            rng: Arc::new(Mutex::new(StdRng::from_os_rng())),
        }
    }

    /// Replaces the entropy-seeded generator with a deterministic one.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Arc::new(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    #[must_use]
    pub fn policy(&self) -> &AssessmentPolicy {
        &self.policy
    }

    /// Opens module content for a learner and records the visit.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AccessDenied` while the previous module is
    /// incomplete.
    pub async fn open_module(
        &self,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<ModuleProgress, AssessmentError> {
        self.gate.require_module(learner, module).await?;
        self.tracker.start_module(learner, module).await
    }

    /// Questions for the learner's next knowledge check on `module`.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AccessDenied` if the module is locked, or
    /// `AssessmentError::NotFound` if it has no questions.
    pub async fn start_knowledge_check(
        &self,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<Selection, AssessmentError> {
        self.gate.require_module(learner, module).await?;
        let prior = self.tracker.knowledge_check_attempts(learner, module).await?;
        let sets = self.bank.sets(module).await?;

        let selector = AttemptSelector::new(self.policy.pool_size(AssessmentKind::KnowledgeCheck))?;
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(selector.select(&sets, prior, &mut *rng)?)
    }

    /// Grades the presented questions and records the attempt.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::IncompleteSubmission` when a presented
    /// question is unanswered, `AssessmentError::NotFound` when a presented id
    /// is not part of the module, or `AssessmentError::ProgressReset` when the
    /// learner's progress was reset after the gate check.
    pub async fn submit_knowledge_check(
        &self,
        learner: LearnerId,
        module: ModuleId,
        presented: &[QuestionId],
        answers: &Answers,
        time_taken_secs: u32,
    ) -> Result<KnowledgeCheckOutcome, AssessmentError> {
        let cycle = self.tracker.current_cycle(learner).await?;
        self.gate.require_module(learner, module).await?;
        let sets = self.bank.sets(module).await?;
        let questions = resolve_presented(&sets, presented)?;

        let grader = Grader::new(self.policy.knowledge_check_passing_score());
        let grade = grader.grade(&questions, answers)?;
        let recorded = self
            .tracker
            .record_knowledge_check(learner, module, cycle, &grade, time_taken_secs)
            .await?;

        Ok(KnowledgeCheckOutcome {
            attempt_id: recorded.attempt_id,
            grade,
            first_completion: recorded.first_completion,
        })
    }

    /// Questions for the learner's next final attempt.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AccessDenied` until every content module is
    /// completed, or `AssessmentError::AttemptLimitExceeded` when the cycle
    /// is exhausted.
    pub async fn start_final_assessment(
        &self,
        learner: LearnerId,
    ) -> Result<Selection, AssessmentError> {
        let course = self.gate.require_final(learner).await?;
        let state = self.lifecycle.state(learner).await?;
        let used = self.lifecycle.attempts_used(learner).await?;
        state.start(used, self.policy.max_final_attempts())?;

        let pool = self.bank.final_pool(&course).await?;
        let selector =
            AttemptSelector::new(self.policy.pool_size(AssessmentKind::FinalAssessment))?;
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(selector.select_final(&pool, used, &mut *rng)?)
    }

    /// Grades a final attempt and applies the attempt lifecycle.
    ///
    /// # Errors
    ///
    /// Same as `submit_knowledge_check`, plus
    /// `AssessmentError::AttemptLimitExceeded`.
    pub async fn submit_final_assessment(
        &self,
        learner: LearnerId,
        presented: &[QuestionId],
        answers: &Answers,
        time_taken_secs: u32,
    ) -> Result<FinalAssessmentOutcome, AssessmentError> {
        let cycle = self.tracker.current_cycle(learner).await?;
        let course = self.gate.require_final(learner).await?;
        let pool = self.bank.final_pool(&course).await?;
        let questions = resolve_presented(&pool, presented)?;

        let grader = Grader::new(self.policy.final_passing_score());
        let grade = grader.grade(&questions, answers)?;
        let submission = self
            .lifecycle
            .submit(learner, cycle, &grade, time_taken_secs)
            .await?;
        Ok(FinalAssessmentOutcome { grade, submission })
    }
}

/// Looks up presented ids in `sets`, keeping presentation order and
/// dropping repeats.
fn resolve_presented(
    sets: &[QuestionSet],
    presented: &[QuestionId],
) -> Result<Vec<Question>, AssessmentError> {
    let mut seen = HashSet::with_capacity(presented.len());
    presented
        .iter()
        .filter(|id| seen.insert(**id))
        .map(|id| {
            sets.iter()
                .flat_map(QuestionSet::questions)
                .find(|q| q.id() == *id)
                .cloned()
                .ok_or_else(|| AssessmentError::NotFound(format!("question {id}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use awareness_core::model::OptionLabel;

    fn set(module: u64, number: u32, ids: &[u64]) -> QuestionSet {
        let questions = ids
            .iter()
            .map(|id| {
                Question::new(
                    QuestionId::new(*id),
                    format!("Q{id}?"),
                    ["a".into(), "b".into(), "c".into(), "d".into()],
                    OptionLabel::D,
                    "explained",
                )
                .unwrap()
            })
            .collect();
        QuestionSet::new(ModuleId::new(module), number, questions).unwrap()
    }

    #[test]
    fn presented_ids_resolve_in_order_without_repeats() {
        let sets = [set(1, 1, &[1, 2]), set(1, 2, &[3, 4])];
        let ids = [3, 1, 3].map(QuestionId::new);
        let questions = resolve_presented(&sets, &ids).unwrap();
        let got: Vec<u64> = questions.iter().map(|q| q.id().value()).collect();
        assert_eq!(got, vec![3, 1]);
    }

    #[test]
    fn foreign_question_is_not_found() {
        let sets = [set(1, 1, &[1, 2])];
        let err = resolve_presented(&sets, &[QuestionId::new(99)]).unwrap_err();
        assert!(matches!(err, AssessmentError::NotFound(_)));
    }
}
