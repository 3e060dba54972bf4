use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use awareness_core::lifecycle::decide_outcome;
use awareness_core::model::{
    AssessmentAttempt, AssessmentTarget, AttemptId, FeedbackSurvey, Learner, LearnerId,
    LearnerProfile, LearnerTotals, Module, ModuleId, ModuleProgress, QuestionSet,
    SimulationResult,
};
use chrono::{DateTime, Utc};

use crate::repository::{
    AssessmentPersistence, AttemptRepository, CourseRepository, FinalAttemptCommit,
    KnowledgeCheckCommit, LearnerRepository, ProgressRepository, QuestionBankRepository,
    SimulationRepository, StorageError, SurveyRepository,
};

#[derive(Default)]
struct MemoryState {
    learners: BTreeMap<LearnerId, Learner>,
    modules: BTreeMap<ModuleId, Module>,
    question_sets: BTreeMap<(ModuleId, u32), QuestionSet>,
    attempts: Vec<AssessmentAttempt>,
    progress: BTreeMap<(LearnerId, ModuleId), ModuleProgress>,
    surveys: HashMap<LearnerId, FeedbackSurvey>,
    simulations: Vec<SimulationResult>,
}

impl MemoryState {
    fn learner(&self, id: LearnerId) -> Result<&Learner, StorageError> {
        self.learners.get(&id).ok_or(StorageError::NotFound)
    }

    fn replace_learner(
        &mut self,
        learner: &Learner,
        cycle: u32,
        totals: LearnerTotals,
    ) -> Result<(), StorageError> {
        let updated = Learner::from_persisted(
            learner.id(),
            learner.profile().clone(),
            learner.password_hash(),
            learner.created_at(),
            cycle,
            totals,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.learners.insert(updated.id(), updated);
        Ok(())
    }

    fn attempts_in_cycle(
        &self,
        learner: LearnerId,
        target: AssessmentTarget,
        cycle: u32,
    ) -> impl Iterator<Item = &AssessmentAttempt> {
        self.attempts.iter().filter(move |a| {
            a.learner_id() == learner && a.target() == target && a.cycle() == cycle
        })
    }

    fn push_attempt(&mut self, attempt: AssessmentAttempt) -> AttemptId {
        let id = AttemptId::new(self.attempts.len() as u64 + 1);
        self.attempts.push(attempt.with_id(id));
        id
    }
}

/// In-memory repository for tests and prototyping.
///
/// All tables sit behind one lock, so every commit is atomic.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl LearnerRepository for InMemoryRepository {
    async fn create_learner(
        &self,
        profile: &LearnerProfile,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Learner, StorageError> {
        let mut guard = self.lock()?;
        let taken = guard.learners.values().any(|l| {
            l.profile().username() == profile.username() || l.profile().email() == profile.email()
        });
        if taken {
            return Err(StorageError::Conflict);
        }
        let id = LearnerId::new(guard.learners.len() as u64 + 1);
        let learner = Learner::new(id, profile.clone(), password_hash, created_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.learners.insert(id, learner.clone());
        Ok(learner)
    }

    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError> {
        self.lock()?.learner(id).cloned()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Learner>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .learners
            .values()
            .find(|l| l.profile().username() == username)
            .cloned())
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        self.lock()?.modules.insert(module.id(), module.clone());
        Ok(())
    }

    async fn list_modules(&self) -> Result<Vec<Module>, StorageError> {
        Ok(self.lock()?.modules.values().cloned().collect())
    }
}

#[async_trait]
impl QuestionBankRepository for InMemoryRepository {
    async fn upsert_question_set(&self, set: &QuestionSet) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.modules.contains_key(&set.module()) {
            return Err(StorageError::NotFound);
        }
        let key = (set.module(), set.set_number());
        let clash = guard
            .question_sets
            .iter()
            .filter(|(k, _)| **k != key)
            .flat_map(|(_, s)| s.questions())
            .any(|q| set.questions().iter().any(|n| n.id() == q.id()));
        if clash {
            return Err(StorageError::Conflict);
        }
        guard.question_sets.insert(key, set.clone());
        Ok(())
    }

    async fn question_sets(&self, module: ModuleId) -> Result<Vec<QuestionSet>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .question_sets
            .range((module, 0)..=(module, u32::MAX))
            .map(|(_, s)| s.clone())
            .collect())
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn attempts_for_learner(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<AssessmentAttempt>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .attempts
            .iter()
            .filter(|a| a.learner_id() == learner)
            .cloned()
            .collect())
    }

    async fn count_attempts(
        &self,
        learner: LearnerId,
        target: AssessmentTarget,
        cycle: u32,
    ) -> Result<u32, StorageError> {
        let guard = self.lock()?;
        let count = guard.attempts_in_cycle(learner, target, cycle).count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn has_passing_attempt(
        &self,
        learner: LearnerId,
        target: AssessmentTarget,
        cycle: Option<u32>,
    ) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard.attempts.iter().any(|a| {
            a.learner_id() == learner
                && a.target() == target
                && a.passed()
                && cycle.is_none_or(|c| a.cycle() == c)
        }))
    }

    async fn passed_modules(
        &self,
        learner: LearnerId,
        cycle: u32,
    ) -> Result<BTreeSet<ModuleId>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .attempts
            .iter()
            .filter(|a| a.learner_id() == learner && a.cycle() == cycle && a.passed())
            .filter_map(|a| match a.target() {
                AssessmentTarget::KnowledgeCheck(module) => Some(module),
                AssessmentTarget::Final => None,
            })
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<Option<ModuleProgress>, StorageError> {
        Ok(self.lock()?.progress.get(&(learner, module)).cloned())
    }

    async fn list_progress(&self, learner: LearnerId) -> Result<Vec<ModuleProgress>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .values()
            .filter(|p| p.learner_id() == learner)
            .cloned()
            .collect())
    }

    async fn upsert_progress(&self, progress: &ModuleProgress) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.learner(progress.learner_id())?;
        guard
            .progress
            .insert((progress.learner_id(), progress.module_id()), progress.clone());
        Ok(())
    }
}

#[async_trait]
impl AssessmentPersistence for InMemoryRepository {
    async fn commit_knowledge_check(
        &self,
        commit: KnowledgeCheckCommit,
    ) -> Result<AttemptId, StorageError> {
        let KnowledgeCheckCommit {
            attempt,
            progress,
            first_completion_score,
        } = commit;
        if attempt.target() != AssessmentTarget::KnowledgeCheck(progress.module_id())
            || attempt.learner_id() != progress.learner_id()
        {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;
        let learner = guard.learner(attempt.learner_id())?.clone();
        if learner.cycle() != attempt.cycle() {
            return Err(StorageError::Conflict);
        }

        let id = guard.push_attempt(attempt);
        guard
            .progress
            .insert((progress.learner_id(), progress.module_id()), progress);
        if let Some(score) = first_completion_score {
            let totals = learner.totals().with_first_completion(score);
            guard.replace_learner(&learner, learner.cycle(), totals)?;
        }
        Ok(id)
    }

    async fn commit_final_attempt(
        &self,
        attempt: AssessmentAttempt,
        max_attempts: u32,
    ) -> Result<FinalAttemptCommit, StorageError> {
        if attempt.target() != AssessmentTarget::Final {
            return Err(StorageError::Conflict);
        }

        let mut guard = self.lock()?;
        let learner = guard.learner(attempt.learner_id())?.clone();
        if learner.cycle() != attempt.cycle() {
            return Err(StorageError::Conflict);
        }

        let (used, already_passed) = guard
            .attempts_in_cycle(learner.id(), AssessmentTarget::Final, learner.cycle())
            .fold((0u32, false), |(n, p), a| (n + 1, p || a.passed()));
        let outcome = decide_outcome(used, already_passed, attempt.passed(), max_attempts)
            .map_err(|_| StorageError::Conflict)?;

        let attempt_id = guard.push_attempt(attempt);
        let mut new_cycle = None;
        if outcome.must_reset {
            guard.progress.retain(|(l, _), _| *l != learner.id());
            let next = learner.cycle() + 1;
            guard.replace_learner(&learner, next, LearnerTotals::default())?;
            new_cycle = Some(next);
        }
        Ok(FinalAttemptCommit {
            attempt_id,
            outcome,
            new_cycle,
        })
    }
}

#[async_trait]
impl SurveyRepository for InMemoryRepository {
    async fn insert_survey(&self, survey: &FeedbackSurvey) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.learner(survey.learner_id)?;
        if guard.surveys.contains_key(&survey.learner_id) {
            return Err(StorageError::Conflict);
        }
        guard.surveys.insert(survey.learner_id, survey.clone());
        Ok(())
    }

    async fn get_survey(&self, learner: LearnerId) -> Result<Option<FeedbackSurvey>, StorageError> {
        Ok(self.lock()?.surveys.get(&learner).cloned())
    }
}

#[async_trait]
impl SimulationRepository for InMemoryRepository {
    async fn record_simulation(&self, result: &SimulationResult) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        guard.learner(result.learner_id)?;
        guard.simulations.push(result.clone());
        Ok(guard.simulations.len() as i64)
    }

    async fn simulations_for(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<SimulationResult>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .simulations
            .iter()
            .filter(|s| s.learner_id == learner)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awareness_core::grading::GradeResult;
    use awareness_core::time::fixed_now;

    async fn learner(repo: &InMemoryRepository, name: &str) -> Learner {
        let profile = LearnerProfile::new(name, format!("{name}@example.com"), "Test Learner").unwrap();
        repo.create_learner(&profile, "hash", fixed_now()).await.unwrap()
    }

    fn final_attempt(learner: &Learner, correct: u32) -> AssessmentAttempt {
        AssessmentAttempt::from_grade(
            learner.id(),
            AssessmentTarget::Final,
            &GradeResult::from_counts(correct, 10, 80),
            60,
            learner.cycle(),
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let repo = InMemoryRepository::new();
        learner(&repo, "alice").await;
        let profile = LearnerProfile::new("alice", "other@example.com", "Alice").unwrap();
        let err = repo
            .create_learner(&profile, "hash", fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn third_failed_final_resets_and_bumps_cycle() {
        let repo = InMemoryRepository::new();
        let alice = learner(&repo, "alice").await;
        let progress = ModuleProgress::new(alice.id(), ModuleId::new(1));
        repo.upsert_progress(&progress).await.unwrap();

        for correct in [5, 6] {
            let commit = repo
                .commit_final_attempt(final_attempt(&alice, correct), 3)
                .await
                .unwrap();
            assert!(!commit.outcome.must_reset);
        }
        let commit = repo
            .commit_final_attempt(final_attempt(&alice, 7), 3)
            .await
            .unwrap();
        assert!(commit.outcome.must_reset);
        assert_eq!(commit.new_cycle, Some(2));

        assert!(repo.list_progress(alice.id()).await.unwrap().is_empty());
        let reloaded = repo.get_learner(alice.id()).await.unwrap();
        assert_eq!(reloaded.cycle(), 2);
        assert_eq!(repo.attempts_for_learner(alice.id()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stale_cycle_is_rejected_without_writing() {
        let repo = InMemoryRepository::new();
        let alice = learner(&repo, "alice").await;
        for correct in [1, 2, 3] {
            repo.commit_final_attempt(final_attempt(&alice, correct), 3)
                .await
                .unwrap();
        }
        let err = repo
            .commit_final_attempt(final_attempt(&alice, 10), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
        assert_eq!(repo.attempts_for_learner(alice.id()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn second_survey_conflicts() {
        let repo = InMemoryRepository::new();
        let alice = learner(&repo, "alice").await;
        let survey = awareness_core::model::SurveyDraft {
            program_rating: 4,
            content_quality: 4,
            difficulty_level: awareness_core::model::Difficulty::Easy,
            recommendation_likelihood: 5,
            comments: None,
        }
        .validate(alice.id(), fixed_now())
        .unwrap();
        repo.insert_survey(&survey).await.unwrap();
        let err = repo.insert_survey(&survey).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }
}
