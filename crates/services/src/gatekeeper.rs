use std::sync::Arc;

use tracing::debug;

use awareness_core::gate::{self, GateDecision};
use awareness_core::model::{Course, LearnerId, ModuleId};
use storage::repository::CourseRepository;

use crate::error::AssessmentError;
use crate::progress_tracker::ProgressTracker;

/// Sequential access rules on top of the progress tracker.
#[derive(Clone)]
pub struct GateKeeper {
    course: Arc<dyn CourseRepository>,
    tracker: ProgressTracker,
}

impl GateKeeper {
    #[must_use]
    pub fn new(course: Arc<dyn CourseRepository>, tracker: ProgressTracker) -> Self {
        Self { course, tracker }
    }

    /// Loads the stored modules as a validated course.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::Consistency` if the stored modules do not
    /// form a contiguous course.
    pub async fn course(&self) -> Result<Course, AssessmentError> {
        let modules = self.course.list_modules().await?;
        Ok(Course::new(modules)?)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner or module.
    pub async fn can_access(
        &self,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<GateDecision, AssessmentError> {
        let course = self.course().await?;
        self.decide_module(&course, learner, module).await
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn can_access_final(&self, learner: LearnerId) -> Result<GateDecision, AssessmentError> {
        let course = self.course().await?;
        self.decide_final(&course, learner).await
    }

    /// Like `can_access`, with a denial turned into an error. The final
    /// module is routed through the final-assessment rule.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError::AccessDenied` naming the blocking module.
    pub async fn require_module(
        &self,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<Course, AssessmentError> {
        let course = self.course().await?;
        let decision = if course.contains(module) && module == course.final_module() {
            self.decide_final(&course, learner).await?
        } else {
            self.decide_module(&course, learner, module).await?
        };
        deny_to_error(decision, learner, Some(module))?;
        Ok(course)
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::AccessDenied` naming the lowest incomplete module.
    pub async fn require_final(&self, learner: LearnerId) -> Result<Course, AssessmentError> {
        let course = self.course().await?;
        let decision = self.decide_final(&course, learner).await?;
        deny_to_error(decision, learner, None)?;
        Ok(course)
    }

    async fn decide_module(
        &self,
        course: &Course,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<GateDecision, AssessmentError> {
        let completed = self.tracker.completed_modules(learner).await?;
        Ok(gate::module_access(course, module, &completed)?)
    }

    async fn decide_final(
        &self,
        course: &Course,
        learner: LearnerId,
    ) -> Result<GateDecision, AssessmentError> {
        let completed = self.tracker.completed_modules(learner).await?;
        Ok(gate::final_access(course, &completed))
    }
}

fn deny_to_error(
    decision: GateDecision,
    learner: LearnerId,
    target: Option<ModuleId>,
) -> Result<(), AssessmentError> {
    match decision.blocking_module {
        Some(blocking_module) if !decision.allowed => {
            debug!(
                learner = %learner,
                target = ?target,
                blocking = %blocking_module,
                "access denied"
            );
            Err(AssessmentError::AccessDenied { blocking_module })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awareness_core::grading::GradeResult;
    use awareness_core::model::{LearnerProfile, Module};
    use awareness_core::time::{Clock, fixed_now};
    use storage::repository::{InMemoryRepository, LearnerRepository};

    async fn setup(modules: u64) -> (GateKeeper, ProgressTracker, LearnerId) {
        let repo = InMemoryRepository::new();
        for i in 1..=modules {
            let module = Module::new(ModuleId::new(i), format!("Module {i}"), None, None).unwrap();
            repo.upsert_module(&module).await.unwrap();
        }
        let profile = LearnerProfile::new("grace", "grace@example.com", "Grace Hopper").unwrap();
        let learner = repo
            .create_learner(&profile, "hash", fixed_now())
            .await
            .unwrap();
        let tracker = ProgressTracker::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        let gate = GateKeeper::new(Arc::new(repo), tracker.clone());
        (gate, tracker, learner.id())
    }

    async fn pass(tracker: &ProgressTracker, learner: LearnerId, module: u64) {
        tracker
            .record_knowledge_check(
                learner,
                ModuleId::new(module),
                1,
                &GradeResult::from_counts(5, 5, 80),
                30,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn first_module_is_always_open() {
        let (gate, _, learner) = setup(4).await;
        let decision = gate.can_access(learner, ModuleId::new(1)).await.unwrap();
        assert_eq!(decision, GateDecision::allow());
    }

    #[tokio::test]
    async fn only_the_immediate_predecessor_is_checked() {
        let (gate, tracker, learner) = setup(4).await;
        pass(&tracker, learner, 2).await;

        assert_eq!(
            gate.can_access(learner, ModuleId::new(3)).await.unwrap(),
            GateDecision::allow()
        );
        assert_eq!(
            gate.can_access(learner, ModuleId::new(2)).await.unwrap(),
            GateDecision::deny(ModuleId::new(1))
        );
    }

    #[tokio::test]
    async fn final_needs_every_content_module() {
        let (gate, tracker, learner) = setup(4).await;
        pass(&tracker, learner, 1).await;
        pass(&tracker, learner, 3).await;

        let err = gate.require_final(learner).await.unwrap_err();
        assert!(matches!(
            err,
            AssessmentError::AccessDenied { blocking_module } if blocking_module == ModuleId::new(2)
        ));

        pass(&tracker, learner, 2).await;
        assert!(gate.require_final(learner).await.is_ok());
        assert!(gate.require_module(learner, ModuleId::new(4)).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_module_is_not_found() {
        let (gate, _, learner) = setup(3).await;
        let err = gate.can_access(learner, ModuleId::new(9)).await.unwrap_err();
        assert!(matches!(err, AssessmentError::NotFound(_)));
    }
}
