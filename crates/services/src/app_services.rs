use std::sync::Arc;

use awareness_core::model::PasswordPolicy;
use awareness_core::policy::AssessmentPolicy;
use storage::repository::Storage;

use crate::Clock;
use crate::assessment_service::AssessmentService;
use crate::catalog::CourseCatalog;
use crate::config::CourseConfig;
use crate::dashboard::DashboardService;
use crate::error::AppServicesError;
use crate::final_assessment::FinalAssessmentLifecycle;
use crate::gatekeeper::GateKeeper;
use crate::learner_service::{LearnerService, PasswordHasher};
use crate::locks::SubmissionLocks;
use crate::progress_tracker::ProgressTracker;
use crate::question_bank::QuestionBank;
use crate::simulation_service::SimulationService;
use crate::survey_service::SurveyService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    password_policy: PasswordPolicy,
    assessments: Arc<AssessmentService>,
    progress: Arc<ProgressTracker>,
    gate: Arc<GateKeeper>,
    final_lifecycle: Arc<FinalAssessmentLifecycle>,
    surveys: Arc<SurveyService>,
    simulations: Arc<SimulationService>,
    dashboard: Arc<DashboardService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the policy is invalid or storage
    /// initialization fails.
    pub async fn new_sqlite(config: &CourseConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let policy = config.assessment_policy()?;
        let storage = Storage::sqlite(&config.database_url).await?;
        Ok(Self::from_storage(storage, policy, clock).with_password_policy(config.password.clone()))
    }

    #[must_use]
    pub fn in_memory(policy: AssessmentPolicy, clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), policy, clock)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, policy: AssessmentPolicy, clock: Clock) -> Self {
        Self::from_storage_with_locks(storage, policy, clock, Arc::new(SubmissionLocks::new()))
    }

    /// Same as `from_storage`, serializing submissions on a lock table
    /// shared with other service sets over the same storage.
    #[must_use]
    pub fn from_storage_with_locks(
        storage: Storage,
        policy: AssessmentPolicy,
        clock: Clock,
        locks: Arc<SubmissionLocks>,
    ) -> Self {
        let tracker = ProgressTracker::new(
            clock,
            Arc::clone(&storage.learners),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.assessments),
        )
        .with_locks(Arc::clone(&locks));
        let gate = GateKeeper::new(Arc::clone(&storage.course), tracker.clone());
        let lifecycle = FinalAssessmentLifecycle::new(
            clock,
            policy.max_final_attempts(),
            Arc::clone(&storage.learners),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.assessments),
        )
        .with_locks(locks);
        let bank = QuestionBank::new(Arc::clone(&storage.questions));

        let assessments = AssessmentService::new(
            policy,
            bank,
            gate.clone(),
            tracker.clone(),
            lifecycle.clone(),
        );
        let surveys = SurveyService::new(
            clock,
            Arc::clone(&storage.learners),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.surveys),
        );
        let simulations = SimulationService::new(
            clock,
            Arc::clone(&storage.learners),
            Arc::clone(&storage.simulations),
        );
        let dashboard = DashboardService::new(
            Arc::clone(&storage.learners),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.surveys),
            Arc::clone(&storage.simulations),
            gate.clone(),
            tracker.clone(),
            lifecycle.clone(),
        );

        Self {
            clock,
            storage,
            password_policy: PasswordPolicy::default(),
            assessments: Arc::new(assessments),
            progress: Arc::new(tracker),
            gate: Arc::new(gate),
            final_lifecycle: Arc::new(lifecycle),
            surveys: Arc::new(surveys),
            simulations: Arc::new(simulations),
            dashboard: Arc::new(dashboard),
        }
    }

    #[must_use]
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    /// Makes question selection reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        let assessments = (*self.assessments).clone().with_seed(seed);
        self.assessments = Arc::new(assessments);
        self
    }

    /// Upserts the catalog's modules and question sets.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Catalog` if a write fails.
    pub async fn seed(&self, catalog: &CourseCatalog) -> Result<(), AppServicesError> {
        catalog.seed(&self.storage).await?;
        Ok(())
    }

    /// Registration service using the caller's password hasher.
    #[must_use]
    pub fn learners(&self, hasher: Arc<dyn PasswordHasher>) -> LearnerService {
        LearnerService::new(self.clock, hasher, Arc::clone(&self.storage.learners))
            .with_password_policy(self.password_policy.clone())
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn assessments(&self) -> Arc<AssessmentService> {
        Arc::clone(&self.assessments)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn gate(&self) -> Arc<GateKeeper> {
        Arc::clone(&self.gate)
    }

    #[must_use]
    pub fn final_lifecycle(&self) -> Arc<FinalAssessmentLifecycle> {
        Arc::clone(&self.final_lifecycle)
    }

    #[must_use]
    pub fn surveys(&self) -> Arc<SurveyService> {
        Arc::clone(&self.surveys)
    }

    #[must_use]
    pub fn simulations(&self) -> Arc<SimulationService> {
        Arc::clone(&self.simulations)
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }
}
