use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use awareness_core::gate;
use awareness_core::grading::percentage;
use awareness_core::lifecycle::FinalState;
use awareness_core::model::{
    AssessmentTarget, LearnerId, LearnerTotals, ModuleId, ModuleProgress, ModuleStatus,
    SimulationKind,
};
use storage::repository::{
    AttemptRepository, LearnerRepository, SimulationRepository, SurveyRepository,
};

use crate::error::AssessmentError;
use crate::final_assessment::FinalAssessmentLifecycle;
use crate::gatekeeper::GateKeeper;
use crate::progress_tracker::{ProgressTracker, load_learner};

const RECENT_ACTIVITY_LIMIT: usize = 5;

//
// ─── VIEW MODEL ────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub module_id: ModuleId,
    pub title: String,
    pub status: ModuleStatus,
    pub accessible: bool,
    pub completed: bool,
    pub best_score: u8,
    pub simulation: Option<SimulationKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    KnowledgeCheck,
    FinalAssessment,
    ModuleCompleted,
    Simulation,
    Survey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub module_id: Option<ModuleId>,
    pub percentage: Option<u8>,
    pub passed: Option<bool>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub learner_id: LearnerId,
    pub full_name: String,
    pub cycle: u32,
    pub modules: Vec<ModuleSummary>,
    /// Content modules completed in the current cycle.
    pub completed_count: u32,
    pub totals: LearnerTotals,
    /// Correct answers over questions across every recorded attempt.
    pub average_score: Option<u8>,
    pub final_state: FinalState,
    pub final_accessible: bool,
    pub survey_submitted: bool,
    pub certificate_eligible: bool,
    pub recent_activity: Vec<Activity>,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Read-only learner overview.
#[derive(Clone)]
pub struct DashboardService {
    learners: Arc<dyn LearnerRepository>,
    attempts: Arc<dyn AttemptRepository>,
    surveys: Arc<dyn SurveyRepository>,
    simulations: Arc<dyn SimulationRepository>,
    gate: GateKeeper,
    tracker: ProgressTracker,
    lifecycle: FinalAssessmentLifecycle,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        learners: Arc<dyn LearnerRepository>,
        attempts: Arc<dyn AttemptRepository>,
        surveys: Arc<dyn SurveyRepository>,
        simulations: Arc<dyn SimulationRepository>,
        gate: GateKeeper,
        tracker: ProgressTracker,
        lifecycle: FinalAssessmentLifecycle,
    ) -> Self {
        Self {
            learners,
            attempts,
            surveys,
            simulations,
            gate,
            tracker,
            lifecycle,
        }
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::NotFound` for an unknown learner.
    pub async fn dashboard(&self, learner_id: LearnerId) -> Result<Dashboard, AssessmentError> {
        let learner = load_learner(self.learners.as_ref(), learner_id).await?;
        let course = self.gate.course().await?;
        let completed = self.tracker.completed_modules(learner_id).await?;
        let progress: BTreeMap<ModuleId, ModuleProgress> = self
            .tracker
            .list_progress(learner_id)
            .await?
            .into_iter()
            .map(|row| (row.module_id(), row))
            .collect();

        let final_access = gate::final_access(&course, &completed);
        let mut modules = Vec::with_capacity(course.len());
        for module in course.modules() {
            let id = module.id();
            let accessible = if id == course.final_module() {
                final_access.allowed
            } else {
                gate::module_access(&course, id, &completed)?.allowed
            };
            let row = progress.get(&id);
            modules.push(ModuleSummary {
                module_id: id,
                title: module.title().to_owned(),
                status: row.map(ModuleProgress::status).unwrap_or_default(),
                accessible,
                completed: completed.contains(&id),
                best_score: row.map_or(0, ModuleProgress::best_score),
                simulation: module.simulation(),
            });
        }

        let history = self.attempts.attempts_for_learner(learner_id).await?;
        let (correct, total) = history.iter().fold((0u32, 0u32), |(c, t), a| {
            (
                c.saturating_add(a.correct_count()),
                t.saturating_add(a.total_questions()),
            )
        });
        let average_score = (total > 0).then(|| percentage(correct, total));

        let survey = self.surveys.get_survey(learner_id).await?;
        let passed_final = self.lifecycle.has_passed(learner_id).await?;
        let final_state = self.lifecycle.state(learner_id).await?;

        let mut activity: Vec<Activity> = history
            .iter()
            .map(|a| Activity {
                kind: match a.target() {
                    AssessmentTarget::KnowledgeCheck(_) => ActivityKind::KnowledgeCheck,
                    AssessmentTarget::Final => ActivityKind::FinalAssessment,
                },
                module_id: a.module_id(),
                percentage: Some(a.percentage()),
                passed: Some(a.passed()),
                at: a.submitted_at(),
            })
            .collect();
        activity.extend(progress.values().filter_map(|row| {
            row.completed_at().map(|at| Activity {
                kind: ActivityKind::ModuleCompleted,
                module_id: Some(row.module_id()),
                percentage: Some(row.best_score()),
                passed: None,
                at,
            })
        }));
        activity.extend(
            self.simulations
                .simulations_for(learner_id)
                .await?
                .into_iter()
                .map(|s| Activity {
                    kind: ActivityKind::Simulation,
                    module_id: Some(s.module()),
                    percentage: Some(s.percentage()),
                    passed: None,
                    at: s.completed_at,
                }),
        );
        if let Some(survey) = &survey {
            activity.push(Activity {
                kind: ActivityKind::Survey,
                module_id: None,
                percentage: None,
                passed: None,
                at: survey.submitted_at,
            });
        }
        activity.sort_by(|a, b| b.at.cmp(&a.at));
        activity.truncate(RECENT_ACTIVITY_LIMIT);

        Ok(Dashboard {
            learner_id,
            full_name: learner.profile().full_name().to_owned(),
            cycle: learner.cycle(),
            modules,
            completed_count: u32::try_from(completed.len()).unwrap_or(u32::MAX),
            totals: learner.totals(),
            average_score,
            final_state,
            final_accessible: final_access.allowed,
            survey_submitted: survey.is_some(),
            certificate_eligible: passed_final && survey.is_some(),
            recent_activity: activity,
        })
    }
}
