use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use awareness_core::model::{AssessmentTarget, FeedbackSurvey, LearnerId, SurveyDraft};
use awareness_core::time::Clock;
use storage::repository::{AttemptRepository, LearnerRepository, StorageError, SurveyRepository};

use crate::error::SurveyServiceError;

/// Whether the survey form should be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurveyEligibility {
    pub passed_final: bool,
    pub already_submitted: bool,
}

impl SurveyEligibility {
    #[must_use]
    pub fn can_submit(self) -> bool {
        self.passed_final && !self.already_submitted
    }
}

/// End-of-course feedback and certificate eligibility.
///
/// A pass in any cycle counts: a later reset never takes the survey or the
/// certificate away.
#[derive(Clone)]
pub struct SurveyService {
    clock: Clock,
    learners: Arc<dyn LearnerRepository>,
    attempts: Arc<dyn AttemptRepository>,
    surveys: Arc<dyn SurveyRepository>,
}

impl SurveyService {
    #[must_use]
    pub fn new(
        clock: Clock,
        learners: Arc<dyn LearnerRepository>,
        attempts: Arc<dyn AttemptRepository>,
        surveys: Arc<dyn SurveyRepository>,
    ) -> Self {
        Self {
            clock,
            learners,
            attempts,
            surveys,
        }
    }

    /// # Errors
    ///
    /// Returns `SurveyServiceError::UnknownLearner` for an unknown learner.
    pub async fn eligibility(
        &self,
        learner: LearnerId,
    ) -> Result<SurveyEligibility, SurveyServiceError> {
        self.ensure_learner(learner).await?;
        let passed_final = self
            .attempts
            .has_passing_attempt(learner, AssessmentTarget::Final, None)
            .await?;
        let already_submitted = self.surveys.get_survey(learner).await?.is_some();
        Ok(SurveyEligibility {
            passed_final,
            already_submitted,
        })
    }

    /// Validates and stores the learner's only survey.
    ///
    /// # Errors
    ///
    /// Returns `SurveyServiceError::NotEligible` before a passing final,
    /// `SurveyServiceError::AlreadySubmitted` for a second survey, or
    /// `SurveyServiceError::Survey` for out-of-range ratings.
    pub async fn submit(
        &self,
        learner: LearnerId,
        draft: SurveyDraft,
    ) -> Result<FeedbackSurvey, SurveyServiceError> {
        let eligibility = self.eligibility(learner).await?;
        if !eligibility.passed_final {
            return Err(SurveyServiceError::NotEligible);
        }
        if eligibility.already_submitted {
            return Err(SurveyServiceError::AlreadySubmitted);
        }

        let survey = draft.validate(learner, self.clock.now())?;
        match self.surveys.insert_survey(&survey).await {
            Ok(()) => {}
            // A concurrent submission won the race.
            Err(StorageError::Conflict) => return Err(SurveyServiceError::AlreadySubmitted),
            Err(e) => return Err(e.into()),
        }
        info!(learner = %learner, "feedback survey submitted");
        Ok(survey)
    }

    /// # Errors
    ///
    /// Returns `SurveyServiceError::Storage` on backend failures.
    pub async fn survey(
        &self,
        learner: LearnerId,
    ) -> Result<Option<FeedbackSurvey>, SurveyServiceError> {
        Ok(self.surveys.get_survey(learner).await?)
    }

    /// A certificate needs a passed final assessment and a submitted survey.
    ///
    /// # Errors
    ///
    /// Returns `SurveyServiceError::UnknownLearner` for an unknown learner.
    pub async fn certificate_eligible(&self, learner: LearnerId) -> Result<bool, SurveyServiceError> {
        let eligibility = self.eligibility(learner).await?;
        Ok(eligibility.passed_final && eligibility.already_submitted)
    }

    async fn ensure_learner(&self, learner: LearnerId) -> Result<(), SurveyServiceError> {
        match self.learners.get_learner(learner).await {
            Ok(_) => Ok(()),
            Err(StorageError::NotFound) => Err(SurveyServiceError::UnknownLearner(learner)),
            Err(e) => Err(e.into()),
        }
    }
}
