use awareness_core::model::{FeedbackSurvey, LearnerId};

use super::{
    SqliteRepository,
    mapping::{conflict_or_conn, conn, id_i64, map_survey_row},
};
use crate::repository::{StorageError, SurveyRepository};

#[async_trait::async_trait]
impl SurveyRepository for SqliteRepository {
    async fn insert_survey(&self, survey: &FeedbackSurvey) -> Result<(), StorageError> {
        // UNIQUE(learner_id) settles racing submissions.
        sqlx::query(
            r"
                INSERT INTO feedback_surveys (
                    learner_id, program_rating, content_quality, difficulty_level,
                    recommendation_likelihood, comments, submitted_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(id_i64("learner_id", survey.learner_id.value())?)
        .bind(i64::from(survey.program_rating.value()))
        .bind(i64::from(survey.content_quality.value()))
        .bind(survey.difficulty_level.as_str())
        .bind(i64::from(survey.recommendation_likelihood.value()))
        .bind(survey.comments.as_deref())
        .bind(survey.submitted_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_conn)?;
        Ok(())
    }

    async fn get_survey(&self, learner: LearnerId) -> Result<Option<FeedbackSurvey>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    learner_id, program_rating, content_quality, difficulty_level,
                    recommendation_likelihood, comments, submitted_at
                FROM feedback_surveys
                WHERE learner_id = ?1
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_survey_row).transpose()
    }
}
