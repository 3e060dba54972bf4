use awareness_core::model::{
    AssessmentAttempt, AssessmentKind, AssessmentTarget, AttemptId, Difficulty, FeedbackSurvey,
    Learner, LearnerId, LearnerProfile, LearnerTotals, Module, ModuleId, ModuleProgress,
    ModuleStatus, OptionLabel, Question, QuestionId, Rating, SimulationKind, SimulationResult,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps a UNIQUE violation to `Conflict`, anything else to `Connection`.
pub(crate) fn conflict_or_conn(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => conn(e),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn i64_to_u8(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn get_u32(row: &SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    i64_to_u32(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

fn get_u8(row: &SqliteRow, field: &'static str) -> Result<u8, StorageError> {
    i64_to_u8(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn module_id_from_i64(v: i64) -> Result<ModuleId, StorageError> {
    Ok(ModuleId::new(i64_to_u64("module_id", v)?))
}

fn module_id_col(row: &SqliteRow) -> Result<ModuleId, StorageError> {
    module_id_from_i64(row.try_get::<i64, _>("module_id").map_err(ser)?)
}

fn learner_id_col(row: &SqliteRow) -> Result<LearnerId, StorageError> {
    learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)
}

pub(crate) fn map_learner_row(row: &SqliteRow) -> Result<Learner, StorageError> {
    let profile = LearnerProfile::new(
        row.try_get::<String, _>("username").map_err(ser)?,
        row.try_get::<String, _>("email").map_err(ser)?,
        row.try_get::<String, _>("full_name").map_err(ser)?,
    )
    .map_err(ser)?
    .with_profile_picture(row.try_get("profile_picture").map_err(ser)?);

    let totals = LearnerTotals {
        modules_completed: get_u32(row, "modules_completed")?,
        total_score: get_u32(row, "total_score")?,
    };

    Learner::from_persisted(
        learner_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        profile,
        row.try_get::<String, _>("password_hash").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
        get_u32(row, "cycle")?,
        totals,
    )
    .map_err(ser)
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<Module, StorageError> {
    let simulation = row
        .try_get::<Option<String>, _>("simulation")
        .map_err(ser)?
        .map(|s| s.parse::<SimulationKind>())
        .transpose()
        .map_err(ser)?;
    Module::new(
        module_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get("description").map_err(ser)?,
        simulation,
    )
    .map_err(ser)
}

/// Returns the question together with its set number.
pub(crate) fn map_question_row(row: &SqliteRow) -> Result<(u32, Question), StorageError> {
    let correct: String = row.try_get("correct").map_err(ser)?;
    let question = Question::new(
        QuestionId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        row.try_get::<String, _>("text").map_err(ser)?,
        [
            row.try_get::<String, _>("option_a").map_err(ser)?,
            row.try_get::<String, _>("option_b").map_err(ser)?,
            row.try_get::<String, _>("option_c").map_err(ser)?,
            row.try_get::<String, _>("option_d").map_err(ser)?,
        ],
        correct.parse::<OptionLabel>().map_err(ser)?,
        row.try_get::<String, _>("explanation").map_err(ser)?,
    )
    .map_err(ser)?;
    Ok((get_u32(row, "set_number")?, question))
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<AssessmentAttempt, StorageError> {
    let kind: String = row.try_get("assessment_type").map_err(ser)?;
    let kind = kind.parse::<AssessmentKind>().map_err(ser)?;
    let module_id = row
        .try_get::<Option<i64>, _>("module_id")
        .map_err(ser)?
        .map(module_id_from_i64)
        .transpose()?;
    let target = AssessmentTarget::from_parts(kind, module_id).map_err(ser)?;

    AssessmentAttempt::from_persisted(
        Some(AttemptId::new(i64_to_u64(
            "id",
            row.try_get::<i64, _>("id").map_err(ser)?,
        )?)),
        learner_id_col(row)?,
        target,
        get_u32(row, "total_questions")?,
        get_u32(row, "correct_count")?,
        get_u8(row, "percentage")?,
        row.try_get::<bool, _>("passed").map_err(ser)?,
        get_u32(row, "time_taken_secs")?,
        get_u32(row, "cycle")?,
        row.try_get("submitted_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ModuleProgress, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    let time_spent: i64 = row.try_get("time_spent_secs").map_err(ser)?;
    ModuleProgress::from_persisted(
        learner_id_col(row)?,
        module_id_col(row)?,
        status.parse::<ModuleStatus>().map_err(ser)?,
        get_u8(row, "best_score")?,
        get_u32(row, "attempts")?,
        i64_to_u64("time_spent_secs", time_spent)?,
        row.try_get::<Option<DateTime<Utc>>, _>("started_at")
            .map_err(ser)?,
        row.try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_survey_row(row: &SqliteRow) -> Result<FeedbackSurvey, StorageError> {
    let difficulty: String = row.try_get("difficulty_level").map_err(ser)?;
    Ok(FeedbackSurvey {
        learner_id: learner_id_col(row)?,
        program_rating: Rating::new("program", get_u8(row, "program_rating")?).map_err(ser)?,
        content_quality: Rating::new("content quality", get_u8(row, "content_quality")?)
            .map_err(ser)?,
        difficulty_level: difficulty.parse::<Difficulty>().map_err(ser)?,
        recommendation_likelihood: Rating::new(
            "recommendation",
            get_u8(row, "recommendation_likelihood")?,
        )
        .map_err(ser)?,
        comments: row.try_get("comments").map_err(ser)?,
        submitted_at: row.try_get("submitted_at").map_err(ser)?,
    })
}

pub(crate) fn map_simulation_row(row: &SqliteRow) -> Result<SimulationResult, StorageError> {
    let kind: String = row.try_get("simulation_type").map_err(ser)?;
    SimulationResult::new(
        learner_id_col(row)?,
        kind.parse::<SimulationKind>().map_err(ser)?,
        get_u32(row, "correct_decisions")?,
        get_u32(row, "total_decisions")?,
        get_u32(row, "time_taken_secs")?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}
