use std::collections::BTreeSet;

use awareness_core::lifecycle::decide_outcome;
use awareness_core::model::{
    AssessmentAttempt, AssessmentTarget, AttemptId, LearnerId, ModuleId, ModuleProgress,
};
use sqlx::{Row, SqliteConnection};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_attempt_row, module_id_from_i64, ser},
};
use crate::repository::{
    AssessmentPersistence, AttemptRepository, FinalAttemptCommit, KnowledgeCheckCommit,
    StorageError,
};

fn target_params(target: AssessmentTarget) -> Result<(&'static str, Option<i64>), StorageError> {
    let module = target
        .module_id()
        .map(|m| id_i64("module_id", m.value()))
        .transpose()?;
    Ok((target.kind().as_str(), module))
}

/// Takes the database write lock and returns the learner's current cycle.
///
/// The no-op update comes first so concurrent writers queue on the lock
/// before anything is read.
async fn lock_learner_cycle(
    db: &mut SqliteConnection,
    learner: LearnerId,
) -> Result<u32, StorageError> {
    let id = id_i64("learner_id", learner.value())?;
    let touched = sqlx::query("UPDATE learners SET cycle = cycle WHERE id = ?1")
        .bind(id)
        .execute(&mut *db)
        .await
        .map_err(conn)?;
    if touched.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    let cycle: i64 = sqlx::query("SELECT cycle FROM learners WHERE id = ?1")
        .bind(id)
        .fetch_one(&mut *db)
        .await
        .map_err(conn)?
        .try_get("cycle")
        .map_err(ser)?;
    u32::try_from(cycle).map_err(ser)
}

async fn insert_attempt(
    db: &mut SqliteConnection,
    attempt: &AssessmentAttempt,
) -> Result<AttemptId, StorageError> {
    let (kind, module) = target_params(attempt.target())?;
    let res = sqlx::query(
        r"
            INSERT INTO assessment_attempts (
                learner_id, assessment_type, module_id, total_questions, correct_count,
                percentage, passed, time_taken_secs, cycle, submitted_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ",
    )
    .bind(id_i64("learner_id", attempt.learner_id().value())?)
    .bind(kind)
    .bind(module)
    .bind(i64::from(attempt.total_questions()))
    .bind(i64::from(attempt.correct_count()))
    .bind(i64::from(attempt.percentage()))
    .bind(attempt.passed())
    .bind(i64::from(attempt.time_taken_secs()))
    .bind(i64::from(attempt.cycle()))
    .bind(attempt.submitted_at())
    .execute(&mut *db)
    .await
    .map_err(conn)?;

    let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
    Ok(AttemptId::new(id))
}

pub(super) async fn upsert_progress_row(
    db: &mut SqliteConnection,
    progress: &ModuleProgress,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
            INSERT INTO module_progress (
                learner_id, module_id, status, best_score, attempts,
                time_spent_secs, started_at, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(learner_id, module_id) DO UPDATE SET
                status = excluded.status,
                best_score = excluded.best_score,
                attempts = excluded.attempts,
                time_spent_secs = excluded.time_spent_secs,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at
        ",
    )
    .bind(id_i64("learner_id", progress.learner_id().value())?)
    .bind(id_i64("module_id", progress.module_id().value())?)
    .bind(progress.status().as_str())
    .bind(i64::from(progress.best_score()))
    .bind(i64::from(progress.attempts()))
    .bind(id_i64("time_spent_secs", progress.time_spent_secs())?)
    .bind(progress.started_at())
    .bind(progress.completed_at())
    .execute(&mut *db)
    .await
    .map_err(conn)?;
    Ok(())
}

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn attempts_for_learner(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<AssessmentAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, learner_id, assessment_type, module_id, total_questions,
                    correct_count, percentage, passed, time_taken_secs, cycle, submitted_at
                FROM assessment_attempts
                WHERE learner_id = ?1
                ORDER BY submitted_at ASC, id ASC
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_attempt_row(&row)?);
        }
        Ok(out)
    }

    async fn count_attempts(
        &self,
        learner: LearnerId,
        target: AssessmentTarget,
        cycle: u32,
    ) -> Result<u32, StorageError> {
        let (kind, module) = target_params(target)?;
        let count: i64 = sqlx::query(
            r"
                SELECT COUNT(*) AS n
                FROM assessment_attempts
                WHERE learner_id = ?1 AND assessment_type = ?2 AND module_id IS ?3 AND cycle = ?4
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .bind(kind)
        .bind(module)
        .bind(i64::from(cycle))
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?
        .try_get("n")
        .map_err(ser)?;
        u32::try_from(count).map_err(ser)
    }

    async fn has_passing_attempt(
        &self,
        learner: LearnerId,
        target: AssessmentTarget,
        cycle: Option<u32>,
    ) -> Result<bool, StorageError> {
        let (kind, module) = target_params(target)?;
        let row = sqlx::query(
            r"
                SELECT 1
                FROM assessment_attempts
                WHERE learner_id = ?1 AND assessment_type = ?2 AND module_id IS ?3
                  AND passed = 1 AND (?4 IS NULL OR cycle = ?4)
                LIMIT 1
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .bind(kind)
        .bind(module)
        .bind(cycle.map(i64::from))
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn passed_modules(
        &self,
        learner: LearnerId,
        cycle: u32,
    ) -> Result<BTreeSet<ModuleId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT DISTINCT module_id
                FROM assessment_attempts
                WHERE learner_id = ?1 AND assessment_type = 'knowledge_check'
                  AND passed = 1 AND cycle = ?2
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .bind(i64::from(cycle))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| module_id_from_i64(row.try_get::<i64, _>("module_id").map_err(ser)?))
            .collect()
    }
}

#[async_trait::async_trait]
impl AssessmentPersistence for SqliteRepository {
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

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let cycle = lock_learner_cycle(&mut tx, attempt.learner_id()).await?;
        if cycle != attempt.cycle() {
            return Err(StorageError::Conflict);
        }

        let id = insert_attempt(&mut tx, &attempt).await?;
        upsert_progress_row(&mut tx, &progress).await?;

        if let Some(score) = first_completion_score {
            sqlx::query(
                r"
                    UPDATE learners
                    SET modules_completed = modules_completed + 1,
                        total_score = total_score + ?2
                    WHERE id = ?1
                ",
            )
            .bind(id_i64("learner_id", attempt.learner_id().value())?)
            .bind(i64::from(score))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
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
        let learner_id = id_i64("learner_id", attempt.learner_id().value())?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let cycle = lock_learner_cycle(&mut tx, attempt.learner_id()).await?;
        if cycle != attempt.cycle() {
            return Err(StorageError::Conflict);
        }

        let row = sqlx::query(
            r"
                SELECT COUNT(*) AS used, COALESCE(MAX(passed), 0) AS any_passed
                FROM assessment_attempts
                WHERE learner_id = ?1 AND assessment_type = 'final_assessment' AND cycle = ?2
            ",
        )
        .bind(learner_id)
        .bind(i64::from(cycle))
        .fetch_one(&mut *tx)
        .await
        .map_err(conn)?;
        let used = u32::try_from(row.try_get::<i64, _>("used").map_err(ser)?).map_err(ser)?;
        let already_passed = row.try_get::<i64, _>("any_passed").map_err(ser)? != 0;

        let outcome = decide_outcome(used, already_passed, attempt.passed(), max_attempts)
            .map_err(|_| StorageError::Conflict)?;

        let attempt_id = insert_attempt(&mut tx, &attempt).await?;

        let mut new_cycle = None;
        if outcome.must_reset {
            sqlx::query("DELETE FROM module_progress WHERE learner_id = ?1")
                .bind(learner_id)
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            sqlx::query(
                r"
                    UPDATE learners
                    SET cycle = cycle + 1, modules_completed = 0, total_score = 0
                    WHERE id = ?1
                ",
            )
            .bind(learner_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
            new_cycle = Some(cycle + 1);
        }

        tx.commit().await.map_err(conn)?;
        Ok(FinalAttemptCommit {
            attempt_id,
            outcome,
            new_cycle,
        })
    }
}
