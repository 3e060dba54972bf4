use awareness_core::model::{LearnerId, ModuleId, ModuleProgress};

use super::{
    SqliteRepository,
    attempt_repo::upsert_progress_row,
    mapping::{conn, id_i64, map_progress_row},
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        learner: LearnerId,
        module: ModuleId,
    ) -> Result<Option<ModuleProgress>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    learner_id, module_id, status, best_score, attempts,
                    time_spent_secs, started_at, completed_at
                FROM module_progress
                WHERE learner_id = ?1 AND module_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .bind(id_i64("module_id", module.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_progress_row).transpose()
    }

    async fn list_progress(&self, learner: LearnerId) -> Result<Vec<ModuleProgress>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    learner_id, module_id, status, best_score, attempts,
                    time_spent_secs, started_at, completed_at
                FROM module_progress
                WHERE learner_id = ?1
                ORDER BY module_id ASC
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_progress(&self, progress: &ModuleProgress) -> Result<(), StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        upsert_progress_row(&mut db, progress)
            .await
            .map_err(|e| match e {
                // Missing learner or module trips the foreign key.
                StorageError::Connection(msg) if msg.contains("FOREIGN KEY") => {
                    StorageError::NotFound
                }
                other => other,
            })
    }
}
