use awareness_core::model::{LearnerId, SimulationResult};

use super::{
    SqliteRepository,
    mapping::{conn, id_i64, map_simulation_row},
};
use crate::repository::{SimulationRepository, StorageError};

#[async_trait::async_trait]
impl SimulationRepository for SqliteRepository {
    async fn record_simulation(&self, result: &SimulationResult) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO simulation_results (
                    learner_id, simulation_type, module_id, correct_decisions,
                    total_decisions, time_taken_secs, completed_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(id_i64("learner_id", result.learner_id.value())?)
        .bind(result.kind.as_str())
        .bind(id_i64("module_id", result.module().value())?)
        .bind(i64::from(result.correct_decisions))
        .bind(i64::from(result.total_decisions))
        .bind(i64::from(result.time_taken_secs))
        .bind(result.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(res.last_insert_rowid())
    }

    async fn simulations_for(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<SimulationResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    learner_id, simulation_type, correct_decisions, total_decisions,
                    time_taken_secs, completed_at
                FROM simulation_results
                WHERE learner_id = ?1
                ORDER BY completed_at ASC, id ASC
            ",
        )
        .bind(id_i64("learner_id", learner.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_simulation_row(&row)?);
        }
        Ok(out)
    }
}
