use awareness_core::model::{Learner, LearnerId, LearnerProfile};
use chrono::{DateTime, Utc};

use super::{
    SqliteRepository,
    mapping::{conflict_or_conn, conn, id_i64, learner_id_from_i64, map_learner_row},
};
use crate::repository::{LearnerRepository, StorageError};

const LEARNER_COLUMNS: &str = r"
    id, username, email, full_name, password_hash, profile_picture,
    created_at, cycle, modules_completed, total_score
";

#[async_trait::async_trait]
impl LearnerRepository for SqliteRepository {
    async fn create_learner(
        &self,
        profile: &LearnerProfile,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Learner, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO learners (
                    username, email, full_name, password_hash, profile_picture, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(profile.username())
        .bind(profile.email())
        .bind(profile.full_name())
        .bind(password_hash)
        .bind(profile.profile_picture())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(conflict_or_conn)?;

        let id = learner_id_from_i64(res.last_insert_rowid())?;
        Learner::new(id, profile.clone(), password_hash, created_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn get_learner(&self, id: LearnerId) -> Result<Learner, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {LEARNER_COLUMNS} FROM learners WHERE id = ?1"
        ))
        .bind(id_i64("learner_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;
        map_learner_row(&row)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Learner>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {LEARNER_COLUMNS} FROM learners WHERE username = ?1"
        ))
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;
        row.as_ref().map(map_learner_row).transpose()
    }
}
