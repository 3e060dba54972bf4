use awareness_core::model::{Module, ModuleId, Question, QuestionSet};

use super::{
    SqliteRepository,
    mapping::{conflict_or_conn, conn, id_i64, map_module_row, map_question_row, ser},
};
use crate::repository::{CourseRepository, QuestionBankRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO modules (id, title, description, simulation)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    simulation = excluded.simulation
            ",
        )
        .bind(id_i64("module_id", module.id().value())?)
        .bind(module.title())
        .bind(module.description())
        .bind(module.simulation().map(|s| s.as_str()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn list_modules(&self) -> Result<Vec<Module>, StorageError> {
        let rows = sqlx::query("SELECT id, title, description, simulation FROM modules ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_module_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl QuestionBankRepository for SqliteRepository {
    async fn upsert_question_set(&self, set: &QuestionSet) -> Result<(), StorageError> {
        let module_id = id_i64("module_id", set.module().value())?;
        let set_number = i64::from(set.set_number());

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let module_exists = sqlx::query("SELECT 1 FROM modules WHERE id = ?1")
            .bind(module_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?
            .is_some();
        if !module_exists {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM questions WHERE module_id = ?1 AND set_number = ?2")
            .bind(module_id)
            .bind(set_number)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in set.questions().iter().enumerate() {
            let [a, b, c, d] = question.options();
            sqlx::query(
                r"
                    INSERT INTO questions (
                        id, module_id, set_number, position, text,
                        option_a, option_b, option_c, option_d, correct, explanation
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ",
            )
            .bind(id_i64("question_id", question.id().value())?)
            .bind(module_id)
            .bind(set_number)
            .bind(i64::try_from(position).map_err(ser)?)
            .bind(question.text())
            .bind(a.as_str())
            .bind(b.as_str())
            .bind(c.as_str())
            .bind(d.as_str())
            .bind(question.correct().as_str())
            .bind(question.explanation())
            .execute(&mut *tx)
            .await
            .map_err(conflict_or_conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn question_sets(&self, module: ModuleId) -> Result<Vec<QuestionSet>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, set_number, text, option_a, option_b, option_c, option_d,
                    correct, explanation
                FROM questions
                WHERE module_id = ?1
                ORDER BY set_number ASC, position ASC
            ",
        )
        .bind(id_i64("module_id", module.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut grouped: Vec<(u32, Vec<Question>)> = Vec::new();
        for row in rows {
            let (set_number, question) = map_question_row(&row)?;
            match grouped.last_mut() {
                Some((n, questions)) if *n == set_number => questions.push(question),
                _ => grouped.push((set_number, vec![question])),
            }
        }

        grouped
            .into_iter()
            .map(|(n, questions)| QuestionSet::new(module, n, questions).map_err(ser))
            .collect()
    }
}
