use std::sync::Arc;

use awareness_core::model::{Course, ModuleId, Question, QuestionSet};
use storage::repository::QuestionBankRepository;

use crate::error::BankError;

/// Read access to the stored question sets.
#[derive(Clone)]
pub struct QuestionBank {
    questions: Arc<dyn QuestionBankRepository>,
}

impl QuestionBank {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionBankRepository>) -> Self {
        Self { questions }
    }

    /// Sets of a module ordered by set number.
    ///
    /// # Errors
    ///
    /// Returns `BankError::NoQuestions` when the module has no questions.
    pub async fn sets(&self, module: ModuleId) -> Result<Vec<QuestionSet>, BankError> {
        let sets = self.questions.question_sets(module).await?;
        if sets.iter().all(QuestionSet::is_empty) {
            return Err(BankError::NoQuestions(module));
        }
        Ok(sets)
    }

    /// Questions of one set in stored order.
    ///
    /// # Errors
    ///
    /// Returns `BankError::NoQuestions` or `BankError::SetNotFound`.
    pub async fn questions(
        &self,
        module: ModuleId,
        set_number: u32,
    ) -> Result<Vec<Question>, BankError> {
        self.sets(module)
            .await?
            .into_iter()
            .find(|s| s.set_number() == set_number)
            .map(QuestionSet::into_questions)
            .ok_or(BankError::SetNotFound { module, set_number })
    }

    /// # Errors
    ///
    /// Returns `BankError::NoQuestions` when the module has no questions.
    pub async fn count_available_sets(&self, module: ModuleId) -> Result<u32, BankError> {
        let sets = self.sets(module).await?;
        Ok(u32::try_from(sets.len()).unwrap_or(u32::MAX))
    }

    /// Sets of every content module, in module then set order.
    ///
    /// Content modules without questions are skipped.
    ///
    /// # Errors
    ///
    /// Returns `BankError::EmptyFinalPool` when no content module has questions.
    pub async fn final_pool(&self, course: &Course) -> Result<Vec<QuestionSet>, BankError> {
        let mut pool = Vec::new();
        for module in course.content_modules() {
            pool.extend(self.questions.question_sets(module.id()).await?);
        }
        if pool.iter().all(QuestionSet::is_empty) {
            return Err(BankError::EmptyFinalPool);
        }
        Ok(pool)
    }
}
