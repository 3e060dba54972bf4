use thiserror::Error;

use crate::model::AssessmentKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PolicyError {
    #[error("passing score {0} is outside 0..=100")]
    InvalidPassingScore(u8),

    #[error("max final attempts must be >= 1")]
    ZeroAttempts,

    #[error("question pool size must be >= 1")]
    ZeroPoolSize,
}

/// Thresholds, attempt cap and pool sizes of the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssessmentPolicy {
    knowledge_check_passing_score: u8,
    final_passing_score: u8,
    max_final_attempts: u32,
    knowledge_check_questions: usize,
    final_questions: usize,
}

impl Default for AssessmentPolicy {
    fn default() -> Self {
        Self {
            knowledge_check_passing_score: Self::DEFAULT_PASSING_SCORE,
            final_passing_score: Self::DEFAULT_PASSING_SCORE,
            max_final_attempts: Self::DEFAULT_MAX_FINAL_ATTEMPTS,
            knowledge_check_questions: Self::DEFAULT_KNOWLEDGE_CHECK_QUESTIONS,
            final_questions: Self::DEFAULT_FINAL_QUESTIONS,
        }
    }
}

impl AssessmentPolicy {
    pub const DEFAULT_PASSING_SCORE: u8 = 80;
    pub const DEFAULT_MAX_FINAL_ATTEMPTS: u32 = 3;
    pub const DEFAULT_KNOWLEDGE_CHECK_QUESTIONS: usize = 5;
    pub const DEFAULT_FINAL_QUESTIONS: usize = 25;

    /// Creates a custom policy.
    ///
    /// # Errors
    ///
    /// Returns `PolicyError` for a passing score above 100, a zero attempt
    /// cap or an empty pool size.
    pub fn new(
        knowledge_check_passing_score: u8,
        final_passing_score: u8,
        max_final_attempts: u32,
        knowledge_check_questions: usize,
        final_questions: usize,
    ) -> Result<Self, PolicyError> {
        for score in [knowledge_check_passing_score, final_passing_score] {
            if score > 100 {
                return Err(PolicyError::InvalidPassingScore(score));
            }
        }
        if max_final_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if knowledge_check_questions == 0 || final_questions == 0 {
            return Err(PolicyError::ZeroPoolSize);
        }
        Ok(Self {
            knowledge_check_passing_score,
            final_passing_score,
            max_final_attempts,
            knowledge_check_questions,
            final_questions,
        })
    }

    #[must_use]
    pub fn knowledge_check_passing_score(&self) -> u8 {
        self.knowledge_check_passing_score
    }

    #[must_use]
    pub fn final_passing_score(&self) -> u8 {
        self.final_passing_score
    }

    #[must_use]
    pub fn max_final_attempts(&self) -> u32 {
        self.max_final_attempts
    }

    #[must_use]
    pub fn knowledge_check_questions(&self) -> usize {
        self.knowledge_check_questions
    }

    #[must_use]
    pub fn final_questions(&self) -> usize {
        self.final_questions
    }

    #[must_use]
    pub fn passing_score(&self, kind: AssessmentKind) -> u8 {
        match kind {
            AssessmentKind::KnowledgeCheck => self.knowledge_check_passing_score,
            AssessmentKind::FinalAssessment => self.final_passing_score,
        }
    }

    #[must_use]
    pub fn pool_size(&self, kind: AssessmentKind) -> usize {
        match kind {
            AssessmentKind::KnowledgeCheck => self.knowledge_check_questions,
            AssessmentKind::FinalAssessment => self.final_questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_course_rules() {
        let policy = AssessmentPolicy::default();
        assert_eq!(policy.passing_score(AssessmentKind::KnowledgeCheck), 80);
        assert_eq!(policy.passing_score(AssessmentKind::FinalAssessment), 80);
        assert_eq!(policy.max_final_attempts(), 3);
        assert_eq!(policy.pool_size(AssessmentKind::KnowledgeCheck), 5);
        assert_eq!(policy.pool_size(AssessmentKind::FinalAssessment), 25);
    }

    #[test]
    fn thresholds_are_per_kind() {
        let policy = AssessmentPolicy::new(80, 70, 3, 5, 25).unwrap();
        assert_eq!(policy.passing_score(AssessmentKind::FinalAssessment), 70);
        assert_eq!(policy.knowledge_check_passing_score(), 80);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_eq!(
            AssessmentPolicy::new(101, 80, 3, 5, 25).unwrap_err(),
            PolicyError::InvalidPassingScore(101)
        );
        assert_eq!(
            AssessmentPolicy::new(80, 80, 0, 5, 25).unwrap_err(),
            PolicyError::ZeroAttempts
        );
        assert_eq!(
            AssessmentPolicy::new(80, 80, 3, 0, 25).unwrap_err(),
            PolicyError::ZeroPoolSize
        );
    }
}
