use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::model::{OptionLabel, Question, QuestionId};

/// Learner answers keyed by question.
pub type Answers = HashMap<QuestionId, OptionLabel>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradeError {
    #[error("submission is missing answers for {} question(s)", missing.len())]
    IncompleteSubmission { missing: Vec<QuestionId> },
}

/// `round(100 * correct / total)` with halves rounded up.
///
/// Returns 0 for an empty total. `correct` is clamped to `total`.
#[must_use]
pub fn percentage(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (200 * correct + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Per-question outcome shown on the result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionFeedback {
    pub question_id: QuestionId,
    pub chosen: OptionLabel,
    pub correct: OptionLabel,
    pub is_correct: bool,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeResult {
    pub correct_count: u32,
    pub total_count: u32,
    pub percentage: u8,
    pub passed: bool,
    pub feedback: Vec<QuestionFeedback>,
}

impl GradeResult {
    /// Builds a result from raw counts, without per-question feedback.
    #[must_use]
    pub fn from_counts(correct_count: u32, total_count: u32, passing_score: u8) -> Self {
        let percentage = percentage(correct_count, total_count);
        Self {
            correct_count: correct_count.min(total_count),
            total_count,
            percentage,
            passed: percentage >= passing_score,
            feedback: Vec::new(),
        }
    }
}

/// Scores a submission against the presented questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grader {
    passing_score: u8,
}

impl Grader {
    #[must_use]
    pub fn new(passing_score: u8) -> Self {
        Self { passing_score }
    }

    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    /// Grades every presented question. Answers for questions that were not
    /// presented are ignored.
    ///
    /// # Errors
    ///
    /// Returns `GradeError::IncompleteSubmission` listing the unanswered
    /// questions, or when no questions were presented at all.
    pub fn grade(&self, questions: &[Question], answers: &Answers) -> Result<GradeResult, GradeError> {
        let missing: Vec<QuestionId> = questions
            .iter()
            .map(Question::id)
            .filter(|id| !answers.contains_key(id))
            .collect();
        if questions.is_empty() || !missing.is_empty() {
            return Err(GradeError::IncompleteSubmission { missing });
        }

        let mut feedback = Vec::with_capacity(questions.len());
        let mut correct_count = 0u32;
        for question in questions {
            let Some(&chosen) = answers.get(&question.id()) else {
                continue;
            };
            let is_correct = chosen == question.correct();
            if is_correct {
                correct_count += 1;
            }
            feedback.push(QuestionFeedback {
                question_id: question.id(),
                chosen,
                correct: question.correct(),
                is_correct,
                explanation: question.explanation().to_owned(),
            });
        }

        let total_count = u32::try_from(questions.len()).unwrap_or(u32::MAX);
        let mut result = GradeResult::from_counts(correct_count, total_count, self.passing_score);
        result.feedback = feedback;
        Ok(result)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
