use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ModuleId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("option {0} cannot be empty")]
    EmptyOption(OptionLabel),

    #[error("explanation cannot be empty")]
    EmptyExplanation,

    #[error("invalid option label: {0:?} (expected a, b, c or d)")]
    InvalidLabel(String),

    #[error("question set number must be >= 1")]
    InvalidSetNumber,

    #[error("question set {set_number} of module {module} has no questions")]
    EmptySet { module: ModuleId, set_number: u32 },

    #[error("question {0} appears more than once in a set")]
    DuplicateQuestion(QuestionId),
}

//
// ─── OPTION LABEL ──────────────────────────────────────────────────────────────
//

/// One of the four labelled answer options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 4] = [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OptionLabel::A => "a",
            OptionLabel::B => "b",
            OptionLabel::C => "c",
            OptionLabel::D => "d",
        }
    }

    #[must_use]
    pub fn index(self) -> usize {
        match self {
            OptionLabel::A => 0,
            OptionLabel::B => 1,
            OptionLabel::C => 2,
            OptionLabel::D => 3,
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionLabel {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(OptionLabel::A),
            "b" => Ok(OptionLabel::B),
            "c" => Ok(OptionLabel::C),
            "d" => Ok(OptionLabel::D),
            _ => Err(QuestionError::InvalidLabel(s.to_owned())),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A four-option multiple choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    text: String,
    options: [String; 4],
    correct: OptionLabel,
    explanation: String,
}

impl Question {
    /// # Errors
    ///
    /// Returns `QuestionError` if the text, any option, or the explanation is blank.
    pub fn new(
        id: QuestionId,
        text: impl Into<String>,
        options: [String; 4],
        correct: OptionLabel,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        let text = text.into().trim().to_owned();
        if text.is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let options = options.map(|o| o.trim().to_owned());
        if let Some(label) = OptionLabel::ALL
            .into_iter()
            .find(|label| options[label.index()].is_empty())
        {
            return Err(QuestionError::EmptyOption(label));
        }

        let explanation = explanation.into().trim().to_owned();
        if explanation.is_empty() {
            return Err(QuestionError::EmptyExplanation);
        }

        Ok(Self {
            id,
            text,
            options,
            correct,
            explanation,
        })
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn option(&self, label: OptionLabel) -> &str {
        &self.options[label.index()]
    }

    #[must_use]
    pub fn options(&self) -> &[String; 4] {
        &self.options
    }

    #[must_use]
    pub fn correct(&self) -> OptionLabel {
        self.correct
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// A numbered, fixed bundle of questions for one module.
///
/// Set numbers rotate retake content: set 1 on the first attempt, set 2 on
/// the second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    module: ModuleId,
    set_number: u32,
    questions: Vec<Question>,
}

impl QuestionSet {
    /// # Errors
    ///
    /// Returns `QuestionError` for set number 0, an empty set, or repeated question ids.
    pub fn new(
        module: ModuleId,
        set_number: u32,
        questions: Vec<Question>,
    ) -> Result<Self, QuestionError> {
        if set_number == 0 {
            return Err(QuestionError::InvalidSetNumber);
        }
        if questions.is_empty() {
            return Err(QuestionError::EmptySet { module, set_number });
        }
        let mut seen = std::collections::HashSet::with_capacity(questions.len());
        for q in &questions {
            if !seen.insert(q.id()) {
                return Err(QuestionError::DuplicateQuestion(q.id()));
            }
        }
        Ok(Self {
            module,
            set_number,
            questions,
        })
    }

    #[must_use]
    pub fn module(&self) -> ModuleId {
        self.module
    }

    #[must_use]
    pub fn set_number(&self) -> u32 {
        self.set_number
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> [String; 4] {
        ["one".into(), "two".into(), "three".into(), "four".into()]
    }

    fn question(id: u64) -> Question {
        Question::new(
            QuestionId::new(id),
            format!("Question {id}?"),
            options(),
            OptionLabel::B,
            "because",
        )
        .unwrap()
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!("C".parse::<OptionLabel>().unwrap(), OptionLabel::C);
        assert_eq!(" a ".parse::<OptionLabel>().unwrap(), OptionLabel::A);
        assert!(matches!(
            "e".parse::<OptionLabel>(),
            Err(QuestionError::InvalidLabel(_))
        ));
    }

    #[test]
    fn question_rejects_blank_parts() {
        let err = Question::new(QuestionId::new(1), " ", options(), OptionLabel::A, "x")
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyText);

        let mut opts = options();
        opts[2] = "  ".into();
        let err = Question::new(QuestionId::new(1), "Q?", opts, OptionLabel::A, "x").unwrap_err();
        assert_eq!(err, QuestionError::EmptyOption(OptionLabel::C));

        let err = Question::new(QuestionId::new(1), "Q?", options(), OptionLabel::A, "")
            .unwrap_err();
        assert_eq!(err, QuestionError::EmptyExplanation);
    }

    #[test]
    fn question_exposes_options_by_label() {
        let q = question(3);
        assert_eq!(q.option(OptionLabel::D), "four");
        assert_eq!(q.correct(), OptionLabel::B);
    }

    #[test]
    fn set_validation() {
        let module = ModuleId::new(1);
        assert_eq!(
            QuestionSet::new(module, 0, vec![question(1)]).unwrap_err(),
            QuestionError::InvalidSetNumber
        );
        assert_eq!(
            QuestionSet::new(module, 1, Vec::new()).unwrap_err(),
            QuestionError::EmptySet { module, set_number: 1 }
        );
        assert_eq!(
            QuestionSet::new(module, 1, vec![question(1), question(1)]).unwrap_err(),
            QuestionError::DuplicateQuestion(QuestionId::new(1))
        );
        let set = QuestionSet::new(module, 2, vec![question(1), question(2)]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.set_number(), 2);
    }
}
