use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::LearnerId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SurveyError {
    #[error("{field} rating must be between 1 and 5, got {value}")]
    RatingOutOfRange { field: &'static str, value: u8 },

    #[error("unknown difficulty level: {0}")]
    UnknownDifficulty(String),
}

/// Perceived difficulty of the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Moderate => "moderate",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = SurveyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "moderate" => Ok(Difficulty::Moderate),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(SurveyError::UnknownDifficulty(s.to_owned())),
        }
    }
}

/// 1..=5 rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    /// # Errors
    ///
    /// Returns `SurveyError::RatingOutOfRange` outside 1..=5.
    pub fn new(field: &'static str, value: u8) -> Result<Self, SurveyError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(SurveyError::RatingOutOfRange { field, value })
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

/// Survey answers as typed by the learner, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyDraft {
    pub program_rating: u8,
    pub content_quality: u8,
    pub difficulty_level: Difficulty,
    pub recommendation_likelihood: u8,
    pub comments: Option<String>,
}

impl SurveyDraft {
    /// # Errors
    ///
    /// Returns `SurveyError` when a rating is outside 1..=5.
    pub fn validate(
        self,
        learner_id: LearnerId,
        submitted_at: DateTime<Utc>,
    ) -> Result<FeedbackSurvey, SurveyError> {
        let comments = self
            .comments
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty());
        Ok(FeedbackSurvey {
            learner_id,
            program_rating: Rating::new("program", self.program_rating)?,
            content_quality: Rating::new("content quality", self.content_quality)?,
            difficulty_level: self.difficulty_level,
            recommendation_likelihood: Rating::new(
                "recommendation",
                self.recommendation_likelihood,
            )?,
            comments,
            submitted_at,
        })
    }
}

/// End-of-course feedback. At most one per learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSurvey {
    pub learner_id: LearnerId,
    pub program_rating: Rating,
    pub content_quality: Rating,
    pub difficulty_level: Difficulty,
    pub recommendation_likelihood: Rating,
    pub comments: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
