use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{LearnerId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown module status: {0}")]
    UnknownStatus(String),

    #[error("completed progress must carry a completion timestamp")]
    MissingCompletionTime,

    #[error("best score {0} is outside 0..=100")]
    InvalidScore(u8),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ModuleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleStatus::NotStarted => "not_started",
            ModuleStatus::InProgress => "in_progress",
            ModuleStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleStatus {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ModuleStatus::NotStarted),
            "in_progress" => Ok(ModuleStatus::InProgress),
            "completed" => Ok(ModuleStatus::Completed),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── MODULE PROGRESS ───────────────────────────────────────────────────────────
//

/// Per learner, per module progress row.
///
/// Status only moves forward. `Completed` is reachable only through
/// [`ModuleProgress::apply_grade`] with a passing grade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProgress {
    learner_id: LearnerId,
    module_id: ModuleId,
    status: ModuleStatus,
    best_score: u8,
    attempts: u32,
    time_spent_secs: u64,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// What a grading event changed on a progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeApplied {
    /// The row transitioned to `Completed` with this grade.
    pub first_completion: bool,
    /// The grade raised the best score.
    pub new_best: bool,
}

impl ModuleProgress {
    /// Fresh `not_started` row, created on first visit.
    #[must_use]
    pub fn new(learner_id: LearnerId, module_id: ModuleId) -> Self {
        Self {
            learner_id,
            module_id,
            status: ModuleStatus::NotStarted,
            best_score: 0,
            attempts: 0,
            time_spent_secs: 0,
            started_at: None,
            completed_at: None,
        }
    }

    /// Rehydrates a row from storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the score is out of range or a completed
    /// row has no completion timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        learner_id: LearnerId,
        module_id: ModuleId,
        status: ModuleStatus,
        best_score: u8,
        attempts: u32,
        time_spent_secs: u64,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProgressError> {
        if best_score > 100 {
            return Err(ProgressError::InvalidScore(best_score));
        }
        if status == ModuleStatus::Completed && completed_at.is_none() {
            return Err(ProgressError::MissingCompletionTime);
        }
        Ok(Self {
            learner_id,
            module_id,
            status,
            best_score,
            attempts,
            time_spent_secs,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn status(&self) -> ModuleStatus {
        self.status
    }

    #[must_use]
    pub fn best_score(&self) -> u8 {
        self.best_score
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ModuleStatus::Completed
    }

    /// Content was viewed. Returns `true` if the status changed.
    pub fn mark_in_progress(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != ModuleStatus::NotStarted {
            return false;
        }
        self.status = ModuleStatus::InProgress;
        self.started_at.get_or_insert(now);
        true
    }

    pub fn add_time_spent(&mut self, secs: u64) {
        self.time_spent_secs = self.time_spent_secs.saturating_add(secs);
    }

    /// Applies a knowledge-check grade.
    ///
    /// A failing grade never regresses a completed row.
    pub fn apply_grade(&mut self, percentage: u8, passed: bool, now: DateTime<Utc>) -> GradeApplied {
        self.attempts = self.attempts.saturating_add(1);
        let new_best = percentage > self.best_score;
        if new_best {
            self.best_score = percentage.min(100);
        }
        self.mark_in_progress(now);

        let first_completion = passed && self.status != ModuleStatus::Completed;
        if first_completion {
            self.status = ModuleStatus::Completed;
            self.completed_at = Some(now);
        }
        GradeApplied {
            first_completion,
            new_best,
        }
    }

    /// Downgrades a row whose completion is not backed by a passing attempt.
    ///
    /// Used for reporting only; callers never persist the result.
    #[must_use]
    pub fn without_unbacked_completion(mut self) -> Self {
        if self.status == ModuleStatus::Completed {
            self.status = ModuleStatus::InProgress;
            self.completed_at = None;
        }
        self
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn row() -> ModuleProgress {
        ModuleProgress::new(LearnerId::new(1), ModuleId::new(2))
    }

    #[test]
    fn first_view_moves_to_in_progress_once() {
        let mut progress = row();
        assert_eq!(progress.status(), ModuleStatus::NotStarted);
        assert!(progress.mark_in_progress(fixed_now()));
        assert!(!progress.mark_in_progress(fixed_now() + Duration::hours(1)));
        assert_eq!(progress.status(), ModuleStatus::InProgress);
        assert_eq!(progress.started_at(), Some(fixed_now()));
    }

    #[test]
    fn failing_grade_leaves_in_progress() {
        let mut progress = row();
        let applied = progress.apply_grade(60, false, fixed_now());
        assert!(!applied.first_completion);
        assert!(applied.new_best);
        assert_eq!(progress.status(), ModuleStatus::InProgress);
        assert_eq!(progress.attempts(), 1);
        assert_eq!(progress.best_score(), 60);
    }

    #[test]
    fn pass_then_fail_never_regresses() {
        let mut progress = row();
        let now = fixed_now();
        assert!(progress.apply_grade(80, true, now).first_completion);

        let later = now + Duration::days(1);
        let applied = progress.apply_grade(40, false, later);
        assert!(!applied.first_completion);
        assert!(!applied.new_best);
        assert_eq!(progress.status(), ModuleStatus::Completed);
        assert_eq!(progress.completed_at(), Some(now));
        assert_eq!(progress.best_score(), 80);
        assert_eq!(progress.attempts(), 2);
    }

    #[test]
    fn second_pass_is_not_a_first_completion() {
        let mut progress = row();
        progress.apply_grade(80, true, fixed_now());
        let applied = progress.apply_grade(100, true, fixed_now());
        assert!(!applied.first_completion);
        assert!(applied.new_best);
    }

    #[test]
    fn persisted_completed_row_needs_timestamp() {
        let err = ModuleProgress::from_persisted(
            LearnerId::new(1),
            ModuleId::new(1),
            ModuleStatus::Completed,
            80,
            1,
            0,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, ProgressError::MissingCompletionTime);
    }

    #[test]
    fn unbacked_completion_is_reported_as_in_progress() {
        let mut progress = row();
        progress.apply_grade(90, true, fixed_now());
        let downgraded = progress.without_unbacked_completion();
        assert_eq!(downgraded.status(), ModuleStatus::InProgress);
        assert_eq!(downgraded.completed_at(), None);
    }

    #[test]
    fn status_parses_storage_strings() {
        for status in [
            ModuleStatus::NotStarted,
            ModuleStatus::InProgress,
            ModuleStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<ModuleStatus>().unwrap(), status);
        }
        assert!("done".parse::<ModuleStatus>().is_err());
    }
}
