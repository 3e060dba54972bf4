use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LifecycleError {
    #[error("final assessment attempts exhausted ({used} of {max})")]
    AttemptLimitExceeded { used: u32, max: u32 },
}

/// Where a learner stands on the final assessment within the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FinalState {
    NotStarted,
    /// Questions were handed out for this attempt and await submission.
    InProgress { attempt_number: u32 },
    Passed,
    FailedRetryable { attempts_remaining: u32 },
    /// Terminal until the reset starts a new cycle.
    FailedExhausted,
}

impl FinalState {
    /// Derives the state from the final attempts of the current cycle.
    #[must_use]
    pub fn from_history(attempts_used: u32, any_passed: bool, max_attempts: u32) -> Self {
        if any_passed {
            FinalState::Passed
        } else if attempts_used == 0 {
            FinalState::NotStarted
        } else if attempts_used >= max_attempts {
            FinalState::FailedExhausted
        } else {
            FinalState::FailedRetryable {
                attempts_remaining: max_attempts - attempts_used,
            }
        }
    }

    /// Hands out a new attempt.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::AttemptLimitExceeded` from `FailedExhausted`.
    pub fn start(self, attempts_used: u32, max_attempts: u32) -> Result<Self, LifecycleError> {
        match self {
            FinalState::FailedExhausted => Err(LifecycleError::AttemptLimitExceeded {
                used: attempts_used,
                max: max_attempts,
            }),
            _ => Ok(FinalState::InProgress {
                attempt_number: attempts_used.saturating_add(1),
            }),
        }
    }

    #[must_use]
    pub fn is_passed(self) -> bool {
        self == FinalState::Passed
    }
}

/// Result of one final-assessment submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinalOutcome {
    pub passed: bool,
    pub attempts_remaining: u32,
    pub must_reset: bool,
}

/// Decides the outcome of a submission given the attempts already recorded in
/// the current cycle.
///
/// Once the learner has passed, later submissions are informational and
/// never trigger a reset.
///
/// # Errors
///
/// Returns `LifecycleError::AttemptLimitExceeded` when the cycle already holds
/// `max_attempts` attempts without a pass.
pub fn decide_outcome(
    attempts_used: u32,
    already_passed: bool,
    passed: bool,
    max_attempts: u32,
) -> Result<FinalOutcome, LifecycleError> {
    if !already_passed && attempts_used >= max_attempts {
        return Err(LifecycleError::AttemptLimitExceeded {
            used: attempts_used,
            max: max_attempts,
        });
    }
    let effective = attempts_used.saturating_add(1);
    let attempts_remaining = max_attempts.saturating_sub(effective);

    if passed || already_passed {
        return Ok(FinalOutcome {
            passed,
            attempts_remaining,
            must_reset: false,
        });
    }
    Ok(FinalOutcome {
        passed: false,
        attempts_remaining,
        must_reset: effective >= max_attempts,
    })
}
