use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LearnerId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LearnerError {
    #[error("username cannot be empty")]
    EmptyUsername,

    #[error("username may only contain letters, digits, '.', '_' or '-'")]
    InvalidUsername,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("full name cannot be empty")]
    EmptyFullName,

    #[error("password hash cannot be empty")]
    EmptyPasswordHash,

    #[error("progress cycle must be >= 1")]
    InvalidCycle,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PasswordPolicyError {
    #[error("password must be at least {min} characters long")]
    TooShort { min: usize },

    #[error("password must contain an uppercase letter")]
    MissingUppercase,

    #[error("password must contain a lowercase letter")]
    MissingLowercase,

    #[error("password must contain a digit")]
    MissingDigit,

    #[error("password must contain a special character")]
    MissingSpecial,
}

//
// ─── PROFILE ───────────────────────────────────────────────────────────────────
//

/// Display profile of a learner, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerProfile {
    username: String,
    email: String,
    full_name: String,
    profile_picture: Option<String>,
}

impl LearnerProfile {
    /// Creates a validated profile.
    ///
    /// # Errors
    ///
    /// Returns `LearnerError` when the username, email or full name is unusable.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
    ) -> Result<Self, LearnerError> {
        let username = username.into().trim().to_owned();
        if username.is_empty() {
            return Err(LearnerError::EmptyUsername);
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(LearnerError::InvalidUsername);
        }

        let email = email.into().trim().to_ascii_lowercase();
        validate_email(&email)?;

        let full_name = full_name.into().trim().to_owned();
        if full_name.is_empty() {
            return Err(LearnerError::EmptyFullName);
        }

        Ok(Self {
            username,
            email,
            full_name,
            profile_picture: None,
        })
    }

    /// Attaches a stored profile picture reference (blank values are dropped).
    #[must_use]
    pub fn with_profile_picture(mut self, picture: Option<String>) -> Self {
        self.profile_picture = picture
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty());
        self
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn profile_picture(&self) -> Option<&str> {
        self.profile_picture.as_deref()
    }
}

fn validate_email(email: &str) -> Result<(), LearnerError> {
    let invalid = || LearnerError::InvalidEmail(email.to_owned());
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid());
    }
    Ok(())
}

//
// ─── TOTALS ────────────────────────────────────────────────────────────────────
//

/// Dashboard counters kept on the learner row.
///
/// Display only: gating decisions always re-derive from attempt history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerTotals {
    pub modules_completed: u32,
    pub total_score: u32,
}

impl LearnerTotals {
    /// Returns the totals after a module was completed for the first time.
    #[must_use]
    pub fn with_first_completion(self, percentage: u8) -> Self {
        Self {
            modules_completed: self.modules_completed.saturating_add(1),
            total_score: self.total_score.saturating_add(u32::from(percentage)),
        }
    }
}

//
// ─── LEARNER ───────────────────────────────────────────────────────────────────
//

/// A registered learner.
///
/// `cycle` starts at 1 and increases every time exhausted final-assessment
/// attempts reset the learner's progress. Attempts are stamped with the
/// cycle they were submitted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learner {
    id: LearnerId,
    profile: LearnerProfile,
    password_hash: String,
    created_at: DateTime<Utc>,
    cycle: u32,
    totals: LearnerTotals,
}

impl Learner {
    /// Creates a freshly registered learner in cycle 1 with zeroed totals.
    ///
    /// # Errors
    ///
    /// Returns `LearnerError::EmptyPasswordHash` if no credential was supplied.
    pub fn new(
        id: LearnerId,
        profile: LearnerProfile,
        password_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LearnerError> {
        Self::from_persisted(
            id,
            profile,
            password_hash,
            created_at,
            1,
            LearnerTotals::default(),
        )
    }

    /// Rehydrates a learner from storage.
    ///
    /// # Errors
    ///
    /// Returns `LearnerError` if the hash is empty or the cycle is zero.
    pub fn from_persisted(
        id: LearnerId,
        profile: LearnerProfile,
        password_hash: impl Into<String>,
        created_at: DateTime<Utc>,
        cycle: u32,
        totals: LearnerTotals,
    ) -> Result<Self, LearnerError> {
        let password_hash = password_hash.into();
        if password_hash.trim().is_empty() {
            return Err(LearnerError::EmptyPasswordHash);
        }
        if cycle == 0 {
            return Err(LearnerError::InvalidCycle);
        }
        Ok(Self {
            id,
            profile,
            password_hash,
            created_at,
            cycle,
            totals,
        })
    }

    #[must_use]
    pub fn id(&self) -> LearnerId {
        self.id
    }

    #[must_use]
    pub fn profile(&self) -> &LearnerProfile {
        &self.profile
    }

    #[must_use]
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    #[must_use]
    pub fn totals(&self) -> LearnerTotals {
        self.totals
    }
}

//
// ─── PASSWORD POLICY ───────────────────────────────────────────────────────────
//

/// Strength rules applied to plaintext passwords before the caller hashes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 12,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    /// Checks a candidate password against the policy.
    ///
    /// # Errors
    ///
    /// Returns the first rule the password violates.
    pub fn check(&self, password: &str) -> Result<(), PasswordPolicyError> {
        if password.chars().count() < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min: self.min_length,
            });
        }
        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            return Err(PasswordPolicyError::MissingUppercase);
        }
        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            return Err(PasswordPolicyError::MissingLowercase);
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }
        if self.require_special && password.chars().all(char::is_alphanumeric) {
            return Err(PasswordPolicyError::MissingSpecial);
        }
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn profile() -> LearnerProfile {
        LearnerProfile::new("jdelacruz", "J.DelaCruz@Example.org", "Juan Dela Cruz").unwrap()
    }

    #[test]
    fn profile_normalizes_email_and_trims() {
        let p = LearnerProfile::new("  ana_r ", " Ana@Mail.COM ", " Ana Reyes ").unwrap();
        assert_eq!(p.username(), "ana_r");
        assert_eq!(p.email(), "ana@mail.com");
        assert_eq!(p.full_name(), "Ana Reyes");
    }

    #[test]
    fn profile_rejects_bad_fields() {
        assert_eq!(
            LearnerProfile::new(" ", "a@b.co", "A").unwrap_err(),
            LearnerError::EmptyUsername
        );
        assert_eq!(
            LearnerProfile::new("a b", "a@b.co", "A").unwrap_err(),
            LearnerError::InvalidUsername
        );
        assert!(matches!(
            LearnerProfile::new("ab", "not-an-email", "A").unwrap_err(),
            LearnerError::InvalidEmail(_)
        ));
        assert!(matches!(
            LearnerProfile::new("ab", "a@@b.co", "A").unwrap_err(),
            LearnerError::InvalidEmail(_)
        ));
        assert_eq!(
            LearnerProfile::new("ab", "a@b.co", "  ").unwrap_err(),
            LearnerError::EmptyFullName
        );
    }

    #[test]
    fn blank_profile_picture_is_dropped() {
        let p = profile().with_profile_picture(Some("   ".into()));
        assert_eq!(p.profile_picture(), None);
        let p = profile().with_profile_picture(Some("avatars/7.png".into()));
        assert_eq!(p.profile_picture(), Some("avatars/7.png"));
    }

    #[test]
    fn new_learner_starts_in_first_cycle() {
        let learner = Learner::new(LearnerId::new(1), profile(), "$argon2id$stub", fixed_now())
            .unwrap();
        assert_eq!(learner.cycle(), 1);
        assert_eq!(learner.totals(), LearnerTotals::default());
    }

    #[test]
    fn learner_requires_hash_and_cycle() {
        let err = Learner::new(LearnerId::new(1), profile(), "  ", fixed_now()).unwrap_err();
        assert_eq!(err, LearnerError::EmptyPasswordHash);

        let err = Learner::from_persisted(
            LearnerId::new(1),
            profile(),
            "hash",
            fixed_now(),
            0,
            LearnerTotals::default(),
        )
        .unwrap_err();
        assert_eq!(err, LearnerError::InvalidCycle);
    }

    #[test]
    fn totals_accumulate_first_completions() {
        let totals = LearnerTotals::default()
            .with_first_completion(80)
            .with_first_completion(100);
        assert_eq!(totals.modules_completed, 2);
        assert_eq!(totals.total_score, 180);
    }

    #[test]
    fn password_policy_defaults() {
        let policy = PasswordPolicy::default();
        assert!(policy.check("CorrectHorse42").is_ok());
        assert_eq!(
            policy.check("Short1").unwrap_err(),
            PasswordPolicyError::TooShort { min: 12 }
        );
        assert_eq!(
            policy.check("alllowercase12").unwrap_err(),
            PasswordPolicyError::MissingUppercase
        );
        assert_eq!(
            policy.check("ALLUPPERCASE12").unwrap_err(),
            PasswordPolicyError::MissingLowercase
        );
        assert_eq!(
            policy.check("NoDigitsAtAllHere").unwrap_err(),
            PasswordPolicyError::MissingDigit
        );
    }

    #[test]
    fn password_policy_special_is_opt_in() {
        let policy = PasswordPolicy {
            require_special: true,
            ..PasswordPolicy::default()
        };
        assert_eq!(
            policy.check("CorrectHorse42").unwrap_err(),
            PasswordPolicyError::MissingSpecial
        );
        assert!(policy.check("CorrectHorse42!").is_ok());
    }
}
