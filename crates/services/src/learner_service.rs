use std::sync::Arc;

use tracing::info;

use awareness_core::model::{Learner, LearnerId, LearnerProfile, PasswordPolicy};
use awareness_core::time::Clock;
use storage::repository::{LearnerRepository, StorageError};

use crate::error::LearnerServiceError;

/// Turns an accepted plaintext password into the stored credential.
///
/// Hashing lives with the web layer; this crate only stores the result.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
}

/// Registration and lookup of learners.
#[derive(Clone)]
pub struct LearnerService {
    clock: Clock,
    policy: PasswordPolicy,
    hasher: Arc<dyn PasswordHasher>,
    learners: Arc<dyn LearnerRepository>,
}

impl LearnerService {
    #[must_use]
    pub fn new(
        clock: Clock,
        hasher: Arc<dyn PasswordHasher>,
        learners: Arc<dyn LearnerRepository>,
    ) -> Self {
        Self {
            clock,
            policy: PasswordPolicy::default(),
            hasher,
            learners,
        }
    }

    #[must_use]
    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validates the profile and password, then stores a new learner.
    ///
    /// # Errors
    ///
    /// Returns `LearnerServiceError::WeakPassword` or `Learner` for invalid
    /// input, and `AlreadyRegistered` when the username or email is taken.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> Result<Learner, LearnerServiceError> {
        let profile = LearnerProfile::new(username, email, full_name)?;
        self.policy.check(password)?;

        let hash = self.hasher.hash(password);
        let learner = match self
            .learners
            .create_learner(&profile, &hash, self.clock.now())
            .await
        {
            Ok(learner) => learner,
            Err(StorageError::Conflict) => return Err(LearnerServiceError::AlreadyRegistered),
            Err(e) => return Err(e.into()),
        };
        info!(learner = %learner.id(), "learner registered");
        Ok(learner)
    }

    /// # Errors
    ///
    /// Returns `LearnerServiceError::Storage` with `NotFound` for an unknown id.
    pub async fn get(&self, id: LearnerId) -> Result<Learner, LearnerServiceError> {
        Ok(self.learners.get_learner(id).await?)
    }

    /// # Errors
    ///
    /// Returns `LearnerServiceError::Storage` on backend failures.
    pub async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Learner>, LearnerServiceError> {
        Ok(self.learners.find_by_username(username).await?)
    }
}
