//! Course configuration.
//!
//! Values resolve in this order:
//! 1. Environment variables (highest priority)
//! 2. The config file named by `AWARENESS_CONFIG` or passed explicitly
//! 3. Defaults (lowest priority)
//!
//! Every key is optional. Invalid environment values are logged and ignored.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use awareness_core::model::PasswordPolicy;
use awareness_core::policy::AssessmentPolicy;

use crate::error::ConfigError;

pub const ENV_CONFIG: &str = "AWARENESS_CONFIG";
pub const ENV_DB_URL: &str = "AWARENESS_DB_URL";
pub const ENV_CATALOG: &str = "AWARENESS_CATALOG";
pub const ENV_FINAL_PASSING_SCORE: &str = "AWARENESS_FINAL_PASSING_SCORE";
pub const ENV_KNOWLEDGE_CHECK_PASSING_SCORE: &str = "AWARENESS_KNOWLEDGE_CHECK_PASSING_SCORE";
pub const ENV_MAX_FINAL_ATTEMPTS: &str = "AWARENESS_MAX_FINAL_ATTEMPTS";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CourseConfig {
    /// sqlx connection string.
    pub database_url: String,
    /// TOML course catalog used by `seed`.
    pub catalog_path: PathBuf,
    pub policy: PolicySection,
    pub password: PasswordPolicy,
}

impl Default for CourseConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:awareness.db".to_string(),
            catalog_path: PathBuf::from("fixtures/course.toml"),
            policy: PolicySection::default(),
            password: PasswordPolicy::default(),
        }
    }
}

/// `[policy]` table. Validated into an `AssessmentPolicy` on use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicySection {
    pub knowledge_check_passing_score: u8,
    pub final_passing_score: u8,
    pub max_final_attempts: u32,
    pub knowledge_check_questions: usize,
    pub final_questions: usize,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            knowledge_check_passing_score: AssessmentPolicy::DEFAULT_PASSING_SCORE,
            final_passing_score: AssessmentPolicy::DEFAULT_PASSING_SCORE,
            max_final_attempts: AssessmentPolicy::DEFAULT_MAX_FINAL_ATTEMPTS,
            knowledge_check_questions: AssessmentPolicy::DEFAULT_KNOWLEDGE_CHECK_QUESTIONS,
            final_questions: AssessmentPolicy::DEFAULT_FINAL_QUESTIONS,
        }
    }
}

impl CourseConfig {
    /// Loads the file (explicit path, else `AWARENESS_CONFIG`, else none)
    /// and applies process environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a named file cannot be read or parsed. A
    /// missing file is only an error when it was named explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match env::var_os(ENV_CONFIG) {
                Some(path) => Self::load_from_file(Path::new(&path))?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Io` or `ConfigError::Parse`.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Applies overrides read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(ENV_DB_URL) {
            if val.trim().is_empty() {
                warn!("{ENV_DB_URL} is empty, keeping {}", self.database_url);
            } else {
                self.database_url = val;
            }
        }

        if let Some(val) = lookup(ENV_CATALOG) {
            if val.trim().is_empty() {
                warn!("{ENV_CATALOG} is empty, keeping {}", self.catalog_path.display());
            } else {
                self.catalog_path = PathBuf::from(val);
            }
        }

        if let Some(val) = lookup(ENV_FINAL_PASSING_SCORE) {
            match parse_score(&val) {
                Some(score) => self.policy.final_passing_score = score,
                None => warn!(
                    "invalid {ENV_FINAL_PASSING_SCORE} value {val:?} (expected 0-100), using {}",
                    self.policy.final_passing_score
                ),
            }
        }

        if let Some(val) = lookup(ENV_KNOWLEDGE_CHECK_PASSING_SCORE) {
            match parse_score(&val) {
                Some(score) => self.policy.knowledge_check_passing_score = score,
                None => warn!(
                    "invalid {ENV_KNOWLEDGE_CHECK_PASSING_SCORE} value {val:?} (expected 0-100), using {}",
                    self.policy.knowledge_check_passing_score
                ),
            }
        }

        if let Some(val) = lookup(ENV_MAX_FINAL_ATTEMPTS) {
            match val.trim().parse::<u32>() {
                Ok(n) if n >= 1 => self.policy.max_final_attempts = n,
                _ => warn!(
                    "invalid {ENV_MAX_FINAL_ATTEMPTS} value {val:?} (expected >= 1), using {}",
                    self.policy.max_final_attempts
                ),
            }
        }
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Policy` if the `[policy]` values are out of range.
    pub fn assessment_policy(&self) -> Result<AssessmentPolicy, ConfigError> {
        let p = self.policy;
        Ok(AssessmentPolicy::new(
            p.knowledge_check_passing_score,
            p.final_passing_score,
            p.max_final_attempts,
            p.knowledge_check_questions,
            p.final_questions,
        )?)
    }
}

fn parse_score(val: &str) -> Option<u8> {
    val.trim().parse::<u8>().ok().filter(|s| *s <= 100)
}
