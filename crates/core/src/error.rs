use thiserror::Error;

use crate::gate::GateError;
use crate::grading::GradeError;
use crate::lifecycle::LifecycleError;
use crate::model::{
    AttemptError, LearnerError, ModuleError, PasswordPolicyError, ProgressError, QuestionError,
    SimulationError, SurveyError,
};
use crate::policy::PolicyError;
use crate::selection::SelectionError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Learner(#[from] LearnerError),
    #[error(transparent)]
    PasswordPolicy(#[from] PasswordPolicyError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Survey(#[from] SurveyError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Grade(#[from] GradeError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
