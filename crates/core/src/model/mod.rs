mod attempt;
mod ids;
mod learner;
mod module;
mod progress;
mod question;
mod simulation;
mod survey;

pub use ids::{AttemptId, LearnerId, ModuleId, ParseIdError, QuestionId};

pub use attempt::{AssessmentAttempt, AssessmentKind, AssessmentTarget, AttemptError};
pub use learner::{
    Learner, LearnerError, LearnerProfile, LearnerTotals, PasswordPolicy, PasswordPolicyError,
};
pub use module::{Course, Module, ModuleError};
pub use progress::{GradeApplied, ModuleProgress, ModuleStatus, ProgressError};
pub use question::{OptionLabel, Question, QuestionError, QuestionSet};
pub use simulation::{SimulationError, SimulationKind, SimulationResult};
pub use survey::{Difficulty, FeedbackSurvey, Rating, SurveyDraft, SurveyError};
