#![forbid(unsafe_code)]

pub mod app_services;
pub mod assessment_service;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod final_assessment;
pub mod gatekeeper;
pub mod learner_service;
pub mod locks;
pub mod progress_tracker;
pub mod question_bank;
pub mod simulation_service;
pub mod survey_service;

pub use awareness_core::Clock;

pub use app_services::AppServices;
pub use assessment_service::{AssessmentService, FinalAssessmentOutcome, KnowledgeCheckOutcome};
pub use catalog::CourseCatalog;
pub use config::CourseConfig;
pub use dashboard::{Activity, ActivityKind, Dashboard, DashboardService, ModuleSummary};
pub use error::{
    AppServicesError, AssessmentError, BankError, CatalogError, ConfigError, LearnerServiceError,
    SimulationServiceError, SurveyServiceError,
};
pub use final_assessment::{FinalAssessmentLifecycle, FinalSubmission};
pub use gatekeeper::GateKeeper;
pub use learner_service::{LearnerService, PasswordHasher};
pub use locks::{SubmissionKey, SubmissionLocks};
pub use progress_tracker::{ProgressTracker, RecordedCheck};
pub use question_bank::QuestionBank;
pub use simulation_service::SimulationService;
pub use survey_service::{SurveyEligibility, SurveyService};
