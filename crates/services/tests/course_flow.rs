use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use awareness_core::grading::{Answers, GradeResult};
use awareness_core::lifecycle::{FinalOutcome, FinalState};
use awareness_core::model::{
    Difficulty, LearnerId, LearnerProfile, ModuleId, OptionLabel, Question, QuestionId,
    SurveyDraft,
};
use awareness_core::policy::AssessmentPolicy;
use awareness_core::selection::{Selection, SelectionTier};
use awareness_core::time::fixed_now;
use services::{
    ActivityKind, AppServices, AssessmentError, Clock, CourseCatalog, SubmissionKey,
    SubmissionLocks, SurveyServiceError,
};
use storage::repository::{
    AttemptRepository, LearnerRepository, ProgressRepository, QuestionBankRepository, Storage,
};

const CONTENT_MODULES: u64 = 7;

fn catalog() -> CourseCatalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/course.toml");
    CourseCatalog::load(&path).unwrap()
}

/// Threshold 80, three final attempts, five knowledge-check and ten final
/// questions.
fn policy() -> AssessmentPolicy {
    AssessmentPolicy::new(80, 80, 3, 5, 10).unwrap()
}

async fn setup_with_seed(seed: u64) -> (AppServices, LearnerId) {
    let services = AppServices::in_memory(policy(), Clock::fixed(fixed_now())).with_seed(seed);
    enroll(services).await
}

async fn setup_with_locks(locks: Arc<SubmissionLocks>) -> (AppServices, LearnerId) {
    let services = AppServices::from_storage_with_locks(
        Storage::in_memory(),
        policy(),
        Clock::fixed(fixed_now()),
        locks,
    )
    .with_seed(7);
    enroll(services).await
}

async fn enroll(services: AppServices) -> (AppServices, LearnerId) {
    services.seed(&catalog()).await.unwrap();
    let profile = LearnerProfile::new("learner", "learner@example.com", "Test Learner").unwrap();
    let learner = services
        .storage()
        .learners
        .create_learner(&profile, "hash", fixed_now())
        .await
        .unwrap();
    (services, learner.id())
}

async fn setup() -> (AppServices, LearnerId) {
    setup_with_seed(7).await
}

fn wrong(question: &Question) -> OptionLabel {
    OptionLabel::ALL
        .into_iter()
        .find(|label| *label != question.correct())
        .unwrap()
}

/// Answers the first `correct` questions right and the rest wrong.
fn answer(selection: &Selection, correct: usize) -> (Vec<QuestionId>, Answers) {
    let ids = selection.questions.iter().map(Question::id).collect();
    let answers = selection
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let label = if i < correct { q.correct() } else { wrong(q) };
            (q.id(), label)
        })
        .collect();
    (ids, answers)
}

async fn take_check(
    services: &AppServices,
    learner: LearnerId,
    module: u64,
    correct: usize,
) -> GradeResult {
    let module = ModuleId::new(module);
    let assessments = services.assessments();
    let selection = assessments
        .start_knowledge_check(learner, module)
        .await
        .unwrap();
    let (ids, answers) = answer(&selection, correct);
    assessments
        .submit_knowledge_check(learner, module, &ids, &answers, 60)
        .await
        .unwrap()
        .grade
}

async fn complete_course(services: &AppServices, learner: LearnerId) {
    for module in 1..=CONTENT_MODULES {
        let grade = take_check(services, learner, module, 5).await;
        assert!(grade.passed);
    }
}

async fn take_final(services: &AppServices, learner: LearnerId, correct: usize) -> FinalOutcome {
    let assessments = services.assessments();
    let selection = assessments.start_final_assessment(learner).await.unwrap();
    assert_eq!(selection.len(), 10);
    let (ids, answers) = answer(&selection, correct);
    assessments
        .submit_final_assessment(learner, &ids, &answers, 600)
        .await
        .unwrap()
        .submission
        .outcome
}

fn survey() -> SurveyDraft {
    SurveyDraft {
        program_rating: 4,
        content_quality: 5,
        difficulty_level: Difficulty::Easy,
        recommendation_likelihood: 4,
        comments: None,
    }
}

//
// ─── KNOWLEDGE CHECKS ──────────────────────────────────────────────────────────
//

#[tokio::test]
async fn passing_module_one_at_eighty_percent_opens_module_two() {
    let (services, learner) = setup().await;

    let grade = take_check(&services, learner, 1, 4).await;
    assert_eq!(grade.percentage, 80);
    assert!(grade.passed);

    let progress = services.progress();
    assert!(progress.is_module_completed(learner, ModuleId::new(1)).await.unwrap());
    assert!(services
        .gate()
        .can_access(learner, ModuleId::new(2))
        .await
        .unwrap()
        .allowed);
}

#[tokio::test]
async fn failing_first_leaves_module_incomplete_and_rotates_to_set_two() {
    let (services, learner) = setup().await;

    let grade = take_check(&services, learner, 1, 3).await;
    assert_eq!(grade.percentage, 60);
    assert!(!grade.passed);
    assert!(!services
        .progress()
        .is_module_completed(learner, ModuleId::new(1))
        .await
        .unwrap());

    let denied = services
        .gate()
        .can_access(learner, ModuleId::new(2))
        .await
        .unwrap();
    assert_eq!(denied.blocking_module, Some(ModuleId::new(1)));

    let retake = services
        .assessments()
        .start_knowledge_check(learner, ModuleId::new(1))
        .await
        .unwrap();
    assert_eq!(retake.tier, SelectionTier::Fixed(2));
    assert_eq!(retake.attempt_number, 2);
}

#[tokio::test]
async fn first_attempt_selection_is_the_same_for_any_seed() {
    let (a, learner_a) = setup_with_seed(1).await;
    let (b, learner_b) = setup_with_seed(99).await;

    let ids = |s: Selection| s.questions.iter().map(Question::id).collect::<Vec<_>>();
    let first = a
        .assessments()
        .start_knowledge_check(learner_a, ModuleId::new(1))
        .await
        .unwrap();
    let again = a
        .assessments()
        .start_knowledge_check(learner_a, ModuleId::new(1))
        .await
        .unwrap();
    let other = b
        .assessments()
        .start_knowledge_check(learner_b, ModuleId::new(1))
        .await
        .unwrap();

    assert_eq!(first.tier, SelectionTier::Fixed(1));
    assert_eq!(ids(first.clone()), ids(again));
    assert_eq!(ids(first), ids(other));
}

#[tokio::test]
async fn third_retake_draws_randomly_from_both_sets() {
    let (services, learner) = setup().await;
    take_check(&services, learner, 1, 0).await;
    take_check(&services, learner, 1, 1).await;

    let union: HashSet<QuestionId> = services
        .storage()
        .questions
        .question_sets(ModuleId::new(1))
        .await
        .unwrap()
        .iter()
        .flat_map(|s| s.questions().iter().map(Question::id))
        .collect();
    assert_eq!(union.len(), 10);

    let third = services
        .assessments()
        .start_knowledge_check(learner, ModuleId::new(1))
        .await
        .unwrap();
    assert_eq!(third.tier, SelectionTier::Random);
    assert_eq!(third.attempt_number, 3);
    assert_eq!(third.len(), 5);
    let chosen: HashSet<QuestionId> = third.questions.iter().map(Question::id).collect();
    assert_eq!(chosen.len(), 5);
    assert!(chosen.is_subset(&union));
}

#[tokio::test]
async fn locked_module_cannot_start_a_check() {
    let (services, learner) = setup().await;
    let err = services
        .assessments()
        .start_knowledge_check(learner, ModuleId::new(3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssessmentError::AccessDenied { blocking_module } if blocking_module == ModuleId::new(2)
    ));
}

#[tokio::test]
async fn incomplete_submission_records_nothing() {
    let (services, learner) = setup().await;
    let module = ModuleId::new(1);
    let assessments = services.assessments();
    let selection = assessments
        .start_knowledge_check(learner, module)
        .await
        .unwrap();
    let (ids, mut answers) = answer(&selection, 5);
    answers.remove(&ids[2]);

    let err = assessments
        .submit_knowledge_check(learner, module, &ids, &answers, 60)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssessmentError::IncompleteSubmission { ref missing } if missing == &vec![ids[2]]
    ));
    let history = services
        .storage()
        .attempts
        .attempts_for_learner(learner)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn concurrent_passes_count_the_module_once() {
    let (services, learner) = setup().await;
    let module = ModuleId::new(1);
    let selection = services
        .assessments()
        .start_knowledge_check(learner, module)
        .await
        .unwrap();
    let (ids, answers) = answer(&selection, 5);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let assessments = services.assessments();
        let ids = ids.clone();
        let answers = answers.clone();
        handles.push(tokio::spawn(async move {
            assessments
                .submit_knowledge_check(learner, module, &ids, &answers, 60)
                .await
        }));
    }
    let mut first_completions = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().first_completion {
            first_completions += 1;
        }
    }
    assert_eq!(first_completions, 1);

    let stored = services.storage().learners.get_learner(learner).await.unwrap();
    assert_eq!(stored.totals().modules_completed, 1);
    assert_eq!(stored.totals().total_score, 100);
}

//
// ─── GATING ────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn access_to_k_matches_completion_of_k_minus_one() {
    let (services, learner) = setup().await;
    let progress = services.progress();
    for module in [2, 4, 5] {
        progress
            .record_knowledge_check(
                learner,
                ModuleId::new(module),
                1,
                &GradeResult::from_counts(5, 5, 80),
                30,
            )
            .await
            .unwrap();
    }

    let gate = services.gate();
    for k in 2..=CONTENT_MODULES {
        let allowed = gate.can_access(learner, ModuleId::new(k)).await.unwrap().allowed;
        let previous = ModuleId::new(k - 1);
        let first = progress.is_module_completed(learner, previous).await.unwrap();
        let second = progress.is_module_completed(learner, previous).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(allowed, first, "module {k}");
    }
}

//
// ─── FINAL ASSESSMENT ──────────────────────────────────────────────────────────
//

#[tokio::test]
async fn final_requires_every_content_module() {
    let (services, learner) = setup().await;
    for module in 1..=3 {
        take_check(&services, learner, module, 5).await;
    }
    let err = services
        .assessments()
        .start_final_assessment(learner)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AssessmentError::AccessDenied { blocking_module } if blocking_module == ModuleId::new(4)
    ));
}

#[tokio::test]
async fn three_failed_finals_reset_progress() {
    let (services, learner) = setup().await;
    complete_course(&services, learner).await;

    let first = take_final(&services, learner, 5).await;
    assert_eq!(
        first,
        FinalOutcome {
            passed: false,
            attempts_remaining: 2,
            must_reset: false
        }
    );
    let second = take_final(&services, learner, 6).await;
    assert_eq!(second.attempts_remaining, 1);
    assert!(!second.must_reset);

    let third = take_final(&services, learner, 7).await;
    assert_eq!(
        third,
        FinalOutcome {
            passed: false,
            attempts_remaining: 0,
            must_reset: true
        }
    );

    let gate = services.gate();
    assert!(gate.can_access(learner, ModuleId::new(1)).await.unwrap().allowed);
    assert!(!gate.can_access(learner, ModuleId::new(2)).await.unwrap().allowed);
    assert!(services
        .storage()
        .progress
        .list_progress(learner)
        .await
        .unwrap()
        .is_empty());

    // History survives the reset for auditing.
    let history = services
        .storage()
        .attempts
        .attempts_for_learner(learner)
        .await
        .unwrap();
    assert_eq!(history.len(), 7 + 3);

    let stored = services.storage().learners.get_learner(learner).await.unwrap();
    assert_eq!(stored.cycle(), 2);
    assert_eq!(stored.totals().modules_completed, 0);
    assert_eq!(
        services.final_lifecycle().state(learner).await.unwrap(),
        FinalState::NotStarted
    );

    let err = services
        .assessments()
        .start_final_assessment(learner)
        .await
        .unwrap_err();
    assert!(matches!(err, AssessmentError::AccessDenied { .. }));
}

/// Lets spawned submissions run until they block on a held lock.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn pass_queued_behind_an_exhausting_final_is_rejected() {
    let locks = Arc::new(SubmissionLocks::new());
    let (services, learner) = setup_with_locks(Arc::clone(&locks)).await;
    complete_course(&services, learner).await;
    take_final(&services, learner, 5).await;
    take_final(&services, learner, 6).await;

    let assessments = services.assessments();
    let selection = assessments.start_final_assessment(learner).await.unwrap();
    let (fail_ids, fail_answers) = answer(&selection, 7);
    let (pass_ids, pass_answers) = answer(&selection, 10);

    let held = locks.acquire(SubmissionKey::final_assessment(learner)).await;
    let failing = {
        let assessments = Arc::clone(&assessments);
        tokio::spawn(async move {
            assessments
                .submit_final_assessment(learner, &fail_ids, &fail_answers, 600)
                .await
        })
    };
    settle().await;
    let passing = {
        let assessments = Arc::clone(&assessments);
        tokio::spawn(async move {
            assessments
                .submit_final_assessment(learner, &pass_ids, &pass_answers, 600)
                .await
        })
    };
    settle().await;
    drop(held);

    let failing = failing.await.unwrap().unwrap();
    assert_eq!(failing.submission.new_cycle, Some(2));
    let err = passing.await.unwrap().unwrap_err();
    assert!(matches!(err, AssessmentError::ProgressReset));

    assert!(services
        .progress()
        .completed_modules(learner)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        services.final_lifecycle().state(learner).await.unwrap(),
        FinalState::NotStarted
    );
    assert!(matches!(
        services.surveys().submit(learner, survey()).await,
        Err(SurveyServiceError::NotEligible)
    ));
}

#[tokio::test]
async fn knowledge_check_queued_behind_a_reset_is_rejected() {
    let locks = Arc::new(SubmissionLocks::new());
    let (services, learner) = setup_with_locks(Arc::clone(&locks)).await;
    complete_course(&services, learner).await;
    take_final(&services, learner, 5).await;
    take_final(&services, learner, 6).await;

    let module = ModuleId::new(5);
    let assessments = services.assessments();
    let selection = assessments
        .start_knowledge_check(learner, module)
        .await
        .unwrap();
    let (ids, answers) = answer(&selection, 5);

    let held = locks
        .acquire(SubmissionKey::knowledge_check(learner, module))
        .await;
    let retake = {
        let assessments = Arc::clone(&assessments);
        tokio::spawn(async move {
            assessments
                .submit_knowledge_check(learner, module, &ids, &answers, 60)
                .await
        })
    };
    settle().await;

    let third = take_final(&services, learner, 7).await;
    assert!(third.must_reset);
    drop(held);

    let err = retake.await.unwrap().unwrap_err();
    assert!(matches!(err, AssessmentError::ProgressReset));

    let gate = services.gate();
    assert!(!gate.can_access(learner, ModuleId::new(2)).await.unwrap().allowed);
    assert!(!gate.can_access(learner, ModuleId::new(6)).await.unwrap().allowed);
    assert!(services
        .progress()
        .completed_modules(learner)
        .await
        .unwrap()
        .is_empty());
    let stored = services.storage().learners.get_learner(learner).await.unwrap();
    assert_eq!(stored.totals().modules_completed, 0);
}

#[tokio::test]
async fn final_retakes_rotate_through_chunks_then_random() {
    let (services, learner) = setup().await;
    complete_course(&services, learner).await;
    let assessments = services.assessments();

    let mut tiers = Vec::new();
    for _ in 0..3 {
        let selection = assessments.start_final_assessment(learner).await.unwrap();
        tiers.push(selection.tier);
        let (ids, answers) = answer(&selection, 0);
        assessments
            .submit_final_assessment(learner, &ids, &answers, 600)
            .await
            .unwrap();
    }
    assert_eq!(
        tiers,
        vec![
            SelectionTier::Fixed(1),
            SelectionTier::Fixed(2),
            SelectionTier::Random
        ]
    );
}

//
// ─── SURVEY & DASHBOARD ────────────────────────────────────────────────────────
//

#[tokio::test]
async fn survey_opens_after_pass_and_accepts_one_submission() {
    let (services, learner) = setup().await;
    let surveys = services.surveys();
    assert!(matches!(
        surveys.submit(learner, survey()).await,
        Err(SurveyServiceError::NotEligible)
    ));

    complete_course(&services, learner).await;
    let outcome = take_final(&services, learner, 8).await;
    assert!(outcome.passed);

    let mut handles = Vec::new();
    for _ in 0..2 {
        let surveys = Arc::clone(&surveys);
        handles.push(tokio::spawn(
            async move { surveys.submit(learner, survey()).await },
        ));
    }
    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(SurveyServiceError::AlreadySubmitted) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 1);
    assert!(surveys.certificate_eligible(learner).await.unwrap());
}

#[tokio::test]
async fn dashboard_reflects_progress_and_recent_activity() {
    let (services, learner) = setup().await;
    take_check(&services, learner, 1, 2).await;
    take_check(&services, learner, 1, 5).await;
    take_check(&services, learner, 2, 4).await;
    services
        .simulations()
        .record(learner, "quid_pro_quo", 3, 4, 90)
        .await
        .unwrap();

    let dashboard = services.dashboard().dashboard(learner).await.unwrap();
    assert_eq!(dashboard.modules.len(), 8);
    assert_eq!(dashboard.completed_count, 2);
    assert_eq!(dashboard.totals.modules_completed, 2);
    assert_eq!(dashboard.totals.total_score, 180);
    // 11 correct out of 15 questions.
    assert_eq!(dashboard.average_score, Some(73));
    assert!(dashboard.modules[2].accessible);
    assert!(!dashboard.modules[3].accessible);
    assert!(!dashboard.final_accessible);
    assert_eq!(dashboard.final_state, FinalState::NotStarted);
    assert!(!dashboard.certificate_eligible);

    // Three checks, two completions and one simulation, capped at five.
    assert_eq!(dashboard.recent_activity.len(), 5);
    assert_eq!(dashboard.recent_activity[0].kind, ActivityKind::KnowledgeCheck);
    assert_eq!(
        services.simulations().results(learner).await.unwrap().len(),
        1
    );
}
