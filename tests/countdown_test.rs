use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use resultmate_backend::database::{ExamStore, MemoryExamStore};
use resultmate_backend::error::{Error, Result};
use resultmate_backend::models::exam::{Exam, ExamSettings, NewExam};
use resultmate_backend::models::question::Question;
use resultmate_backend::models::submission::{ExamSubmission, NewSubmission, SubmitTrigger};
use resultmate_backend::services::attempt_service::{AttemptService, AttemptView, OpenOutcome};
use resultmate_backend::services::attempt_session::{AttemptPhase, CountdownPolicy, Direction};
use resultmate_backend::services::submission_service::SubmissionService;
use uuid::Uuid;

/// Memory store whose first `failures` submissions stall, then fail.
struct FlakyStore {
    inner: MemoryExamStore,
    failures_left: AtomicUsize,
    stall: Duration,
    submit_calls: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize, stall: Duration) -> Self {
        Self {
            inner: MemoryExamStore::new(),
            failures_left: AtomicUsize::new(failures),
            stall,
            submit_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ExamStore for FlakyStore {
    async fn get_exams_for_class(&self, class_id: Uuid) -> Result<Vec<Exam>> {
        self.inner.get_exams_for_class(class_id).await
    }

    async fn get_exam(&self, exam_id: Uuid) -> Result<Option<Exam>> {
        self.inner.get_exam(exam_id).await
    }

    async fn get_exam_submission(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<ExamSubmission>> {
        self.inner.get_exam_submission(exam_id, student_id).await
    }

    async fn submit_exam(&self, submission: NewSubmission) -> Result<ExamSubmission> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            tokio::time::sleep(self.stall).await;
            return Err(Error::Internal("pool timed out".into()));
        }
        self.inner.submit_exam(submission).await
    }

    async fn get_exam_submissions_for_teacher(&self, exam_id: Uuid) -> Result<Vec<ExamSubmission>> {
        self.inner.get_exam_submissions_for_teacher(exam_id).await
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam> {
        self.inner.create_exam(exam).await
    }

    async fn delete_exam(&self, exam_id: Uuid) -> Result<bool> {
        self.inner.delete_exam(exam_id).await
    }
}

/// Live exam that closes in five minutes but allows thirty.
async fn closing_exam(store: &MemoryExamStore) -> Exam {
    store.create_exam(exam_lasting(30)).await.unwrap()
}

fn exam_lasting(duration_minutes: i32) -> NewExam {
    let now = Utc::now();
    NewExam {
        class_id: Uuid::new_v4(),
        title: "Late start".into(),
        description: None,
        start_time: now - ChronoDuration::minutes(25),
        end_time: now + ChronoDuration::minutes(5),
        duration_minutes,
        questions: (1..=2)
            .map(|id| Question {
                id,
                text: format!("Q{id}"),
                options: ["a".into(), "b".into(), "c".into(), "d".into()],
                correct_option_index: 0,
                marks: 1,
            })
            .collect(),
        settings: ExamSettings {
            shuffle_questions: false,
            show_result_immediately: true,
            allow_retake: false,
        },
        is_published: true,
        created_by: Uuid::new_v4(),
    }
}

fn service<S: ExamStore + 'static>(store: &Arc<S>, policy: CountdownPolicy) -> AttemptService {
    let submissions = SubmissionService::new(store.clone(), 300);
    AttemptService::new(store.clone(), submissions, policy)
}

fn attempt(outcome: OpenOutcome) -> AttemptView {
    match outcome {
        OpenOutcome::InProgress { attempt } => attempt,
        other => panic!("expected an attempt in progress, got {other:?}"),
    }
}

async fn stored(
    store: &MemoryExamStore,
    exam_id: Uuid,
    student_id: Uuid,
) -> Option<ExamSubmission> {
    store.get_exam_submission(exam_id, student_id).await.unwrap()
}

async fn wait_for_submission(
    store: &MemoryExamStore,
    exam_id: Uuid,
    student_id: Uuid,
) -> ExamSubmission {
    for _ in 0..100 {
        if let Some(submission) = stored(store, exam_id, student_id).await {
            return submission;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no submission was stored");
}

#[tokio::test(start_paused = true)]
async fn timer_auto_submits_after_the_full_duration() {
    let store = Arc::new(MemoryExamStore::new());
    let exam = closing_exam(&store).await;
    let service = service(&store, CountdownPolicy::default());
    let student = Uuid::new_v4();

    let view = attempt(service.open(exam.id, student, Utc::now()).await.unwrap());
    assert_eq!(view.remaining_seconds, 1800);
    service.select(exam.id, student, 1, 0).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1799)).await;
    assert_eq!(service.active_count(), 1);
    assert!(stored(&store, exam.id, student).await.is_none());
    let view = service.view(exam.id, student).await.unwrap();
    assert!(view.remaining_seconds <= 2);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let submission = wait_for_submission(&store, exam.id, student).await;
    assert_eq!(submission.trigger, SubmitTrigger::Timeout);
    assert_eq!(submission.score, 1);
    assert_eq!(submission.total_marks, 2);
    assert_eq!(service.active_count(), 0);

    match service.open(exam.id, student, Utc::now()).await.unwrap() {
        OpenOutcome::ViewingResult { review, .. } => {
            assert_eq!(review.unwrap().trigger, SubmitTrigger::Timeout)
        }
        other => panic!("expected result state, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn clamped_policy_caps_the_countdown_at_the_window() {
    let store = Arc::new(MemoryExamStore::new());
    let exam = closing_exam(&store).await;
    let service = service(
        &store,
        CountdownPolicy {
            clamp_to_window: true,
        },
    );

    let view = attempt(service.open(exam.id, Uuid::new_v4(), Utc::now()).await.unwrap());
    assert!(view.remaining_seconds <= 300);
    assert!(view.remaining_seconds >= 295);
}

#[tokio::test(start_paused = true)]
async fn manual_submit_stops_the_timer() {
    let store = Arc::new(MemoryExamStore::new());
    let exam = closing_exam(&store).await;
    let service = service(&store, CountdownPolicy::default());
    let student = Uuid::new_v4();

    service.open(exam.id, student, Utc::now()).await.unwrap();
    service.navigate(exam.id, student, Direction::Forward).await.unwrap();
    let receipt = service.submit(exam.id, student, Utc::now()).await.unwrap();
    assert_eq!(receipt.trigger, SubmitTrigger::Manual);

    tokio::time::sleep(Duration::from_secs(2000)).await;
    let submission = stored(&store, exam.id, student).await.unwrap();
    assert_eq!(submission.trigger, SubmitTrigger::Manual);
    assert_eq!(submission.id, receipt.submission_id);
}

#[tokio::test(start_paused = true)]
async fn abandoned_attempts_are_never_submitted() {
    let store = Arc::new(MemoryExamStore::new());
    let exam = closing_exam(&store).await;
    let service = service(&store, CountdownPolicy::default());
    let student = Uuid::new_v4();

    service.open(exam.id, student, Utc::now()).await.unwrap();
    service.select(exam.id, student, 2, 3).await.unwrap();
    service.abandon(exam.id, student).unwrap();

    tokio::time::sleep(Duration::from_secs(1900)).await;
    assert!(stored(&store, exam.id, student).await.is_none());
    assert_eq!(service.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_submits_store_exactly_once() {
    let store = Arc::new(MemoryExamStore::new());
    let exam = closing_exam(&store).await;
    let service = service(&store, CountdownPolicy::default());
    let student = Uuid::new_v4();

    service.open(exam.id, student, Utc::now()).await.unwrap();
    service.navigate(exam.id, student, Direction::Forward).await.unwrap();

    let (first, second) = tokio::join!(
        service.submit(exam.id, student, Utc::now()),
        service.submit(exam.id, student, Utc::now()),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::Conflict(_) | Error::NotFound(_))));

    let all = store
        .get_exam_submissions_for_teacher(exam.id)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn timer_expiry_and_manual_submit_at_the_same_instant() {
    let store = Arc::new(MemoryExamStore::new());
    let exam = store.create_exam(exam_lasting(1)).await.unwrap();
    let service = service(&store, CountdownPolicy::default());
    let student = Uuid::new_v4();

    service.open(exam.id, student, Utc::now()).await.unwrap();
    service.navigate(exam.id, student, Direction::Forward).await.unwrap();

    tokio::time::sleep(Duration::from_secs(59)).await;
    let manual = tokio::spawn({
        let service = service.clone();
        let exam_id = exam.id;
        async move { service.submit(exam_id, student, Utc::now()).await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    let manual = manual.await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let all = store.get_exam_submissions_for_teacher(exam.id).await.unwrap();
    assert_eq!(all.len(), 1);
    match manual {
        Ok(receipt) => {
            assert_eq!(all[0].trigger, SubmitTrigger::Manual);
            assert_eq!(all[0].id, receipt.submission_id);
        }
        Err(e) => {
            assert!(matches!(e, Error::Conflict(_) | Error::NotFound(_)), "{e:?}");
            assert_eq!(all[0].trigger, SubmitTrigger::Timeout);
        }
    }
    assert_eq!(service.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_manual_submit_keeps_the_countdown_running() {
    let store = Arc::new(FlakyStore::new(1, Duration::from_secs(3)));
    let exam = store.create_exam(exam_lasting(1)).await.unwrap();
    let service = service(&store, CountdownPolicy::default());
    let student = Uuid::new_v4();

    service.open(exam.id, student, Utc::now()).await.unwrap();
    service.navigate(exam.id, student, Direction::Forward).await.unwrap();

    let err = service.submit(exam.id, student, Utc::now()).await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)), "{err:?}");

    let view = service.view(exam.id, student).await.unwrap();
    assert_eq!(view.phase, AttemptPhase::InProgress);
    assert!(view.remaining_seconds < 60);
    service.select(exam.id, student, 1, 0).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    let submission = wait_for_submission(&store.inner, exam.id, student).await;
    assert_eq!(submission.trigger, SubmitTrigger::Timeout);
    assert_eq!(submission.score, 1);
    assert_eq!(store.submit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(service.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_auto_submit_is_retried() {
    let store = Arc::new(FlakyStore::new(1, Duration::ZERO));
    let exam = store.create_exam(exam_lasting(1)).await.unwrap();
    let service = service(&store, CountdownPolicy::default());
    let student = Uuid::new_v4();

    service.open(exam.id, student, Utc::now()).await.unwrap();
    service.select(exam.id, student, 2, 0).await.unwrap();

    tokio::time::sleep(Duration::from_secs(65)).await;
    let submission = wait_for_submission(&store.inner, exam.id, student).await;
    assert_eq!(submission.trigger, SubmitTrigger::Timeout);
    assert_eq!(submission.answers.get(&2), Some(&0));
    assert_eq!(store.submit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(service.active_count(), 0);
}
