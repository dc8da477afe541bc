use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::database::ExamStore;
use crate::error::{Error, Result};
use crate::models::exam::Exam;
use crate::models::question::PublicQuestion;
use crate::models::submission::{AnswerMap, SubmitTrigger};
use crate::services::attempt_session::{
    AttemptPhase, AttemptSession, CountdownPolicy, Direction, Step, Tick,
};
use crate::services::review_service::{ResultReview, ReviewService};
use crate::services::submission_service::{SubmissionReceipt, SubmissionService};
use crate::utils::time;

type AttemptKey = (Uuid, Uuid);

/// A running attempt and the handle that stops its countdown.
struct LiveAttempt {
    exam: Arc<Exam>,
    session: Mutex<AttemptSession>,
    cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptView {
    pub exam_id: Uuid,
    pub title: String,
    pub phase: AttemptPhase,
    /// In presentation order.
    pub questions: Vec<PublicQuestion>,
    pub current_index: usize,
    pub current_question_id: Option<i32>,
    pub answers: AnswerMap,
    pub remaining_seconds: u32,
    pub can_submit: bool,
}

impl AttemptView {
    fn render(exam: &Exam, session: &AttemptSession) -> Self {
        let questions = session
            .order()
            .iter()
            .filter_map(|id| exam.question(*id))
            .map(|q| q.to_public())
            .collect();
        Self {
            exam_id: exam.id,
            title: exam.title.clone(),
            phase: session.phase(),
            questions,
            current_index: session.current_index(),
            current_question_id: session.current_question_id(),
            answers: session.answers().clone(),
            remaining_seconds: session.remaining_seconds(),
            can_submit: session.phase() == AttemptPhase::InProgress && session.reached_last(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OpenOutcome {
    InProgress {
        attempt: AttemptView,
    },
    /// Already submitted; `review` is absent until results are released.
    ViewingResult {
        submission_id: Uuid,
        submitted_at: DateTime<Utc>,
        review: Option<ResultReview>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigateOutcome {
    pub step: Step,
    pub attempt: AttemptView,
}

/// Registry of live attempts plus the per-attempt countdown tasks.
#[derive(Clone)]
pub struct AttemptService {
    store: Arc<dyn ExamStore>,
    submissions: SubmissionService,
    policy: CountdownPolicy,
    live: Arc<StdMutex<HashMap<AttemptKey, Arc<LiveAttempt>>>>,
}

impl AttemptService {
    pub fn new(
        store: Arc<dyn ExamStore>,
        submissions: SubmissionService,
        policy: CountdownPolicy,
    ) -> Self {
        Self {
            store,
            submissions,
            policy,
            live: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<AttemptKey, Arc<LiveAttempt>>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: AttemptKey) -> Option<Arc<LiveAttempt>> {
        self.registry().get(&key).cloned()
    }

    fn require(&self, exam_id: Uuid, student_id: Uuid) -> Result<Arc<LiveAttempt>> {
        self.lookup((exam_id, student_id))
            .ok_or_else(|| Error::NotFound("No active attempt for this exam".to_string()))
    }

    fn is_registered(&self, key: AttemptKey, live: &Arc<LiveAttempt>) -> bool {
        self.registry()
            .get(&key)
            .map_or(false, |current| Arc::ptr_eq(current, live))
    }

    /// Drops the registry entry only if it still points at `live`.
    fn unregister(&self, key: AttemptKey, live: &Arc<LiveAttempt>) {
        let mut registry = self.registry();
        if registry.get(&key).map_or(false, |current| Arc::ptr_eq(current, live)) {
            registry.remove(&key);
        }
        live.cancel.cancel();
    }

    pub fn active_count(&self) -> usize {
        self.registry().len()
    }

    /// Opens (or resumes) the student's attempt.
    ///
    /// A student who already submitted lands on the result state instead,
    /// regardless of the exam window.
    pub async fn open(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<OpenOutcome> {
        let key = (exam_id, student_id);
        if let Some(live) = self.lookup(key) {
            let session = live.session.lock().await;
            return Ok(OpenOutcome::InProgress {
                attempt: AttemptView::render(&live.exam, &session),
            });
        }

        let exam = self
            .store
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;
        let prior = self.store.get_exam_submission(exam_id, student_id).await?;

        let mut rng = StdRng::from_entropy();
        let session =
            AttemptSession::open(&exam, student_id, prior.as_ref(), now, self.policy, &mut rng)?;

        if let (AttemptPhase::ViewingResult, Some(prior)) = (session.phase(), prior.as_ref()) {
            let review = exam
                .settings
                .show_result_immediately
                .then(|| ReviewService::build(&exam, prior));
            return Ok(OpenOutcome::ViewingResult {
                submission_id: prior.id,
                submitted_at: prior.submitted_at,
                review,
            });
        }

        let exam = Arc::new(exam);
        let candidate = Arc::new(LiveAttempt {
            exam: exam.clone(),
            session: Mutex::new(session),
            cancel: CancellationToken::new(),
        });

        let (live, created) = {
            let mut registry = self.registry();
            match registry.get(&key) {
                Some(existing) => (existing.clone(), false),
                None => {
                    registry.insert(key, candidate.clone());
                    (candidate, true)
                }
            }
        };

        if created {
            let remaining_seconds = live.session.lock().await.remaining_seconds();
            tracing::info!(
                exam_id = %exam_id,
                student_id = %student_id,
                remaining_seconds,
                "Attempt started"
            );
            self.spawn_countdown(key, live.clone());
        }

        let session = live.session.lock().await;
        Ok(OpenOutcome::InProgress {
            attempt: AttemptView::render(&live.exam, &session),
        })
    }

    pub async fn view(&self, exam_id: Uuid, student_id: Uuid) -> Result<AttemptView> {
        let live = self.require(exam_id, student_id)?;
        let session = live.session.lock().await;
        Ok(AttemptView::render(&live.exam, &session))
    }

    pub async fn select(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
        question_id: i32,
        option_index: u8,
    ) -> Result<AttemptView> {
        let live = self.require(exam_id, student_id)?;
        let mut session = live.session.lock().await;
        session.select(question_id, option_index)?;
        Ok(AttemptView::render(&live.exam, &session))
    }

    pub async fn navigate(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
        direction: Direction,
    ) -> Result<NavigateOutcome> {
        let live = self.require(exam_id, student_id)?;
        let mut session = live.session.lock().await;
        let step = session.navigate(direction)?;
        Ok(NavigateOutcome {
            step,
            attempt: AttemptView::render(&live.exam, &session),
        })
    }

    pub async fn submit(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt> {
        let live = self.require(exam_id, student_id)?;
        let answers = live.session.lock().await.request_manual_submit()?;
        self.finalize((exam_id, student_id), &live, answers, SubmitTrigger::Manual, now)
            .await
    }

    /// Discards the attempt without submitting. Re-opening starts afresh.
    pub fn abandon(&self, exam_id: Uuid, student_id: Uuid) -> Result<()> {
        let key = (exam_id, student_id);
        let live = self
            .registry()
            .remove(&key)
            .ok_or_else(|| Error::NotFound("No active attempt for this exam".to_string()))?;
        live.cancel.cancel();
        tracing::info!(exam_id = %exam_id, student_id = %student_id, "Attempt abandoned");
        Ok(())
    }

    /// Drops every live attempt of a deleted exam.
    pub fn abandon_exam(&self, exam_id: Uuid) -> usize {
        let mut registry = self.registry();
        let keys: Vec<AttemptKey> = registry
            .keys()
            .filter(|(exam, _)| *exam == exam_id)
            .copied()
            .collect();
        for key in &keys {
            if let Some(live) = registry.remove(key) {
                live.cancel.cancel();
            }
        }
        keys.len()
    }

    /// Sends answers taken from the session's submit gate to the store.
    ///
    /// Callers must hold the answers returned by `begin_submit`; the session
    /// lock is not held here.
    async fn finalize(
        &self,
        key: AttemptKey,
        live: &Arc<LiveAttempt>,
        answers: AnswerMap,
        trigger: SubmitTrigger,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt> {
        let (_, student_id) = key;
        match self
            .submissions
            .submit(&live.exam, student_id, answers, trigger, now)
            .await
        {
            Ok(receipt) => {
                live.session.lock().await.complete();
                self.unregister(key, live);
                Ok(receipt)
            }
            Err(e @ (Error::Conflict(_) | Error::Timing(_))) => {
                // A record already exists or the window has closed.
                tracing::warn!(
                    exam_id = %key.0,
                    student_id = %student_id,
                    trigger = trigger.as_str(),
                    error = %e,
                    "Attempt closed without a new submission"
                );
                live.session.lock().await.complete();
                self.unregister(key, live);
                Err(e)
            }
            Err(e) => {
                live.session.lock().await.submit_failed();
                Err(e)
            }
        }
    }

    fn spawn_countdown(&self, key: AttemptKey, live: Arc<LiveAttempt>) {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = live.cancel.cancelled() => return,
                    _ = interval.tick() => {}
                }

                let answers = {
                    let mut session = live.session.lock().await;
                    match session.tick() {
                        Tick::Running { .. } | Tick::Waiting { .. } => continue,
                        Tick::Expired => session.answers().clone(),
                        Tick::Idle => return,
                    }
                };

                if !service.is_registered(key, &live) {
                    return;
                }

                let (exam_id, student_id) = key;
                tracing::info!(exam_id = %exam_id, student_id = %student_id, "Time is up, auto-submitting");
                match service
                    .finalize(key, &live, answers, SubmitTrigger::Timeout, time::now())
                    .await
                {
                    Ok(_) => return,
                    // Retried on the next tick unless the attempt was closed.
                    Err(e) => tracing::error!(
                        exam_id = %exam_id,
                        student_id = %student_id,
                        error = %e,
                        "Auto-submit failed"
                    ),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryExamStore;
    use crate::models::exam::{ExamSettings, NewExam};
    use crate::models::question::Question;
    use chrono::Duration as ChronoDuration;

    async fn setup(shuffle: bool) -> (Arc<MemoryExamStore>, AttemptService, Exam) {
        let store = Arc::new(MemoryExamStore::new());
        let start = Utc::now() - ChronoDuration::minutes(1);
        let exam = store
            .create_exam(NewExam {
                class_id: Uuid::new_v4(),
                title: "Geography".into(),
                description: None,
                start_time: start,
                end_time: start + ChronoDuration::hours(2),
                duration_minutes: 10,
                questions: (1..=3)
                    .map(|id| Question {
                        id,
                        text: format!("Q{id}"),
                        options: ["a".into(), "b".into(), "c".into(), "d".into()],
                        correct_option_index: 2,
                        marks: 1,
                    })
                    .collect(),
                settings: ExamSettings {
                    shuffle_questions: shuffle,
                    show_result_immediately: true,
                    allow_retake: false,
                },
                is_published: true,
                created_by: Uuid::new_v4(),
            })
            .await
            .unwrap();
        let submissions = SubmissionService::new(store.clone(), 300);
        let service = AttemptService::new(store.clone(), submissions, CountdownPolicy::default());
        (store, service, exam)
    }

    fn in_progress(outcome: OpenOutcome) -> AttemptView {
        match outcome {
            OpenOutcome::InProgress { attempt } => attempt,
            other => panic!("expected an attempt, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reopening_resumes_the_same_session() {
        let (_, service, exam) = setup(true).await;
        let student = Uuid::new_v4();

        let first = in_progress(service.open(exam.id, student, Utc::now()).await.unwrap());
        service.select(exam.id, student, first.questions[0].id, 1).await.unwrap();
        let again = in_progress(service.open(exam.id, student, Utc::now()).await.unwrap());

        let order = |v: &AttemptView| v.questions.iter().map(|q| q.id).collect::<Vec<_>>();
        assert_eq!(order(&first), order(&again));
        assert_eq!(again.answers.len(), 1);
        assert_eq!(service.active_count(), 1);
    }

    #[tokio::test]
    async fn manual_submit_completes_and_unregisters() {
        let (store, service, exam) = setup(false).await;
        let student = Uuid::new_v4();
        service.open(exam.id, student, Utc::now()).await.unwrap();

        service.select(exam.id, student, 1, 2).await.unwrap();
        service.navigate(exam.id, student, Direction::Forward).await.unwrap();
        let last = service.navigate(exam.id, student, Direction::Forward).await.unwrap();
        assert_eq!(last.step, Step::Moved { index: 2 });
        assert!(last.attempt.can_submit);

        let receipt = service.submit(exam.id, student, Utc::now()).await.unwrap();
        assert_eq!(receipt.trigger, SubmitTrigger::Manual);
        assert_eq!(service.active_count(), 0);

        let stored = store.get_exam_submission(exam.id, student).await.unwrap().unwrap();
        assert_eq!(stored.score, 1);

        match service.open(exam.id, student, Utc::now()).await.unwrap() {
            OpenOutcome::ViewingResult { review, .. } => assert!(review.is_some()),
            other => panic!("expected result state, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn abandon_discards_answers() {
        let (_, service, exam) = setup(false).await;
        let student = Uuid::new_v4();
        service.open(exam.id, student, Utc::now()).await.unwrap();
        service.select(exam.id, student, 2, 0).await.unwrap();

        service.abandon(exam.id, student).unwrap();
        assert!(matches!(service.view(exam.id, student).await, Err(Error::NotFound(_))));
        assert!(matches!(service.abandon(exam.id, student), Err(Error::NotFound(_))));

        let fresh = in_progress(service.open(exam.id, student, Utc::now()).await.unwrap());
        assert!(fresh.answers.is_empty());
    }

    #[tokio::test]
    async fn abandon_exam_drops_all_students() {
        let (_, service, exam) = setup(false).await;
        for _ in 0..3 {
            service.open(exam.id, Uuid::new_v4(), Utc::now()).await.unwrap();
        }
        assert_eq!(service.abandon_exam(exam.id), 3);
        assert_eq!(service.active_count(), 0);
    }
}
