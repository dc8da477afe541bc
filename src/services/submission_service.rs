use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::ExamStore;
use crate::error::{Error, Result};
use crate::models::exam::Exam;
use crate::models::submission::{AnswerMap, NewSubmission, SubmitTrigger};
use crate::services::review_service::{ResultReview, ReviewService};
use crate::services::scoring_service;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultState {
    Released { review: ResultReview },
    /// The teacher has not released results; no score is disclosed.
    Pending,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub exam_id: Uuid,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
    pub result: ResultState,
}

#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn ExamStore>,
    grace: Duration,
}

impl SubmissionService {
    pub fn new(store: Arc<dyn ExamStore>, grace_seconds: i64) -> Self {
        Self {
            store,
            grace: Duration::seconds(grace_seconds.max(0)),
        }
    }

    /// Latest instant at which a submission for `exam` is still accepted.
    ///
    /// The countdown is not capped at `end_time`, so a student who opens the
    /// exam at the last moment may legitimately submit up to a full duration
    /// later.
    pub fn deadline(&self, exam: &Exam) -> DateTime<Utc> {
        exam.end_time + Duration::minutes(i64::from(exam.duration_minutes)) + self.grace
    }

    fn check_window(&self, exam: &Exam, now: DateTime<Utc>) -> Result<()> {
        if now < exam.start_time {
            return Err(Error::Timing("This exam has not started yet".to_string()));
        }
        if now > self.deadline(exam) {
            return Err(Error::Timing(
                "The submission window for this exam has closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Scores `answers` against the canonical exam and records the result.
    ///
    /// A second submission for the same exam and student fails with
    /// [`Error::Conflict`]; the stored record is never replaced.
    pub async fn submit(
        &self,
        exam: &Exam,
        student_id: Uuid,
        answers: AnswerMap,
        trigger: SubmitTrigger,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt> {
        self.check_window(exam, now)?;

        let summary = scoring_service::score(&exam.questions, &answers);
        let stored = self
            .store
            .submit_exam(NewSubmission {
                exam_id: exam.id,
                student_id,
                answers,
                score: summary.score,
                total_marks: summary.total_marks,
                trigger,
            })
            .await
            .map_err(|e| {
                tracing::warn!(
                    exam_id = %exam.id,
                    student_id = %student_id,
                    trigger = trigger.as_str(),
                    error = %e,
                    "Submission rejected"
                );
                e
            })?;

        tracing::info!(
            exam_id = %exam.id,
            student_id = %student_id,
            trigger = trigger.as_str(),
            score = stored.score,
            total_marks = stored.total_marks,
            "Exam submitted"
        );

        let result = if exam.settings.show_result_immediately {
            let submission = self
                .store
                .get_exam_submission(exam.id, student_id)
                .await?
                .ok_or_else(|| Error::NotFound("Submission not found".to_string()))?;
            ResultState::Released {
                review: ReviewService::build(exam, &submission),
            }
        } else {
            ResultState::Pending
        };

        Ok(SubmissionReceipt {
            submission_id: stored.id,
            exam_id: exam.id,
            trigger: stored.trigger,
            submitted_at: stored.submitted_at,
            result,
        })
    }
}
