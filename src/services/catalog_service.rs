use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::ExamStore;
use crate::models::exam::{Exam, ExamStatus, ExamSummary};

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub exam: ExamSummary,
    pub status: ExamStatus,
    pub can_attempt: bool,
    /// Only set while the exam is upcoming.
    pub starts_in_seconds: Option<i64>,
    pub has_submission: bool,
}

impl CatalogEntry {
    fn classify(exam: &Exam, has_submission: bool, now: DateTime<Utc>) -> Self {
        let status = exam.status_at(now);
        Self {
            exam: exam.summary(),
            status,
            can_attempt: status == ExamStatus::Live && exam.is_published && !has_submission,
            starts_in_seconds: (status == ExamStatus::Upcoming)
                .then(|| (exam.start_time - now).num_seconds()),
            has_submission,
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn ExamStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn ExamStore>) -> Self {
        Self { store }
    }

    /// Exams of a class as a student sees them at `now`.
    ///
    /// A store failure yields an empty list rather than an error.
    pub async fn list_for_class(
        &self,
        class_id: Uuid,
        student_id: Uuid,
        now: DateTime<Utc>,
    ) -> Vec<CatalogEntry> {
        let exams = match self.store.get_exams_for_class(class_id).await {
            Ok(exams) => exams,
            Err(e) => {
                tracing::warn!(class_id = %class_id, error = %e, "Failed to load exam catalog");
                return Vec::new();
            }
        };

        let mut entries = Vec::with_capacity(exams.len());
        for exam in &exams {
            let has_submission = match self.store.get_exam_submission(exam.id, student_id).await {
                Ok(found) => found.is_some(),
                Err(e) => {
                    tracing::warn!(exam_id = %exam.id, error = %e, "Failed to check submission");
                    false
                }
            };
            entries.push(CatalogEntry::classify(exam, has_submission, now));
        }
        entries
    }
}
