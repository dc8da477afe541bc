use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::store::ExamStore;
use crate::error::{Error, Result};
use crate::models::exam::{Exam, NewExam};
use crate::models::submission::{ExamSubmission, NewSubmission};

#[derive(Default)]
struct Tables {
    exams: HashMap<Uuid, Exam>,
    submissions: HashMap<(Uuid, Uuid), ExamSubmission>,
}

/// Process-local store with the same uniqueness and cascade rules as the
/// Postgres schema.
#[derive(Default)]
pub struct MemoryExamStore {
    tables: RwLock<Tables>,
}

impl MemoryExamStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamStore for MemoryExamStore {
    async fn get_exams_for_class(&self, class_id: Uuid) -> Result<Vec<Exam>> {
        let tables = self.tables.read().await;
        let mut exams: Vec<Exam> = tables
            .exams
            .values()
            .filter(|e| e.class_id == class_id)
            .cloned()
            .collect();
        exams.sort_by(|a, b| a.start_time.cmp(&b.start_time));
        Ok(exams)
    }

    async fn get_exam(&self, exam_id: Uuid) -> Result<Option<Exam>> {
        Ok(self.tables.read().await.exams.get(&exam_id).cloned())
    }

    async fn get_exam_submission(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<ExamSubmission>> {
        Ok(self
            .tables
            .read()
            .await
            .submissions
            .get(&(exam_id, student_id))
            .cloned())
    }

    async fn submit_exam(&self, submission: NewSubmission) -> Result<ExamSubmission> {
        let mut tables = self.tables.write().await;
        if !tables.exams.contains_key(&submission.exam_id) {
            return Err(Error::NotFound("Exam not found".to_string()));
        }
        let key = (submission.exam_id, submission.student_id);
        if tables.submissions.contains_key(&key) {
            return Err(Error::Conflict(
                "A submission already exists for this exam and student".to_string(),
            ));
        }
        let stored = ExamSubmission {
            id: Uuid::new_v4(),
            exam_id: submission.exam_id,
            student_id: submission.student_id,
            answers: submission.answers,
            score: submission.score,
            total_marks: submission.total_marks,
            trigger: submission.trigger,
            submitted_at: Utc::now(),
        };
        tables.submissions.insert(key, stored.clone());
        Ok(stored)
    }

    async fn get_exam_submissions_for_teacher(&self, exam_id: Uuid) -> Result<Vec<ExamSubmission>> {
        Ok(self
            .tables
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.exam_id == exam_id)
            .cloned()
            .collect())
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam> {
        let created = Exam {
            id: Uuid::new_v4(),
            class_id: exam.class_id,
            title: exam.title,
            description: exam.description,
            start_time: exam.start_time,
            end_time: exam.end_time,
            duration_minutes: exam.duration_minutes,
            questions: exam.questions,
            settings: exam.settings,
            is_published: exam.is_published,
            created_by: exam.created_by,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .exams
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_exam(&self, exam_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let removed = tables.exams.remove(&exam_id).is_some();
        if removed {
            tables.submissions.retain(|(e, _), _| *e != exam_id);
        }
        Ok(removed)
    }
}
