use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::database::ExamStore;
use crate::dto::exam_dto::{CreateExamPayload, QuestionPayload};
use crate::error::{Error, Result};
use crate::models::exam::{Exam, NewExam};
use crate::models::question::Question;
use crate::models::submission::ExamSubmission;

#[derive(Clone)]
pub struct ExamService {
    store: Arc<dyn ExamStore>,
}

impl ExamService {
    pub fn new(store: Arc<dyn ExamStore>) -> Self {
        Self { store }
    }

    /// Validates the payload, numbers its questions and stores the exam.
    pub async fn create(&self, payload: CreateExamPayload, created_by: Uuid) -> Result<Exam> {
        validate_exam(&payload)?;

        let exam = self
            .store
            .create_exam(NewExam {
                class_id: payload.class_id,
                title: payload.title.trim().to_string(),
                description: payload
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
                start_time: payload.start_time,
                end_time: payload.end_time,
                duration_minutes: payload.duration_minutes,
                questions: assign_question_ids(payload.questions),
                settings: payload.settings,
                is_published: payload.is_published,
                created_by,
            })
            .await?;

        tracing::info!(
            exam_id = %exam.id,
            class_id = %exam.class_id,
            questions = exam.questions.len(),
            "Exam created"
        );
        Ok(exam)
    }

    pub async fn get(&self, exam_id: Uuid) -> Result<Exam> {
        self.store
            .get_exam(exam_id)
            .await?
            .ok_or_else(|| Error::NotFound("Exam not found".to_string()))
    }

    /// Removes the exam together with its submissions.
    pub async fn delete(&self, exam_id: Uuid) -> Result<()> {
        if !self.store.delete_exam(exam_id).await? {
            return Err(Error::NotFound("Exam not found".to_string()));
        }
        tracing::info!(exam_id = %exam_id, "Exam deleted");
        Ok(())
    }

    pub async fn submissions(&self, exam_id: Uuid) -> Result<(Exam, Vec<ExamSubmission>)> {
        let exam = self.get(exam_id).await?;
        let submissions = self.store.get_exam_submissions_for_teacher(exam_id).await?;
        Ok((exam, submissions))
    }

    pub async fn submission(&self, exam_id: Uuid, student_id: Uuid) -> Result<(Exam, ExamSubmission)> {
        let exam = self.get(exam_id).await?;
        let submission = self
            .store
            .get_exam_submission(exam_id, student_id)
            .await?
            .ok_or_else(|| Error::NotFound("Submission not found".to_string()))?;
        Ok((exam, submission))
    }
}

pub fn validate_exam(payload: &CreateExamPayload) -> Result<()> {
    payload.validate()?;
    if payload.title.trim().is_empty() {
        return Err(Error::BadRequest("Title must not be blank".to_string()));
    }
    if payload.start_time >= payload.end_time {
        return Err(Error::BadRequest(
            "Start time must be before end time".to_string(),
        ));
    }
    for (idx, q) in payload.questions.iter().enumerate() {
        if let Some(problem) = q.blank_fields() {
            return Err(Error::BadRequest(format!("Question {}: {}", idx + 1, problem)));
        }
    }
    Ok(())
}

fn assign_question_ids(questions: Vec<QuestionPayload>) -> Vec<Question> {
    questions
        .into_iter()
        .enumerate()
        .map(|(idx, q)| q.into_question(idx as i32 + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryExamStore;
    use crate::models::exam::ExamSettings;
    use chrono::{Duration, Utc};

    fn question(text: &str) -> QuestionPayload {
        QuestionPayload {
            text: text.into(),
            options: ["1".into(), "2".into(), "3".into(), "4".into()],
            correct_option_index: 3,
            marks: 2,
        }
    }

    fn payload() -> CreateExamPayload {
        let start = Utc::now();
        CreateExamPayload {
            class_id: Uuid::new_v4(),
            title: "  Weekly quiz ".into(),
            description: Some("   ".into()),
            start_time: start,
            end_time: start + Duration::hours(1),
            duration_minutes: 30,
            questions: vec![question("A"), question("B")],
            settings: ExamSettings::default(),
            is_published: true,
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let store = Arc::new(MemoryExamStore::new());
        let service = ExamService::new(store.clone());

        let exam = service.create(payload(), Uuid::new_v4()).await.unwrap();
        assert_eq!(exam.title, "Weekly quiz");
        assert_eq!(exam.description, None);
        assert_eq!(exam.questions.iter().map(|q| q.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(exam.total_marks(), 4);
    }

    #[tokio::test]
    async fn invalid_payloads_store_nothing() {
        let store = Arc::new(MemoryExamStore::new());
        let service = ExamService::new(store.clone());
        let teacher = Uuid::new_v4();

        let mut reversed = payload();
        reversed.end_time = reversed.start_time;
        let mut no_questions = payload();
        no_questions.questions.clear();
        let mut zero_duration = payload();
        zero_duration.duration_minutes = 0;
        let mut bad_index = payload();
        bad_index.questions[1].correct_option_index = 4;
        let mut blank_option = payload();
        blank_option.questions[0].options[2] = " ".into();
        let mut zero_marks = payload();
        zero_marks.questions[0].marks = 0;
        let mut huge_marks = payload();
        huge_marks.questions[0].marks = i32::MAX;
        huge_marks.questions[1].marks = i32::MAX;
        let mut blank_title = payload();
        blank_title.title = "   ".into();

        for bad in [
            reversed,
            no_questions,
            zero_duration,
            bad_index,
            blank_option,
            zero_marks,
            huge_marks,
            blank_title,
        ] {
            let class_id = bad.class_id;
            let res = service.create(bad, teacher).await;
            assert!(
                matches!(res, Err(Error::Validation(_)) | Err(Error::BadRequest(_))),
                "expected a validation failure, got {res:?}"
            );
            assert!(store.get_exams_for_class(class_id).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn deleting_a_missing_exam_is_not_found() {
        let service = ExamService::new(Arc::new(MemoryExamStore::new()));
        assert!(matches!(
            service.delete(Uuid::new_v4()).await,
            Err(Error::NotFound(_))
        ));
    }
}
