use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::store::ExamStore;
use crate::error::{Error, Result};
use crate::models::exam::{Exam, ExamSettings, NewExam};
use crate::models::question::Question;
use crate::models::submission::{AnswerMap, ExamSubmission, NewSubmission, SubmitTrigger};

#[derive(Debug, FromRow)]
struct ExamRow {
    id: Uuid,
    class_id: Uuid,
    title: String,
    description: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_minutes: i32,
    questions: Json<Vec<Question>>,
    settings: Json<ExamSettings>,
    is_published: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ExamRow> for Exam {
    fn from(row: ExamRow) -> Self {
        Exam {
            id: row.id,
            class_id: row.class_id,
            title: row.title,
            description: row.description,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            questions: row.questions.0,
            settings: row.settings.0,
            is_published: row.is_published,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SubmissionRow {
    id: Uuid,
    exam_id: Uuid,
    student_id: Uuid,
    answers: Json<AnswerMap>,
    score: i32,
    total_marks: i32,
    trigger: String,
    submitted_at: DateTime<Utc>,
}

impl TryFrom<SubmissionRow> for ExamSubmission {
    type Error = Error;

    fn try_from(row: SubmissionRow) -> Result<Self> {
        let trigger = SubmitTrigger::parse(&row.trigger).ok_or_else(|| {
            Error::Internal(format!("Unknown submission trigger '{}'", row.trigger))
        })?;
        Ok(ExamSubmission {
            id: row.id,
            exam_id: row.exam_id,
            student_id: row.student_id,
            answers: row.answers.0,
            score: row.score,
            total_marks: row.total_marks,
            trigger,
            submitted_at: row.submitted_at,
        })
    }
}

const EXAM_COLUMNS: &str = r#"
    id, class_id, title, description, start_time, end_time, duration_minutes,
    questions, settings, is_published, created_by, created_at
"#;

const SUBMISSION_COLUMNS: &str = r#"
    id, exam_id, student_id, answers, score, total_marks, trigger, submitted_at
"#;

#[derive(Clone)]
pub struct PgExamStore {
    pool: PgPool,
}

impl PgExamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamStore for PgExamStore {
    async fn get_exams_for_class(&self, class_id: Uuid) -> Result<Vec<Exam>> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE class_id = $1 ORDER BY start_time ASC"
        ))
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Exam::from).collect())
    }

    async fn get_exam(&self, exam_id: Uuid) -> Result<Option<Exam>> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"
        ))
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Exam::from))
    }

    async fn get_exam_submission(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<ExamSubmission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM exam_submissions WHERE exam_id = $1 AND student_id = $2"
        ))
        .bind(exam_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ExamSubmission::try_from).transpose()
    }

    async fn submit_exam(&self, submission: NewSubmission) -> Result<ExamSubmission> {
        let row = sqlx::query_as::<_, SubmissionRow>(&format!(
            r#"
            INSERT INTO exam_submissions (exam_id, student_id, answers, score, total_marks, trigger)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SUBMISSION_COLUMNS}
            "#
        ))
        .bind(submission.exam_id)
        .bind(submission.student_id)
        .bind(Json(&submission.answers))
        .bind(submission.score)
        .bind(submission.total_marks)
        .bind(submission.trigger.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match Error::from(e) {
            Error::Conflict(_) => Error::Conflict(
                "A submission already exists for this exam and student".to_string(),
            ),
            other => other,
        })?;
        ExamSubmission::try_from(row)
    }

    async fn get_exam_submissions_for_teacher(&self, exam_id: Uuid) -> Result<Vec<ExamSubmission>> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM exam_submissions WHERE exam_id = $1"
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ExamSubmission::try_from).collect()
    }

    async fn create_exam(&self, exam: NewExam) -> Result<Exam> {
        let row = sqlx::query_as::<_, ExamRow>(&format!(
            r#"
            INSERT INTO exams (
                class_id, title, description, start_time, end_time, duration_minutes,
                questions, settings, is_published, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {EXAM_COLUMNS}
            "#
        ))
        .bind(exam.class_id)
        .bind(&exam.title)
        .bind(&exam.description)
        .bind(exam.start_time)
        .bind(exam.end_time)
        .bind(exam.duration_minutes)
        .bind(Json(&exam.questions))
        .bind(Json(&exam.settings))
        .bind(exam.is_published)
        .bind(exam.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn delete_exam(&self, exam_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM exams WHERE id = $1")
            .bind(exam_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
