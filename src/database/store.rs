use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::exam::{Exam, NewExam};
use crate::models::submission::{ExamSubmission, NewSubmission};

/// Persistence boundary of the exam subsystem.
///
/// Implementations must enforce at most one submission per
/// `(exam_id, student_id)`: a second `submit_exam` for the same pair fails
/// with [`crate::error::Error::Conflict`] and leaves the first record intact.
/// Deleting an exam removes its submissions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExamStore: Send + Sync {
    async fn get_exams_for_class(&self, class_id: Uuid) -> Result<Vec<Exam>>;

    async fn get_exam(&self, exam_id: Uuid) -> Result<Option<Exam>>;

    async fn get_exam_submission(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<ExamSubmission>>;

    async fn submit_exam(&self, submission: NewSubmission) -> Result<ExamSubmission>;

    /// Unordered; ranking happens at display time.
    async fn get_exam_submissions_for_teacher(&self, exam_id: Uuid) -> Result<Vec<ExamSubmission>>;

    async fn create_exam(&self, exam: NewExam) -> Result<Exam>;

    /// Returns false when no exam had that id.
    async fn delete_exam(&self, exam_id: Uuid) -> Result<bool>;
}
