use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::exam::Exam;
use crate::models::question::OPTION_COUNT;
use crate::models::submission::{ExamSubmission, SubmitTrigger};
use crate::services::scoring_service::{grade, percentage, Outcome};

#[derive(Debug, Clone, Serialize)]
pub struct ReviewRow {
    pub question_id: i32,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub chosen_option_index: Option<u8>,
    pub correct_option_index: u8,
    pub outcome: Outcome,
    pub marks_awarded: i32,
    pub marks: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultReview {
    pub submission_id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub title: String,
    pub score: i32,
    pub total_marks: i32,
    pub percentage: f64,
    pub correct: usize,
    pub incorrect: usize,
    pub unanswered: usize,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
    pub questions: Vec<ReviewRow>,
}

pub struct ReviewService;

impl ReviewService {
    /// Question-by-question analysis of a stored submission, in the exam's
    /// original question order.
    pub fn build(exam: &Exam, submission: &ExamSubmission) -> ResultReview {
        let graded = grade(&exam.questions, &submission.answers);
        let count = |o: Outcome| graded.iter().filter(|g| g.outcome == o).count();
        let (correct, incorrect, unanswered) = (
            count(Outcome::Correct),
            count(Outcome::Incorrect),
            count(Outcome::Unanswered),
        );

        let questions = exam
            .questions
            .iter()
            .zip(graded)
            .map(|(q, g)| ReviewRow {
                question_id: q.id,
                text: q.text.clone(),
                options: q.options.clone(),
                chosen_option_index: g.chosen_option_index,
                correct_option_index: g.correct_option_index,
                outcome: g.outcome,
                marks_awarded: g.marks_awarded,
                marks: g.max_marks,
            })
            .collect();

        ResultReview {
            submission_id: submission.id,
            exam_id: exam.id,
            student_id: submission.student_id,
            title: exam.title.clone(),
            score: submission.score,
            total_marks: submission.total_marks,
            percentage: percentage(submission.score, submission.total_marks),
            correct,
            incorrect,
            unanswered,
            trigger: submission.trigger,
            submitted_at: submission.submitted_at,
            questions,
        }
    }

    /// Students only see their analysis once the exam releases results.
    pub fn for_student(exam: &Exam, submission: &ExamSubmission) -> Result<ResultReview> {
        if !exam.settings.show_result_immediately {
            return Err(Error::Forbidden(
                "Results for this exam have not been released".to_string(),
            ));
        }
        Ok(Self::build(exam, submission))
    }
}
