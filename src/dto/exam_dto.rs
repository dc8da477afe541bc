use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::exam::ExamSettings;
use crate::models::question::{Question, OPTION_COUNT};

fn default_marks() -> i32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionPayload {
    #[validate(length(min = 1, message = "Question text is required"))]
    pub text: String,
    pub options: [String; OPTION_COUNT],
    #[validate(range(max = 3, message = "Correct option index must be between 0 and 3"))]
    pub correct_option_index: u8,
    #[serde(default = "default_marks")]
    #[validate(range(min = 1, max = 1000, message = "Marks must be between 1 and 1000"))]
    pub marks: i32,
}

impl QuestionPayload {
    /// Problems the derive cannot express: blank text or options.
    pub fn blank_fields(&self) -> Option<String> {
        if self.text.trim().is_empty() {
            return Some("question text is blank".to_string());
        }
        self.options
            .iter()
            .position(|o| o.trim().is_empty())
            .map(|idx| format!("option {} is blank", idx))
    }

    pub fn into_question(self, id: i32) -> Question {
        Question {
            id,
            text: self.text.trim().to_string(),
            options: self.options.map(|o| o.trim().to_string()),
            correct_option_index: self.correct_option_index,
            marks: self.marks,
        }
    }
}

impl From<Question> for QuestionPayload {
    fn from(q: Question) -> Self {
        Self {
            text: q.text,
            options: q.options,
            correct_option_index: q.correct_option_index,
            marks: q.marks,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExamPayload {
    pub class_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration_minutes: i32,
    #[validate(length(min = 1, message = "An exam needs at least one question"), nested)]
    pub questions: Vec<QuestionPayload>,
    #[serde(default)]
    pub settings: ExamSettings,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteExamResponse {
    pub deleted: bool,
    pub exam_id: Uuid,
    pub abandoned_attempts: usize,
}
