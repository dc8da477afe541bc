use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::question::{PublicQuestion, Question};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamSettings {
    pub shuffle_questions: bool,
    pub show_result_immediately: bool,
    /// Stored for the authoring UI; the attempt flow never reads it.
    pub allow_retake: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub class_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub questions: Vec<Question>,
    pub settings: ExamSettings,
    pub is_published: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Exam {
    pub fn status_at(&self, now: DateTime<Utc>) -> ExamStatus {
        ExamStatus::at(self.start_time, self.end_time, now)
    }

    pub fn total_marks(&self) -> i32 {
        self.questions
            .iter()
            .fold(0i32, |acc, q| acc.saturating_add(q.marks))
    }

    pub fn question(&self, question_id: i32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn summary(&self) -> ExamSummary {
        ExamSummary {
            id: self.id,
            class_id: self.class_id,
            title: self.title.clone(),
            description: self.description.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            total_questions: self.questions.len(),
            total_marks: self.total_marks(),
            is_published: self.is_published,
        }
    }

    pub fn public_questions(&self) -> Vec<PublicQuestion> {
        self.questions.iter().map(Question::to_public).collect()
    }
}

/// Availability of an exam, derived only from the clock and its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamStatus {
    Upcoming,
    Live,
    Expired,
}

impl ExamStatus {
    /// Both ends of the window are inclusive.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            ExamStatus::Upcoming
        } else if now <= end {
            ExamStatus::Live
        } else {
            ExamStatus::Expired
        }
    }
}

/// Exam header without questions or answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSummary {
    pub id: Uuid,
    pub class_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub total_questions: usize,
    pub total_marks: i32,
    pub is_published: bool,
}

/// Input to `ExamStore::create_exam`, already validated and with question ids.
#[derive(Debug, Clone)]
pub struct NewExam {
    pub class_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub questions: Vec<Question>,
    pub settings: ExamSettings,
    pub is_published: bool,
    pub created_by: Uuid,
}
