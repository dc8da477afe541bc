use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question id -> chosen option index. Unanswered questions are absent.
pub type AnswerMap = BTreeMap<i32, u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

impl SubmitTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitTrigger::Manual => "manual",
            SubmitTrigger::Timeout => "timeout",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "manual" => Some(SubmitTrigger::Manual),
            "timeout" => Some(SubmitTrigger::Timeout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSubmission {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub answers: AnswerMap,
    pub score: i32,
    pub total_marks: i32,
    pub trigger: SubmitTrigger,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub answers: AnswerMap,
    pub score: i32,
    pub total_marks: i32,
    pub trigger: SubmitTrigger,
}
