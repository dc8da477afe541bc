use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::dto::exam_dto::QuestionPayload;
use crate::models::question::Question;

pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PageImage {
    pub mime_type: String,
    /// Plain base64 or a `data:` URL.
    #[validate(length(min = 1))]
    pub data_base64: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftLevel {
    Easy,
    Medium,
    Hard,
}

impl DraftLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftLevel::Easy => "easy",
            DraftLevel::Medium => "medium",
            DraftLevel::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftSource {
    /// Cropped photos of textbook pages.
    Images { images: Vec<PageImage> },
    Topic { topic: String },
}

fn default_language() -> String {
    "English".to_string()
}

fn default_level() -> DraftLevel {
    DraftLevel::Medium
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateDraftsPayload {
    pub source: DraftSource,
    #[serde(default = "default_language")]
    #[validate(length(min = 1, max = 40))]
    pub language: String,
    #[serde(default = "default_level")]
    pub level: DraftLevel,
    #[validate(range(min = 1, message = "Ask for at least one question"))]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftStageResponse {
    pub stage_id: Uuid,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AcceptDraftsPayload {
    /// Indices into the staged proposals.
    pub selected: Vec<usize>,
    /// The teacher's current, possibly edited, question list.
    #[serde(default)]
    #[validate(nested)]
    pub existing: Vec<QuestionPayload>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptDraftsResponse {
    pub questions: Vec<Question>,
    pub accepted: usize,
}
