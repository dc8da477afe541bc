use serde::{Deserialize, Serialize};

/// Every question offers exactly this many options.
pub const OPTION_COUNT: usize = 4;

/// Upper bound on the marks of a single question.
pub const MAX_MARKS: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable within its exam; assigned 1..=n at creation and never reordered.
    #[serde(default)]
    pub id: i32,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct_option_index: u8,
    #[serde(default = "default_marks")]
    pub marks: i32,
}

fn default_marks() -> i32 {
    1
}

impl Question {
    pub fn is_correct(&self, chosen: u8) -> bool {
        chosen == self.correct_option_index
    }

    /// Copy without the answer key, safe to send to a student.
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            text: self.text.clone(),
            options: self.options.clone(),
            marks: self.marks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: i32,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub marks: i32,
}
