use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::attempt_session::Direction;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SelectAnswerRequest {
    pub question_id: i32,
    #[validate(range(max = 3))]
    pub option_index: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigateRequest {
    pub direction: Direction,
}
