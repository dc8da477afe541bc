pub mod attempt_dto;
pub mod draft_dto;
pub mod exam_dto;
