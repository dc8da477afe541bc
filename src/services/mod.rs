pub mod ai_service;
pub mod attempt_service;
pub mod attempt_session;
pub mod catalog_service;
pub mod draft_service;
pub mod exam_service;
pub mod export_service;
pub mod randomizer;
pub mod rank_service;
pub mod review_service;
pub mod scoring_service;
pub mod submission_service;
