pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::database::ExamStore;
use crate::error::Result;
use crate::middleware::auth::AuthKeys;
use crate::services::{
    ai_service::{AIService, GeneratorSettings},
    attempt_service::AttemptService,
    attempt_session::CountdownPolicy,
    catalog_service::CatalogService,
    draft_service::DraftStaging,
    exam_service::ExamService,
    submission_service::SubmissionService,
};
use reqwest::Client;

#[derive(Clone)]
pub struct AppState {
    pub catalog_service: CatalogService,
    pub exam_service: ExamService,
    pub attempt_service: AttemptService,
    pub ai_service: AIService,
    pub draft_staging: DraftStaging,
    pub auth: AuthKeys,
    pub public_rps: u32,
    pub teacher_rps: u32,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn ExamStore>) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let submission_service =
            SubmissionService::new(store.clone(), config.submission_grace_seconds);
        let attempt_service = AttemptService::new(
            store.clone(),
            submission_service,
            CountdownPolicy {
                clamp_to_window: config.clamp_duration_to_window,
            },
        );
        let ai_service = AIService::new(
            config.openai_api_key.clone(),
            http_client,
            GeneratorSettings {
                base_url: config.openai_base_url.clone(),
                model: config.openai_model.clone(),
                max_questions: config.max_draft_questions,
                max_images: config.max_draft_images,
                cooldown: Duration::from_secs(config.generation_cooldown_seconds),
            },
        );

        Ok(Self {
            catalog_service: CatalogService::new(store.clone()),
            exam_service: ExamService::new(store),
            attempt_service,
            ai_service,
            draft_staging: DraftStaging::new(),
            auth: AuthKeys::new(&config.jwt_secret),
            public_rps: config.public_rps,
            teacher_rps: config.teacher_rps,
        })
    }
}
