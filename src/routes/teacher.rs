use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::draft_dto::{
    AcceptDraftsPayload, AcceptDraftsResponse, DraftStageResponse, GenerateDraftsPayload,
};
use crate::dto::exam_dto::{CreateExamPayload, DeleteExamResponse};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::services::export_service::ExportService;
use crate::services::rank_service;
use crate::services::review_service::ReviewService;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamPayload>,
) -> Result<impl IntoResponse> {
    let exam = state.exam_service.create(payload, claims.user_id()?).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

#[axum::debug_handler]
pub async fn delete_exam(
    State(state): State<AppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.exam_service.delete(exam_id).await?;
    let abandoned_attempts = state.attempt_service.abandon_exam(exam_id);
    if abandoned_attempts > 0 {
        tracing::info!(exam_id = %exam_id, abandoned_attempts, "Dropped live attempts of deleted exam");
    }
    Ok(Json(DeleteExamResponse {
        deleted: true,
        exam_id,
        abandoned_attempts,
    }))
}

#[axum::debug_handler]
pub async fn list_submissions(
    State(state): State<AppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (exam, submissions) = state.exam_service.submissions(exam_id).await?;
    let ranked = rank_service::rank(submissions);
    Ok(Json(json!({
        "exam": exam.summary(),
        "submissions": ranked,
    })))
}

#[axum::debug_handler]
pub async fn export_submissions(
    State(state): State<AppState>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (exam, submissions) = state.exam_service.submissions(exam_id).await?;
    let ranked = rank_service::rank(submissions);
    let buffer = ExportService::rank_list_xlsx(&exam, &ranked)?;

    let filename = format!(
        "rank_list_{}_{}.xlsx",
        exam.title
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect::<String>(),
        chrono::Utc::now().format("%Y%m%d")
    );
    let disposition = format!("attachment; filename=\"{}\"", filename);

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buffer,
    ))
}

#[axum::debug_handler]
pub async fn review_submission(
    State(state): State<AppState>,
    Path((exam_id, student_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse> {
    let (exam, submission) = state.exam_service.submission(exam_id, student_id).await?;
    Ok(Json(ReviewService::build(&exam, &submission)))
}

#[axum::debug_handler]
pub async fn generate_drafts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<GenerateDraftsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let teacher_id = claims.user_id()?;
    let questions = state.ai_service.generate_drafts(teacher_id, &payload).await?;
    let stage_id = state.draft_staging.stage(teacher_id, questions.clone());
    Ok((
        StatusCode::CREATED,
        Json(DraftStageResponse { stage_id, questions }),
    ))
}

#[axum::debug_handler]
pub async fn get_drafts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stage_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let questions = state
        .draft_staging
        .pending(claims.user_id()?, stage_id)
        .ok_or_else(|| Error::NotFound("Draft stage not found".to_string()))?;
    Ok(Json(DraftStageResponse { stage_id, questions }))
}

#[axum::debug_handler]
pub async fn accept_drafts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(stage_id): Path<Uuid>,
    Json(payload): Json<AcceptDraftsPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let existing = payload.existing.len();
    let questions = state.draft_staging.accept(
        claims.user_id()?,
        stage_id,
        &payload.selected,
        payload.existing,
    )?;
    Ok(Json(AcceptDraftsResponse {
        accepted: questions.len() - existing,
        questions,
    }))
}
