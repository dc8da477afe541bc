use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::{NavigateRequest, SelectAnswerRequest};
use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::services::review_service::ReviewService;
use crate::utils::time;
use crate::AppState;

#[axum::debug_handler]
pub async fn list_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(class_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let student_id = claims.user_id()?;
    let exams = state
        .catalog_service
        .list_for_class(class_id, student_id, time::now())
        .await;
    Ok(Json(json!({ "exams": exams })))
}

#[axum::debug_handler]
pub async fn open_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let student_id = claims.user_id()?;
    let outcome = state
        .attempt_service
        .open(exam_id, student_id, time::now())
        .await?;
    Ok(Json(outcome))
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempt = state
        .attempt_service
        .view(exam_id, claims.user_id()?)
        .await?;
    Ok(Json(attempt))
}

#[axum::debug_handler]
pub async fn select_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(payload): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let attempt = state
        .attempt_service
        .select(
            exam_id,
            claims.user_id()?,
            payload.question_id,
            payload.option_index,
        )
        .await?;
    Ok(Json(attempt))
}

#[axum::debug_handler]
pub async fn navigate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state
        .attempt_service
        .navigate(exam_id, claims.user_id()?, payload.direction)
        .await?;
    Ok(Json(outcome))
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let receipt = state
        .attempt_service
        .submit(exam_id, claims.user_id()?, time::now())
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

#[axum::debug_handler]
pub async fn abandon_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.attempt_service.abandon(exam_id, claims.user_id()?)?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let (exam, submission) = state
        .exam_service
        .submission(exam_id, claims.user_id()?)
        .await?;
    let review = ReviewService::for_student(&exam, &submission)?;
    Ok(Json(review))
}
