pub mod health;
pub mod student;
pub mod teacher;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::middleware::auth::{require_student, require_teacher};
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::AppState;

/// Page images for the draft generator are the largest bodies we accept.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let student_api = Router::new()
        .route("/api/classes/:class_id/exams", get(student::list_exams))
        .route(
            "/api/exams/:exam_id/attempt",
            post(student::open_attempt)
                .get(student::get_attempt)
                .delete(student::abandon_attempt),
        )
        .route("/api/exams/:exam_id/attempt/answer", put(student::select_answer))
        .route("/api/exams/:exam_id/attempt/navigate", post(student::navigate))
        .route("/api/exams/:exam_id/attempt/submit", post(student::submit_attempt))
        .route("/api/exams/:exam_id/result", get(student::get_result))
        .route_layer(from_fn_with_state(state.auth.clone(), require_student))
        .layer(from_fn_with_state(
            RateLimiter::per_second(state.public_rps),
            rps_middleware,
        ));

    let teacher_api = Router::new()
        .route("/api/teacher/exams", post(teacher::create_exam))
        .route(
            "/api/teacher/exams/:exam_id",
            axum::routing::delete(teacher::delete_exam),
        )
        .route(
            "/api/teacher/exams/:exam_id/submissions",
            get(teacher::list_submissions),
        )
        .route(
            "/api/teacher/exams/:exam_id/submissions/export",
            get(teacher::export_submissions),
        )
        .route(
            "/api/teacher/exams/:exam_id/submissions/:student_id/review",
            get(teacher::review_submission),
        )
        .route("/api/teacher/drafts/generate", post(teacher::generate_drafts))
        .route("/api/teacher/drafts/:stage_id", get(teacher::get_drafts))
        .route(
            "/api/teacher/drafts/:stage_id/accept",
            post(teacher::accept_drafts),
        )
        .route_layer(from_fn_with_state(state.auth.clone(), require_teacher))
        .layer(from_fn_with_state(
            RateLimiter::per_second(state.teacher_rps),
            rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(student_api)
        .merge(teacher_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}
