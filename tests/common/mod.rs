#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use resultmate_backend::{
    config::Config, database::MemoryExamStore, middleware::auth::Claims, routes, AppState,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";

pub fn test_config(openai_base_url: &str) -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: None,
        jwt_secret: JWT_SECRET.into(),
        openai_api_key: "sk-test".into(),
        openai_base_url: openai_base_url.into(),
        openai_model: "gpt-test".into(),
        public_rps: 1000,
        teacher_rps: 1000,
        max_draft_questions: 20,
        max_draft_images: 4,
        generation_cooldown_seconds: 60,
        submission_grace_seconds: 300,
        clamp_duration_to_window: false,
    }
}

pub fn app_with(config: &Config) -> (Router, Arc<MemoryExamStore>) {
    let store = Arc::new(MemoryExamStore::new());
    let state = AppState::new(config, store.clone()).expect("app state");
    (routes::create_router(state), store)
}

pub fn app() -> (Router, Arc<MemoryExamStore>) {
    app_with(&test_config("http://127.0.0.1:9"))
}

pub fn token(user_id: Uuid, role: Option<&str>) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
        role: role.map(str::to_string),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("sign token")
}

pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    let req = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let (status, _, bytes) = send_raw(app, method, uri, bearer, body).await;
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
    };
    (status, json)
}

pub fn question(text: &str, correct: u8, marks: i32) -> JsonValue {
    json!({
        "text": text,
        "options": ["A", "B", "C", "D"],
        "correct_option_index": correct,
        "marks": marks,
    })
}

pub fn exam_payload(
    class_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    duration_minutes: i32,
    questions: Vec<JsonValue>,
    show_result_immediately: bool,
) -> JsonValue {
    json!({
        "class_id": class_id,
        "title": "Unit test",
        "start_time": start,
        "end_time": end,
        "duration_minutes": duration_minutes,
        "questions": questions,
        "settings": {
            "shuffle_questions": false,
            "show_result_immediately": show_result_immediately,
        },
        "is_published": true,
    })
}

/// Creates an exam through the teacher API and returns its id.
pub async fn create_exam(app: &Router, teacher_token: &str, payload: JsonValue) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/teacher/exams",
        Some(teacher_token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create exam failed: {body}");
    body["id"].as_str().unwrap().parse().unwrap()
}
