use crate::dto::draft_dto::{DraftSource, GenerateDraftsPayload, ALLOWED_IMAGE_TYPES};
use crate::error::{Error, Result};
use crate::models::question::{Question, MAX_MARKS, OPTION_COUNT};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::{Client, StatusCode};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct GeneratorSettings {
    pub base_url: String,
    pub model: String,
    pub max_questions: usize,
    pub max_images: usize,
    pub cooldown: Duration,
}

#[derive(Clone)]
pub struct AIService {
    client: Client,
    api_key: String,
    settings: GeneratorSettings,
    /// Teacher id -> end of the cooldown that followed an upstream 429.
    cooldowns: Arc<Mutex<HashMap<Uuid, Instant>>>,
}

impl AIService {
    pub fn new(api_key: String, client: Client, settings: GeneratorSettings) -> Self {
        Self {
            client,
            api_key,
            settings,
            cooldowns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Proposes draft questions from page images or a topic.
    ///
    /// Nothing is written anywhere; the caller decides what to stage.
    pub async fn generate_drafts(
        &self,
        teacher_id: Uuid,
        payload: &GenerateDraftsPayload,
    ) -> Result<Vec<Question>> {
        self.check_cooldown(teacher_id)?;
        self.check_request(payload)?;

        let system_prompt = r#"You are an experienced school teacher writing multiple-choice exam questions.
Return a JSON object with a single field 'questions'.

Rules:
1. Every question has exactly four options and exactly one correct option.
2. 'correct_option_index' is the 0-based position of the correct option. Vary it between questions.
3. 'marks' is a positive integer, 1 unless a question is clearly harder.
4. Write questions, options and nothing else in the requested language.
5. Only use facts present in the provided material or the given topic.
"#;

        let instructions = serde_json::json!({
            "language": payload.language,
            "level": payload.level.as_str(),
            "required_count": payload.count,
            "schema_example": {
                "questions": [
                    {
                        "text": "Question text",
                        "options": ["Option A", "Option B", "Option C", "Option D"],
                        "correct_option_index": 1,
                        "marks": 1
                    }
                ]
            }
        });

        let mut content: Vec<JsonValue> = Vec::new();
        match &payload.source {
            DraftSource::Topic { topic } => {
                content.push(serde_json::json!({
                    "type": "text",
                    "text": format!("Topic: {}\n\n{}", topic.trim(), instructions),
                }));
            }
            DraftSource::Images { images } => {
                content.push(serde_json::json!({
                    "type": "text",
                    "text": format!(
                        "Write questions about the textbook pages in the images below.\n\n{}",
                        instructions
                    ),
                }));
                for (i, image) in images.iter().enumerate() {
                    tracing::debug!(page = i + 1, mime_type = %image.mime_type, "Adding page image");
                    content.push(serde_json::json!({
                        "type": "image_url",
                        "image_url": {
                            "url": format!("data:{};base64,{}", image.mime_type, strip_data_url(&image.data_base64)),
                            "detail": "high"
                        }
                    }));
                }
            }
        }

        let request = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": content}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7
        });

        let raw = self.chat_openai(teacher_id, request).await?;
        let parsed = parse_model_output(&raw)?;
        let questions = sanitize_questions(&parsed, payload.count);
        if questions.is_empty() {
            return Err(Error::Generation(
                "the model returned no usable questions".to_string(),
            ));
        }

        tracing::info!(
            teacher_id = %teacher_id,
            requested = payload.count,
            generated = questions.len(),
            "Draft questions generated"
        );
        Ok(questions)
    }

    fn check_request(&self, payload: &GenerateDraftsPayload) -> Result<()> {
        if payload.count > self.settings.max_questions {
            return Err(Error::BadRequest(format!(
                "At most {} questions can be generated at once",
                self.settings.max_questions
            )));
        }
        match &payload.source {
            DraftSource::Topic { topic } if topic.trim().is_empty() => {
                Err(Error::BadRequest("Topic must not be empty".to_string()))
            }
            DraftSource::Topic { .. } => Ok(()),
            DraftSource::Images { images } => {
                if images.is_empty() || images.len() > self.settings.max_images {
                    return Err(Error::BadRequest(format!(
                        "Provide between 1 and {} page images",
                        self.settings.max_images
                    )));
                }
                for image in images {
                    if !ALLOWED_IMAGE_TYPES.contains(&image.mime_type.as_str()) {
                        return Err(Error::BadRequest(format!(
                            "Unsupported image type '{}'",
                            image.mime_type
                        )));
                    }
                    if BASE64.decode(strip_data_url(&image.data_base64)).is_err() {
                        return Err(Error::BadRequest(
                            "Page image is not valid base64".to_string(),
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    /// Seconds left on this teacher's cooldown, if one is running.
    pub fn cooldown_remaining(&self, teacher_id: Uuid) -> Option<u64> {
        let mut cooldowns = self.cooldowns.lock().unwrap_or_else(PoisonError::into_inner);
        let until = *cooldowns.get(&teacher_id)?;
        let now = Instant::now();
        if now >= until {
            cooldowns.remove(&teacher_id);
            return None;
        }
        let left = until - now;
        Some(left.as_secs() + u64::from(left.subsec_nanos() > 0))
    }

    fn check_cooldown(&self, teacher_id: Uuid) -> Result<()> {
        match self.cooldown_remaining(teacher_id) {
            Some(retry_after_seconds) => Err(Error::RateLimited { retry_after_seconds }),
            None => Ok(()),
        }
    }

    fn start_cooldown(&self, teacher_id: Uuid) {
        self.cooldowns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(teacher_id, Instant::now() + self.settings.cooldown);
    }

    async fn chat_openai(&self, teacher_id: Uuid, payload: JsonValue) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let res = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            self.start_cooldown(teacher_id);
            tracing::warn!(
                teacher_id = %teacher_id,
                cooldown_seconds = self.settings.cooldown.as_secs(),
                "Model endpoint rate limited, cooling down"
            );
            return Err(Error::RateLimited {
                retry_after_seconds: self.settings.cooldown.as_secs(),
            });
        }

        let body: JsonValue = res.error_for_status()?.json().await?;
        body.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Generation("unexpected response format".to_string()))
    }
}

fn strip_data_url(data: &str) -> &str {
    match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_model_output(raw: &str) -> Result<JsonValue> {
    serde_json::from_str(strip_code_fences(raw))
        .map_err(|e| Error::Generation(format!("model output is not valid JSON: {}", e)))
}

/// Keeps well-formed questions, numbered 1..=n, at most `limit` of them.
pub fn sanitize_questions(raw: &JsonValue, limit: usize) -> Vec<Question> {
    let items = raw
        .get("questions")
        .and_then(|q| q.as_array())
        .or_else(|| raw.as_array());
    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(coerce_question)
        .take(limit)
        .enumerate()
        .map(|(idx, mut q)| {
            q.id = idx as i32 + 1;
            q
        })
        .collect()
}

fn coerce_question(v: &JsonValue) -> Option<Question> {
    let text = v
        .get("text")
        .or_else(|| v.get("question"))
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())?;

    let options: Vec<String> = v
        .get("options")?
        .as_array()?
        .iter()
        .map(|o| o.as_str().map(|s| s.trim().to_string()))
        .collect::<Option<Vec<_>>>()?;
    if options.iter().any(|o| o.is_empty()) {
        return None;
    }
    let options: [String; OPTION_COUNT] = options.try_into().ok()?;

    let correct = v
        .get("correct_option_index")
        .or_else(|| v.get("correct_answer"))
        .and_then(|c| c.as_u64())
        .filter(|c| (*c as usize) < OPTION_COUNT)?;

    let marks = v
        .get("marks")
        .and_then(|m| m.as_i64())
        .filter(|m| (1..=i64::from(MAX_MARKS)).contains(m))
        .and_then(|m| i32::try_from(m).ok())
        .unwrap_or(1);

    Some(Question {
        id: 0,
        text: text.to_string(),
        options,
        correct_option_index: correct as u8,
        marks,
    })
}
