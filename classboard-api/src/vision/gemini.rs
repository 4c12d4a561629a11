//! Gemini `generateContent` client
//!
//! One request per schedule image: the prompt and the inline image as two
//! parts of a single user turn. Calls are rate limited per minute.

use async_trait::async_trait;
use classboard_common::config::VisionConfig;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

use super::{schedule_response_schema, InlineImage, VisionError, VisionModel, VisionResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Gemini API client
pub struct GeminiClient {
    endpoint: String,
    model: String,
    api_key: String,
    structured_output: bool,
    client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl GeminiClient {
    pub fn new(config: &VisionConfig, api_key: &str) -> VisionResult<Self> {
        let per_minute = NonZeroU32::new(config.requests_per_minute).ok_or_else(|| {
            VisionError::Config("requests_per_minute must be at least 1".to_string())
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VisionError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
            structured_output: config.structured_output,
            client,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body<'a>(&self, prompt: &'a str, image: &'a InlineImage) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: &image.mime_type,
                            data: &image.data,
                        },
                    },
                ],
            }],
            generation_config: self.structured_output.then(|| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schedule_response_schema(),
            }),
        }
    }
}

/// Concatenated text parts of the first candidate
fn reply_text(response: GenerateResponse) -> VisionResult<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(VisionError::EmptyReply(format!("prompt blocked ({})", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| VisionError::EmptyReply("no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(VisionError::EmptyReply(format!("finish reason {}", reason)));
    }

    Ok(text)
}

#[async_trait]
impl VisionModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, image: &InlineImage) -> VisionResult<String> {
        self.rate_limiter.until_ready().await;

        debug!(
            model = %self.model,
            mime_type = %image.mime_type,
            encoded_len = image.data.len(),
            structured = self.structured_output,
            "Calling vision model"
        );

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt, image))
            .send()
            .await
            .map_err(|e| VisionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(VisionError::Api(status.as_u16(), message));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        let text = reply_text(parsed)?;
        debug!(reply_len = text.len(), "Vision model replied");
        Ok(text)
    }
}
