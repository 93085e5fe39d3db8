//! Scoring: one chat-completion call per image, returning a [`RubricResult`].
//!
//! The request is a single user message with two parts: the rubric prompt
//! (see [`crate::prompts`]) and the image, either as a URL the service fetches
//! itself or as an inline PNG data URL produced by the normaliser. Sampling
//! temperature is low and `response_format` is forced to a JSON object so the
//! reply can be validated strictly.
//!
//! ## No retries
//!
//! Each call makes exactly one attempt. A failure is returned to the caller,
//! which records it on the row and moves on; re-running the sheet is the
//! retry policy.
//!
//! ## Cancellation
//!
//! The whole exchange (send + body read) races the run's
//! [`CancellationToken`]. When the token fires the in-flight request future is
//! dropped, which aborts the connection, and the call returns
//! [`ScoreError::Cancelled`] straight away.

use crate::config::ReviewConfig;
use crate::error::ScoreError;
use crate::prompts::rubric_prompt;
use crate::rubric::RubricResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Scores one image against the rubric.
#[async_trait]
pub trait RubricScorer: Send + Sync {
    async fn score(
        &self,
        image_url: &str,
        brief: &str,
        cancel: &CancellationToken,
    ) -> Result<RubricResult, ScoreError>;
}

/// HTTP client for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct OpenAiScorer {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    timeout_secs: Option<u64>,
}

impl std::fmt::Debug for OpenAiScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiScorer")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl OpenAiScorer {
    /// Build a scorer from the run configuration.
    ///
    /// A missing API key is not an error here; [`RubricScorer::score`]
    /// reports it without touching the network.
    pub fn from_config(config: &ReviewConfig) -> Result<Self, ScoreError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().map_err(|e| ScoreError::Request(e.to_string()))?;

        Ok(Self {
            http,
            api_key: config.credential().unwrap_or_default().to_string(),
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn build_request<'a>(&'a self, image_url: &'a str, brief: &str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: rubric_prompt(brief),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
            temperature: self.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }

    async fn exchange(&self, request: &ChatRequest<'_>) -> Result<RubricResult, ScoreError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            return Err(ScoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let content = extract_content(&body)?;
        RubricResult::from_json_str(&content)
    }

    fn request_error(&self, e: reqwest::Error) -> ScoreError {
        match self.timeout_secs {
            Some(secs) if e.is_timeout() => ScoreError::Timeout { secs },
            _ => ScoreError::Request(with_causes(&e)),
        }
    }
}

/// The error's message followed by each `source()` in turn, `": "`-separated.
fn with_causes(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl RubricScorer for OpenAiScorer {
    async fn score(
        &self,
        image_url: &str,
        brief: &str,
        cancel: &CancellationToken,
    ) -> Result<RubricResult, ScoreError> {
        if self.api_key.is_empty() {
            return Err(ScoreError::MissingCredential);
        }
        if image_url.trim().is_empty() {
            return Err(ScoreError::MissingImageReference);
        }

        let request = self.build_request(image_url, brief);
        let start = Instant::now();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ScoreError::Cancelled),
            r = self.exchange(&request) => r,
        };

        match &result {
            Ok(_) => debug!("Scored image in {:?}", start.elapsed()),
            Err(e) => warn!("Scoring failed after {:?}: {}", start.elapsed(), e),
        }
        result
    }
}

/// Pull the message content out of a chat-completion envelope.
///
/// Content is normally a string. A parts array is also accepted, in which
/// case the first part's `text` is used.
fn extract_content(body: &str) -> Result<String, ScoreError> {
    let envelope: ChatResponse = serde_json::from_str(body).map_err(|e| {
        ScoreError::InvalidRubric(format!("response envelope is not valid JSON: {e}"))
    })?;

    let content = envelope
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);

    let text = match content {
        Some(Value::String(s)) => s,
        Some(Value::Array(parts)) => parts
            .first()
            .and_then(|p| p.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };

    if text.trim().is_empty() {
        return Err(ScoreError::NoContent);
    }
    Ok(text)
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: String },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<Value>,
}
