//! Classification: ask a vision model whether the first page is a paper.
//!
//! The request is one user message holding the instruction prompt and the
//! page as an inline `data:image/png;base64,...` image. The answer must be a
//! JSON object `{is_paper, title, author}`.
//!
//! Two failure points are kept apart:
//!
//! * [`ClassifyError::RequestFailed`]: nothing usable came back (network,
//!   auth, non-2xx, timeout).
//! * [`ClassifyError::ParseFailed`]: the model answered, but not with JSON.
//!   The orchestrator treats this as "not a paper", the safe outcome.
//!
//! Valid JSON that lacks a field is *not* a parse failure: the missing field
//! takes its default (`false` / `""`).
//!
//! [`OpenAiClassifier`] talks to an OpenAI-compatible `chat/completions`
//! endpoint with a strict `json_schema` response format. Other providers go
//! through [`crate::pipeline::llm::ProviderClassifier`].

use crate::config::RenamerConfig;
use crate::error::{ClassifyError, RenamerError};
use crate::pipeline::encode::PageImage;
use crate::prompts::{classification_schema, SCHEMA_NAME};
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// What the model decided about one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_paper: bool,
    /// May be empty even when `is_paper` is true.
    pub title: String,
    pub author: String,
}

impl ClassificationResult {
    /// The fallback used when the answer cannot be parsed.
    pub fn not_a_paper() -> Self {
        Self::default()
    }
}

/// A vision model that can classify a rendered first page.
///
/// Returns a boxed future so implementations can be stored as
/// `Arc<dyn Classifier>`.
pub trait Classifier: Send + Sync {
    /// One attempt, no retry.
    fn classify<'a>(
        &'a self,
        image: &'a PageImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<ClassificationResult, ClassifyError>>;
}

/// Wire shape of the answer. Every field is optional so that a missing or
/// `null` field falls back to its default instead of failing the parse.
#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(default)]
    is_paper: Option<bool>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
}

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```$").unwrap());

/// Parse the model's text answer into a [`ClassificationResult`].
///
/// Tolerates an outer ```` ```json ```` fence and surrounding whitespace.
pub fn parse_classification(content: &str) -> Result<ClassificationResult, ClassifyError> {
    let trimmed = content.trim();
    let body = RE_CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(trimmed);

    let raw: RawClassification =
        serde_json::from_str(body).map_err(|e| ClassifyError::ParseFailed {
            detail: format!("{e}; content: {:?}", truncate(trimmed, 200)),
        })?;

    Ok(ClassificationResult {
        is_paper: raw.is_paper.unwrap_or(false),
        title: raw.title.unwrap_or_default().trim().to_string(),
        author: raw.author.unwrap_or_default().trim().to_string(),
    })
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── OpenAI-compatible backend ────────────────────────────────────────────

/// Chat-completions response, reduced to the fields we read.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// [`Classifier`] for OpenAI and OpenAI-compatible endpoints.
///
/// Uses structured outputs (`response_format.type = "json_schema"`,
/// `strict: true`) so a conforming server can only answer with the
/// three-field record.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl OpenAiClassifier {
    /// Build a client from the config. Requires an API key.
    pub fn from_config(config: &RenamerConfig) -> Result<Self, RenamerError> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| RenamerError::ProviderNotConfigured {
                provider: "openai".into(),
                hint: format!(
                    "Set `api_key` in the config file or export {}.",
                    crate::config::API_KEY_ENV
                ),
            })?;
        Self::new(
            &config.api_base_url,
            api_key,
            &config.model,
            config.api_timeout(),
        )
        .map(|c| c.with_sampling(config.temperature, config.max_tokens))
    }

    /// Build a client for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// `timeout` bounds the whole request, connect through body.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RenamerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RenamerError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
            max_tokens: 300,
        })
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// JSON body of the chat-completions request.
    fn request_body(&self, image: &PageImage, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image.to_data_uri() } }
                ]
            }],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": SCHEMA_NAME,
                    "strict": true,
                    "schema": classification_schema()
                }
            }
        })
    }

    async fn send(
        &self,
        image: &PageImage,
        prompt: &str,
    ) -> Result<ClassificationResult, ClassifyError> {
        let body = self.request_body(image, prompt);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifyError::RequestFailed {
                detail: if e.is_timeout() {
                    format!("timed out: {e}")
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClassifyError::RequestFailed {
                detail: format!("HTTP {}: {}", status, truncate(text.trim(), 300)),
            });
        }

        let completion: ChatCompletion =
            response
                .json()
                .await
                .map_err(|e| ClassifyError::RequestFailed {
                    detail: format!("unreadable response body: {e}"),
                })?;

        let message = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ClassifyError::ParseFailed {
                detail: "response has no choices".into(),
            })?;

        if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
            return Err(ClassifyError::ParseFailed {
                detail: format!("model refused: {refusal}"),
            });
        }

        let content = message.content.unwrap_or_default();
        debug!("Classification response: {}", content.trim());
        parse_classification(&content)
    }
}

impl Classifier for OpenAiClassifier {
    fn classify<'a>(
        &'a self,
        image: &'a PageImage,
        prompt: &'a str,
    ) -> BoxFuture<'a, Result<ClassificationResult, ClassifyError>> {
        Box::pin(self.send(image, prompt))
    }
}
