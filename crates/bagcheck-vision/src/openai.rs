//! OpenAI-compatible chat completions client
//!
//! Sends one system turn and one multimodal user turn (text plus an image
//! data URI) and asks for a single JSON object back. The completion text is
//! returned untouched; interpreting it is the caller's job.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 300;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response envelope ({status}): {message}")]
    Envelope { status: u16, message: String },
    #[error("model returned no completion text (finish_reason: {finish_reason:?})")]
    EmptyCompletion { finish_reason: Option<String> },
}

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// `None` keeps reqwest's default (no timeout)
    pub timeout: Option<Duration>,
}

/// One inspection turn: the instructions, the user's text and the image URI
#[derive(Debug, Clone, Copy)]
pub struct VisionPrompt<'a> {
    pub system: &'a str,
    pub text: &'a str,
    pub image_url: &'a str,
}

/// Raw completion as received, before any parsing by the caller
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub finish_reason: Option<String>,
    pub model: Option<String>,
}

impl Completion {
    /// True when the provider cut the answer off at `max_tokens`
    pub fn truncated(&self) -> bool {
        self.finish_reason.as_deref() == Some("length")
    }
}

#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Arc<String>,
    model: String,
    max_tokens: u32,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, ChatError> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("Bagcheck/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: Arc::new(config.api_key),
            model: config.model,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run a single completion constrained to a JSON object. No retries.
    pub async fn complete_json(&self, prompt: &VisionPrompt<'_>) -> Result<Completion, ChatError> {
        let url = format!("{}/chat/completions", self.api_url);
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(prompt.system),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text { text: prompt.text },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: prompt.image_url,
                            },
                        },
                    ]),
                },
            ],
            max_tokens: self.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        info!(
            "Sending inspection to {} ({} byte image URI)",
            self.model,
            prompt.image_url.len()
        );
        debug!("Vision API request to {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Vision API error {}: {}", status, text);
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: provider_error_message(&text),
            });
        }

        let envelope: ChatResponse =
            serde_json::from_str(&text).map_err(|e| {
                warn!("Vision API returned an unreadable envelope: {}", text);
                ChatError::Envelope {
                    status: status.as_u16(),
                    message: e.to_string(),
                }
            })?;

        let choice = envelope
            .choices
            .into_iter()
            .next()
            .ok_or(ChatError::EmptyCompletion {
                finish_reason: None,
            })?;
        let Some(content) = choice.message.content.filter(|c| !c.trim().is_empty()) else {
            warn!(
                "Vision API returned no content (finish_reason: {:?})",
                choice.finish_reason
            );
            return Err(ChatError::EmptyCompletion {
                finish_reason: choice.finish_reason,
            });
        };

        let completion = Completion {
            content,
            finish_reason: choice.finish_reason,
            model: envelope.model,
        };

        if completion.truncated() {
            warn!("Completion hit max_tokens ({}), output is likely cut off", self.max_tokens);
        }
        debug!(
            "Completion received ({} chars): {}",
            completion.content.len(),
            completion.content.chars().take(200).collect::<String>()
        );

        Ok(completion)
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Pull `error.message` out of an OpenAI-style error body, else keep the body
fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error.message)
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}
