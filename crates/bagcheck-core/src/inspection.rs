//! Bag inspection
//!
//! Sends the rubric and one encoded photo to the hosted model and turns its
//! reply into an [`InspectionVerdict`]. The reply is untrusted input: it must
//! be a single JSON object with exactly `is_acceptable` and `reason`.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use bagcheck_vision::codec::JPEG_MIME_TYPE;
use bagcheck_vision::{ChatClient, ChatError, CodecError, VisionPrompt};

use crate::config::Config;
use crate::rubric::Rubric;

/// One inspection as sent to the model
#[derive(Debug, Clone, Copy)]
pub struct InspectionRequest<'a> {
    pub instruction_text: &'a str,
    pub image_base64: &'a str,
    pub mime_type: &'static str,
}

impl<'a> InspectionRequest<'a> {
    pub fn new(instruction_text: &'a str, image_base64: &'a str) -> Self {
        Self {
            instruction_text,
            image_base64,
            mime_type: JPEG_MIME_TYPE,
        }
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.image_base64)
    }
}

/// The model's decision for one photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InspectionVerdict {
    is_acceptable: bool,
    reason: String,
}

impl InspectionVerdict {
    pub fn new(is_acceptable: bool, reason: impl Into<String>) -> Self {
        Self {
            is_acceptable,
            reason: reason.into(),
        }
    }

    pub fn is_acceptable(&self) -> bool {
        self.is_acceptable
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InspectionError {
    #[error("no image provided")]
    NoImageProvided,
    #[error("could not process image: {0}")]
    ImageEncode(#[from] CodecError),
    #[error("could not reach the model provider: {0}")]
    Transport(String),
    #[error("model provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("failed to parse model response: {detail}")]
    JsonParse { detail: String, raw: String },
    #[error("inspection worker failed: {0}")]
    Worker(String),
}

impl From<ChatError> for InspectionError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Request(e) => InspectionError::Transport(e.to_string()),
            ChatError::Api { status, message } => InspectionError::Api { status, message },
            ChatError::Envelope { status, message } => InspectionError::Api { status, message },
            ChatError::EmptyCompletion { finish_reason } => InspectionError::JsonParse {
                detail: format!(
                    "completion had no content (finish_reason: {})",
                    finish_reason.as_deref().unwrap_or("none")
                ),
                raw: String::new(),
            },
        }
    }
}

/// Anything that can judge a base64 JPEG of a bag
#[async_trait]
pub trait Inspector: Send + Sync {
    async fn inspect(&self, image_base64: &str) -> Result<InspectionVerdict, InspectionError>;
}

/// Strictly parse the model's reply into a verdict.
///
/// No prose or code fences are tolerated around the object. The raw text is
/// logged on failure and kept on the error for diagnostics.
pub fn parse_verdict(raw: &str) -> Result<InspectionVerdict, InspectionError> {
    let malformed = |detail: String| {
        warn!("Model response did not match the verdict schema: {}", detail);
        warn!("Raw response content: {}", raw);
        InspectionError::JsonParse {
            detail,
            raw: raw.to_string(),
        }
    };

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(malformed("expected a single JSON object".to_string()));
    }
    let verdict: InspectionVerdict =
        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

    let reason = verdict.reason.trim();
    if reason.is_empty() {
        return Err(malformed("reason is empty".to_string()));
    }

    Ok(InspectionVerdict::new(verdict.is_acceptable, reason))
}

/// Inspector backed by an OpenAI-compatible vision model
#[derive(Debug)]
pub struct OpenAiInspector {
    client: ChatClient,
    rubric: Rubric,
    prompt: String,
}

impl OpenAiInspector {
    pub fn new(config: &Config, rubric: Rubric) -> anyhow::Result<Self> {
        let client = ChatClient::new(config.chat_client_config())
            .context("Failed to build model provider HTTP client")?;

        Ok(Self {
            client,
            rubric,
            prompt: config.prompt.clone(),
        })
    }
}

#[async_trait]
impl Inspector for OpenAiInspector {
    async fn inspect(&self, image_base64: &str) -> Result<InspectionVerdict, InspectionError> {
        if image_base64.is_empty() {
            return Err(InspectionError::NoImageProvided);
        }

        let request = InspectionRequest::new(&self.prompt, image_base64);
        let data_uri = request.data_uri();
        let prompt = VisionPrompt {
            system: self.rubric.text(),
            text: request.instruction_text,
            image_url: &data_uri,
        };

        let completion = self.client.complete_json(&prompt).await?;

        let verdict = parse_verdict(&completion.content).map_err(|e| match e {
            InspectionError::JsonParse { detail, raw } if completion.truncated() => {
                InspectionError::JsonParse {
                    detail: format!("{} (completion stopped at max_tokens)", detail),
                    raw,
                }
            }
            other => other,
        })?;

        info!(
            "Verdict from {}: acceptable={}",
            completion.model.as_deref().unwrap_or(self.client.model()),
            verdict.is_acceptable()
        );
        debug!("Verdict reason: {}", verdict.reason());

        Ok(verdict)
    }
}
