use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use bagcheck_vision::codec::DEFAULT_JPEG_QUALITY;
use bagcheck_vision::openai::{DEFAULT_API_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use bagcheck_vision::ChatClientConfig;

pub const DEFAULT_PROMPT: &str = "Please analyze this thermal bag image.";
pub const DEFAULT_HTTP_PORT: u16 = 7860;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct Config {
    pub openai_api_url: String,
    pub openai_api_key: String,
    pub openai_model: String,

    /// Completion bound sent as `max_tokens`
    pub max_tokens: u32,
    /// Outbound request timeout; `None` keeps the transport default
    pub timeout: Option<Duration>,
    /// Text of the user turn that accompanies the image
    pub prompt: String,
    /// Optional file replacing the built-in rubric
    pub rubric_path: Option<PathBuf>,

    pub jpeg_quality: u8,

    pub http_host: String,
    pub http_port: u16,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            openai_api_url: var("OPENAI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            openai_api_key: var("OPENAI_API_KEY").context(
                "OPENAI_API_KEY not found. Set it in the environment or in a .env file.",
            )?,
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),

            max_tokens: match var("INSPECT_MAX_TOKENS") {
                Some(v) => {
                    let n: u32 = v
                        .trim()
                        .parse()
                        .context("INSPECT_MAX_TOKENS must be a positive integer")?;
                    anyhow::ensure!(n > 0, "INSPECT_MAX_TOKENS must be a positive integer");
                    n
                }
                None => DEFAULT_MAX_TOKENS,
            },
            timeout: var("INSPECT_TIMEOUT_SECS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .context("INSPECT_TIMEOUT_SECS must be a whole number of seconds")?
                .map(Duration::from_secs),
            prompt: var("INSPECT_PROMPT").unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
            rubric_path: var("RUBRIC_PATH").map(PathBuf::from),

            jpeg_quality: match var("JPEG_QUALITY") {
                Some(v) => {
                    let q: u8 = v.trim().parse().context("JPEG_QUALITY must be 1-100")?;
                    anyhow::ensure!((1..=100).contains(&q), "JPEG_QUALITY must be 1-100");
                    q
                }
                None => DEFAULT_JPEG_QUALITY,
            },

            http_host: var("HTTP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            http_port: var("HTTP_PORT")
                .map(|v| v.trim().parse::<u16>())
                .transpose()
                .context("HTTP_PORT must be a valid port number")?
                .unwrap_or(DEFAULT_HTTP_PORT),
            max_upload_bytes: var("MAX_UPLOAD_BYTES")
                .map(|v| v.trim().parse::<usize>())
                .transpose()
                .context("MAX_UPLOAD_BYTES must be a byte count")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        })
    }

    pub fn chat_client_config(&self) -> ChatClientConfig {
        ChatClientConfig {
            api_url: self.openai_api_url.clone(),
            api_key: self.openai_api_key.clone(),
            model: self.openai_model.clone(),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("openai_api_url", &self.openai_api_url)
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_model", &self.openai_model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("prompt", &self.prompt)
            .field("rubric_path", &self.rubric_path)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("http_host", &self.http_host)
            .field("http_port", &self.http_port)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}
