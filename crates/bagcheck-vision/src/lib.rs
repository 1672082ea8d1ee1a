//! Bagcheck Vision - image and model I/O for the inspector
//!
//! Modules:
//! - codec: decode uploads, re-encode as base64 JPEG
//! - openai: OpenAI-compatible chat completions client with image input

pub mod codec;
pub mod openai;

pub use codec::{CodecError, JpegCodec};
pub use openai::{ChatClient, ChatClientConfig, ChatError, Completion, VisionPrompt};
