//! Judgement service boundary
//!
//! [`JudgementService`] is the raw contract with the generative-AI service:
//! it may fail with a [`JudgeError`]. [`JudgementAdapter`] wraps it and never
//! fails; every call yields a [`crate::types::Judged`] value.

pub mod adapter;
pub mod gemini_client;
pub mod normalize;
pub mod prompts;

pub use adapter::JudgementAdapter;
pub use gemini_client::GeminiClient;

use crate::types::MediaType;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Judgement service call failure (never escapes the adapter)
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to parse reply: {0}")]
    Parse(String),

    #[error("Empty reply: {0}")]
    EmptyResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for JudgeError {
    fn from(err: serde_json::Error) -> Self {
        JudgeError::Parse(err.to_string())
    }
}

/// Contract with the external generative-AI service
///
/// Media-bound calls receive the media file; text calls receive only text.
/// Implementations are shared across concurrently running pipelines.
#[async_trait]
pub trait JudgementService: Send + Sync {
    /// Speech transcript of the media
    async fn transcribe(&self, media: &Path, media_type: MediaType) -> Result<String, JudgeError>;

    /// On-screen text, one line per caption or annotation
    async fn ocr(&self, media: &Path, media_type: MediaType) -> Result<String, JudgeError>;

    /// Scene analysis as raw JSON (`summary`, `segments`, `risk_flags`)
    async fn analyze_visual(
        &self,
        media: &Path,
        media_type: MediaType,
    ) -> Result<serde_json::Value, JudgeError>;

    /// Free-text completion
    async fn generate_text(&self, prompt: &str) -> Result<String, JudgeError>;

    /// JSON completion for an instruction over text content
    async fn generate_structured(
        &self,
        instruction: &str,
        content: &str,
    ) -> Result<serde_json::Value, JudgeError>;
}
