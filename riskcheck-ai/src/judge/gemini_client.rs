//! Gemini generateContent client
//!
//! Media is sent inline as base64 with a MIME type sniffed from the file
//! content. Without an API key the client runs in stub mode and returns
//! deterministic `[stub]` payloads so the pipeline can run offline.

use super::prompts;
use super::{JudgeError, JudgementService};
use crate::config::GeminiSettings;
use crate::types::MediaType;
use async_trait::async_trait;
use base64::Engine;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::{json, Value};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini API client
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout_secs: u64,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl GeminiClient {
    pub fn new(settings: &GeminiSettings) -> Result<Self, JudgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| JudgeError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        let per_minute = NonZeroU32::new(settings.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            client,
            base_url: GEMINI_API_URL.to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            timeout_secs: settings.timeout_secs,
            rate_limiter,
        })
    }

    /// Point the client at another endpoint (local proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_stub(&self) -> bool {
        self.api_key.is_none()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn invoke(&self, parts: Vec<Value>, response_mime: Option<&str>) -> Result<Value, JudgeError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| JudgeError::Transport("API key not configured".to_string()))?;

        self.rate_limiter.until_ready().await;

        let mut payload = json!({ "contents": [{ "parts": parts }] });
        if let Some(mime) = response_mime {
            payload["generation_config"] = json!({ "response_mime_type": mime });
        }

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, "Calling Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JudgeError::Timeout(self.timeout_secs)
                } else {
                    JudgeError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| JudgeError::Parse(e.to_string()))
    }

    async fn invoke_with_media(
        &self,
        media: &Path,
        instruction: &str,
        response_mime: Option<&str>,
    ) -> Result<Value, JudgeError> {
        let bytes = tokio::fs::read(media).await?;
        let mime_type = detect_mime(&bytes, media);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let parts = vec![
            json!({ "text": instruction }),
            json!({ "inline_data": { "mime_type": mime_type, "data": encoded } }),
        ];
        self.invoke(parts, response_mime).await
    }
}

/// MIME type from content, then file extension, then `application/octet-stream`
pub fn detect_mime(bytes: &[u8], path: &Path) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let mime = match extension.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

/// Text parts of every candidate, first candidate with text wins
fn candidate_text(payload: &Value) -> Option<String> {
    payload
        .get("candidates")?
        .as_array()?
        .iter()
        .filter_map(|candidate| candidate.pointer("/content/parts")?.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text")?.as_str())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
        })
        .find(|texts| !texts.is_empty())
        .map(|texts| texts.join("\n").trim().to_string())
}

/// First text part that parses as JSON
fn candidate_json(payload: &Value) -> Option<Value> {
    payload
        .get("candidates")?
        .as_array()?
        .iter()
        .filter_map(|candidate| candidate.pointer("/content/parts")?.as_array())
        .flatten()
        .filter_map(|part| part.get("text")?.as_str())
        .find_map(|text| serde_json::from_str(text.trim()).ok())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string())
}

#[async_trait]
impl JudgementService for GeminiClient {
    async fn transcribe(&self, media: &Path, _media_type: MediaType) -> Result<String, JudgeError> {
        if self.is_stub() {
            return Ok(format!(
                "[stub] Transcription for {}. Set GEMINI_API_KEY to enable transcription.",
                file_name(media)
            ));
        }
        let payload = self
            .invoke_with_media(media, prompts::TRANSCRIPTION_INSTRUCTION, None)
            .await?;
        candidate_text(&payload)
            .ok_or_else(|| JudgeError::EmptyResponse("no transcript in reply".to_string()))
    }

    async fn ocr(&self, media: &Path, _media_type: MediaType) -> Result<String, JudgeError> {
        if self.is_stub() {
            return Ok(format!(
                "[stub] OCR captions captured from {}. Set GEMINI_API_KEY to enable OCR extraction.",
                file_name(media)
            ));
        }
        let payload = self
            .invoke_with_media(media, prompts::OCR_INSTRUCTION, None)
            .await?;
        candidate_text(&payload)
            .ok_or_else(|| JudgeError::EmptyResponse("no OCR text in reply".to_string()))
    }

    async fn analyze_visual(&self, media: &Path, media_type: MediaType) -> Result<Value, JudgeError> {
        if self.is_stub() {
            return Ok(match media_type {
                MediaType::Video => stub_video_analysis(&file_name(media)),
                MediaType::Image => stub_image_analysis(&file_name(media)),
            });
        }
        let instruction = match media_type {
            MediaType::Video => prompts::VIDEO_ANALYSIS_INSTRUCTION,
            MediaType::Image => prompts::IMAGE_ANALYSIS_INSTRUCTION,
        };
        let payload = self
            .invoke_with_media(media, instruction, Some("application/json"))
            .await?;
        candidate_json(&payload)
            .ok_or_else(|| JudgeError::Parse("no JSON visual analysis in reply".to_string()))
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, JudgeError> {
        if self.is_stub() {
            return Ok("[stub] Text generation is unavailable without GEMINI_API_KEY.".to_string());
        }
        let payload = self.invoke(vec![json!({ "text": prompt })], None).await?;
        candidate_text(&payload)
            .ok_or_else(|| JudgeError::EmptyResponse("no text in reply".to_string()))
    }

    async fn generate_structured(&self, instruction: &str, content: &str) -> Result<Value, JudgeError> {
        if self.is_stub() {
            return Ok(stub_judgement());
        }
        let parts = vec![json!({ "text": instruction }), json!({ "text": content })];
        let payload = self.invoke(parts, Some("application/json")).await?;
        candidate_json(&payload)
            .ok_or_else(|| JudgeError::Parse("no JSON judgement in reply".to_string()))
    }
}

fn stub_video_analysis(name: &str) -> Value {
    json!({
        "summary": format!(
            "[stub] Visual analysis of {}. Set GEMINI_API_KEY to receive real scene analysis.",
            name
        ),
        "segments": [
            {
                "label": "Intro / brand reveal",
                "description": "Opening shots presenting the logo and tagline.",
                "shots": [
                    { "timecode": "00:00-00:05", "description": "Logo motion graphics" },
                    { "timecode": "00:05-00:08", "description": "Brand message on screen" }
                ]
            },
            {
                "label": "Usage scenes",
                "description": "Shots of people using the product.",
                "shots": [
                    { "timecode": "00:08-00:15", "description": "Close-up of smartphone operation" },
                    { "timecode": "00:15-00:22", "description": "Checking the app at an airport" }
                ]
            },
            {
                "label": "Closing / call to action",
                "description": "Closing shots prompting the viewer to act.",
                "shots": [
                    { "timecode": "00:22-00:27", "description": "App screen with download prompt" }
                ]
            }
        ],
        "risk_flags": []
    })
}

fn stub_image_analysis(name: &str) -> Value {
    json!({
        "summary": format!(
            "[stub] Still image analysis of {}. Set GEMINI_API_KEY for composition and risk insights.",
            name
        ),
        "segments": [
            {
                "label": "Whole image",
                "description": "No detailed analysis without an API key.",
                "shots": [{ "timecode": "still", "description": "Full frame" }]
            }
        ],
        "risk_flags": ["analysis-unavailable"]
    })
}

fn stub_judgement() -> Value {
    json!({
        "social": {
            "grade": "C",
            "reason": "[stub] Provisional grade: no API key configured.",
            "findings": []
        },
        "legal": {
            "grade": "抵触する可能性がある",
            "reason": "[stub] Provisional grade: no API key configured.",
            "recommendations": "Configure GEMINI_API_KEY and run the analysis again.",
            "violations": [],
            "findings": []
        },
        "matrix": { "x_axis": "法務評価", "y_axis": "社会的感度", "position": [1, 2] },
        "tags": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_client() -> GeminiClient {
        GeminiClient::new(&GeminiSettings {
            api_key: None,
            model: "gemini-test".to_string(),
            timeout_secs: 5,
            requests_per_minute: 0,
        })
        .unwrap()
    }

    #[test]
    fn test_detect_mime_prefers_content() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(detect_mime(&png, Path::new("file.bin")), "image/png");
        assert_eq!(detect_mime(b"????", Path::new("clip.MOV")), "video/quicktime");
        assert_eq!(detect_mime(b"????", Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let payload = json!({
            "candidates": [
                { "content": { "parts": [] } },
                { "content": { "parts": [{ "text": "line 1" }, { "text": "line 2 " }] } }
            ]
        });
        assert_eq!(candidate_text(&payload).as_deref(), Some("line 1\nline 2"));
        assert_eq!(candidate_text(&json!({})), None);
    }

    #[test]
    fn test_candidate_json_skips_non_json_parts() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "not json" },
                { "text": "{\"summary\": \"ok\"}" }
            ] } }]
        });
        assert_eq!(candidate_json(&payload), Some(json!({ "summary": "ok" })));
    }

    #[tokio::test]
    async fn test_stub_mode_payloads() {
        let client = stub_client();
        assert!(client.is_stub());

        let transcript = client
            .transcribe(Path::new("/media/ad.mp4"), MediaType::Video)
            .await
            .unwrap();
        assert!(transcript.starts_with("[stub]"));
        assert!(transcript.contains("ad.mp4"));

        let visual = client
            .analyze_visual(Path::new("/media/ad.mp4"), MediaType::Video)
            .await
            .unwrap();
        assert_eq!(visual["segments"].as_array().unwrap().len(), 3);

        let image = client
            .analyze_visual(Path::new("/media/poster.png"), MediaType::Image)
            .await
            .unwrap();
        assert_eq!(image["risk_flags"][0], "analysis-unavailable");

        let judgement = client.generate_structured("judge", "content").await.unwrap();
        assert_eq!(judgement["social"]["grade"], "C");
    }
}
