use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::llm::{InlineImage, VisionModel};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

const GEMINI_REQUEST_TIMEOUT_SECS: u64 = 90;

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: i32,
}

/// REST client for the `generateContent` endpoint. Constructed explicitly
/// with its credential so nothing reads the environment at request time.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    api_base: String,
    safety_profile: String,
    generation: GenerationSettings,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

// Image-bearing parts are tolerated when deserializing but never consumed;
// this endpoint only ever asks the model for text.
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_request_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for candidate in response.candidates.unwrap_or_default() {
        if let Some(content) = candidate.content {
            if let Some(parts) = content.parts {
                for part in parts {
                    if let GeminiPart::Text { text } = part {
                        if !text.trim().is_empty() {
                            text_parts.push(text);
                        }
                    }
                }
            }
        }
    }
    text_parts.join("\n")
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        safety_profile: impl Into<String>,
        generation: GenerationSettings,
    ) -> Self {
        GeminiClient {
            api_key: api_key.into(),
            model: model.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            safety_profile: safety_profile.into(),
            generation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        GeminiClient::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.gemini_safety_settings.clone(),
            GenerationSettings {
                temperature: config.gemini_temperature,
                top_k: config.gemini_top_k,
                top_p: config.gemini_top_p,
                max_output_tokens: config.gemini_max_output_tokens,
            },
        )
        .with_api_base(config.gemini_api_base.trim_end_matches('/'))
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn safety_settings(&self) -> Vec<Value> {
        let threshold = match self.safety_profile.as_str() {
            "standard" => "BLOCK_MEDIUM_AND_ABOVE",
            "permissive" => "OFF",
            other => {
                warn!("Unknown GEMINI_SAFETY_SETTINGS value '{other}', using standard thresholds.");
                "BLOCK_MEDIUM_AND_ABOVE"
            }
        };

        vec![
            json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
            json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
            json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
            json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
            json!({ "category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": threshold }),
        ]
    }

    /// Single-attempt call: an upstream failure is terminal for the request.
    async fn generate_content(&self, parts: Vec<Value>) -> Result<GeminiResponse> {
        let client = get_http_client();
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            let parts_summary = Value::Array(summarize_request_parts(&parts));
            debug!(target: "llm.gemini", model = %self.model, parts = %parts_summary);
        }

        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": self.generation.temperature,
                "topK": self.generation.top_k,
                "topP": self.generation.top_p,
                "maxOutputTokens": self.generation.max_output_tokens,
            },
            "safetySettings": self.safety_settings(),
        });

        let response = match client
            .post(&url)
            .timeout(Duration::from_secs(GEMINI_REQUEST_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err_text = self.redact_api_key(&err.to_string());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status()
                );
                return Err(anyhow!("Gemini request failed: {}", err_text));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                self.redact_api_key(&detail)
            ));
        }

        let value = response.json::<GeminiResponse>().await?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let candidates = value.candidates.as_ref().map(Vec::len).unwrap_or(0);
            debug!(target: "llm.gemini", model = %self.model, candidates = candidates);
        }
        Ok(value)
    }
}

#[async_trait]
impl VisionModel for GeminiClient {
    async fn analyze_image(&self, prompt: &str, image: &InlineImage) -> Result<String> {
        // Part order matters: the instruction text first, then the creative.
        let parts = vec![
            json!({ "text": prompt }),
            json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.data,
                }
            }),
        ];

        log_llm_timing("gemini", &self.model, "analyze_image", None, || async {
            let response = self.generate_content(parts).await?;
            Ok(extract_text_from_response(response))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(api_base: &str) -> GeminiClient {
        GeminiClient::new(
            "test-key",
            "test-model",
            "standard",
            GenerationSettings {
                temperature: 0.7,
                top_k: 40,
                top_p: 0.95,
                max_output_tokens: 1024,
            },
        )
        .with_api_base(api_base)
    }

    fn test_image() -> InlineImage {
        InlineImage::from_bytes(b"fake image bytes", "image/png".to_string())
    }

    #[tokio::test]
    async fn extracts_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(mockito::Matcher::UrlEncoded(
                "key".into(),
                "test-key".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "candidates": [{
                        "content": {
                            "parts": [
                                { "text": "## 1. FIRST IMPRESSION" },
                                { "text": "Overall Score: 7/10" }
                            ]
                        }
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = test_client(&server.url());
        let text = client
            .analyze_image("analyze this", &test_image())
            .await
            .unwrap();
        assert_eq!(text, "## 1. FIRST IMPRESSION\nOverall Score: 7/10");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sends_text_part_before_inline_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "analyze this" },
                        { "inlineData": { "mimeType": "image/png" } }
                    ]
                }]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates": [{"content": {"parts": [{"text": "ok"}]}}]}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        client
            .analyze_image("analyze this", &test_image())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn surfaces_upstream_error_status_without_leaking_the_key() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error": {"message": "Quota exceeded for key test-key"}}"#)
            .create_async()
            .await;

        let client = test_client(&server.url());
        let err = client
            .analyze_image("analyze this", &test_image())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("429"));
        assert!(!message.contains("test-key"));
        assert!(message.contains("[redacted]"));
    }

    #[test]
    fn empty_candidates_collapse_to_empty_string() {
        let response = GeminiResponse { candidates: None };
        assert_eq!(extract_text_from_response(response), "");
    }

    #[test]
    fn error_body_summary_prefers_nested_message() {
        let (message, _) =
            summarize_error_body(r#"{"error": {"message": "API key not valid"}}"#);
        assert_eq!(message.as_deref(), Some("API key not valid"));
    }
}
