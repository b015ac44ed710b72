//! Google Gemini vision provider.
//!
//! Requires GEMINI_API_KEY (or `providers.gemini.api_key`).
//!
//! Rate limiting:
//! - Set GEMINI_DELAY_MS to configure delay between requests (default: 200ms)
//! - Automatically retries on 429 with exponential backoff
//! - Respects Retry-After header from API

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::api::{apply_rate_delay, create_client, ensure_success, retry_on_rate_limit};
use super::{ProviderKind, VisionProvider};
use crate::config::VisionSettings;
use crate::error::ProviderError;
use crate::models::ImageInput;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider using Google's Generative Language API.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    api_key: Option<String>,
    model: String,
    endpoint: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiProvider {
    /// Create a provider with default settings and the key from GEMINI_API_KEY.
    pub fn new() -> Self {
        Self::from_settings(&VisionSettings::default(), Duration::from_secs(60))
    }

    pub fn from_settings(settings: &VisionSettings, timeout: Duration) -> Self {
        Self {
            api_key: settings.resolve_api_key("GEMINI_API_KEY"),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model (e.g., "gemini-1.5-flash", "gemini-1.5-pro").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_request(&self, images: &[ImageInput], prompt: &str) -> GeminiRequest {
        let mut parts = vec![GeminiPart::Text {
            text: prompt.to_string(),
        }];
        parts.extend(images.iter().map(|image| GeminiPart::InlineData {
            inline_data: GeminiInlineData {
                mime_type: image.mime_type().to_string(),
                data: image.to_base64(),
            },
        }));

        GeminiRequest {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        }
    }

    fn request_url(&self, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            api_key
        )
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenated text of the first candidate.
fn response_text(response: GeminiResponse) -> Result<String, ProviderError> {
    if let Some(error) = response.error {
        return Err(ProviderError::RequestFailed(format!(
            "Gemini API error: {}",
            error.message
        )));
    }

    let text: String = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::InvalidResponse(
            "Gemini returned no text".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &str {
        ProviderKind::Gemini.as_str()
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_none() {
            "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string()
        } else {
            format!("Gemini is available (model: {})", self.model)
        }
    }

    async fn analyze(&self, images: &[ImageInput], prompt: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderError::NotAvailable("GEMINI_API_KEY not set".to_string())
        })?;

        let request = self.build_request(images, prompt);
        let url = self.request_url(api_key);
        let client = create_client(self.name(), self.timeout)?;

        apply_rate_delay("GEMINI_DELAY_MS", 200, self.name()).await;

        let response = retry_on_rate_limit(self.name(), || async {
            client
                .post_json(&url, &request)
                .await
                .map_err(ProviderError::from)
        })
        .await?;
        let response = ensure_success(self.name(), response).await?;

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Gemini response: {}", e))
        })?;
        response_text(gemini_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> GeminiProvider {
        GeminiProvider {
            api_key: None,
            ..GeminiProvider::new()
        }
    }

    #[test]
    fn test_request_shape() {
        let images = vec![
            ImageInput::new("a.png", b"\x89PNG\r\n\x1a\n0000".to_vec()),
            ImageInput::new("b.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0]),
        ];
        let request = provider().build_request(&images, "Assess this");
        let json = serde_json::to_value(&request).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "Assess this");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(parts[2]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_request_url() {
        let url = provider().with_model("gemini-1.5-pro").request_url("k");
        assert_eq!(
            url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent?key=k"
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "{\"score\": "}, {"text": "80}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "{\"score\": 80}");
    }

    #[test]
    fn test_response_error_and_empty() {
        let error: GeminiResponse =
            serde_json::from_str(r#"{"error": {"message": "API key invalid"}}"#).unwrap();
        assert!(matches!(
            response_text(error),
            Err(ProviderError::RequestFailed(_))
        ));

        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(
            response_text(empty),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_without_key() {
        let provider = provider();
        assert!(!provider.is_available());
        assert!(provider.availability_hint().contains("GEMINI_API_KEY"));
        assert!(matches!(
            provider.analyze(&[], "p").await,
            Err(ProviderError::NotAvailable(_))
        ));
        assert!(provider.with_api_key("k").is_available());
    }
}
