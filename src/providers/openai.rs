//! OpenAI-compatible chat completions provider (OpenAI, Groq).
//!
//! Images are sent as base64 data URLs in `image_url` content parts.
//! Keys come from OPENAI_API_KEY / GROQ_API_KEY unless configured;
//! OPENAI_DELAY_MS / GROQ_DELAY_MS set the delay between requests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::api::{apply_rate_delay, create_client, ensure_success, retry_on_rate_limit};
use super::{ProviderKind, VisionProvider};
use crate::config::VisionSettings;
use crate::error::ProviderError;
use crate::models::ImageInput;

/// Per-vendor defaults.
struct Flavor {
    kind: ProviderKind,
    endpoint: &'static str,
    model: &'static str,
    key_var: &'static str,
    delay_var: &'static str,
    delay_ms: u64,
    signup_url: &'static str,
}

static OPENAI: Flavor = Flavor {
    kind: ProviderKind::OpenAi,
    endpoint: "https://api.openai.com/v1/chat/completions",
    model: "gpt-4o-mini",
    key_var: "OPENAI_API_KEY",
    delay_var: "OPENAI_DELAY_MS",
    delay_ms: 0,
    signup_url: "https://platform.openai.com/api-keys",
};

static GROQ: Flavor = Flavor {
    kind: ProviderKind::Groq,
    endpoint: "https://api.groq.com/openai/v1/chat/completions",
    model: "meta-llama/llama-4-scout-17b-16e-instruct",
    key_var: "GROQ_API_KEY",
    delay_var: "GROQ_DELAY_MS",
    delay_ms: 500,
    signup_url: "https://console.groq.com/keys",
};

/// Vision provider speaking the OpenAI chat completions protocol.
pub struct OpenAiCompatibleProvider {
    flavor: &'static Flavor,
    api_key: Option<String>,
    model: String,
    endpoint: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Debug, Serialize)]
struct ChatImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ChatError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatError {
    message: String,
}

impl OpenAiCompatibleProvider {
    fn with_flavor(flavor: &'static Flavor, settings: &VisionSettings, timeout: Duration) -> Self {
        Self {
            flavor,
            api_key: settings.resolve_api_key(flavor.key_var),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| flavor.model.to_string()),
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| flavor.endpoint.to_string()),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout,
        }
    }

    /// OpenAI chat completions.
    pub fn openai(settings: &VisionSettings, timeout: Duration) -> Self {
        Self::with_flavor(&OPENAI, settings, timeout)
    }

    /// Groq's OpenAI-compatible endpoint.
    pub fn groq(settings: &VisionSettings, timeout: Duration) -> Self {
        Self::with_flavor(&GROQ, settings, timeout)
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn kind(&self) -> ProviderKind {
        self.flavor.kind
    }

    fn build_request(&self, images: &[ImageInput], prompt: &str) -> ChatRequest {
        let mut content = vec![ChatContent::Text {
            text: prompt.to_string(),
        }];
        content.extend(images.iter().map(|image| ChatContent::ImageUrl {
            image_url: ChatImageUrl {
                url: image.data_url(),
            },
        }));

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

fn response_text(provider: &str, response: ChatResponse) -> Result<String, ProviderError> {
    if let Some(error) = response.error {
        return Err(ProviderError::RequestFailed(format!(
            "{} API error: {}",
            provider, error.message
        )));
    }

    let text = response
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::InvalidResponse(format!(
            "{} returned no text",
            provider
        )));
    }
    Ok(text)
}

#[async_trait]
impl VisionProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        self.flavor.kind.as_str()
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.api_key.is_none() {
            format!(
                "{} not set. Get an API key from {}",
                self.flavor.key_var, self.flavor.signup_url
            )
        } else {
            format!("{} is available (model: {})", self.name(), self.model)
        }
    }

    async fn analyze(&self, images: &[ImageInput], prompt: &str) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ProviderError::NotAvailable(format!("{} not set", self.flavor.key_var))
        })?;

        let request = self.build_request(images, prompt);
        let client = create_client(self.name(), self.timeout)?;
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", api_key));

        apply_rate_delay(self.flavor.delay_var, self.flavor.delay_ms, self.name()).await;

        let response = retry_on_rate_limit(self.name(), || async {
            client
                .post_json_with_headers(&self.endpoint, &request, &headers)
                .await
                .map_err(ProviderError::from)
        })
        .await?;
        let response = ensure_success(self.name(), response).await?;

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!(
                "Failed to parse {} response: {}",
                self.name(),
                e
            ))
        })?;
        response_text(self.name(), chat_response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groq() -> OpenAiCompatibleProvider {
        let mut provider =
            OpenAiCompatibleProvider::groq(&VisionSettings::default(), Duration::from_secs(5));
        provider.api_key = None;
        provider
    }

    #[test]
    fn test_flavor_defaults() {
        let provider = groq();
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.kind(), ProviderKind::Groq);
        assert_eq!(provider.endpoint, GROQ.endpoint);

        let settings = VisionSettings {
            model: Some("gpt-4o".to_string()),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let openai = OpenAiCompatibleProvider::openai(&settings, Duration::from_secs(5));
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.model, "gpt-4o");
        assert!(openai.is_available());
    }

    #[test]
    fn test_request_shape() {
        let images = vec![ImageInput::new("a.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0])];
        let request = groq().with_model("m").build_request(&images, "Assess");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "m");
        let content = json["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "Assess");
        assert_eq!(content[1]["type"], "image_url");
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_response_text() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "score: 64"}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text("groq", response).unwrap(), "score: 64");

        let error: ChatResponse =
            serde_json::from_str(r#"{"error": {"message": "invalid key"}}"#).unwrap();
        assert!(matches!(
            response_text("groq", error),
            Err(ProviderError::RequestFailed(ref m)) if m.contains("invalid key")
        ));

        let null_content: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(
            response_text("groq", null_content),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unavailable_without_key() {
        let provider = groq();
        assert!(!provider.is_available());
        assert!(provider.availability_hint().contains("GROQ_API_KEY"));
        assert!(matches!(
            provider.analyze(&[], "p").await,
            Err(ProviderError::NotAvailable(_))
        ));
    }
}
