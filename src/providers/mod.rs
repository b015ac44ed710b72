//! External vision and label providers.
//!
//! A [`VisionProvider`] takes images plus a prompt and returns free text;
//! a [`LabelProvider`] returns detected labels for one image. Adapters:
//! - Gemini (`GEMINI_API_KEY`)
//! - OpenAI and Groq via the OpenAI-compatible chat API (`OPENAI_API_KEY`, `GROQ_API_KEY`)
//! - A generic HTTP label detection service (`LABEL_ENDPOINT`, `LABEL_API_KEY`)

pub mod api;
mod fallback;
mod gemini;
mod labels;
mod openai;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

pub use fallback::FallbackVisionProvider;
pub use gemini::GeminiProvider;
pub use labels::{HttpLabelProvider, LabelFilter};
pub use openai::OpenAiCompatibleProvider;

use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::models::{ImageInput, Label};

/// Known provider implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Groq,
    Labels,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Groq => "groq",
            ProviderKind::Labels => "labels",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(ProviderKind::Gemini),
            "openai" => Some(ProviderKind::OpenAi),
            "groq" => Some(ProviderKind::Groq),
            "labels" | "label" => Some(ProviderKind::Labels),
            _ => None,
        }
    }

    /// Providers that can serve as a [`VisionProvider`].
    pub fn vision() -> &'static [ProviderKind] {
        &[ProviderKind::Gemini, ProviderKind::OpenAi, ProviderKind::Groq]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vision/LLM service that answers a prompt about one or more images.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether the provider has what it needs to make requests (API key etc.).
    fn is_available(&self) -> bool;

    /// Human-readable setup hint or status.
    fn availability_hint(&self) -> String;

    /// Send `images` with `prompt` and return the raw reply text.
    async fn analyze(&self, images: &[ImageInput], prompt: &str) -> Result<String, ProviderError>;
}

/// A service that detects labels in an image.
#[async_trait]
pub trait LabelProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn availability_hint(&self) -> String;

    async fn detect_labels(&self, image: &ImageInput) -> Result<Vec<Label>, ProviderError>;
}

/// Create a vision provider by kind. `None` for non-vision kinds.
pub fn create_vision_provider(
    kind: ProviderKind,
    config: &ProvidersConfig,
    timeout: Duration,
) -> Option<Arc<dyn VisionProvider>> {
    match kind {
        ProviderKind::Gemini => Some(Arc::new(GeminiProvider::from_settings(
            &config.gemini,
            timeout,
        ))),
        ProviderKind::OpenAi => Some(Arc::new(OpenAiCompatibleProvider::openai(
            &config.openai,
            timeout,
        ))),
        ProviderKind::Groq => Some(Arc::new(OpenAiCompatibleProvider::groq(
            &config.groq,
            timeout,
        ))),
        ProviderKind::Labels => None,
    }
}

/// Build the configured vision provider or fallback chain.
pub fn vision_from_config(config: &ProvidersConfig, timeout: Duration) -> Arc<dyn VisionProvider> {
    let entry = &config.vision;
    let mut providers = Vec::new();
    for name in entry.backends() {
        match ProviderKind::from_str(name).and_then(|k| create_vision_provider(k, config, timeout)) {
            Some(provider) => providers.push(provider),
            None => warn!("Unknown vision provider '{}'", name),
        }
    }

    if !entry.is_chain() && providers.len() == 1 {
        return providers.remove(0);
    }
    Arc::new(FallbackVisionProvider::new(providers))
}

/// Build the configured label provider.
pub fn labels_from_config(config: &ProvidersConfig, timeout: Duration) -> Arc<dyn LabelProvider> {
    Arc::new(HttpLabelProvider::from_settings(&config.labels, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendEntry;

    #[test]
    fn test_provider_kind_round_trip() {
        for kind in [
            ProviderKind::Gemini,
            ProviderKind::OpenAi,
            ProviderKind::Groq,
            ProviderKind::Labels,
        ] {
            assert_eq!(ProviderKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ProviderKind::from_str("GEMINI"), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::from_str("bedrock"), None);
    }

    #[test]
    fn test_single_vision_provider() {
        let config = ProvidersConfig::default();
        let provider = vision_from_config(&config, Duration::from_secs(5));
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_chain_vision_provider() {
        let config = ProvidersConfig {
            vision: BackendEntry::Chain(vec!["groq".to_string(), "openai".to_string()]),
            ..Default::default()
        };
        let provider = vision_from_config(&config, Duration::from_secs(5));
        assert_eq!(provider.name(), "groq -> openai");
    }

    #[test]
    fn test_unknown_names_skipped() {
        let config = ProvidersConfig {
            vision: BackendEntry::Single("bedrock".to_string()),
            ..Default::default()
        };
        let provider = vision_from_config(&config, Duration::from_secs(5));
        assert!(!provider.is_available());
    }

    #[test]
    fn test_labels_not_a_vision_provider() {
        let config = ProvidersConfig::default();
        assert!(
            create_vision_provider(ProviderKind::Labels, &config, Duration::from_secs(5))
                .is_none()
        );
    }
}
