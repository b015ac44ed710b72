//! Vision provider that tries a chain of providers in sequence.
//!
//! When a provider fails (rate limited, unreachable, timed out), the next
//! provider in the chain is tried. The last error is returned if all fail.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::VisionProvider;
use crate::error::ProviderError;
use crate::models::ImageInput;

/// A fallback chain of vision providers.
pub struct FallbackVisionProvider {
    /// Ordered list of providers to try.
    providers: Vec<Arc<dyn VisionProvider>>,
    name: String,
}

impl FallbackVisionProvider {
    pub fn new(providers: Vec<Arc<dyn VisionProvider>>) -> Self {
        let name = if providers.is_empty() {
            "none".to_string()
        } else {
            providers
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(" -> ")
        };
        Self { providers, name }
    }

    /// Names of the providers in the chain that can currently make requests.
    pub fn available_providers(&self) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.name())
            .collect()
    }
}

#[async_trait]
impl VisionProvider for FallbackVisionProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.providers.iter().any(|p| p.is_available())
    }

    fn availability_hint(&self) -> String {
        if self.providers.is_empty() {
            "No vision providers configured".to_string()
        } else {
            format!("Fallback chain: {}", self.name)
        }
    }

    async fn analyze(&self, images: &[ImageInput], prompt: &str) -> Result<String, ProviderError> {
        let mut last_error: Option<ProviderError> = None;

        for provider in &self.providers {
            if !provider.is_available() {
                debug!(
                    "Skipping {} ({})",
                    provider.name(),
                    provider.availability_hint()
                );
                continue;
            }
            match provider.analyze(images, prompt).await {
                Ok(text) => {
                    debug!("Vision request succeeded with {}", provider.name());
                    return Ok(text);
                }
                Err(ProviderError::RateLimited {
                    provider: p,
                    retry_after_secs,
                }) => {
                    warn!(
                        "Provider {} rate limited (retry after {:?}s), trying next",
                        p, retry_after_secs
                    );
                    last_error = Some(ProviderError::RateLimited {
                        provider: p,
                        retry_after_secs,
                    });
                }
                Err(e) => {
                    warn!("Provider {} failed: {}", provider.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ProviderError::NotAvailable(format!("No vision providers available ({})", self.name))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        available: bool,
        reply: Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(
            name: &'static str,
            available: bool,
            reply: Result<&'static str, &'static str>,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                available,
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl VisionProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        async fn analyze(&self, _: &[ImageInput], _: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Ok(text) => Ok(text.to_string()),
                Err("rate") => Err(ProviderError::RateLimited {
                    provider: self.name.to_string(),
                    retry_after_secs: Some(30),
                }),
                Err(msg) => Err(ProviderError::RequestFailed(msg.to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_falls_through_to_next() {
        let first = Scripted::new("groq", true, Err("rate"));
        let second = Scripted::new("gemini", true, Ok("{\"score\": 70}"));
        let chain = FallbackVisionProvider::new(vec![
            first.clone() as Arc<dyn VisionProvider>,
            second.clone() as Arc<dyn VisionProvider>,
        ]);

        let text = chain.analyze(&[], "prompt").await.unwrap();
        assert_eq!(text, "{\"score\": 70}");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_skips_unavailable() {
        let missing = Scripted::new("openai", false, Ok("never"));
        let present = Scripted::new("gemini", true, Ok("reply"));
        let chain = FallbackVisionProvider::new(vec![
            missing.clone() as Arc<dyn VisionProvider>,
            present as Arc<dyn VisionProvider>,
        ]);

        assert_eq!(chain.available_providers(), vec!["gemini"]);
        assert_eq!(chain.analyze(&[], "p").await.unwrap(), "reply");
        assert_eq!(missing.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_returns_last_error() {
        let a = Scripted::new("a", true, Err("rate"));
        let b = Scripted::new("b", true, Err("connection reset"));
        let chain = FallbackVisionProvider::new(vec![
            a as Arc<dyn VisionProvider>,
            b as Arc<dyn VisionProvider>,
        ]);

        let err = chain.analyze(&[], "p").await.unwrap_err();
        assert!(matches!(err, ProviderError::RequestFailed(ref m) if m == "connection reset"));
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = FallbackVisionProvider::new(Vec::new());
        assert!(!chain.is_available());
        assert!(matches!(
            chain.analyze(&[], "p").await,
            Err(ProviderError::NotAvailable(_))
        ));
    }
}
