//! Per-image analysis strategies and the degrade stage.
//!
//! An [`ImageAnalyzer`] turns one image into a [`PerImageAnalysis`] or a
//! provider error. [`ImagePipeline`] wraps it with the cache, a timeout, and
//! the [`DegradePolicy`] that decides what a provider error becomes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn, Instrument, Span};

use crate::cache::AnalysisCache;
use crate::config::Strategy;
use crate::error::{AnalysisError, ProviderError};
use crate::mock::DegradePolicy;
use crate::models::{ImageInput, PerImageAnalysis};
use crate::parser::ResponseParser;
use crate::providers::api::with_timeout;
use crate::providers::prompts::PER_IMAGE_PROMPT;
use crate::providers::{LabelProvider, VisionProvider};
use crate::scoring::LabelScorer;

/// One way of analyzing a single image.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Name of the provider behind this analyzer.
    fn provider_name(&self) -> &str;

    /// Call the provider and normalize its output.
    async fn analyze_image(&self, image: &ImageInput) -> Result<PerImageAnalysis, ProviderError>;
}

/// Vision provider + response parser.
pub struct VisionImageAnalyzer {
    provider: Arc<dyn VisionProvider>,
    parser: ResponseParser,
    prompt: String,
}

impl VisionImageAnalyzer {
    pub fn new(provider: Arc<dyn VisionProvider>, parser: ResponseParser) -> Self {
        Self {
            provider,
            parser,
            prompt: PER_IMAGE_PROMPT.to_string(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

#[async_trait]
impl ImageAnalyzer for VisionImageAnalyzer {
    fn strategy(&self) -> Strategy {
        Strategy::Vision
    }

    fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn analyze_image(&self, image: &ImageInput) -> Result<PerImageAnalysis, ProviderError> {
        let text = self
            .provider
            .analyze(std::slice::from_ref(image), &self.prompt)
            .await?;
        Ok(self.parser.parse(&image.filename, &text))
    }
}

/// Label provider + label scorer.
pub struct LabelImageAnalyzer {
    provider: Arc<dyn LabelProvider>,
    scorer: LabelScorer,
}

impl LabelImageAnalyzer {
    pub fn new(provider: Arc<dyn LabelProvider>, scorer: LabelScorer) -> Self {
        Self { provider, scorer }
    }
}

#[async_trait]
impl ImageAnalyzer for LabelImageAnalyzer {
    fn strategy(&self) -> Strategy {
        Strategy::Labels
    }

    fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn analyze_image(&self, image: &ImageInput) -> Result<PerImageAnalysis, ProviderError> {
        let labels = self.provider.detect_labels(image).await?;
        Ok(self.scorer.score(&image.filename, &labels))
    }
}

/// Runs one image through cache, provider call, and degrade stage.
pub struct ImagePipeline {
    analyzer: Arc<dyn ImageAnalyzer>,
    degrade: DegradePolicy,
    timeout: Duration,
    cache: Option<Arc<AnalysisCache>>,
    span: Span,
}

impl ImagePipeline {
    pub fn new(analyzer: Arc<dyn ImageAnalyzer>, degrade: DegradePolicy, timeout: Duration) -> Self {
        Self {
            analyzer,
            degrade,
            timeout,
            cache: None,
            span: Span::none(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<AnalysisCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.analyzer.strategy()
    }

    pub fn degrade_policy(&self) -> DegradePolicy {
        self.degrade
    }

    /// Provider call with the per-call timeout; no cache, no degrade.
    pub async fn call_provider(
        &self,
        image: &ImageInput,
    ) -> Result<PerImageAnalysis, ProviderError> {
        with_timeout(
            self.analyzer.provider_name(),
            self.timeout,
            self.analyzer.analyze_image(image),
        )
        .await
    }

    /// Analyze one image. Provider errors go through the degrade policy;
    /// in strict mode they are returned.
    pub async fn run(&self, image: &ImageInput) -> Result<PerImageAnalysis, AnalysisError> {
        let strategy = self.strategy();
        let span = self.span.clone();
        async move {
            if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(image, strategy)) {
                debug!(filename = %image.filename, "Using cached analysis");
                return Ok(hit);
            }

            match self.call_provider(image).await {
                Ok(analysis) => {
                    debug!(
                        filename = %image.filename,
                        score = analysis.score(),
                        source = analysis.source.as_str(),
                        "Analyzed image"
                    );
                    if let Some(cache) = &self.cache {
                        cache.insert(image, strategy, &analysis);
                    }
                    Ok(analysis)
                }
                Err(e) => match self.degrade.degrade(&e, image) {
                    Some(placeholder) => {
                        warn!(
                            filename = %image.filename,
                            error = %e,
                            "Provider failed, using placeholder"
                        );
                        Ok(placeholder)
                    }
                    None => Err(AnalysisError::Provider(e)),
                },
            }
        }
        .instrument(span)
        .await
    }
}
