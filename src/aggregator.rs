//! Multi-image report assembly.
//!
//! Per-image analyses run concurrently (bounded by a semaphore) alongside a
//! single whole-set provider call. Results land in input order regardless of
//! completion order. Dropping the returned future abandons in-flight calls
//! without leaving partial state behind.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

use crate::cache::AnalysisCache;
use crate::config::{Config, Strategy};
use crate::error::AnalysisError;
use crate::models::{
    AnalysisSource, BatchStatistics, ComprehensiveReport, ImageInput, PerImageAnalysis, Rating,
};
use crate::parser::ResponseParser;
use crate::pipeline::{ImageAnalyzer, ImagePipeline, LabelImageAnalyzer, VisionImageAnalyzer};
use crate::providers::api::with_timeout;
use crate::providers::prompts::WHOLE_SET_PROMPT;
use crate::providers::{labels_from_config, vision_from_config, VisionProvider};
use crate::scoring::LabelScorer;

/// Default cap on concurrent per-image provider calls.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// The single provider call that sees every image at once.
struct WholeSetStage {
    provider: Arc<dyn VisionProvider>,
    parser: ResponseParser,
    prompt: String,
    timeout: Duration,
}

/// Produces a [`ComprehensiveReport`] for a batch of images.
pub struct Analyzer {
    pipeline: ImagePipeline,
    whole_set: Option<WholeSetStage>,
    max_concurrency: usize,
    span: Span,
}

impl Analyzer {
    pub fn new(pipeline: ImagePipeline) -> Self {
        Self {
            pipeline,
            whole_set: None,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            span: Span::none(),
        }
    }

    /// Build providers, pipeline, and cache from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        config.validate()?;
        let settings = &config.analysis;
        let timeout = settings.provider_timeout();
        let parser = ResponseParser::new(config.mock);

        let image_analyzer: Arc<dyn ImageAnalyzer> = match settings.strategy {
            Strategy::Vision => Arc::new(VisionImageAnalyzer::new(
                vision_from_config(&config.providers, timeout),
                parser.clone(),
            )),
            Strategy::Labels => Arc::new(LabelImageAnalyzer::new(
                labels_from_config(&config.providers, timeout),
                LabelScorer::new(config.scoring.clone()),
            )),
        };

        let mut pipeline = ImagePipeline::new(image_analyzer, config.degrade_policy(), timeout);
        if let Some(ttl) = settings.cache_ttl() {
            pipeline = pipeline.with_cache(Arc::new(AnalysisCache::with_ttl(ttl)));
        }

        let mut analyzer = Self::new(pipeline).with_max_concurrency(settings.max_concurrency);
        if settings.whole_set {
            let whole_set_timeout = settings.whole_set_timeout();
            analyzer = analyzer
                .with_whole_set(
                    vision_from_config(&config.providers, whole_set_timeout),
                    whole_set_timeout,
                )
                .with_whole_set_parser(parser);
        }
        Ok(analyzer)
    }

    /// Enable the whole-set call through `provider`.
    pub fn with_whole_set(mut self, provider: Arc<dyn VisionProvider>, timeout: Duration) -> Self {
        self.whole_set = Some(WholeSetStage {
            provider,
            parser: ResponseParser::default(),
            prompt: WHOLE_SET_PROMPT.to_string(),
            timeout,
        });
        self
    }

    fn with_whole_set_parser(mut self, parser: ResponseParser) -> Self {
        if let Some(stage) = self.whole_set.as_mut() {
            stage.parser = parser;
        }
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Instrument batch and per-image work under `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.pipeline = self.pipeline.with_span(span.clone());
        self.span = span;
        self
    }

    pub fn pipeline(&self) -> &ImagePipeline {
        &self.pipeline
    }

    /// Analyze every image and merge the results into one report.
    ///
    /// Fails only when no images are submitted. Per-image trouble is
    /// absorbed: provider failures become placeholders or zero-score markers,
    /// an image with no bytes becomes a zero-score marker, and a failed
    /// whole-set call yields a report built from per-image results alone.
    pub async fn analyze_images(
        &self,
        images: &[ImageInput],
    ) -> Result<ComprehensiveReport, AnalysisError> {
        if images.is_empty() {
            return Err(AnalysisError::NoImages);
        }

        async move {
            info!(images = images.len(), strategy = %self.pipeline.strategy(), "Starting analysis");

            let (results, secondary) =
                tokio::join!(self.analyze_each(images), self.analyze_whole_set(images));

            let report = self.build_report(results, secondary);
            info!(
                overall = report.overall_score,
                average = report.average_score,
                secondary = ?report.secondary_score,
                fallback = report.whole_set_fallback,
                "Analysis complete"
            );
            Ok(report)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Per-image results in input order.
    async fn analyze_each(&self, images: &[ImageInput]) -> Vec<PerImageAnalysis> {
        let semaphore = Semaphore::new(self.max_concurrency);
        let tasks = images.iter().map(|image| {
            let semaphore = &semaphore;
            async move {
                if image.is_empty() {
                    let err = AnalysisError::EmptyImage(image.filename.clone());
                    warn!(filename = %image.filename, "Skipping image with no content");
                    return PerImageAnalysis::failed(&image.filename, err.to_string());
                }
                let _permit = semaphore.acquire().await.ok();
                match self.pipeline.run(image).await {
                    Ok(analysis) => analysis,
                    Err(e) => {
                        warn!(filename = %image.filename, error = %e, "Image analysis failed");
                        PerImageAnalysis::failed(&image.filename, e.to_string())
                    }
                }
            }
        });
        join_all(tasks).await
    }

    /// Whole-set analysis, or `None` if disabled, failed, or unparseable.
    async fn analyze_whole_set(&self, images: &[ImageInput]) -> Option<PerImageAnalysis> {
        let stage = self.whole_set.as_ref()?;
        let images: Cow<'_, [ImageInput]> = if images.iter().any(ImageInput::is_empty) {
            Cow::Owned(images.iter().filter(|i| !i.is_empty()).cloned().collect())
        } else {
            Cow::Borrowed(images)
        };
        if images.is_empty() {
            warn!("No image has content, skipping whole-set analysis");
            return None;
        }
        let reply = with_timeout(
            stage.provider.name(),
            stage.timeout,
            stage.provider.analyze(&images, &stage.prompt),
        )
        .await;

        match reply {
            Ok(text) => {
                let analysis = stage.parser.parse("whole-set", &text);
                if analysis.source == AnalysisSource::Heuristic {
                    warn!("Whole-set reply had no usable content, using per-image results only");
                    return None;
                }
                debug!(score = analysis.score(), "Whole-set analysis");
                Some(analysis)
            }
            Err(e) => {
                warn!(error = %e, "Whole-set analysis failed, using per-image results only");
                None
            }
        }
    }

    fn build_report(
        &self,
        results: Vec<PerImageAnalysis>,
        secondary: Option<PerImageAnalysis>,
    ) -> ComprehensiveReport {
        let average_score = average_score(&results);
        let secondary_score = secondary.as_ref().map(|s| s.score());
        let overall_score = combine_scores(average_score, secondary_score);

        let mut positive_features = UniqueList::default();
        let mut barriers = UniqueList::default();
        let mut safety_concerns = UniqueList::default();
        let mut recommendations = UniqueList::default();
        for analysis in results.iter().chain(secondary.iter()) {
            positive_features.extend(&analysis.positive_features);
            barriers.extend(&analysis.barriers);
            safety_concerns.extend(&analysis.safety_concerns);
            recommendations.extend(&analysis.recommendations);
        }

        ComprehensiveReport {
            id: Uuid::new_v4(),
            overall_score,
            average_score,
            secondary_score,
            images_analyzed: results.len(),
            positive_features: positive_features.into_vec(),
            barriers: barriers.into_vec(),
            safety_concerns: safety_concerns.into_vec(),
            recommendations: recommendations.into_vec(),
            confidence: mean_confidence(&results),
            rating: Rating::from_score(overall_score),
            whole_set_fallback: self.whole_set.is_some() && secondary.is_none(),
            statistics: BatchStatistics::from_results(&results),
            per_image_results: results,
            generated_at: Utc::now(),
        }
    }
}

/// Rounded mean of every score, zero-score markers included.
pub fn average_score(results: &[PerImageAnalysis]) -> u8 {
    if results.is_empty() {
        return 0;
    }
    let sum: u32 = results.iter().map(|r| u32::from(r.score())).sum();
    (f64::from(sum) / results.len() as f64).round() as u8
}

/// The more generous of the per-image average and the whole-set score.
pub fn combine_scores(average: u8, secondary: Option<u8>) -> u8 {
    secondary.map_or(average, |s| average.max(s))
}

/// Mean confidence of valid results that report one; 0 when none do.
pub fn mean_confidence(results: &[PerImageAnalysis]) -> f32 {
    let values: Vec<f32> = results
        .iter()
        .filter(|r| r.is_valid())
        .filter_map(|r| r.confidence)
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Exact-match deduplicating list that keeps first-seen order.
#[derive(Default)]
struct UniqueList {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl UniqueList {
    fn extend(&mut self, values: &[String]) {
        for value in values {
            if self.seen.insert(value.clone()) {
                self.items.push(value.clone());
            }
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}
