//! Multi-image report returned by the analyzer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::analysis::{AnalysisSource, PerImageAnalysis, Rating};

/// Final aggregate over every image in one request.
///
/// The feature, barrier, safety, and recommendation lists are
/// exact-string deduplicated and keep first-discovery order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensiveReport {
    pub id: Uuid,
    pub overall_score: u8,
    /// Rounded mean of every per-image score, placeholders included.
    pub average_score: u8,
    /// Score from the whole-set provider call; `None` when it was unavailable.
    pub secondary_score: Option<u8>,
    pub images_analyzed: usize,
    pub positive_features: Vec<String>,
    pub barriers: Vec<String>,
    pub safety_concerns: Vec<String>,
    pub recommendations: Vec<String>,
    pub per_image_results: Vec<PerImageAnalysis>,
    /// Mean confidence of valid per-image results, 0.0-1.0.
    pub confidence: f32,
    pub rating: Rating,
    /// True when the whole-set call failed and the report uses per-image results only.
    pub whole_set_fallback: bool,
    pub statistics: BatchStatistics,
    pub generated_at: DateTime<Utc>,
}

/// Outcome counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatistics {
    pub total_images: usize,
    /// Results produced by a provider (any parse tier or label scoring).
    pub successful: usize,
    /// Results replaced by a deterministic placeholder.
    pub degraded: usize,
    /// Results that failed outright (zero-score markers).
    pub failed: usize,
    /// Percentage of images with a provider-backed result.
    pub success_rate: f32,
    pub total_labels: usize,
}

impl BatchStatistics {
    pub fn from_results(results: &[PerImageAnalysis]) -> Self {
        let mut stats = Self {
            total_images: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.source {
                AnalysisSource::Placeholder => stats.degraded += 1,
                AnalysisSource::Failed => stats.failed += 1,
                _ => stats.successful += 1,
            }
            stats.total_labels += result.labels_detected;
        }
        if stats.total_images > 0 {
            stats.success_rate = stats.successful as f32 / stats.total_images as f32 * 100.0;
        }
        stats
    }
}
