//! Deterministic placeholder analyses for degraded providers.
//!
//! A polynomial rolling hash over the seed bytes drives selection from small
//! fixed pools, so the same image always gets the same placeholder and
//! different images get visibly different ones.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::models::{AnalysisSource, ImageInput, PerImageAnalysis};

/// Confidence assigned to placeholder results.
pub const PLACEHOLDER_CONFIDENCE: f32 = 0.25;

/// Polynomial rolling hash (`h = h * 31 + b`, wrapping).
pub fn rolling_hash(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(*b)))
}

const FEATURE_POOL: &[&str] = &[
    "Step-free main entrance",
    "Wide doorways suitable for wheelchair access",
    "Grab bars installed in bathroom",
    "Lever-style door handles",
    "Bright, even overhead lighting",
    "Open floor plan with clear pathways",
    "Handrails on both sides of the staircase",
    "Walk-in shower with low threshold",
];

const BARRIER_POOL: &[&str] = &[
    "Steps at front entrance",
    "Narrow interior doorways",
    "Raised thresholds between rooms",
    "Bathtub without transfer bench",
    "Cluttered walkways",
    "Uneven flooring transitions",
    "Staircase without handrail",
];

const RECOMMENDATION_POOL: &[&str] = &[
    "Install a ramp at the main entrance",
    "Widen doorways to at least 32 inches",
    "Add grab bars near the toilet and shower",
    "Replace door knobs with lever handles",
    "Improve lighting along hallways and stairs",
    "Remove or bevel raised thresholds",
    "Add non-slip flooring in wet areas",
    "Install handrails on both sides of stairs",
];

/// Take `count` consecutive pool entries starting at `start`, wrapping.
fn pick(pool: &[&str], start: u64, count: u64) -> Vec<String> {
    let len = pool.len() as u64;
    (0..count.min(len))
        .map(|i| pool[((start + i) % len) as usize].to_string())
        .collect()
}

/// Generates hash-seeded placeholder analyses within a score band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockGenerator {
    #[serde(default = "default_min_score")]
    pub min_score: u8,
    #[serde(default = "default_max_score")]
    pub max_score: u8,
}

fn default_min_score() -> u8 {
    40
}

fn default_max_score() -> u8 {
    85
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_score: default_max_score(),
        }
    }
}

impl MockGenerator {
    /// Bounds are clamped to 0-100 and swapped if given in reverse.
    pub fn new(min_score: u8, max_score: u8) -> Self {
        let (lo, hi) = (min_score.min(100), max_score.min(100));
        Self {
            min_score: lo.min(hi),
            max_score: lo.max(hi),
        }
    }

    fn bounds(&self) -> (u8, u8) {
        let lo = self.min_score.min(100);
        let hi = self.max_score.min(100);
        (lo.min(hi), lo.max(hi))
    }

    /// Score in `[min_score, max_score]` for a hash value.
    pub fn score_for(&self, hash: u64) -> u8 {
        let (lo, hi) = self.bounds();
        let span = u64::from(hi - lo) + 1;
        lo + (hash % span) as u8
    }

    /// Build an analysis from `seed`, tagged with `source`.
    pub fn synthesize(
        &self,
        filename: &str,
        seed: &[u8],
        source: AnalysisSource,
    ) -> PerImageAnalysis {
        let h = rolling_hash(seed);
        let mut analysis =
            PerImageAnalysis::new(filename, i64::from(self.score_for(h)), source);
        analysis.positive_features = pick(FEATURE_POOL, h >> 8, 1 + (h >> 16) % 3);
        analysis.barriers = pick(BARRIER_POOL, h >> 24, 1 + (h >> 32) % 2);
        analysis.recommendations = pick(RECOMMENDATION_POOL, h >> 40, 2 + (h >> 48) % 2);
        analysis
    }

    /// Placeholder for an image whose provider could not be reached.
    pub fn placeholder(&self, filename: &str, seed: &[u8]) -> PerImageAnalysis {
        let mut analysis = self.synthesize(filename, seed, AnalysisSource::Placeholder);
        analysis.confidence = Some(PLACEHOLDER_CONFIDENCE);
        analysis.raw_analysis_text = format!(
            "Placeholder analysis (seed hash {:016x})",
            rolling_hash(seed)
        );
        analysis
    }
}

/// What the placeholder hash is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// Image bytes (vision providers).
    Content,
    /// File name (label providers).
    Filename,
}

/// How a provider failure is turned into a per-image result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradePolicy {
    /// Replace the failure with a deterministic placeholder.
    Mock {
        generator: MockGenerator,
        seed: SeedSource,
    },
    /// Pass the failure through.
    Strict,
}

impl DegradePolicy {
    pub fn mock(generator: MockGenerator, seed: SeedSource) -> Self {
        DegradePolicy::Mock { generator, seed }
    }

    pub fn is_strict(&self) -> bool {
        matches!(self, DegradePolicy::Strict)
    }

    /// Same policy with a different seed source. No-op for `Strict`.
    pub fn with_seed(self, seed: SeedSource) -> Self {
        match self {
            DegradePolicy::Mock { generator, .. } => DegradePolicy::Mock { generator, seed },
            DegradePolicy::Strict => DegradePolicy::Strict,
        }
    }

    /// Placeholder for `image` after `error`, or `None` in strict mode.
    pub fn degrade(&self, error: &ProviderError, image: &ImageInput) -> Option<PerImageAnalysis> {
        match self {
            DegradePolicy::Mock { generator, seed } => {
                let seed_bytes = match seed {
                    SeedSource::Content => image.bytes.as_slice(),
                    SeedSource::Filename => image.filename.as_bytes(),
                };
                let mut analysis = generator.placeholder(&image.filename, seed_bytes);
                analysis.error = Some(error.to_string());
                Some(analysis)
            }
            DegradePolicy::Strict => None,
        }
    }
}

impl Default for DegradePolicy {
    fn default() -> Self {
        DegradePolicy::mock(MockGenerator::default(), SeedSource::Content)
    }
}
