//! Per-image analysis records and the score → rating mapping.

use serde::Serialize;

/// Five-level rating derived from a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Rating {
    #[serde(rename = "Very Poor")]
    VeryPoor,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Rating {
    /// The only score → rating mapping in the crate.
    ///
    /// ≥90 Excellent, ≥80 Good, ≥70 Fair, ≥60 Poor, otherwise Very Poor.
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => Self::Excellent,
            80..=89 => Self::Good,
            70..=79 => Self::Fair,
            60..=69 => Self::Poor,
            _ => Self::VeryPoor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Clamp any intermediate score into 0-100.
pub(crate) fn clamp_score(raw: i64) -> u8 {
    raw.clamp(0, 100) as u8
}

/// How a per-image analysis was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Provider reply parsed as strict JSON.
    Structured,
    /// Provider reply mined for score and keyword lines.
    Keywords,
    /// Provider reply carried nothing usable; synthesized from a hash of the text.
    Heuristic,
    /// Scored from detected labels.
    Labels,
    /// Provider unreachable; deterministic placeholder.
    Placeholder,
    /// Analysis failed entirely; zero-score marker.
    Failed,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Keywords => "keywords",
            Self::Heuristic => "heuristic",
            Self::Labels => "labels",
            Self::Placeholder => "placeholder",
            Self::Failed => "failed",
        }
    }
}

/// Normalized analysis of one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerImageAnalysis {
    pub filename: String,
    score: u8,
    rating: Rating,
    pub positive_features: Vec<String>,
    pub barriers: Vec<String>,
    pub safety_concerns: Vec<String>,
    pub recommendations: Vec<String>,
    /// Rating string the provider claimed, if any. Informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_rating: Option<String>,
    /// Confidence in this result, 0.0-1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub source: AnalysisSource,
    pub labels_detected: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub raw_analysis_text: String,
}

impl PerImageAnalysis {
    pub fn new(filename: impl Into<String>, score: i64, source: AnalysisSource) -> Self {
        let score = clamp_score(score);
        Self {
            filename: filename.into(),
            score,
            rating: Rating::from_score(score),
            positive_features: Vec::new(),
            barriers: Vec::new(),
            safety_concerns: Vec::new(),
            recommendations: Vec::new(),
            reported_rating: None,
            confidence: None,
            source,
            labels_detected: 0,
            error: None,
            raw_analysis_text: String::new(),
        }
    }

    /// Zero-score marker for an image whose analysis failed outright.
    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        let mut analysis = Self::new(filename, 0, AnalysisSource::Failed);
        analysis.error = Some(error.into());
        analysis
    }

    pub fn score(&self) -> u8 {
        self.score
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    /// Replace the score, keeping the rating in step.
    pub fn set_score(&mut self, score: i64) {
        self.score = clamp_score(score);
        self.rating = Rating::from_score(self.score);
    }

    /// Whether this result came from a real analysis path (not the failure marker).
    pub fn is_valid(&self) -> bool {
        self.source != AnalysisSource::Failed
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(
            self.source,
            AnalysisSource::Placeholder | AnalysisSource::Failed
        )
    }
}
