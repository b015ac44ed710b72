//! Parsing of free-form provider replies into per-image analyses.
//!
//! Three tiers, tried in order:
//! 1. Structured: the span from the first `{` to the last `}` parsed as a JSON object.
//! 2. Keywords: a `score: N` pattern plus keyword-matched lines.
//! 3. Heuristic: a hash-seeded synthesis of the reply text.
//!
//! Parsing never fails; a worse tier only carries less information.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn, Span};

use crate::mock::MockGenerator;
use crate::models::{AnalysisSource, PerImageAnalysis};

/// Confidence used when a structured reply carries none.
pub const STRUCTURED_CONFIDENCE: f32 = 0.8;
pub const KEYWORD_CONFIDENCE: f32 = 0.5;
pub const HEURISTIC_CONFIDENCE: f32 = 0.3;

/// Score used by the keyword tier when no score pattern is present.
pub const DEFAULT_SCORE: i64 = 50;

/// Maximum lines collected per keyword set.
const MAX_LINES: usize = 5;

static SCORE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)score[:\s]*(\d+)").unwrap());

static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•]+|\d+[.)])\s*").unwrap());

pub const FEATURE_LINE_KEYWORDS: &[&str] = &[
    "accessible",
    "ramp",
    "elevator",
    "grab bar",
    "handrail",
    "wide",
    "lever",
    "step-free",
    "stair-free",
    "barrier-free",
    "threshold-free",
    "zero threshold",
    "zero-threshold",
    "well lit",
    "well-lit",
    "good lighting",
    "positive",
    "feature",
];

pub const BARRIER_LINE_KEYWORDS: &[&str] = &[
    "barrier",
    "stair",
    "step",
    "narrow",
    "threshold",
    "obstacle",
    "hazard",
    "slippery",
    "uneven",
    "clutter",
    "difficult",
    "lack",
];

/// Positive compounds that contain a barrier keyword. Blanked out before
/// barrier matching so "step-free path" is not read as a step.
pub const POSITIVE_COMPOUNDS: &[&str] = &[
    "step-free",
    "step free",
    "stair-free",
    "barrier-free",
    "threshold-free",
    "zero threshold",
    "zero-threshold",
    "no steps",
    "no stairs",
];

pub const RECOMMENDATION_LINE_KEYWORDS: &[&str] = &[
    "recommend",
    "recommendation",
    "install",
    "consider",
    "replace",
    "widen",
    "improve",
    "remove",
    "should",
];

static FEATURE_LINES: LazyLock<LineMatcher> =
    LazyLock::new(|| LineMatcher::new(FEATURE_LINE_KEYWORDS, &[]));

static BARRIER_LINES: LazyLock<LineMatcher> =
    LazyLock::new(|| LineMatcher::new(BARRIER_LINE_KEYWORDS, POSITIVE_COMPOUNDS));

static RECOMMENDATION_LINES: LazyLock<LineMatcher> =
    LazyLock::new(|| LineMatcher::new(RECOMMENDATION_LINE_KEYWORDS, &[]));

/// Keys checked, in order, when a list item is an object instead of a string.
const ITEM_TEXT_KEYS: &[&str] = &[
    "description",
    "feature",
    "barrier",
    "recommendation",
    "improvement",
    "name",
    "title",
    "text",
];

/// Converts raw provider text into a [`PerImageAnalysis`].
#[derive(Debug, Clone)]
pub struct ResponseParser {
    heuristic: MockGenerator,
    span: Span,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(MockGenerator::default())
    }
}

impl ResponseParser {
    /// Parser whose heuristic tier draws from `heuristic`.
    pub fn new(heuristic: MockGenerator) -> Self {
        Self {
            heuristic,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Parse `text` for `filename`, falling through the tiers as needed.
    pub fn parse(&self, filename: &str, text: &str) -> PerImageAnalysis {
        let _enter = self.span.enter();

        if let Some(span) = json_span(text) {
            match serde_json::from_str::<Value>(span) {
                Ok(Value::Object(map)) => {
                    debug!(filename, "Parsed structured reply");
                    return structured(filename, text, &map);
                }
                Ok(_) => debug!(filename, "JSON span is not an object"),
                Err(e) => debug!(filename, error = %e, "JSON span did not parse"),
            }
        }

        if let Some(analysis) = keywords(filename, text) {
            warn!(filename, "Reply was not valid JSON, used keyword extraction");
            return analysis;
        }

        warn!(filename, "Reply had no recognizable content, synthesizing");
        let mut analysis =
            self.heuristic
                .synthesize(filename, text.as_bytes(), AnalysisSource::Heuristic);
        analysis.confidence = Some(HEURISTIC_CONFIDENCE);
        analysis.raw_analysis_text = text.to_string();
        analysis
    }
}

/// Text from the first `{` through the last `}`, if both exist in order.
pub fn json_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn structured(filename: &str, text: &str, map: &Map<String, Value>) -> PerImageAnalysis {
    let score = map.get("score").and_then(number).map_or(0, |s| s.round() as i64);
    let mut analysis = PerImageAnalysis::new(filename, score, AnalysisSource::Structured);

    analysis.positive_features = items(map.get("positive_features"));
    analysis.barriers = items(map.get("barriers"));
    analysis.safety_concerns = items(map.get("safety_concerns"));
    analysis.recommendations = items(map.get("recommendations"));
    analysis
        .recommendations
        .extend(items(map.get("priority_improvements")));

    analysis.reported_rating = Some(
        map.get("accessibility_rating")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
    );
    analysis.confidence = Some(
        map.get("confidence")
            .and_then(number)
            .map_or(STRUCTURED_CONFIDENCE, normalize_confidence),
    );
    analysis.raw_analysis_text = text.to_string();
    analysis
}

/// Numeric value from a JSON number or numeric string.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Accept 0-1 or 0-100 confidence values.
fn normalize_confidence(raw: f64) -> f32 {
    let value = if raw > 1.0 { raw / 100.0 } else { raw };
    value.clamp(0.0, 1.0) as f32
}

fn items(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(values)) => values.iter().filter_map(item_text).collect(),
        Some(other) => item_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Object(map) => ITEM_TEXT_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(|s| s.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn keywords(filename: &str, text: &str) -> Option<PerImageAnalysis> {
    let score = SCORE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().parse::<i64>().unwrap_or(i64::MAX));

    let features = matching_lines(text, &FEATURE_LINES);
    let barriers = matching_lines(text, &BARRIER_LINES);
    let recommendations = matching_lines(text, &RECOMMENDATION_LINES);

    if score.is_none() && features.is_empty() && barriers.is_empty() && recommendations.is_empty()
    {
        return None;
    }

    let mut analysis = PerImageAnalysis::new(
        filename,
        score.unwrap_or(DEFAULT_SCORE),
        AnalysisSource::Keywords,
    );
    analysis.positive_features = features;
    analysis.barriers = barriers;
    analysis.recommendations = recommendations;
    analysis.confidence = Some(KEYWORD_CONFIDENCE);
    analysis.raw_analysis_text = text.to_string();
    Some(analysis)
}

/// Whole-word keyword matcher for one keyword set.
///
/// A keyword matches at a word start and may carry a plural or verb ending
/// ("stairs", "cluttered"), but not an arbitrary continuation: "wide" does
/// not match "widen".
#[derive(Debug)]
struct LineMatcher {
    pattern: Regex,
    masks: &'static [&'static str],
}

impl LineMatcher {
    /// Matcher for `keywords`, ignoring any text covered by `masks`.
    fn new(keywords: &[&str], masks: &'static [&'static str]) -> Self {
        let alternation = keywords
            .iter()
            .map(|k| regex::escape(&k.to_lowercase()))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(r"\b(?:{})(?:s|es|d|ed|ing|ment|ments)?\b", alternation);
        Self {
            pattern: Regex::new(&pattern).unwrap(),
            masks,
        }
    }

    fn is_match(&self, line: &str) -> bool {
        let mut lower = line.to_lowercase();
        for mask in self.masks {
            if lower.contains(mask) {
                lower = lower.replace(mask, " ");
            }
        }
        self.pattern.is_match(&lower)
    }
}

/// Up to [`MAX_LINES`] distinct matching lines, bullets stripped.
fn matching_lines(text: &str, matcher: &LineMatcher) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for line in text.lines() {
        if !matcher.is_match(line) {
            continue;
        }
        let cleaned = BULLET_PREFIX.replace(line, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() || found.iter().any(|f| f == cleaned) {
            continue;
        }
        found.push(cleaned.to_string());
        if found.len() == MAX_LINES {
            break;
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;

    fn parse(text: &str) -> PerImageAnalysis {
        ResponseParser::default().parse("img.jpg", text)
    }

    #[test]
    fn test_structured_with_preamble() {
        let result = parse(
            r#"Great analysis. {"score": 92, "positive_features":["Wide hallway"], "barriers":[], "recommendations":[]}"#,
        );
        assert_eq!(result.source, AnalysisSource::Structured);
        assert_eq!(result.score(), 92);
        assert_eq!(result.rating(), Rating::Excellent);
        assert_eq!(result.positive_features, vec!["Wide hallway"]);
        assert!(result.barriers.is_empty());
        assert_eq!(result.confidence, Some(STRUCTURED_CONFIDENCE));
        assert_eq!(result.reported_rating.as_deref(), Some("Unknown"));
    }

    #[test]
    fn test_structured_in_code_fence() {
        let text = "```json\n{\"score\": \"71\", \"accessibility_rating\": \"Fair\", \"confidence\": 85}\n```";
        let result = parse(text);
        assert_eq!(result.source, AnalysisSource::Structured);
        assert_eq!(result.score(), 71);
        assert_eq!(result.rating(), Rating::Fair);
        assert_eq!(result.reported_rating.as_deref(), Some("Fair"));
        assert_eq!(result.confidence, Some(0.85));
    }

    #[test]
    fn test_structured_missing_fields_default() {
        let result = parse("{}");
        assert_eq!(result.source, AnalysisSource::Structured);
        assert_eq!(result.score(), 0);
        assert!(result.positive_features.is_empty());
        assert!(result.recommendations.is_empty());
    }

    #[test]
    fn test_structured_score_clamped() {
        assert_eq!(parse(r#"{"score": 250}"#).score(), 100);
        assert_eq!(parse(r#"{"score": -5}"#).score(), 0);
    }

    #[test]
    fn test_priority_improvements_follow_recommendations() {
        let result = parse(
            r#"{"score": 60, "recommendations": ["Add ramp"], "priority_improvements": [{"improvement": "Widen door", "priority": "high"}]}"#,
        );
        assert_eq!(result.recommendations, vec!["Add ramp", "Widen door"]);
    }

    #[test]
    fn test_safety_concerns_mapped() {
        let result = parse(r#"{"score": 60, "safety_concerns": ["Loose rug"]}"#);
        assert_eq!(result.safety_concerns, vec!["Loose rug"]);
    }

    #[test]
    fn test_keyword_tier_barrier_line() {
        let text = "The photo shows a hallway.\nBarrier: narrow doorway causing access issues\nNothing else.";
        let result = parse(text);
        assert_eq!(result.source, AnalysisSource::Keywords);
        assert_eq!(result.barriers, vec!["Barrier: narrow doorway causing access issues"]);
        assert_eq!(result.score(), 50);
        assert_eq!(result.rating(), Rating::VeryPoor);
        assert_eq!(result.confidence, Some(KEYWORD_CONFIDENCE));
    }

    #[test]
    fn test_keyword_tier_score_and_bullets() {
        let text = "Accessibility score: 83\n- Ramp at the entrance\n* Wide doorways throughout\n1. Replace the door knobs\n2) Replace the door knobs";
        let result = parse(text);
        assert_eq!(result.source, AnalysisSource::Keywords);
        assert_eq!(result.score(), 83);
        assert_eq!(result.rating(), Rating::Good);
        assert_eq!(
            result.positive_features,
            vec!["Ramp at the entrance", "Wide doorways throughout"]
        );
        assert_eq!(result.recommendations, vec!["Replace the door knobs"]);
    }

    #[test]
    fn test_keyword_tier_mixed_lines() {
        let text = "- Zero threshold entry at the front door\n- Step-free path to the garden\n- Narrow stairs to the basement\nRecommend you widen the hallway";
        let result = parse(text);
        assert_eq!(result.source, AnalysisSource::Keywords);
        assert_eq!(
            result.positive_features,
            vec![
                "Zero threshold entry at the front door",
                "Step-free path to the garden"
            ]
        );
        assert_eq!(result.barriers, vec!["Narrow stairs to the basement"]);
        assert_eq!(result.recommendations, vec!["Recommend you widen the hallway"]);
    }

    #[test]
    fn test_line_matcher_whole_words() {
        assert!(FEATURE_LINES.is_match("Wide doorways"));
        assert!(!FEATURE_LINES.is_match("Widen the doorways"));
        assert!(BARRIER_LINES.is_match("Three steps at the porch"));
        assert!(BARRIER_LINES.is_match("Cluttered hallway"));
        assert!(!BARRIER_LINES.is_match("Barrier-free shower"));
        assert!(BARRIER_LINES.is_match("Step-free kitchen but a high threshold at the patio"));
        assert!(RECOMMENDATION_LINES.is_match("Improvements: add lighting"));
    }

    #[test]
    fn test_keyword_tier_caps_lines() {
        let text = (1..=8)
            .map(|i| format!("- Barrier number {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let result = parse(&text);
        assert_eq!(result.barriers.len(), 5);
        assert_eq!(result.barriers[0], "Barrier number 1");
    }

    #[test]
    fn test_invalid_json_falls_back() {
        let result = parse("{score: 77, barriers: [stairs]}");
        assert_eq!(result.source, AnalysisSource::Keywords);
        assert_eq!(result.score(), 77);
    }

    #[test]
    fn test_heuristic_tier_deterministic() {
        let a = parse("Lovely photo.");
        let b = parse("Lovely photo.");
        assert_eq!(a.source, AnalysisSource::Heuristic);
        assert_eq!(a, b);
        assert!((40..=85).contains(&a.score()));
        assert_eq!(a.confidence, Some(HEURISTIC_CONFIDENCE));
    }

    #[test]
    fn test_json_span() {
        assert_eq!(json_span("a {b} c {d} e"), Some("{b} c {d}"));
        assert_eq!(json_span("} before {"), None);
        assert_eq!(json_span("no braces"), None);
    }
}
