//! Label-based accessibility scoring.
//!
//! Scores start at a base value; positive labels add a feature-specific
//! bonus, negative labels subtract a feature-specific penalty, safety labels
//! add a flat bonus, and measurement/room labels are recorded only. The sum
//! is order-independent and clamped to 0-100.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::categorize::{KeywordTable, LabelCategorizer};
use crate::models::{AnalysisSource, Category, Label, PerImageAnalysis};

/// One keyword group and the points it is worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRule {
    pub keywords: Vec<String>,
    /// Signed adjustment: bonuses are positive, penalties negative.
    pub points: i32,
}

impl ScoreRule {
    fn new(keywords: &[&str], points: i32) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            points,
        }
    }
}

/// Scoring constants. Rules within each list are checked in order; the first
/// rule with a keyword contained in the label name applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    #[serde(default = "default_base_score")]
    pub base_score: i32,
    #[serde(default = "default_positive_rules")]
    pub positive_rules: Vec<ScoreRule>,
    #[serde(default = "default_positive_points")]
    pub default_positive: i32,
    #[serde(default = "default_negative_rules")]
    pub negative_rules: Vec<ScoreRule>,
    #[serde(default = "default_negative_points")]
    pub default_negative: i32,
    #[serde(default = "default_safety_bonus")]
    pub safety_bonus: i32,
}

fn default_base_score() -> i32 {
    50
}

fn default_positive_rules() -> Vec<ScoreRule> {
    vec![
        ScoreRule::new(&["ramp", "elevator", "lift"], 15),
        ScoreRule::new(&["wide doorway", "wide hallway", "accessible entrance"], 12),
        ScoreRule::new(&["grab bar", "handrail", "safety rail"], 10),
        ScoreRule::new(&["accessible bathroom", "accessible kitchen"], 8),
        ScoreRule::new(&["good lighting", "clear pathway"], 6),
    ]
}

fn default_positive_points() -> i32 {
    5
}

fn default_negative_rules() -> Vec<ScoreRule> {
    vec![
        ScoreRule::new(
            &[
                "steep stair",
                "steep step",
                "narrow stair",
                "narrow step",
                "high stair",
                "high step",
            ],
            -20,
        ),
        ScoreRule::new(&["narrow doorway", "narrow hallway", "narrow corridor"], -15),
        ScoreRule::new(&["threshold", "step", "stair"], -12),
        ScoreRule::new(&["trip hazard", "slippery", "uneven"], -10),
        ScoreRule::new(&["clutter", "poor lighting"], -8),
    ]
}

fn default_negative_points() -> i32 {
    -5
}

fn default_safety_bonus() -> i32 {
    8
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            base_score: default_base_score(),
            positive_rules: default_positive_rules(),
            default_positive: default_positive_points(),
            negative_rules: default_negative_rules(),
            default_negative: default_negative_points(),
            safety_bonus: default_safety_bonus(),
        }
    }
}

impl ScoringPolicy {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

fn rules_table(rules: &[ScoreRule]) -> KeywordTable<i32> {
    let mut table = KeywordTable::new();
    for rule in rules {
        table.push(rule.points, &rule.keywords);
    }
    table
}

pub const RAMP_RECOMMENDATION: &str =
    "Install a ramp with a maximum 1:12 slope (ADA) or a platform lift to bypass steps";
pub const WIDEN_RECOMMENDATION: &str =
    "Widen doorways to at least 32 inches of clear width and hallways to at least 36 inches";
pub const SMOKE_DETECTOR_RECOMMENDATION: &str =
    "Install smoke detectors on every level and outside each sleeping area";
pub const FIRE_EXTINGUISHER_RECOMMENDATION: &str =
    "Keep a fire extinguisher within reach in the kitchen";
pub const EXIT_SIGN_RECOMMENDATION: &str = "Mark exit routes with illuminated exit signs";
pub const GRAB_BAR_RECOMMENDATION: &str =
    "Install grab bars beside the toilet and inside the shower or tub";
pub const THRESHOLD_RECOMMENDATION: &str =
    "Replace raised thresholds with beveled or zero-threshold transitions";
pub const SURFACE_RECOMMENDATION: &str =
    "Apply non-slip surfaces and level uneven flooring along walking routes";
pub const PATHWAY_RECOMMENDATION: &str =
    "Clear walking paths of clutter and add bright, even lighting";

/// What a recommendation rule looks for in one image's labels.
#[derive(Debug, Clone, Copy)]
enum Trigger {
    /// A negative label contains one of these keywords.
    Barrier(&'static [&'static str]),
    /// No safety label was detected.
    NoSafetyLabels,
    /// A label containing `room` was seen but none containing `feature`.
    RoomWithout {
        room: &'static str,
        feature: &'static str,
    },
}

const RECOMMENDATION_RULES: &[(Trigger, &[&str])] = &[
    (Trigger::Barrier(&["step", "stair"]), &[RAMP_RECOMMENDATION]),
    (
        Trigger::Barrier(&["narrow doorway", "narrow door", "narrow hallway", "narrow corridor"]),
        &[WIDEN_RECOMMENDATION],
    ),
    (Trigger::Barrier(&["threshold"]), &[THRESHOLD_RECOMMENDATION]),
    (
        Trigger::Barrier(&["trip hazard", "slippery", "uneven"]),
        &[SURFACE_RECOMMENDATION],
    ),
    (
        Trigger::Barrier(&["clutter", "poor lighting"]),
        &[PATHWAY_RECOMMENDATION],
    ),
    (
        Trigger::NoSafetyLabels,
        &[
            SMOKE_DETECTOR_RECOMMENDATION,
            FIRE_EXTINGUISHER_RECOMMENDATION,
            EXIT_SIGN_RECOMMENDATION,
        ],
    ),
    (
        Trigger::RoomWithout {
            room: "bathroom",
            feature: "grab bar",
        },
        &[GRAB_BAR_RECOMMENDATION],
    ),
];

/// Converts categorized labels into a scored per-image analysis.
#[derive(Debug, Clone)]
pub struct LabelScorer {
    categorizer: LabelCategorizer,
    policy: ScoringPolicy,
    positive: KeywordTable<i32>,
    negative: KeywordTable<i32>,
}

impl LabelScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self::with_categorizer(policy, LabelCategorizer::default())
    }

    pub fn with_categorizer(policy: ScoringPolicy, categorizer: LabelCategorizer) -> Self {
        let positive = rules_table(&policy.positive_rules);
        let negative = rules_table(&policy.negative_rules);
        Self {
            categorizer,
            policy,
            positive,
            negative,
        }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Score adjustment for a single label of a known category.
    pub fn adjustment(&self, name: &str, category: Category) -> i32 {
        match category {
            Category::Positive => self
                .positive
                .first_match(name)
                .unwrap_or(self.policy.default_positive),
            Category::Negative => self
                .negative
                .first_match(name)
                .unwrap_or(self.policy.default_negative),
            Category::Safety => self.policy.safety_bonus,
            Category::Measurement | Category::Room | Category::General => 0,
        }
    }

    /// Score one image's labels.
    pub fn score(&self, filename: &str, labels: &[Label]) -> PerImageAnalysis {
        let mut total = i64::from(self.policy.base_score);
        let mut positive_features = Vec::new();
        let mut barriers = Vec::new();
        let mut safety_labels = 0usize;
        let mut lowered = Vec::with_capacity(labels.len());
        let mut raw = String::new();

        for label in labels {
            let category = self.categorizer.categorize(&label.name);
            let points = self.adjustment(&label.name, category);
            total += i64::from(points);

            match category {
                Category::Positive => positive_features.push(label.name.clone()),
                Category::Negative => barriers.push(label.name.clone()),
                Category::Safety => {
                    safety_labels += 1;
                    positive_features.push(label.name.clone());
                }
                Category::Measurement | Category::Room | Category::General => {}
            }

            let _ = writeln!(
                raw,
                "{} [{}] {:.0}% ({:+})",
                label.name, category, label.confidence, points
            );
            lowered.push((category, label.name.to_lowercase()));
        }

        let mut analysis = PerImageAnalysis::new(filename, total, AnalysisSource::Labels);
        analysis.recommendations = recommendations_for(&lowered, safety_labels);
        analysis.positive_features = positive_features;
        analysis.barriers = barriers;
        analysis.labels_detected = labels.len();
        analysis.confidence = mean_confidence(labels);
        analysis.raw_analysis_text = raw;
        analysis
    }
}

impl Default for LabelScorer {
    fn default() -> Self {
        Self::new(ScoringPolicy::default())
    }
}

fn recommendations_for(labels: &[(Category, String)], safety_labels: usize) -> Vec<String> {
    let mut recommendations = Vec::new();
    for (trigger, texts) in RECOMMENDATION_RULES {
        let fires = match *trigger {
            Trigger::Barrier(keywords) => labels.iter().any(|(category, name)| {
                *category == Category::Negative && keywords.iter().any(|k| name.contains(k))
            }),
            Trigger::NoSafetyLabels => safety_labels == 0,
            Trigger::RoomWithout { room, feature } => {
                labels.iter().any(|(_, name)| name.contains(room))
                    && !labels.iter().any(|(_, name)| name.contains(feature))
            }
        };
        if fires {
            recommendations.extend(texts.iter().map(|t| t.to_string()));
        }
    }
    recommendations
}

fn mean_confidence(labels: &[Label]) -> Option<f32> {
    if labels.is_empty() {
        return None;
    }
    let sum: f32 = labels.iter().map(|l| l.confidence).sum();
    Some((sum / labels.len() as f32 / 100.0).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rating;

    fn labels(items: &[(&str, f32)]) -> Vec<Label> {
        items.iter().map(|(n, c)| Label::new(*n, *c)).collect()
    }

    #[test]
    fn test_ramp_and_narrow_doorway_cancel() {
        let scorer = LabelScorer::default();
        let result = scorer.score("entry.jpg", &labels(&[("Ramp", 90.0), ("Narrow Doorway", 80.0)]));
        assert_eq!(result.score(), 50);
        assert_eq!(result.rating(), Rating::VeryPoor);
        assert_eq!(result.positive_features, vec!["Ramp"]);
        assert_eq!(result.barriers, vec!["Narrow Doorway"]);
        assert!(result
            .recommendations
            .contains(&WIDEN_RECOMMENDATION.to_string()));
        assert_eq!(result.confidence, Some(0.85));
    }

    #[test]
    fn test_feature_specific_adjustments() {
        let scorer = LabelScorer::default();
        let cases = [
            ("Elevator", Category::Positive, 15),
            ("Wide Hallway", Category::Positive, 12),
            ("Handrail", Category::Positive, 10),
            ("Accessible Bathroom", Category::Positive, 8),
            ("Good Lighting", Category::Positive, 6),
            ("Wheelchair", Category::Positive, 5),
            ("Steep Stairs", Category::Negative, -20),
            ("Narrow Corridor", Category::Negative, -15),
            ("Stairs", Category::Negative, -12),
            ("Slippery Floor", Category::Negative, -10),
            ("Clutter", Category::Negative, -8),
            ("Curb", Category::Negative, -5),
            ("Smoke Detector", Category::Safety, 8),
            ("Door Width", Category::Measurement, 0),
            ("Kitchen", Category::Room, 0),
        ];
        for (name, category, expected) in cases {
            assert_eq!(scorer.adjustment(name, category), expected, "{}", name);
        }
    }

    #[test]
    fn test_score_is_order_independent() {
        let scorer = LabelScorer::default();
        let mut items = labels(&[
            ("Stairs", 95.0),
            ("Handrail", 88.0),
            ("Smoke Detector", 75.0),
            ("Clutter", 70.0),
        ]);
        let forward = scorer.score("a.jpg", &items).score();
        items.reverse();
        let backward = scorer.score("a.jpg", &items).score();
        assert_eq!(forward, backward);
        assert_eq!(forward, 50 - 12 + 10 + 8 - 8);
    }

    #[test]
    fn test_score_clamped() {
        let scorer = LabelScorer::default();
        let many_ramps = vec![Label::new("Ramp", 99.0); 10];
        assert_eq!(scorer.score("a.jpg", &many_ramps).score(), 100);

        let many_stairs = vec![Label::new("Steep Stairs", 99.0); 10];
        assert_eq!(scorer.score("a.jpg", &many_stairs).score(), 0);
    }

    #[test]
    fn test_safety_recommendations_when_no_safety_labels() {
        let scorer = LabelScorer::default();
        let result = scorer.score("a.jpg", &labels(&[("Kitchen", 90.0)]));
        assert!(result
            .recommendations
            .contains(&SMOKE_DETECTOR_RECOMMENDATION.to_string()));
        assert!(result
            .recommendations
            .contains(&FIRE_EXTINGUISHER_RECOMMENDATION.to_string()));
        assert!(result
            .recommendations
            .contains(&EXIT_SIGN_RECOMMENDATION.to_string()));

        let with_detector = scorer.score("b.jpg", &labels(&[("Smoke Detector", 90.0)]));
        assert!(!with_detector
            .recommendations
            .contains(&SMOKE_DETECTOR_RECOMMENDATION.to_string()));
    }

    #[test]
    fn test_bathroom_without_grab_bar() {
        let scorer = LabelScorer::default();
        let bare = scorer.score("bath.jpg", &labels(&[("Bathroom", 92.0)]));
        assert!(bare
            .recommendations
            .contains(&GRAB_BAR_RECOMMENDATION.to_string()));

        let equipped = scorer.score(
            "bath.jpg",
            &labels(&[("Bathroom", 92.0), ("Grab Bar", 81.0)]),
        );
        assert!(!equipped
            .recommendations
            .contains(&GRAB_BAR_RECOMMENDATION.to_string()));
    }

    #[test]
    fn test_step_barrier_recommends_ramp() {
        let scorer = LabelScorer::default();
        let result = scorer.score("porch.jpg", &labels(&[("Front Steps", 90.0)]));
        assert_eq!(result.recommendations[0], RAMP_RECOMMENDATION);
    }

    #[test]
    fn test_no_labels() {
        let scorer = LabelScorer::default();
        let result = scorer.score("empty.jpg", &[]);
        assert_eq!(result.score(), 50);
        assert_eq!(result.confidence, None);
        assert_eq!(result.labels_detected, 0);
    }

    #[test]
    fn test_custom_policy() {
        let policy = ScoringPolicy {
            base_score: 60,
            safety_bonus: 0,
            ..Default::default()
        };
        let scorer = LabelScorer::new(policy);
        let result = scorer.score("a.jpg", &labels(&[("Smoke Detector", 90.0)]));
        assert_eq!(result.score(), 60);
    }
}
