//! Prompts sent to vision providers.

/// Per-image accessibility assessment prompt.
pub const PER_IMAGE_PROMPT: &str = r#"You are a home accessibility assessor. Evaluate this photo of a home interior or exterior for a person who uses a wheelchair or has limited mobility.

Respond with ONLY a JSON object in this exact shape:
{
  "score": <integer 0-100, higher is more accessible>,
  "accessibility_rating": "<Excellent|Good|Fair|Poor|Very Poor>",
  "positive_features": ["<feature>", ...],
  "barriers": ["<barrier>", ...],
  "safety_concerns": ["<concern>", ...],
  "recommendations": ["<recommendation>", ...],
  "priority_improvements": ["<most important change>", ...],
  "confidence": <number 0-1>
}

Look for ramps, steps, door and hallway widths, thresholds, grab bars, handrails, flooring, lighting, and clutter. Keep each list item short and specific."#;

/// Whole-set synthesis prompt, sent with every image in one request.
pub const WHOLE_SET_PROMPT: &str = r#"You are a home accessibility assessor. These photos all show the same home. Consider them together and assess the home as a whole for a person who uses a wheelchair or has limited mobility, including features that only become apparent across rooms.

Respond with ONLY a JSON object in this exact shape:
{
  "score": <integer 0-100 for the whole home>,
  "accessibility_rating": "<Excellent|Good|Fair|Poor|Very Poor>",
  "positive_features": ["<feature>", ...],
  "barriers": ["<barrier>", ...],
  "safety_concerns": ["<concern>", ...],
  "recommendations": ["<recommendation>", ...],
  "priority_improvements": ["<most important change>", ...]
}"#;
