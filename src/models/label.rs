//! Labels emitted by label-detection providers.

use serde::Serialize;

/// A detected visual object or feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Label {
    pub name: String,
    /// Detection confidence, 0-100.
    pub confidence: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 100.0),
        }
    }
}

/// Accessibility-relevant bucket a label is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Positive,
    Negative,
    Safety,
    Measurement,
    Room,
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Safety => "safety",
            Self::Measurement => "measurement",
            Self::Room => "room",
            Self::General => "general",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "safety" => Some(Self::Safety),
            "measurement" => Some(Self::Measurement),
            "room" => Some(Self::Room),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
