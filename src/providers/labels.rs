//! Label detection over HTTP.
//!
//! POSTs the base64 image to a label service and expects
//! `{"labels": [{"name": ..., "confidence": 0-100}]}` back. Rekognition-style
//! `Labels`/`Name`/`Confidence` keys are accepted too.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api::{apply_rate_delay, create_client, ensure_success, retry_on_rate_limit};
use super::{LabelProvider, ProviderKind};
use crate::categorize::LabelCategorizer;
use crate::config::LabelSettings;
use crate::error::ProviderError;
use crate::models::{Category, ImageInput, Label};

/// Confidence floor, result cap, and relevance filter for detected labels.
#[derive(Debug, Clone)]
pub struct LabelFilter {
    pub min_confidence: f32,
    pub max_labels: usize,
    /// Drop labels the categorizer files under `general`.
    pub relevant_only: bool,
    categorizer: LabelCategorizer,
}

impl LabelFilter {
    pub fn new(min_confidence: f32, max_labels: usize) -> Self {
        Self {
            min_confidence,
            max_labels,
            relevant_only: false,
            categorizer: LabelCategorizer::default(),
        }
    }

    pub fn from_settings(settings: &LabelSettings) -> Self {
        Self {
            relevant_only: settings.relevant_only,
            ..Self::new(settings.min_confidence, settings.max_labels)
        }
    }

    pub fn relevant_only(mut self, relevant_only: bool) -> Self {
        self.relevant_only = relevant_only;
        self
    }

    /// Keep labels at or above the floor, most confident first, at most `max_labels`.
    pub fn apply(&self, labels: Vec<Label>) -> Vec<Label> {
        let mut kept: Vec<Label> = labels
            .into_iter()
            .filter(|l| l.confidence >= self.min_confidence)
            .filter(|l| {
                !self.relevant_only || self.categorizer.categorize(&l.name) != Category::General
            })
            .collect();
        kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        kept.truncate(self.max_labels);
        kept
    }
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self::from_settings(&LabelSettings::default())
    }
}

#[derive(Debug, Serialize)]
struct LabelRequest<'a> {
    filename: &'a str,
    image: String,
    max_labels: usize,
    min_confidence: f32,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default, alias = "Labels")]
    labels: Vec<DetectedLabel>,
}

#[derive(Debug, Deserialize)]
struct DetectedLabel {
    #[serde(alias = "Name")]
    name: String,
    #[serde(alias = "Confidence")]
    confidence: f32,
}

/// Label provider backed by an HTTP detection service.
pub struct HttpLabelProvider {
    endpoint: Option<String>,
    api_key: Option<String>,
    filter: LabelFilter,
    timeout: Duration,
}

impl HttpLabelProvider {
    pub fn from_settings(settings: &LabelSettings, timeout: Duration) -> Self {
        Self {
            endpoint: settings.resolve_endpoint(),
            api_key: settings.resolve_api_key(),
            filter: LabelFilter::from_settings(settings),
            timeout,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn filter(&self) -> &LabelFilter {
        &self.filter
    }
}

fn into_labels(response: LabelResponse) -> Vec<Label> {
    response
        .labels
        .into_iter()
        .map(|l| Label::new(l.name, l.confidence))
        .collect()
}

#[async_trait]
impl LabelProvider for HttpLabelProvider {
    fn name(&self) -> &str {
        ProviderKind::Labels.as_str()
    }

    fn is_available(&self) -> bool {
        self.endpoint.is_some()
    }

    fn availability_hint(&self) -> String {
        match &self.endpoint {
            None => "LABEL_ENDPOINT not set (or providers.labels.endpoint)".to_string(),
            Some(endpoint) => format!("Label service at {}", endpoint),
        }
    }

    async fn detect_labels(&self, image: &ImageInput) -> Result<Vec<Label>, ProviderError> {
        let endpoint = self.endpoint.as_ref().ok_or_else(|| {
            ProviderError::NotAvailable("LABEL_ENDPOINT not set".to_string())
        })?;

        let request = LabelRequest {
            filename: &image.filename,
            image: image.to_base64(),
            max_labels: self.filter.max_labels,
            min_confidence: self.filter.min_confidence,
        };
        let mut headers = HashMap::new();
        if let Some(key) = &self.api_key {
            headers.insert("Authorization".to_string(), format!("Bearer {}", key));
        }
        let client = create_client(self.name(), self.timeout)?;

        apply_rate_delay("LABEL_DELAY_MS", 0, self.name()).await;

        let response = retry_on_rate_limit(self.name(), || async {
            client
                .post_json_with_headers(endpoint, &request, &headers)
                .await
                .map_err(ProviderError::from)
        })
        .await?;
        let response = ensure_success(self.name(), response).await?;

        let parsed: LabelResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse label response: {}", e))
        })?;
        let detected = into_labels(parsed);
        let total = detected.len();
        let labels = self.filter.apply(detected);
        debug!(
            filename = %image.filename,
            total,
            kept = labels.len(),
            "Filtered detected labels"
        );
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(labels: &[Label]) -> Vec<&str> {
        labels.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_filter_confidence_and_cap() {
        let labels = vec![
            Label::new("Ramp", 72.0),
            Label::new("Stairs", 95.0),
            Label::new("Door", 65.0),
            Label::new("Handrail", 88.0),
        ];
        let filter = LabelFilter::new(70.0, 2);
        assert_eq!(names(&filter.apply(labels)), vec!["Stairs", "Handrail"]);
    }

    #[test]
    fn test_filter_relevant_only() {
        let labels = vec![
            Label::new("Houseplant", 99.0),
            Label::new("Grab Bar", 80.0),
            Label::new("Kitchen", 75.0),
        ];
        let filter = LabelFilter::new(70.0, 50).relevant_only(true);
        assert_eq!(names(&filter.apply(labels.clone())), vec!["Grab Bar", "Kitchen"]);

        let unfiltered = LabelFilter::new(70.0, 50);
        assert_eq!(unfiltered.apply(labels).len(), 3);
    }

    #[test]
    fn test_response_keys() {
        let ours: LabelResponse =
            serde_json::from_str(r#"{"labels": [{"name": "Ramp", "confidence": 91.5}]}"#).unwrap();
        assert_eq!(into_labels(ours), vec![Label::new("Ramp", 91.5)]);

        let rekognition: LabelResponse = serde_json::from_str(
            r#"{"Labels": [{"Name": "Stairs", "Confidence": 99.1, "Instances": []}]}"#,
        )
        .unwrap();
        assert_eq!(into_labels(rekognition), vec![Label::new("Stairs", 99.1)]);
    }

    #[tokio::test]
    async fn test_unavailable_without_endpoint() {
        let settings = LabelSettings {
            endpoint: None,
            ..Default::default()
        };
        let mut provider = HttpLabelProvider::from_settings(&settings, Duration::from_secs(5));
        provider.endpoint = None;
        assert!(!provider.is_available());
        let image = ImageInput::new("a.jpg", vec![1]);
        assert!(matches!(
            provider.detect_labels(&image).await,
            Err(ProviderError::NotAvailable(_))
        ));
        assert!(provider
            .with_endpoint("http://localhost:9")
            .is_available());
    }
}
