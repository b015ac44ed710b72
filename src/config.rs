//! Configuration management using the prefer crate for discovery.
//!
//! Files are named `access-checker.{toml,yaml,json}`; every field has a
//! default, and `ACCESS_*` environment variables override analysis settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mock::{DegradePolicy, MockGenerator, SeedSource};
use crate::scoring::ScoringPolicy;

/// Config file stem searched for by [`Config::load`].
pub const CONFIG_NAME: &str = "access-checker";

/// A backend entry - either a single provider or a fallback chain.
///
/// Examples:
/// - `"gemini"` - single provider
/// - `["groq", "gemini"]` - fallback chain, tries groq first, gemini if it fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendEntry {
    /// Single provider.
    Single(String),
    /// Fallback chain - tries providers in order until one succeeds.
    Chain(Vec<String>),
}

impl BackendEntry {
    /// Get the primary provider name (first in chain or the single provider).
    pub fn primary(&self) -> &str {
        match self {
            BackendEntry::Single(s) => s,
            BackendEntry::Chain(v) => v.first().map(|s| s.as_str()).unwrap_or(""),
        }
    }

    /// Get all provider names in this entry.
    pub fn backends(&self) -> Vec<&str> {
        match self {
            BackendEntry::Single(s) => vec![s.as_str()],
            BackendEntry::Chain(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }

    /// Check if this is a fallback chain (multiple providers).
    pub fn is_chain(&self) -> bool {
        matches!(self, BackendEntry::Chain(v) if v.len() > 1)
    }
}

impl Default for BackendEntry {
    fn default() -> Self {
        BackendEntry::Single("gemini".to_string())
    }
}

/// Which per-image analysis path to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Vision/LLM provider + response parser.
    #[default]
    Vision,
    /// Label provider + label scorer.
    Labels,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Vision => "vision",
            Strategy::Labels => "labels",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vision" | "llm" => Some(Strategy::Vision),
            "labels" | "label" => Some(Strategy::Labels),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a provider call fails for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegradeMode {
    /// Substitute a deterministic placeholder.
    #[default]
    Mock,
    /// Record the image as failed.
    Strict,
}

impl DegradeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradeMode::Mock => "mock",
            DegradeMode::Strict => "strict",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mock" => Some(DegradeMode::Mock),
            "strict" => Some(DegradeMode::Strict),
            _ => None,
        }
    }
}

/// Batch analysis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Maximum per-image provider calls in flight.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Timeout for each per-image provider call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Timeout for the whole-set synthesis call.
    #[serde(default = "default_whole_set_timeout_secs")]
    pub whole_set_timeout_secs: u64,
    #[serde(default)]
    pub strategy: Strategy,
    /// Whether to make the whole-set synthesis call at all.
    #[serde(default = "default_whole_set")]
    pub whole_set: bool,
    #[serde(default)]
    pub degrade: DegradeMode,
    /// Lifetime of cached per-image results. 0 disables the cache.
    #[serde(default = "default_cache_ttl_hours")]
    pub cache_ttl_hours: u64,
}

fn default_max_concurrency() -> usize {
    4
}
fn default_provider_timeout_secs() -> u64 {
    60
}
fn default_whole_set_timeout_secs() -> u64 {
    120
}
fn default_whole_set() -> bool {
    true
}
fn default_cache_ttl_hours() -> u64 {
    24
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            provider_timeout_secs: default_provider_timeout_secs(),
            whole_set_timeout_secs: default_whole_set_timeout_secs(),
            strategy: Strategy::default(),
            whole_set: default_whole_set(),
            degrade: DegradeMode::default(),
            cache_ttl_hours: default_cache_ttl_hours(),
        }
    }
}

impl AnalysisSettings {
    /// Apply `ACCESS_*` environment variable overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = lookup("ACCESS_MAX_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.max_concurrency = n;
        }
        if let Some(n) = lookup("ACCESS_PROVIDER_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.provider_timeout_secs = n;
        }
        if let Some(s) = lookup("ACCESS_STRATEGY").and_then(|v| Strategy::from_str(&v)) {
            self.strategy = s;
        }
        if let Some(d) = lookup("ACCESS_DEGRADE").and_then(|v| DegradeMode::from_str(&v)) {
            self.degrade = d;
        }
        if let Some(n) = lookup("ACCESS_CACHE_TTL_HOURS").and_then(|v| v.parse().ok()) {
            self.cache_ttl_hours = n;
        }
        self
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn whole_set_timeout(&self) -> Duration {
        Duration::from_secs(self.whole_set_timeout_secs)
    }

    /// Cache TTL, or `None` when caching is disabled.
    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_hours > 0)
            .then(|| Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600)))
    }

    /// Degrade policy for the configured mode and strategy.
    pub fn degrade_policy(&self, generator: MockGenerator) -> DegradePolicy {
        match self.degrade {
            DegradeMode::Strict => DegradePolicy::Strict,
            DegradeMode::Mock => {
                let seed = match self.strategy {
                    Strategy::Vision => SeedSource::Content,
                    Strategy::Labels => SeedSource::Filename,
                };
                DegradePolicy::mock(generator, seed)
            }
        }
    }
}

/// Settings for one vision/LLM provider. Unset fields use the provider's defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// API key; falls back to the provider's environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.2
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            model: None,
            endpoint: None,
            api_key: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl VisionSettings {
    /// Configured key, else the value of `env_var`.
    pub fn resolve_api_key(&self, env_var: &str) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Settings for the label detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_max_labels")]
    pub max_labels: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Drop labels no keyword table recognizes.
    #[serde(default = "default_relevant_only")]
    pub relevant_only: bool,
}

fn default_max_labels() -> usize {
    50
}
fn default_min_confidence() -> f32 {
    70.0
}
fn default_relevant_only() -> bool {
    true
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            max_labels: default_max_labels(),
            min_confidence: default_min_confidence(),
            relevant_only: default_relevant_only(),
        }
    }
}

impl LabelSettings {
    pub fn resolve_endpoint(&self) -> Option<String> {
        self.endpoint
            .clone()
            .or_else(|| std::env::var("LABEL_ENDPOINT").ok())
            .filter(|e| !e.is_empty())
    }

    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("LABEL_API_KEY").ok())
            .filter(|k| !k.is_empty())
    }
}

/// Provider selection and per-provider settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Vision provider or fallback chain.
    #[serde(default)]
    pub vision: BackendEntry,
    #[serde(default)]
    pub gemini: VisionSettings,
    #[serde(default)]
    pub openai: VisionSettings,
    #[serde(default)]
    pub groq: VisionSettings,
    #[serde(default)]
    pub labels: LabelSettings,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub mock: MockGenerator,
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// File the config was loaded from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the discovered config file, or defaults.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}, using defaults", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => {
                // No config file found, use defaults with env overrides
                Self::default_with_env()
            }
        }
    }

    /// Default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default_with_overrides(|key| std::env::var(key).ok())
    }

    /// Defaults plus overrides from `lookup`. Overrides that leave the
    /// config invalid are discarded with a warning.
    pub fn default_with_overrides<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.analysis = config.analysis.with_overrides(lookup);
        match config.validate() {
            Ok(()) => config,
            Err(e) => {
                tracing::warn!("{}, ignoring environment overrides", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML, and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        config.analysis = config.analysis.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse file contents, choosing the format from `path`'s extension.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_err = |message: String| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| parse_err(e.to_string())),
            _ => serde_json::from_str(contents).map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Reject settings the analyzer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.max_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "analysis.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.analysis.provider_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "analysis.provider_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.providers.vision.backends().is_empty() {
            return Err(ConfigError::Invalid(
                "providers.vision must name at least one provider".to_string(),
            ));
        }
        Ok(())
    }

    /// Degrade policy for this configuration.
    pub fn degrade_policy(&self) -> DegradePolicy {
        self.analysis.degrade_policy(self.mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analysis.max_concurrency, 4);
        assert_eq!(config.analysis.provider_timeout(), Duration::from_secs(60));
        assert_eq!(config.analysis.strategy, Strategy::Vision);
        assert_eq!(config.analysis.degrade, DegradeMode::Mock);
        assert_eq!(
            config.analysis.cache_ttl(),
            Some(Duration::from_secs(24 * 3600))
        );
        assert_eq!(config.providers.vision.primary(), "gemini");
        assert_eq!(config.providers.labels.max_labels, 50);
        assert!(config.scoring.is_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_entry_untagged() {
        let single: BackendEntry = serde_json::from_str(r#""groq""#).unwrap();
        assert_eq!(single, BackendEntry::Single("groq".to_string()));
        assert!(!single.is_chain());

        let chain: BackendEntry = serde_json::from_str(r#"["groq", "gemini"]"#).unwrap();
        assert!(chain.is_chain());
        assert_eq!(chain.primary(), "groq");
        assert_eq!(chain.backends(), vec!["groq", "gemini"]);
    }

    #[test]
    fn test_overrides() {
        let settings = AnalysisSettings::default().with_overrides(|key| match key {
            "ACCESS_MAX_CONCURRENCY" => Some("8".to_string()),
            "ACCESS_STRATEGY" => Some("labels".to_string()),
            "ACCESS_DEGRADE" => Some("STRICT".to_string()),
            "ACCESS_CACHE_TTL_HOURS" => Some("0".to_string()),
            "ACCESS_PROVIDER_TIMEOUT_SECS" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.strategy, Strategy::Labels);
        assert_eq!(settings.degrade, DegradeMode::Strict);
        assert_eq!(settings.cache_ttl(), None);
        assert_eq!(settings.provider_timeout_secs, 60);
    }

    #[test]
    fn test_cache_ttl_saturates() {
        let settings = AnalysisSettings::default().with_overrides(|key| {
            (key == "ACCESS_CACHE_TTL_HOURS").then(|| u64::MAX.to_string())
        });
        assert_eq!(settings.cache_ttl_hours, u64::MAX);
        assert_eq!(settings.cache_ttl(), Some(Duration::from_secs(u64::MAX)));

        let disabled = AnalysisSettings {
            cache_ttl_hours: 0,
            ..Default::default()
        };
        assert_eq!(disabled.cache_ttl(), None);
    }

    #[test]
    fn test_invalid_env_overrides_discarded() {
        let config = Config::default_with_overrides(|key| match key {
            "ACCESS_PROVIDER_TIMEOUT_SECS" => Some("0".to_string()),
            "ACCESS_STRATEGY" => Some("labels".to_string()),
            _ => None,
        });
        assert_eq!(config, Config::default());

        let config = Config::default_with_overrides(|key| {
            (key == "ACCESS_PROVIDER_TIMEOUT_SECS").then(|| "15".to_string())
        });
        assert_eq!(config.analysis.provider_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_degrade_policy_seed_follows_strategy() {
        let mut settings = AnalysisSettings::default();
        assert_eq!(
            settings.degrade_policy(MockGenerator::default()),
            DegradePolicy::mock(MockGenerator::default(), SeedSource::Content)
        );
        settings.strategy = Strategy::Labels;
        assert_eq!(
            settings.degrade_policy(MockGenerator::default()),
            DegradePolicy::mock(MockGenerator::default(), SeedSource::Filename)
        );
        settings.degrade = DegradeMode::Strict;
        assert!(settings.degrade_policy(MockGenerator::default()).is_strict());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[analysis]
max_concurrency = 2
strategy = "labels"

[scoring]
base_score = 55

[mock]
min_score = 30
max_score = 60

[providers]
vision = ["groq", "gemini"]

[providers.groq]
model = "llama-4-scout-17b-16e-instruct"
"#;
        let config = Config::parse(toml, Path::new("access-checker.toml")).unwrap();
        assert_eq!(config.analysis.max_concurrency, 2);
        assert_eq!(config.analysis.strategy, Strategy::Labels);
        assert_eq!(config.analysis.whole_set_timeout_secs, 120);
        assert_eq!(config.scoring.base_score, 55);
        assert_eq!(config.scoring.safety_bonus, 8);
        assert_eq!(config.mock, MockGenerator::new(30, 60));
        assert!(config.providers.vision.is_chain());
        assert_eq!(
            config.providers.groq.model.as_deref(),
            Some("llama-4-scout-17b-16e-instruct")
        );
        assert_eq!(config.providers.groq.max_tokens, 2048);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "analysis:\n  degrade: strict\n";
        let config = Config::parse(yaml, Path::new("access-checker.yaml")).unwrap();
        assert_eq!(config.analysis.degrade, DegradeMode::Strict);

        let json = r#"{"providers": {"labels": {"min_confidence": 85.5}}}"#;
        let config = Config::parse(json, Path::new("access-checker.json")).unwrap();
        assert_eq!(config.providers.labels.min_confidence, 85.5);
    }

    #[test]
    fn test_parse_error() {
        let result = Config::parse("not = [valid", Path::new("bad.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access-checker.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, r#"{{"analysis": {{"whole_set": false}}}}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert!(!config.analysis.whole_set);
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_load_rejects_zero_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access-checker.toml");
        std::fs::write(&path, "[analysis]\nmax_concurrency = 0\n").unwrap();

        let result = Config::load_from_path(&path).await;
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = Config::load_from_path(Path::new("/nonexistent/access-checker.toml")).await;
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
