//! Error types for providers, analysis, and configuration.

use std::time::Duration;

use thiserror::Error;

/// Errors from vision and label providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Rate limited by {provider}, retry after {retry_after_secs:?}s")]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{provider} timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::RequestFailed(err.to_string())
    }
}

/// Errors surfaced by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("No images submitted")]
    NoImages,

    #[error("Image has no content: {0}")]
    EmptyImage(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for AnalysisError {
    fn from(err: ConfigError) -> Self {
        AnalysisError::Config(err.to_string())
    }
}
