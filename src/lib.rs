//! access-checker - home accessibility assessment from photos.
//!
//! Images are sent to vision/LLM or label-detection providers, the replies
//! are normalized into per-image analyses, and [`Analyzer::analyze_images`]
//! merges them into one [`ComprehensiveReport`]. Provider failures degrade to
//! deterministic placeholders instead of failing the batch.

pub mod aggregator;
pub mod cache;
pub mod categorize;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod providers;
pub mod rate_limit;
pub mod scoring;

pub use aggregator::Analyzer;
pub use config::Config;
pub use error::{AnalysisError, ConfigError, ProviderError};
pub use models::{ComprehensiveReport, ImageInput, PerImageAnalysis, Rating};
