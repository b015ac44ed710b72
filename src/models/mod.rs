//! Data models for access-checker.

mod analysis;
mod image;
mod label;
mod report;

pub use analysis::{AnalysisSource, PerImageAnalysis, Rating};
pub use image::ImageInput;
pub use label::{Category, Label};
pub use report::{BatchStatistics, ComprehensiveReport};
