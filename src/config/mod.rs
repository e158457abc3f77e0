// src/config/mod.rs
pub mod analysis;
pub mod services;

pub use analysis::{AnalysisConfig, CitationConfig, CrossValidationConfig};
pub use services::ServiceConfig;
