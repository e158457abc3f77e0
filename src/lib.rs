// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod analyzer;
pub mod bootstrap;
pub mod citation;
pub mod config;
pub mod gateway;
pub mod health;
pub mod input;
pub mod metrics;
pub mod parse;
pub mod persist;
pub mod prompts;
pub mod render;
pub mod report;
pub mod score;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, DimensionName, DimensionScore, Provenance, WeightTable};
pub use crate::analyzer::{AnalysisError, CredibilityAnalyzer};
pub use crate::gateway::{CompletionGateway, GatewayError, SearchGateway};
pub use crate::health::{Service, ServiceHealth};
pub use crate::parse::{parse, ParseOutcome, ParseStrategy, ParsedScoreRecord};
pub use crate::report::{CredibilityReport, Rating};
