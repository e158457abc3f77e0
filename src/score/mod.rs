//! # Dimension scorers
//!
//! One scorer per `DimensionName`. Each returns a `ScorerReport` that either
//! carries a score (measured or substituted) or says the dimension is absent
//! and why. Gateway failures end here: they become an absent dimension plus a
//! warning naming the service, never an error to the caller.
//!
//! Three scorers read the same whole-article completion reply, which
//! `ScoreContext::holistic` requests once per analysis.

pub mod cross_validation;
pub mod holistic;
pub mod section;
pub mod source_quality;

pub use cross_validation::CrossValidationScorer;
pub use holistic::HolisticScorer;
pub use section::{AiContentScorer, NeutralityScorer};
pub use source_quality::SourceCitationScorer;

use crate::aggregate::{DimensionName, DimensionScore};
use crate::citation::Citation;
use crate::config::AnalysisConfig;
use crate::gateway::{CompletionGateway, GatewayError, SearchGateway};
use crate::parse::{self, ParseOutcome, HOLISTIC};
use crate::prompts;
use crate::sources::SourceTrust;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// What a scorer saw, for the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evidence {
    pub summary: String,
    pub details: Vec<String>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorerReport {
    pub dimension: DimensionName,
    /// `None` means the dimension is absent for this analysis.
    pub score: Option<DimensionScore>,
    pub evidence: Evidence,
    pub warnings: Vec<String>,
    pub issues: Vec<String>,
    /// Only the citation scorer fills this.
    pub citations: Vec<Citation>,
}

impl ScorerReport {
    pub fn present(dimension: DimensionName, score: DimensionScore, evidence: Evidence) -> Self {
        Self {
            dimension,
            score: Some(score),
            evidence,
            warnings: Vec::new(),
            issues: Vec::new(),
            citations: Vec::new(),
        }
    }

    /// Absent dimension; `reason` becomes the first warning.
    pub fn absent(dimension: DimensionName, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            dimension,
            score: None,
            evidence: Evidence {
                summary: reason.clone(),
                ..Evidence::default()
            },
            warnings: vec![format!("{dimension}: {reason}")],
            issues: Vec::new(),
            citations: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        let w = warning.into();
        if !self.warnings.contains(&w) {
            self.warnings.push(w);
        }
        self
    }

    pub fn with_warnings<I: IntoIterator<Item = String>>(self, warnings: I) -> Self {
        warnings.into_iter().fold(self, |r, w| r.with_warning(w))
    }

    pub fn with_issues<I: IntoIterator<Item = String>>(mut self, issues: I) -> Self {
        self.issues.extend(issues);
        self
    }

    pub fn is_absent(&self) -> bool {
        self.score.is_none()
    }
}

/// Shared, read-only inputs for one analysis.
pub struct ScoreContext {
    pub text: String,
    pub url: Option<String>,
    pub completion: Arc<CompletionGateway>,
    pub search: Arc<SearchGateway>,
    pub trust: Arc<SourceTrust>,
    pub config: Arc<AnalysisConfig>,
    holistic: OnceCell<Result<Arc<ParseOutcome>, GatewayError>>,
}

impl ScoreContext {
    pub fn new(
        text: impl Into<String>,
        url: Option<String>,
        completion: Arc<CompletionGateway>,
        search: Arc<SearchGateway>,
        trust: Arc<SourceTrust>,
        config: Arc<AnalysisConfig>,
    ) -> Self {
        Self {
            text: text.into(),
            url,
            completion,
            search,
            trust,
            config,
            holistic: OnceCell::new(),
        }
    }

    /// The whole-article analysis, requested at most once per context.
    pub async fn holistic(&self) -> Result<Arc<ParseOutcome>, GatewayError> {
        self.holistic
            .get_or_init(|| async {
                self.completion
                    .complete(&prompts::holistic(&self.text))
                    .await
                    .map(|raw| Arc::new(parse::parse(&raw, &HOLISTIC)))
            })
            .await
            .clone()
    }
}

#[async_trait]
pub trait DimensionScorer: Send + Sync {
    fn dimension(&self) -> DimensionName;
    async fn score(&self, ctx: &ScoreContext) -> ScorerReport;
}

/// One scorer per dimension, in table order.
pub fn default_scorers() -> Vec<Box<dyn DimensionScorer>> {
    vec![
        Box::new(AiContentScorer),
        Box::new(NeutralityScorer),
        Box::new(SourceCitationScorer),
        Box::new(HolisticScorer),
        Box::new(CrossValidationScorer),
    ]
}
