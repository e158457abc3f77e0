//! # Credibility analyzer
//!
//! Runs every dimension scorer concurrently, each under its own timeout,
//! then aggregates whatever came back. A scorer that times out is an absent
//! dimension; only "nothing could be scored" fails the analysis.

use crate::aggregate::{aggregate, DimensionScores, WeightTable};
use crate::config::AnalysisConfig;
use crate::gateway::{CompletionGateway, SearchGateway};
use crate::report::CredibilityReport;
use crate::score::{default_scorers, DimensionScorer, ScoreContext, ScorerReport};
use crate::sources::SourceTrust;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Every dimension was absent; `warnings` says why.
    #[error("no dimension could be scored ({} warning(s))", .warnings.len())]
    NoScorableDimensions { warnings: Vec<String> },
}

pub struct CredibilityAnalyzer {
    completion: Arc<CompletionGateway>,
    search: Arc<SearchGateway>,
    trust: Arc<SourceTrust>,
    config: Arc<AnalysisConfig>,
    weights: WeightTable,
    scorers: Vec<Box<dyn DimensionScorer>>,
}

impl CredibilityAnalyzer {
    pub fn new(
        completion: Arc<CompletionGateway>,
        search: Arc<SearchGateway>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            completion,
            search,
            trust: Arc::new(SourceTrust::default_seed()),
            weights: config.weight_table(),
            config: Arc::new(config),
            scorers: default_scorers(),
        }
    }

    pub fn with_source_trust(mut self, trust: SourceTrust) -> Self {
        self.trust = Arc::new(trust);
        self
    }

    pub fn with_scorers(mut self, scorers: Vec<Box<dyn DimensionScorer>>) -> Self {
        self.scorers = scorers;
        self
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Per-scorer budget: the scorer timeout, never past the overall deadline.
    fn scorer_budget(&self) -> Duration {
        self.config.scorer_timeout().min(self.config.deadline())
    }

    pub async fn analyze(
        &self,
        text: &str,
        url: Option<&str>,
    ) -> Result<CredibilityReport, AnalysisError> {
        let ctx = ScoreContext::new(
            text,
            url.map(str::to_string),
            self.completion.clone(),
            self.search.clone(),
            self.trust.clone(),
            self.config.clone(),
        );
        let budget = self.scorer_budget();
        tracing::info!(
            target: "scorer",
            chars = text.chars().count(),
            scorers = self.scorers.len(),
            budget_ms = budget.as_millis() as u64,
            "analysis started"
        );

        let reports: Vec<ScorerReport> = join_all(
            self.scorers
                .iter()
                .map(|scorer| run_scorer(scorer.as_ref(), &ctx, budget)),
        )
        .await;

        let scores: DimensionScores = reports.iter().map(|r| (r.dimension, r.score)).collect();
        let agg = aggregate(&scores, &self.weights);
        for d in &agg.absent {
            crate::metrics::record_dimension_absent(d.as_str());
        }

        let Some(overall) = agg.overall else {
            let warnings: Vec<String> = reports.into_iter().flat_map(|r| r.warnings).collect();
            tracing::error!(target: "scorer", warnings = warnings.len(), "no scorable dimensions");
            return Err(AnalysisError::NoScorableDimensions { warnings });
        };

        tracing::info!(
            target: "scorer",
            overall,
            absent = agg.absent.len(),
            substituted = agg.substituted.len(),
            "analysis finished"
        );
        let status = self.completion.health().snapshot();
        Ok(CredibilityReport::assemble(overall, agg, reports, Vec::new(), status))
    }
}

async fn run_scorer(
    scorer: &dyn DimensionScorer,
    ctx: &ScoreContext,
    budget: Duration,
) -> ScorerReport {
    let dim = scorer.dimension();
    tracing::debug!(target: "scorer", dimension = dim.as_str(), "scorer started");
    let report = match tokio::time::timeout(budget, scorer.score(ctx)).await {
        Ok(r) => r,
        Err(_) => ScorerReport::absent(dim, format!("scorer timed out after {budget:?}")),
    };
    match &report.score {
        Some(s) => tracing::info!(
            target: "scorer",
            dimension = dim.as_str(),
            score = s.value,
            provenance = ?s.provenance,
            "scorer finished"
        ),
        None => tracing::warn!(
            target: "scorer",
            dimension = dim.as_str(),
            reason = %report.evidence.summary,
            "dimension absent"
        ),
    }
    report
}
