//! The analysis result handed to renderers and persistence.

use crate::aggregate::{Aggregate, DimensionName, Provenance};
use crate::citation::Citation;
use crate::health::ServiceStatus;
use crate::score::{Evidence, ScorerReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Dimension scores below this produce an issue line.
pub const LOW_SCORE_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    High,
    Medium,
    Low,
    VeryLow,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Rating::High
        } else if score >= 0.6 {
            Rating::Medium
        } else if score >= 0.4 {
            Rating::Low
        } else {
            Rating::VeryLow
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::High => "high",
            Rating::Medium => "medium",
            Rating::Low => "low",
            Rating::VeryLow => "very low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredibilityReport {
    pub overall_score: f64,
    pub rating: Rating,
    /// Every dimension, `None` when absent.
    pub dimension_scores: BTreeMap<DimensionName, Option<f64>>,
    pub dimension_provenance: BTreeMap<DimensionName, Provenance>,
    pub dimension_evidence: BTreeMap<DimensionName, Evidence>,
    pub missing_dimensions: BTreeSet<DimensionName>,
    pub effective_weights: BTreeMap<DimensionName, f64>,
    pub warnings: Vec<String>,
    pub issues: Vec<String>,
    pub citations: Vec<Citation>,
    pub service_status: Vec<ServiceStatus>,
    pub analyzed_at: DateTime<Utc>,
}

impl CredibilityReport {
    /// Assemble from scorer output and a defined aggregate. Scorer warnings
    /// and issues keep scorer order.
    pub(crate) fn assemble(
        overall: f64,
        agg: Aggregate,
        reports: Vec<ScorerReport>,
        mut warnings: Vec<String>,
        service_status: Vec<ServiceStatus>,
    ) -> Self {
        let mut dimension_scores = BTreeMap::new();
        let mut dimension_provenance = BTreeMap::new();
        let mut dimension_evidence = BTreeMap::new();
        let mut issues = Vec::new();
        let mut citations = Vec::new();

        for r in reports {
            let d = r.dimension;
            dimension_scores.insert(d, r.score.map(|s| s.value));
            if let Some(s) = r.score {
                dimension_provenance.insert(d, s.provenance);
                if s.value < LOW_SCORE_THRESHOLD {
                    issues.push(format!("{d} score is low ({:.2})", s.value));
                }
            }
            dimension_evidence.insert(d, r.evidence);
            for w in r.warnings {
                if !warnings.contains(&w) {
                    warnings.push(w);
                }
            }
            issues.extend(r.issues);
            citations.extend(r.citations);
        }
        for d in DimensionName::ALL {
            dimension_scores.entry(d).or_insert(None);
        }

        Self {
            overall_score: overall,
            rating: Rating::from_score(overall),
            dimension_scores,
            dimension_provenance,
            dimension_evidence,
            missing_dimensions: agg.absent,
            effective_weights: agg.effective_weights,
            warnings,
            issues,
            citations,
            service_status,
            analyzed_at: Utc::now(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }
}
