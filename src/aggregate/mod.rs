//! Weighted aggregation over whichever dimensions produced a score.
//!
//! `overall = Σ score_i * effective_weight_i` where the effective weights are
//! the base weights of the present dimensions scaled by `1 / (1 - removed)`.
//! No present dimension means no overall score; nothing is invented here.

pub mod weights;

pub use weights::{DimensionName, WeightTable};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Where a dimension value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Produced by the scorer's primary path.
    Measured,
    /// Produced by a documented fallback (local heuristic instead of LLM).
    Substituted,
}

/// A present dimension value in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub value: f64,
    pub provenance: Provenance,
}

impl DimensionScore {
    pub fn measured(value: f64) -> Self {
        Self {
            value: clamp01(value),
            provenance: Provenance::Measured,
        }
    }

    pub fn substituted(value: f64) -> Self {
        Self {
            value: clamp01(value),
            provenance: Provenance::Substituted,
        }
    }
}

/// Per-dimension input; `None` (or a missing key) means absent.
pub type DimensionScores = BTreeMap<DimensionName, Option<DimensionScore>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub overall: Option<f64>,
    pub effective_weights: BTreeMap<DimensionName, f64>,
    pub absent: BTreeSet<DimensionName>,
    pub substituted: BTreeSet<DimensionName>,
}

/// Combine present dimensions. Pure: same input, same output.
pub fn aggregate(scores: &DimensionScores, table: &WeightTable) -> Aggregate {
    let mut present: BTreeMap<DimensionName, DimensionScore> = BTreeMap::new();
    let mut absent = BTreeSet::new();
    let mut substituted = BTreeSet::new();

    for d in DimensionName::ALL {
        match scores.get(&d).copied().flatten() {
            Some(s) if s.value.is_finite() => {
                if s.provenance == Provenance::Substituted {
                    substituted.insert(d);
                }
                present.insert(d, s);
            }
            _ => {
                absent.insert(d);
            }
        }
    }

    let removed: f64 = absent.iter().map(|d| table.weight(*d)).sum();
    let remaining = 1.0 - removed;

    if present.is_empty() {
        return Aggregate {
            overall: None,
            effective_weights: BTreeMap::new(),
            absent,
            substituted,
        };
    }

    // Only zero-weight dimensions left: share equally among them.
    let effective_weights: BTreeMap<DimensionName, f64> = if remaining <= 1e-12 {
        let share = 1.0 / present.len() as f64;
        present.keys().map(|d| (*d, share)).collect()
    } else {
        let scale = 1.0 / remaining;
        present
            .keys()
            .map(|d| (*d, table.weight(*d) * scale))
            .collect()
    };

    let overall = present
        .iter()
        .map(|(d, s)| clamp01(s.value) * effective_weights[d])
        .sum::<f64>();

    Aggregate {
        overall: Some(clamp01(overall)),
        effective_weights,
        absent,
        substituted,
    }
}

/// Clamp to [0,1]; NaN maps to 0.
pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
