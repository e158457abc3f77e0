//! Dimension names and the base-weight table.
//!
//! Default table (sums to 1.0):
//!
//! | dimension               | weight |
//! |-------------------------|--------|
//! | ai_content              | 0.15   |
//! | language_neutrality     | 0.20   |
//! | source_citation_quality | 0.20   |
//! | deepseek_analysis       | 0.30   |
//! | cross_validation        | 0.15   |
//!
//! Overrides come from the `[weights]` table of `config/credibility.toml`;
//! whatever is loaded is sanitized and normalized before use.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionName {
    AiContent,
    LanguageNeutrality,
    SourceCitationQuality,
    DeepseekAnalysis,
    CrossValidation,
}

impl DimensionName {
    pub const ALL: [DimensionName; 5] = [
        DimensionName::AiContent,
        DimensionName::LanguageNeutrality,
        DimensionName::SourceCitationQuality,
        DimensionName::DeepseekAnalysis,
        DimensionName::CrossValidation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DimensionName::AiContent => "ai_content",
            DimensionName::LanguageNeutrality => "language_neutrality",
            DimensionName::SourceCitationQuality => "source_citation_quality",
            DimensionName::DeepseekAnalysis => "deepseek_analysis",
            DimensionName::CrossValidation => "cross_validation",
        }
    }

    pub fn default_weight(self) -> f64 {
        match self {
            DimensionName::AiContent => 0.15,
            DimensionName::LanguageNeutrality => 0.20,
            DimensionName::SourceCitationQuality => 0.20,
            DimensionName::DeepseekAnalysis => 0.30,
            DimensionName::CrossValidation => 0.15,
        }
    }

    fn index(self) -> usize {
        match self {
            DimensionName::AiContent => 0,
            DimensionName::LanguageNeutrality => 1,
            DimensionName::SourceCitationQuality => 2,
            DimensionName::DeepseekAnalysis => 3,
            DimensionName::CrossValidation => 4,
        }
    }
}

impl fmt::Display for DimensionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DimensionName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        DimensionName::ALL
            .into_iter()
            .find(|d| d.as_str() == key)
            .ok_or_else(|| format!("unknown dimension: {s}"))
    }
}

/// Normalized base weights, one slot per dimension. Always sums to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightTable {
    weights: [f64; 5],
}

impl Default for WeightTable {
    fn default() -> Self {
        let mut weights = [0.0; 5];
        for d in DimensionName::ALL {
            weights[d.index()] = d.default_weight();
        }
        Self { weights }.normalized()
    }
}

impl WeightTable {
    /// Start from the defaults and apply `overrides` (keys are dimension
    /// names). Unknown keys, negative and non-finite values are ignored; an
    /// all-zero result falls back to the defaults.
    pub fn from_overrides(overrides: &BTreeMap<String, f64>) -> Self {
        let mut table = Self::default();
        for (key, &w) in overrides {
            match key.parse::<DimensionName>() {
                Ok(d) if w.is_finite() && w >= 0.0 => table.weights[d.index()] = w,
                Ok(d) => {
                    tracing::warn!(target: "config", dimension = %d, weight = w, "ignoring invalid weight")
                }
                Err(e) => tracing::warn!(target: "config", error = %e, "ignoring weight override"),
            }
        }
        if table.weights.iter().sum::<f64>() <= f64::EPSILON {
            tracing::warn!(target: "config", "all weights are zero; using defaults");
            return Self::default();
        }
        table.normalized()
    }

    fn normalized(mut self) -> Self {
        let total: f64 = self.weights.iter().sum();
        if total > 0.0 {
            for w in &mut self.weights {
                *w /= total;
            }
        }
        self
    }

    pub fn weight(&self, dimension: DimensionName) -> f64 {
        self.weights[dimension.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DimensionName, f64)> + '_ {
        DimensionName::ALL.into_iter().map(|d| (d, self.weight(d)))
    }

    pub fn to_map(&self) -> BTreeMap<DimensionName, f64> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_sums_to_one() {
        let t = WeightTable::default();
        let sum: f64 = t.iter().map(|(_, w)| w).sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!((t.weight(DimensionName::DeepseekAnalysis) - 0.30).abs() < 1e-9);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for d in DimensionName::ALL {
            assert_eq!(d.as_str().parse::<DimensionName>().unwrap(), d);
        }
        assert_eq!(
            "Cross-Validation".parse::<DimensionName>().unwrap(),
            DimensionName::CrossValidation
        );
        assert!("sentiment".parse::<DimensionName>().is_err());
    }

    #[test]
    fn overrides_are_normalized() {
        let mut m = BTreeMap::new();
        m.insert("ai_content".to_string(), 1.0);
        m.insert("language_neutrality".to_string(), 1.0);
        m.insert("source_citation_quality".to_string(), 1.0);
        m.insert("deepseek_analysis".to_string(), 1.0);
        m.insert("cross_validation".to_string(), 1.0);
        let t = WeightTable::from_overrides(&m);
        for (_, w) in t.iter() {
            assert!((w - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut m = BTreeMap::new();
        m.insert("ai_content".to_string(), -3.0);
        m.insert("bogus".to_string(), 10.0);
        m.insert("cross_validation".to_string(), f64::NAN);
        let t = WeightTable::from_overrides(&m);
        for d in DimensionName::ALL {
            assert!((t.weight(d) - WeightTable::default().weight(d)).abs() < 1e-12);
        }
    }

    #[test]
    fn all_zero_falls_back_to_defaults() {
        let m: BTreeMap<String, f64> = DimensionName::ALL
            .iter()
            .map(|d| (d.as_str().to_string(), 0.0))
            .collect();
        assert_eq!(WeightTable::from_overrides(&m), WeightTable::default());
    }
}
