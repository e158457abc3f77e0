// src/config/analysis.rs
use crate::aggregate::WeightTable;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "CREDIBILITY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/credibility.toml";

fn default_scorer_timeout_secs() -> u64 {
    240
}
fn default_deadline_secs() -> u64 {
    600
}

/// Analysis tuning: weights, time budgets, citation and cross-validation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Dimension name → base weight. Missing names keep their default.
    pub weights: BTreeMap<String, f64>,
    pub scorer_timeout_secs: u64,
    pub deadline_secs: u64,
    pub citation: CitationConfig,
    pub cross_validation: CrossValidationConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            scorer_timeout_secs: default_scorer_timeout_secs(),
            deadline_secs: default_deadline_secs(),
            citation: CitationConfig::default(),
            cross_validation: CrossValidationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationConfig {
    /// Citations shorter than this (in characters) are skipped.
    pub min_length: usize,
    pub max_keywords: usize,
    pub results_per_keyword: usize,
    /// Score for skipped/unverified citations and for an empty list.
    pub neutral_score: f64,
    /// Truthfulness at or above this marks a citation verified.
    pub verified_threshold: f64,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_keywords: 3,
            results_per_keyword: 3,
            neutral_score: 0.5,
            verified_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossValidationConfig {
    pub max_points: usize,
    pub results_per_point: usize,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            max_points: 5,
            results_per_point: 5,
        }
    }
}

impl AnalysisConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AnalysisConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading analysis config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing analysis config {}", path.display()))
    }

    /// 1) $CREDIBILITY_CONFIG_PATH 2) config/credibility.toml 3) defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from_file(&p);
        }
        Ok(Self::default())
    }

    pub fn weight_table(&self) -> WeightTable {
        WeightTable::from_overrides(&self.weights)
    }

    pub fn scorer_timeout(&self) -> Duration {
        Duration::from_secs(self.scorer_timeout_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    fn sanitize(&mut self) {
        let d = Self::default();
        if self.scorer_timeout_secs == 0 {
            self.scorer_timeout_secs = d.scorer_timeout_secs;
        }
        if self.deadline_secs == 0 {
            self.deadline_secs = d.deadline_secs;
        }
        let c = &mut self.citation;
        let dc = CitationConfig::default();
        if !(0.0..=1.0).contains(&c.neutral_score) {
            c.neutral_score = dc.neutral_score;
        }
        if !(0.0..=1.0).contains(&c.verified_threshold) {
            c.verified_threshold = dc.verified_threshold;
        }
        if c.max_keywords == 0 {
            c.max_keywords = dc.max_keywords;
        }
        if c.results_per_keyword == 0 {
            c.results_per_keyword = dc.results_per_keyword;
        }
        let x = &mut self.cross_validation;
        let dx = CrossValidationConfig::default();
        if x.max_points == 0 {
            x.max_points = dx.max_points;
        }
        if x.results_per_point == 0 {
            x.results_per_point = dx.results_per_point;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DimensionName;
    use std::env;

    #[test]
    fn empty_toml_is_all_defaults() {
        let cfg = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.scorer_timeout_secs, 240);
        assert_eq!(cfg.citation, CitationConfig::default());
        assert_eq!(cfg.cross_validation.max_points, 5);
        let t = cfg.weight_table();
        assert!((t.weight(DimensionName::DeepseekAnalysis) - 0.30).abs() < 1e-9);
    }

    #[test]
    fn partial_sections_and_sanitizing() {
        let cfg = AnalysisConfig::from_toml_str(
            r#"
            scorer_timeout_secs = 0
            [weights]
            cross_validation = 0.0
            [citation]
            min_length = 20
            neutral_score = 3.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.scorer_timeout_secs, 240);
        assert_eq!(cfg.citation.min_length, 20);
        assert_eq!(cfg.citation.neutral_score, 0.5);
        assert_eq!(cfg.weight_table().weight(DimensionName::CrossValidation), 0.0);
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(AnalysisConfig::from_toml_str("scorer_timeout_secs = \"soon\"").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        let cfg = AnalysisConfig::load_default().unwrap();
        assert_eq!(cfg.deadline_secs, 600);

        let p = tmp.path().join("custom.toml");
        fs::write(&p, "deadline_secs = 30").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        assert_eq!(AnalysisConfig::load_default().unwrap().deadline_secs, 30);

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(AnalysisConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
