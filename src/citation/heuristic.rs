//! Local citation judgment used when the completion service is unavailable.
//!
//! Deterministic: specificity (numbers, dates), source explicitness and
//! trust, minus a penalty for hedging or absolute wording.

use super::UNSPECIFIED_SOURCE;
use crate::sources::SourceTrust;
use once_cell::sync::Lazy;
use regex::Regex;

const BASE: f64 = 0.5;
const SPECIFICITY_BONUS: f64 = 0.1;
const EXPLICIT_SOURCE_BONUS: f64 = 0.15;
const REPUTABLE_SOURCE_BONUS: f64 = 0.1;
const HEDGE_PENALTY: f64 = 0.05;
const HEDGE_PENALTY_CAP: f64 = 0.2;

static SPECIFIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\d|\b(?:january|february|march|april|may|june|july|august|september|october|november|december|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b|[年月日]|星期|周[一二三四五六日]",
    )
    .expect("valid specificity regex")
});

static HEDGES: &[&str] = &[
    "可能", "也许", "大概", "或许", "据说", "传闻", "似乎", "一定", "绝对", "肯定", "永远", "所有",
    "maybe", "perhaps", "possibly", "might", "allegedly", "reportedly", "rumored", "seems",
    "always", "never", "everyone", "definitely", "absolutely",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalJudgment {
    pub truthfulness: f64,
    pub authority: f64,
}

pub fn judge(content: &str, source: &str, trust: &SourceTrust) -> LocalJudgment {
    let mut score = BASE;

    if SPECIFIC.is_match(content) {
        score += SPECIFICITY_BONUS;
    }

    let explicit = !source.is_empty() && source != UNSPECIFIED_SOURCE;
    let reputable = explicit && trust.is_reputable(source);
    if explicit {
        score += EXPLICIT_SOURCE_BONUS;
    }
    if reputable {
        score += REPUTABLE_SOURCE_BONUS;
    }

    score -= (hedge_count(content) as f64 * HEDGE_PENALTY).min(HEDGE_PENALTY_CAP);

    let authority = if reputable {
        0.8
    } else if explicit {
        0.6
    } else {
        0.3
    };

    LocalJudgment {
        truthfulness: score.clamp(0.0, 1.0),
        authority,
    }
}

fn hedge_count(content: &str) -> usize {
    let lower = content.to_lowercase();
    HEDGES
        .iter()
        .filter(|w| {
            if w.is_ascii() {
                lower
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|token| token == **w)
            } else {
                lower.contains(**w)
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trust() -> SourceTrust {
        SourceTrust::default_seed()
    }

    #[test]
    fn specific_reputable_claim_scores_high() {
        let j = judge("GDP grew 3% last year", "the ministry", &trust());
        assert!((j.truthfulness - 0.85).abs() < 1e-9, "{j:?}");
        assert_eq!(j.authority, 0.8);
    }

    #[test]
    fn vague_unsourced_claim_is_penalized() {
        let j = judge("this might possibly be the end", UNSPECIFIED_SOURCE, &trust());
        assert!((j.truthfulness - 0.4).abs() < 1e-9, "{j:?}");
        assert_eq!(j.authority, 0.3);
    }

    #[test]
    fn hedge_penalty_is_capped() {
        let j = judge("可能 也许 大概 或许 据说 传闻", UNSPECIFIED_SOURCE, &trust());
        assert!((j.truthfulness - 0.3).abs() < 1e-9);
    }

    #[test]
    fn explicit_but_unknown_source() {
        let j = judge("prices rose sharply", "a local shop owner", &trust());
        assert!((j.truthfulness - 0.65).abs() < 1e-9);
        assert_eq!(j.authority, 0.6);
    }
}
