//! `cross_validation`: check the article's key factual claims against search.
//!
//! The completion service picks the verification points and judges each one
//! against its search snippets. A point with no search results scores 0.4;
//! a point whose search failed is left out of the mean. A failed judgment
//! falls back to keyword overlap and marks the dimension substituted.

use super::{DimensionScorer, Evidence, ScoreContext, ScorerReport};
use crate::aggregate::{DimensionName, DimensionScore};
use crate::parse::{self, EVIDENCE_JUDGMENT};
use crate::prompts;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;

const UNVERIFIABLE_SCORE: f64 = 0.4;
const NO_SNIPPET_FALLBACK: f64 = 0.3;
const LOW_SUPPORT: f64 = 0.4;
const FALLBACK_QUERY_WORDS: usize = 5;

static WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+").expect("valid word regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    High,
    Medium,
    Low,
}

impl Importance {
    /// `高/中/低` or `high/medium/low`; anything else is medium.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "高" | "high" => Importance::High,
            "低" | "low" => Importance::Low,
            _ => Importance::Medium,
        }
    }

    pub fn weight(self) -> f64 {
        match self {
            Importance::High => 1.5,
            Importance::Medium => 1.0,
            Importance::Low => 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationPoint {
    pub content: String,
    pub importance: Importance,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointResult {
    pub point: VerificationPoint,
    pub score: f64,
    pub conclusion: String,
    pub snippets: usize,
    pub substituted: bool,
}

pub struct CrossValidationScorer;

#[async_trait]
impl DimensionScorer for CrossValidationScorer {
    fn dimension(&self) -> DimensionName {
        DimensionName::CrossValidation
    }

    async fn score(&self, ctx: &ScoreContext) -> ScorerReport {
        let dim = self.dimension();
        let cfg = &ctx.config.cross_validation;

        if let Err(e) = ctx.search.begin_batch().await {
            return ScorerReport::absent(dim, e.to_string());
        }

        let raw = match ctx
            .completion
            .complete(&prompts::verification_points(&ctx.text, cfg.max_points))
            .await
        {
            Ok(raw) => raw,
            Err(e) => return ScorerReport::absent(dim, e.to_string()),
        };
        let points: Vec<VerificationPoint> = points_from_reply(&raw)
            .into_iter()
            .take(cfg.max_points)
            .collect();
        if points.is_empty() {
            return ScorerReport::absent(dim, "no verification points extracted");
        }

        let mut warnings = Vec::new();
        let mut results = Vec::with_capacity(points.len());
        let mut search_failed = 0usize;
        for point in points {
            let hits = match ctx.search.search(&point.query, cfg.results_per_point).await {
                Ok(hits) => hits,
                Err(e) => {
                    // Not scored: a failed search is not evidence of anything.
                    search_failed += 1;
                    let w = format!("{dim}: {e}");
                    if !warnings.contains(&w) {
                        warnings.push(w);
                    }
                    continue;
                }
            };
            if hits.is_empty() {
                results.push(PointResult {
                    point,
                    score: UNVERIFIABLE_SCORE,
                    conclusion: "no search results; claim could not be checked".to_string(),
                    snippets: 0,
                    substituted: false,
                });
                continue;
            }

            let snippets: Vec<String> = hits
                .iter()
                .map(|h| format!("{}: {}", h.title, h.snippet))
                .collect();
            results.push(judge_point(ctx, point, &snippets, &mut warnings).await);
        }

        if results.is_empty() {
            return ScorerReport::absent(
                dim,
                format!("search failed for all {search_failed} verification point(s)"),
            )
            .with_warnings(warnings);
        }
        if search_failed > 0 {
            warnings.push(format!(
                "{dim}: {search_failed} point(s) left out after search failures"
            ));
        }

        let total_weight: f64 = results.iter().map(|r| r.point.importance.weight()).sum();
        let value = results
            .iter()
            .map(|r| r.score * r.point.importance.weight())
            .sum::<f64>()
            / total_weight;
        let substituted = results.iter().filter(|r| r.substituted).count();

        let issues: Vec<String> = results
            .iter()
            .filter(|r| r.snippets > 0 && r.score < LOW_SUPPORT)
            .map(|r| format!("claim not supported by search results: {}", r.point.content))
            .collect();

        let evidence = Evidence {
            summary: format!("{} verification point(s) checked", results.len()),
            details: results
                .iter()
                .map(|r| format!("[{:.2}] {}: {}", r.score, r.point.content, r.conclusion))
                .collect(),
            data: json!({ "points": results }),
        };
        let score = if substituted > 0 {
            warnings.push(format!(
                "{dim}: {substituted} point(s) judged by keyword overlap instead of the completion service"
            ));
            DimensionScore::substituted(value)
        } else {
            DimensionScore::measured(value)
        };

        ScorerReport::present(dim, score, evidence)
            .with_warnings(warnings)
            .with_issues(issues)
    }
}

async fn judge_point(
    ctx: &ScoreContext,
    point: VerificationPoint,
    snippets: &[String],
    warnings: &mut Vec<String>,
) -> PointResult {
    let dim = DimensionName::CrossValidation;
    match ctx
        .completion
        .complete(&prompts::point_judgment(&point.content, snippets))
        .await
    {
        Ok(raw) => {
            let outcome = parse::parse(&raw, &EVIDENCE_JUDGMENT);
            if let Some(w) = outcome.degraded_warning(dim.as_str()) {
                if !warnings.contains(&w) {
                    warnings.push(w);
                }
            }
            if outcome.record.overall_found() {
                return PointResult {
                    point,
                    score: outcome.record.overall,
                    conclusion: outcome.record.narrative.clone(),
                    snippets: snippets.len(),
                    substituted: false,
                };
            }
        }
        Err(e) => {
            tracing::warn!(target: "scorer", dimension = dim.as_str(), error = %e, "point judgment failed");
        }
    }
    PointResult {
        score: overlap_score(&point.content, snippets),
        point,
        conclusion: "judged by keyword overlap with search results".to_string(),
        snippets: snippets.len(),
        substituted: true,
    }
}

/// Mean fraction of the claim's words found per snippet, floored at 0.4.
pub fn overlap_score(claim: &str, snippets: &[String]) -> f64 {
    if snippets.is_empty() {
        return NO_SNIPPET_FALLBACK;
    }
    let claim_words = words(claim);
    if claim_words.is_empty() {
        return UNVERIFIABLE_SCORE;
    }
    let total: f64 = snippets
        .iter()
        .map(|s| {
            let sw = words(s);
            claim_words.intersection(&sw).count() as f64 / claim_words.len() as f64
        })
        .sum();
    (total / snippets.len() as f64).clamp(UNVERIFIABLE_SCORE, 1.0)
}

fn words(s: &str) -> HashSet<String> {
    WORDS
        .find_iter(&s.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `{"验证点": [...]}`, `{"verification_points": [...]}` or a bare list.
fn points_from_reply(raw: &str) -> Vec<VerificationPoint> {
    let Some((value, _)) = parse::parse_value(raw) else {
        return Vec::new();
    };
    let items = match &value {
        Value::Array(items) => items.clone(),
        Value::Object(obj) => ["验证点", "verification_points", "points"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };
    items.iter().filter_map(point_from_value).collect()
}

fn point_from_value(v: &Value) -> Option<VerificationPoint> {
    let field = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| v.get(*k))
            .map(parse::as_text)
            .filter(|s| !s.is_empty())
    };
    let content = match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        _ => field(&["内容", "content"]),
    }?;
    let importance = field(&["重要性", "importance"])
        .map(|s| Importance::parse(&s))
        .unwrap_or(Importance::Medium);
    let query = field(&["搜索关键词", "query", "keywords"]).unwrap_or_else(|| {
        content
            .split_whitespace()
            .take(FALLBACK_QUERY_WORDS)
            .collect::<Vec<_>>()
            .join(" ")
    });
    Some(VerificationPoint {
        content,
        importance,
        query,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Provenance;
    use crate::gateway::{AttemptFailure, ScriptedCompletion, ScriptedSearch, SearchResult};
    use crate::health::ServiceHealth;
    use crate::score::testing::context;

    const POINTS: &str = r#"{"验证点": [
        {"内容": "Factory output rose 5% in May", "重要性": "高", "搜索关键词": "factory output May"},
        {"内容": "The mayor resigned", "重要性": "低", "搜索关键词": "mayor resigned"}
    ]}"#;

    fn search() -> ScriptedSearch {
        ScriptedSearch::with_responder(|q| {
            if q.contains("factory") {
                Ok(vec![SearchResult::new("Stats", "u", "factory output rose 5% in May")])
            } else {
                Ok(Vec::new())
            }
        })
    }

    #[tokio::test]
    async fn weighted_mean_over_points() {
        let completion = ScriptedCompletion::with_responder(|p| {
            if p.contains("验证点") {
                Ok(POINTS.into())
            } else {
                Ok(r#"{"评分": 0.9, "结论": "confirmed"}"#.into())
            }
        });
        let ctx = context("text", completion, search(), ServiceHealth::new(true, true));
        let r = CrossValidationScorer.score(&ctx).await;
        let s = r.score.unwrap();
        // (0.9 * 1.5 + 0.4 * 0.5) / 2.0
        assert!((s.value - 0.775).abs() < 1e-9);
        assert_eq!(s.provenance, Provenance::Measured);
        assert_eq!(r.evidence.details.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_judgment_falls_back_to_overlap() {
        let completion = ScriptedCompletion::new()
            .push(Ok(POINTS.into()))
            .push(Err(AttemptFailure::Status(502)))
            .push(Err(AttemptFailure::Status(502)))
            .push(Err(AttemptFailure::Status(502)))
            .push(Err(AttemptFailure::Status(502)));
        let ctx = context("text", completion, search(), ServiceHealth::new(true, true));
        let r = CrossValidationScorer.score(&ctx).await;
        let s = r.score.unwrap();
        assert_eq!(s.provenance, Provenance::Substituted);
        // overlap 1.0 for the factory point, 0.4 for the unverifiable one
        assert!((s.value - (1.0 * 1.5 + 0.4 * 0.5) / 2.0).abs() < 1e-9);
        assert!(r.warnings.iter().any(|w| w.contains("keyword overlap")));
    }

    #[tokio::test]
    async fn search_down_is_absent() {
        let ctx = context(
            "text",
            ScriptedCompletion::always(POINTS),
            ScriptedSearch::unreachable(),
            ServiceHealth::new(true, true),
        );
        let r = CrossValidationScorer.score(&ctx).await;
        assert!(r.is_absent());
        assert_eq!(r.warnings, vec!["cross_validation: search service unavailable"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_searches_are_not_scored() {
        let completion = ScriptedCompletion::always(POINTS);
        let ctx = context(
            "text",
            completion,
            ScriptedSearch::failing(AttemptFailure::Status(502)),
            ServiceHealth::new(true, true),
        );
        let r = CrossValidationScorer.score(&ctx).await;
        assert!(r.is_absent());
        assert!(r.score.is_none());
        assert!(r
            .warnings
            .iter()
            .any(|w| w.contains("search failed for all 2 verification point(s)")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_search_point_is_left_out_of_mean() {
        let completion = ScriptedCompletion::with_responder(|p| {
            if p.contains("验证点") {
                Ok(POINTS.into())
            } else {
                Ok(r#"{"评分": 0.9, "结论": "confirmed"}"#.into())
            }
        });
        let search = ScriptedSearch::with_responder(|q| {
            if q.contains("factory") {
                Ok(vec![SearchResult::new("Stats", "u", "factory output rose 5% in May")])
            } else {
                Err(AttemptFailure::Status(502))
            }
        });
        let ctx = context("text", completion, search, ServiceHealth::new(true, true));
        let r = CrossValidationScorer.score(&ctx).await;
        let s = r.score.unwrap();
        assert!((s.value - 0.9).abs() < 1e-9);
        assert_eq!(s.provenance, Provenance::Measured);
        assert_eq!(r.evidence.details.len(), 1);
        assert!(r.warnings.iter().any(|w| w.contains("1 point(s) left out")));
    }

    #[tokio::test]
    async fn no_points_is_absent() {
        let ctx = context(
            "text",
            ScriptedCompletion::always(r#"{"验证点": []}"#),
            ScriptedSearch::empty(),
            ServiceHealth::new(true, true),
        );
        assert!(CrossValidationScorer.score(&ctx).await.is_absent());
    }

    #[test]
    fn point_shapes() {
        let pts = points_from_reply(r#"[{"内容": "a b c d e f g"}, "plain claim", {"x": 1}]"#);
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[0].query, "a b c d e");
        assert_eq!(pts[0].importance, Importance::Medium);
        assert_eq!(pts[1].content, "plain claim");
    }

    #[test]
    fn overlap_bounds() {
        assert_eq!(overlap_score("x", &[]), NO_SNIPPET_FALLBACK);
        assert_eq!(overlap_score("alpha beta", &["gamma".into()]), UNVERIFIABLE_SCORE);
        assert_eq!(overlap_score("alpha beta", &["Alpha, beta!".into()]), 1.0);
    }
}
