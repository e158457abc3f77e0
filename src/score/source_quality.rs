//! `source_citation_quality`: local sourcing signals combined with the
//! citation pipeline's verdicts.

use super::{DimensionScorer, Evidence, ScoreContext, ScorerReport};
use crate::aggregate::{DimensionName, DimensionScore};
use crate::citation::{CitationPipeline, VerificationStatus};
use crate::sources::{SourceTrust, REPUTABLE_THRESHOLD};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

const SOURCE_WEIGHT: f64 = 0.4;
const CITATION_WEIGHT: f64 = 0.6;

static SOURCE_INDICATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"据[^，。,]{1,20}?报道",
        r"来自[^，。,]{1,20}?的消息",
        r"根据[^，。,]{1,20}?的数据",
        r"援引[^，。,]{1,20}?的说法",
        r"报道称|消息称|知情人士透露|表示|指出",
        r"(?i)\baccording to\b",
        r"(?i)\b(?:reported|cited|quoted) by\b",
        r"(?i)\b(?:sources|officials|experts|spokesperson|spokesman|spokeswoman) (?:said|told|say)\b",
        r"(?i)\bresearchers found\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid indicator regex"))
    .collect()
});

static QUOTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""[^"\n]{6,}"|“[^”\n]{6,}”|「[^」]{6,}」|『[^』]{6,}』"#).expect("valid quote regex")
});

static DATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(?:\.\d+)?\s*(?:%|％|percent|万|亿|千|百|million|billion)|\d{4}\s*年|\d{1,2}\s*月\s*\d{1,2}\s*日|\d+(?:\.\d+)?")
        .expect("valid data regex")
});

/// Text-only sourcing score with the reasons behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSignals {
    pub score: f64,
    pub indicators: usize,
    pub quotes: usize,
    pub data_points: usize,
    pub trusted_host: Option<String>,
    pub details: Vec<String>,
}

pub fn source_signals(text: &str, url: Option<&str>, trust: &SourceTrust) -> SourceSignals {
    let mut score: f64 = 0.5;
    let mut details = Vec::new();

    let indicators: usize = SOURCE_INDICATORS
        .iter()
        .map(|re| re.find_iter(text).count())
        .sum();
    match indicators {
        0 => {
            score -= 0.1;
            details.push("no explicit source indicators".to_string());
        }
        1..=2 => {
            score += 0.1;
            details.push(format!("{indicators} source indicator(s)"));
        }
        _ => {
            score += 0.2;
            details.push(format!("{indicators} source indicators"));
        }
    }

    let quotes = QUOTES.find_iter(text).count();
    if quotes >= 3 {
        score += 0.2;
    } else if quotes > 0 {
        score += 0.1;
    }
    if quotes > 0 {
        details.push(format!("{quotes} direct quote(s)"));
    }

    let data_points = DATA.find_iter(text).count();
    if data_points >= 5 {
        score += 0.1;
    } else if data_points > 0 {
        score += 0.05;
    }
    if data_points > 0 {
        details.push(format!("{data_points} data point(s)"));
    }

    let trusted_host = url
        .and_then(|u| trust.domain_weight(u))
        .filter(|(_, w)| *w >= REPUTABLE_THRESHOLD)
        .map(|(host, _)| host);
    if let Some(host) = &trusted_host {
        score += 0.1;
        details.push(format!("published on trusted domain {host}"));
    }

    SourceSignals {
        score: score.clamp(0.0, 1.0),
        indicators,
        quotes,
        data_points,
        trusted_host,
        details,
    }
}

pub struct SourceCitationScorer;

#[async_trait]
impl DimensionScorer for SourceCitationScorer {
    fn dimension(&self) -> DimensionName {
        DimensionName::SourceCitationQuality
    }

    async fn score(&self, ctx: &ScoreContext) -> ScorerReport {
        let dim = self.dimension();
        let local = source_signals(&ctx.text, ctx.url.as_deref(), &ctx.trust);

        let citations = CitationPipeline::new(
            &ctx.completion,
            &ctx.search,
            &ctx.trust,
            &ctx.config.citation,
        )
        .run(&ctx.text)
        .await;

        let (value, substituted) = if citations.judged_total() > 0 {
            (
                SOURCE_WEIGHT * local.score + CITATION_WEIGHT * citations.score,
                citations.heuristic_judged > 0,
            )
        } else {
            (local.score, false)
        };
        let score = if substituted {
            DimensionScore::substituted(value)
        } else {
            DimensionScore::measured(value)
        };

        let failed = citations.count(VerificationStatus::Failed);
        let mut issues = Vec::new();
        if local.indicators == 0 && citations.citations.is_empty() {
            issues.push("no sources or citations found in the text".to_string());
        }
        if failed > 0 {
            issues.push(format!("{failed} citation(s) not supported by search evidence"));
        }

        let evidence = Evidence {
            summary: format!(
                "source signals {:.2}, citation score {:.2} ({} of {} citation(s) judged)",
                local.score,
                citations.score,
                citations.judged_total(),
                citations.citations.len()
            ),
            details: local.details.clone(),
            data: json!({
                "source_score": local.score,
                "citation_score": citations.score,
                "citations_total": citations.citations.len(),
                "verified": citations.count(VerificationStatus::Verified),
                "failed": failed,
                "unverified": citations.count(VerificationStatus::Unverified),
                "skipped": citations.count(VerificationStatus::Skipped),
                "trusted_host": local.trusted_host,
            }),
        };

        let mut report = ScorerReport::present(dim, score, evidence)
            .with_warnings(citations.warnings.iter().cloned())
            .with_issues(issues);
        if substituted {
            report = report.with_warning(format!(
                "{dim}: {} citation(s) judged by local heuristic instead of the completion service",
                citations.heuristic_judged
            ));
        }
        report.citations = citations.citations;
        report
    }
}
