//! # Citation pipeline
//!
//! Extracts quoted and attributed claims from the article, then walks each
//! one through:
//!
//! ```text
//! extracted → keyword-derived → search-pending → evidence-found → verified | failed
//!                                              ↘ no-evidence    → unverified
//! extracted → skipped (too short)
//! ```
//!
//! Citations are never dropped: anything that cannot be checked stays in the
//! list as `unverified` with the neutral score.

pub mod extract;
pub mod heuristic;

pub use extract::extract_citations;

use crate::config::analysis::CitationConfig;
use crate::gateway::{CompletionGateway, SearchGateway};
use crate::parse::{self, CITATION_JUDGMENT};
use crate::prompts;
use crate::sources::SourceTrust;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const UNSPECIFIED_SOURCE: &str = "unspecified";

const KEYWORD_FALLBACK_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    DirectQuote,
    IndirectAttribution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Failed,
    Unverified,
    Skipped,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Failed => "failed",
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Skipped => "skipped",
        }
    }

    /// Whether the citation counts toward the aggregate citation score.
    pub fn is_judged(self) -> bool {
        matches!(self, VerificationStatus::Verified | VerificationStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStage {
    Extracted,
    KeywordDerived,
    SearchPending,
    EvidenceFound,
    NoEvidence,
    Verified,
    Failed,
    Skipped,
}

/// Who produced the truthfulness score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Judge {
    Completion,
    LocalHeuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub content: String,
    pub source: String,
    pub context: String,
    pub kind: CitationKind,
    /// Byte offsets of the claim in the article.
    pub position: (usize, usize),
    pub stage: CitationStage,
    pub verification_status: VerificationStatus,
    pub truthfulness_score: Option<f64>,
    pub authority_score: Option<f64>,
    pub keywords: Vec<String>,
    pub evidence_snippets: Vec<String>,
    pub judged_by: Option<Judge>,
    pub rationale: String,
}

impl Citation {
    pub fn extracted(
        content: String,
        source: String,
        context: String,
        kind: CitationKind,
        position: (usize, usize),
    ) -> Self {
        Self {
            content,
            source,
            context,
            kind,
            position,
            stage: CitationStage::Extracted,
            verification_status: VerificationStatus::Unverified,
            truthfulness_score: None,
            authority_score: None,
            keywords: Vec::new(),
            evidence_snippets: Vec::new(),
            judged_by: None,
            rationale: String::new(),
        }
    }

    fn settle_neutral(&mut self, stage: CitationStage, status: VerificationStatus, neutral: f64) {
        self.stage = stage;
        self.verification_status = status;
        self.truthfulness_score = Some(neutral);
    }

    fn settle_judged(&mut self, truthfulness: f64, authority: f64, judge: Judge, threshold: f64) {
        let verified = truthfulness >= threshold;
        self.truthfulness_score = Some(truthfulness);
        self.authority_score = Some(authority);
        self.judged_by = Some(judge);
        self.stage = if verified {
            CitationStage::Verified
        } else {
            CitationStage::Failed
        };
        self.verification_status = if verified {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Failed
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CitationReport {
    pub citations: Vec<Citation>,
    /// Mean truthfulness over verified/failed citations, or the neutral score.
    pub score: f64,
    /// Citations judged by the completion service.
    pub judged: usize,
    /// Citations judged by the local heuristic.
    pub heuristic_judged: usize,
    pub warnings: Vec<String>,
}

impl CitationReport {
    pub fn judged_total(&self) -> usize {
        self.judged + self.heuristic_judged
    }

    pub fn count(&self, status: VerificationStatus) -> usize {
        self.citations
            .iter()
            .filter(|c| c.verification_status == status)
            .count()
    }
}

pub struct CitationPipeline<'a> {
    completion: &'a CompletionGateway,
    search: &'a SearchGateway,
    trust: &'a SourceTrust,
    cfg: &'a CitationConfig,
}

impl<'a> CitationPipeline<'a> {
    pub fn new(
        completion: &'a CompletionGateway,
        search: &'a SearchGateway,
        trust: &'a SourceTrust,
        cfg: &'a CitationConfig,
    ) -> Self {
        Self {
            completion,
            search,
            trust,
            cfg,
        }
    }

    pub async fn run(&self, text: &str) -> CitationReport {
        let citations = extract_citations(text);
        tracing::info!(target: "citation", found = citations.len(), "citations extracted");
        self.verify_all(citations).await
    }

    /// Verify already-extracted citations in order.
    pub async fn verify_all(&self, mut citations: Vec<Citation>) -> CitationReport {
        let mut warnings = Warnings::default();
        // Search is re-probed once, right before the first citation needs it.
        let mut search_ready: Option<bool> = None;

        for c in citations.iter_mut() {
            if c.content.chars().count() < self.cfg.min_length {
                c.settle_neutral(
                    CitationStage::Skipped,
                    VerificationStatus::Skipped,
                    self.cfg.neutral_score,
                );
                continue;
            }

            c.keywords = self.keywords_for(c, &mut warnings).await;
            c.stage = CitationStage::KeywordDerived;

            let ready = match search_ready {
                Some(r) => r,
                None => {
                    let r = self.search.begin_batch().await.is_ok();
                    if !r {
                        warnings.push("search service unavailable: citations left unverified");
                    }
                    search_ready = Some(r);
                    r
                }
            };
            if !ready || !self.search.is_available() {
                c.settle_neutral(
                    CitationStage::SearchPending,
                    VerificationStatus::Unverified,
                    self.cfg.neutral_score,
                );
                continue;
            }

            c.stage = CitationStage::SearchPending;
            let mut search_failed = false;
            for kw in c.keywords.iter().take(self.cfg.max_keywords) {
                match self.search.search(kw, self.cfg.results_per_keyword).await {
                    Ok(results) => c.evidence_snippets.extend(
                        results
                            .into_iter()
                            .map(|r| format!("{}: {}", r.title, r.snippet)),
                    ),
                    Err(e) => {
                        warnings.push(format!("{e}: citation evidence incomplete"));
                        search_failed = true;
                        break;
                    }
                }
            }

            if c.evidence_snippets.is_empty() {
                if !search_failed {
                    tracing::debug!(target: "citation", content = %c.content, "no evidence found");
                }
                c.settle_neutral(
                    CitationStage::NoEvidence,
                    VerificationStatus::Unverified,
                    self.cfg.neutral_score,
                );
                continue;
            }
            c.stage = CitationStage::EvidenceFound;

            self.judge(c, &mut warnings).await;
        }

        let judged_scores: Vec<f64> = citations
            .iter()
            .filter(|c| c.verification_status.is_judged())
            .filter_map(|c| c.truthfulness_score)
            .collect();
        let score = if judged_scores.is_empty() {
            self.cfg.neutral_score
        } else {
            judged_scores.iter().sum::<f64>() / judged_scores.len() as f64
        };
        let judged = citations
            .iter()
            .filter(|c| c.judged_by == Some(Judge::Completion))
            .count();
        let heuristic_judged = citations
            .iter()
            .filter(|c| c.judged_by == Some(Judge::LocalHeuristic))
            .count();

        tracing::info!(
            target: "citation",
            total = citations.len(),
            judged,
            heuristic_judged,
            score,
            "citations verified"
        );

        CitationReport {
            citations,
            score,
            judged,
            heuristic_judged,
            warnings: warnings.into_inner(),
        }
    }

    async fn keywords_for(&self, c: &Citation, warnings: &mut Warnings) -> Vec<String> {
        if self.completion.is_available() {
            match self.completion.complete(&prompts::keywords(&c.content)).await {
                Ok(raw) => {
                    let kws = keywords_from_reply(&raw);
                    if !kws.is_empty() {
                        return kws.into_iter().take(self.cfg.max_keywords).collect();
                    }
                }
                Err(e) => warnings.push(format!("{e}: citation keywords taken from the quote text")),
            }
        }
        let head: String = c.content.chars().take(KEYWORD_FALLBACK_CHARS).collect();
        vec![format!("\"{head}\"")]
    }

    async fn judge(&self, c: &mut Citation, warnings: &mut Warnings) {
        if self.completion.is_available() {
            let prompt = prompts::citation_judgment(&c.content, &c.source, &c.evidence_snippets);
            match self.completion.complete(&prompt).await {
                Ok(raw) => {
                    let outcome = parse::parse(&raw, &CITATION_JUDGMENT);
                    if let Some(w) = outcome.degraded_warning("citation judgment") {
                        warnings.push(w);
                    }
                    if outcome.record.overall_found() {
                        let authority = outcome
                            .record
                            .category("authority")
                            .unwrap_or(parse::DEFAULT_SCORE);
                        c.rationale = outcome.record.narrative.clone();
                        c.settle_judged(
                            outcome.record.overall,
                            authority,
                            Judge::Completion,
                            self.cfg.verified_threshold,
                        );
                        return;
                    }
                    warnings.push("citation judgment reply had no truthfulness score: local heuristic used");
                }
                Err(e) => warnings.push(format!("{e}: citations judged by local heuristic")),
            }
        } else {
            warnings.push("completion service unavailable: citations judged by local heuristic");
        }

        let local = heuristic::judge(&c.content, &c.source, self.trust);
        c.rationale = "local heuristic".to_string();
        c.settle_judged(
            local.truthfulness,
            local.authority,
            Judge::LocalHeuristic,
            self.cfg.verified_threshold,
        );
    }
}

/// `{"keywords": [...]}`, `{"关键词": [...]}` or a bare list.
fn keywords_from_reply(raw: &str) -> Vec<String> {
    let Some((value, _)) = parse::parse_value(raw) else {
        return Vec::new();
    };
    let list = match &value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => ["keywords", "关键词", "search_keywords"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(Value::as_array),
        _ => None,
    };
    list.map(|items| {
        items
            .iter()
            .map(parse::as_text)
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Ordered, de-duplicated warning lines.
#[derive(Default)]
struct Warnings(Vec<String>);

impl Warnings {
    fn push(&mut self, w: impl Into<String>) {
        let w = w.into();
        if !self.0.contains(&w) {
            self.0.push(w);
        }
    }

    fn into_inner(self) -> Vec<String> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{
        AttemptFailure, RetryPolicy, ScriptedCompletion, ScriptedSearch, SearchResult,
    };
    use crate::health::ServiceHealth;
    use std::sync::Arc;
    use std::time::Duration;

    const MINISTRY: &str = r#""GDP grew 3% last year," said the ministry."#;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_millis(50)).with_backoff_unit(Duration::from_millis(1))
    }

    fn gateways(
        completion: ScriptedCompletion,
        search: ScriptedSearch,
        health: ServiceHealth,
    ) -> (CompletionGateway, SearchGateway) {
        let health = Arc::new(health);
        (
            CompletionGateway::new(Arc::new(completion), health.clone(), policy()),
            SearchGateway::new(Arc::new(search), health, policy()),
        )
    }

    fn responder(prompt: &str) -> Result<String, AttemptFailure> {
        if prompt.contains("\"keywords\"") {
            Ok(r#"{"keywords": ["GDP 3%", "ministry GDP"]}"#.into())
        } else {
            Ok(r#"{"truthfulness": 0.9, "authority": 0.8, "rationale": "matches statistics"}"#.into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_search_results_leave_citation_unverified() {
        let (c, s) = gateways(
            ScriptedCompletion::with_responder(responder),
            ScriptedSearch::empty(),
            ServiceHealth::new(true, true),
        );
        let trust = SourceTrust::default_seed();
        let cfg = CitationConfig::default();
        let report = CitationPipeline::new(&c, &s, &trust, &cfg).run(MINISTRY).await;

        assert_eq!(report.citations.len(), 1);
        let cit = &report.citations[0];
        assert_eq!(cit.stage, CitationStage::NoEvidence);
        assert_eq!(cit.verification_status, VerificationStatus::Unverified);
        assert_eq!(cit.truthfulness_score, Some(cfg.neutral_score));
        assert_eq!(cit.keywords, vec!["GDP 3%", "ministry GDP"]);
        assert_eq!(report.score, cfg.neutral_score);
        assert_eq!(report.judged_total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn evidence_and_completion_verify_citation() {
        let search = ScriptedSearch::always(vec![SearchResult::new(
            "Statistics bureau",
            "https://stats.gov.cn/x",
            "GDP rose 3.0 percent",
        )]);
        let (c, s) = gateways(
            ScriptedCompletion::with_responder(responder),
            search,
            ServiceHealth::new(true, true),
        );
        let trust = SourceTrust::default_seed();
        let cfg = CitationConfig::default();
        let report = CitationPipeline::new(&c, &s, &trust, &cfg).run(MINISTRY).await;

        let cit = &report.citations[0];
        assert_eq!(cit.verification_status, VerificationStatus::Verified);
        assert_eq!(cit.judged_by, Some(Judge::Completion));
        assert_eq!(cit.truthfulness_score, Some(0.9));
        assert_eq!(cit.authority_score, Some(0.8));
        assert_eq!(cit.evidence_snippets.len(), 2);
        assert!((report.score - 0.9).abs() < 1e-9);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_down_uses_heuristic_and_quoted_keyword() {
        let search = ScriptedSearch::always(vec![SearchResult::new("t", "u", "GDP data")]);
        let (c, s) = gateways(
            ScriptedCompletion::with_responder(responder),
            search,
            ServiceHealth::new(false, true),
        );
        let trust = SourceTrust::default_seed();
        let cfg = CitationConfig::default();
        let report = CitationPipeline::new(&c, &s, &trust, &cfg).run(MINISTRY).await;

        let cit = &report.citations[0];
        assert_eq!(cit.keywords, vec!["\"GDP grew 3% last year\""]);
        assert_eq!(cit.judged_by, Some(Judge::LocalHeuristic));
        assert_eq!(cit.verification_status, VerificationStatus::Verified);
        assert_eq!(report.heuristic_judged, 1);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("completion service unavailable")));
    }

    #[tokio::test(start_paused = true)]
    async fn search_down_keeps_every_citation() {
        let text = r#"“Factories reopened across the province on Monday,” officials said. 据新华社报道，今年一季度全国粮食产量同比增长百分之三点五。"#;
        let (c, s) = gateways(
            ScriptedCompletion::with_responder(responder),
            ScriptedSearch::unreachable(),
            ServiceHealth::new(true, true),
        );
        let trust = SourceTrust::default_seed();
        let cfg = CitationConfig::default();
        let report = CitationPipeline::new(&c, &s, &trust, &cfg).run(text).await;

        assert_eq!(report.citations.len(), 2);
        assert!(report
            .citations
            .iter()
            .all(|c| c.verification_status == VerificationStatus::Unverified));
        assert!(report.warnings[0].contains("search service unavailable"));
        assert!(!s.is_available());
    }

    #[tokio::test]
    async fn short_citations_are_skipped_with_neutral_score() {
        let (c, s) = gateways(
            ScriptedCompletion::with_responder(responder),
            ScriptedSearch::empty(),
            ServiceHealth::new(true, true),
        );
        let trust = SourceTrust::default_seed();
        let cfg = CitationConfig::default();
        let short = Citation::extracted(
            "too short".into(),
            UNSPECIFIED_SOURCE.into(),
            String::new(),
            CitationKind::DirectQuote,
            (0, 9),
        );
        let report = CitationPipeline::new(&c, &s, &trust, &cfg)
            .verify_all(vec![short])
            .await;
        assert_eq!(report.citations[0].stage, CitationStage::Skipped);
        assert_eq!(report.citations[0].truthfulness_score, Some(cfg.neutral_score));
        assert_eq!(report.count(VerificationStatus::Skipped), 1);
    }

    #[test]
    fn keyword_reply_shapes() {
        assert_eq!(keywords_from_reply(r#"["a", "b"]"#), vec!["a", "b"]);
        assert_eq!(keywords_from_reply("关键词如下 {关键词: ['GDP']}"), vec!["GDP"]);
        assert!(keywords_from_reply("no idea").is_empty());
    }
}
