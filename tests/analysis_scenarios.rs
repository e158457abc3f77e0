// tests/analysis_scenarios.rs
// End-to-end runs through CredibilityAnalyzer with scripted backends.

use news_credibility::citation::{CitationStage, VerificationStatus};
use news_credibility::config::AnalysisConfig;
use news_credibility::gateway::{
    AttemptFailure, CompletionGateway, RetryPolicy, ScriptedCompletion, ScriptedSearch,
    SearchGateway, SearchResult,
};
use news_credibility::{CredibilityAnalyzer, DimensionName, Provenance, ServiceHealth};
use std::sync::Arc;
use std::time::Duration;

const HOLISTIC_REPLY: &str = r#"{"总体评分":0.82,"各大类评分":{"内容真实性":0.8,"信息准确性":0.85,"来源可靠性":0.8,"语言客观性":0.9,"逻辑连贯性":0.8,"引用质量":0.75},"细分点评分":{},"AI生成内容":{"表达模式":0.7,"词汇多样性":0.8,"句子变化":0.7,"上下文连贯性":0.8,"人类特征":0.7,"分析":"像人类撰写"},"语言中立性":{"情感词汇":0.9,"情感平衡":0.8,"极端表述":0.9,"煽动性表达":0.9,"主观评价":0.8,"分析":"中立"},"详细分析":"报道较为可信","可信度判断的疑点":[]}"#;

const ARTICLE: &str = "\"GDP grew 3% last year,\" said the ministry on Monday. \
    Officials reported that exports rose to 120 billion dollars in 2023.";

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(4, Duration::from_millis(200)).with_backoff_unit(Duration::from_millis(1))
}

fn analyzer(completion: ScriptedCompletion, search: ScriptedSearch) -> CredibilityAnalyzer {
    let health = Arc::new(ServiceHealth::new(true, true));
    CredibilityAnalyzer::new(
        Arc::new(CompletionGateway::new(
            Arc::new(completion),
            health.clone(),
            fast_policy(),
        )),
        Arc::new(SearchGateway::new(Arc::new(search), health, fast_policy())),
        AnalysisConfig::default(),
    )
}

/// Routes each prompt family to a reply; `holistic` answers the article-wide prompt.
fn routed(holistic: &'static str) -> ScriptedCompletion {
    ScriptedCompletion::with_responder(move |prompt| {
        let reply = if prompt.contains("总体评分") {
            holistic
        } else if prompt.contains("验证点") {
            r#"{"验证点":[{"内容":"GDP grew 3% last year","重要性":"高","搜索关键词":"GDP growth 3%"}]}"#
        } else if prompt.contains("\"keywords\"") {
            r#"{"keywords":["GDP growth 3%","ministry statistics"]}"#
        } else if prompt.contains("truthfulness") {
            r#"{"truthfulness":0.9,"authority":0.8,"rationale":"matches official data"}"#
        } else {
            r#"{"评分":0.8,"结论":"属实"}"#
        };
        Ok(reply.to_string())
    })
}

fn hits() -> Vec<SearchResult> {
    vec![SearchResult::new(
        "Statistics office",
        "https://stats.example.org/gdp",
        "GDP grew 3% last year according to the statistics office",
    )]
}

#[tokio::test]
async fn well_formed_reply_yields_overall_dimension() {
    let report = analyzer(routed(HOLISTIC_REPLY), ScriptedSearch::always(hits()))
        .analyze(ARTICLE, None)
        .await
        .unwrap();

    let holistic = report.dimension_scores[&DimensionName::DeepseekAnalysis].unwrap();
    assert!((holistic - 0.82).abs() < 1e-9);
    assert!(report.missing_dimensions.is_empty());
    assert!(
        report.warnings.is_empty(),
        "unexpected warnings: {:?}",
        report.warnings
    );
    assert!((report.effective_weights.values().sum::<f64>() - 1.0).abs() < 1e-9);
    assert!(report
        .citations
        .iter()
        .any(|c| c.verification_status == VerificationStatus::Verified));
}

#[tokio::test]
async fn reply_wrapped_in_prose_still_recovers_overall() {
    let wrapped: &'static str = Box::leak(
        format!("好的，以下是分析结果：\n{HOLISTIC_REPLY}\n希望对您有帮助。").into_boxed_str(),
    );
    let report = analyzer(routed(wrapped), ScriptedSearch::always(hits()))
        .analyze(ARTICLE, None)
        .await
        .unwrap();

    let holistic = report.dimension_scores[&DimensionName::DeepseekAnalysis].unwrap();
    assert!((holistic - 0.82).abs() < 0.01);
    let strategy = &report.dimension_evidence[&DimensionName::DeepseekAnalysis].data["parse_strategy"];
    assert_eq!(strategy, "balanced-span");
}

#[tokio::test]
async fn completion_outage_redistributes_weight() {
    let completion = ScriptedCompletion::failing(AttemptFailure::Status(500));
    let report = analyzer(completion, ScriptedSearch::always(hits()))
        .analyze(ARTICLE, None)
        .await
        .unwrap();

    for d in [
        DimensionName::DeepseekAnalysis,
        DimensionName::AiContent,
        DimensionName::LanguageNeutrality,
        DimensionName::CrossValidation,
    ] {
        assert!(report.missing_dimensions.contains(&d), "{d} should be absent");
        assert_eq!(report.dimension_scores[&d], None);
    }

    // Only source_citation_quality is left; it carries the whole weight.
    let w = report.effective_weights[&DimensionName::SourceCitationQuality];
    assert!((w - 1.0).abs() < 1e-9);
    let source = report.dimension_scores[&DimensionName::SourceCitationQuality].unwrap();
    assert!((report.overall_score - source).abs() < 1e-9);

    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("completion service failed after 4 attempt(s)")));
    assert!(report.is_degraded());
}

#[tokio::test]
async fn citation_without_search_hits_stays_in_report() {
    let report = analyzer(routed(HOLISTIC_REPLY), ScriptedSearch::empty())
        .analyze("\"GDP grew 3% last year,\" said the ministry", None)
        .await
        .unwrap();

    assert_eq!(report.citations.len(), 1);
    let c = &report.citations[0];
    assert_eq!(c.content, "GDP grew 3% last year");
    assert_eq!(c.stage, CitationStage::NoEvidence);
    assert_eq!(c.verification_status, VerificationStatus::Unverified);
    assert_eq!(c.truthfulness_score, Some(0.5));
}

#[tokio::test]
async fn heuristic_substitution_is_reported() {
    // Completion is down from the start: citations fall back to the local judge.
    let health = Arc::new(ServiceHealth::new(false, true));
    let analyzer = CredibilityAnalyzer::new(
        Arc::new(CompletionGateway::new(
            Arc::new(ScriptedCompletion::canned()),
            health.clone(),
            fast_policy(),
        )),
        Arc::new(SearchGateway::new(
            Arc::new(ScriptedSearch::always(hits())),
            health,
            fast_policy(),
        )),
        AnalysisConfig::default(),
    );
    let report = analyzer.analyze(ARTICLE, None).await.unwrap();

    assert_eq!(
        report.dimension_provenance[&DimensionName::SourceCitationQuality],
        Provenance::Substituted
    );
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("local heuristic")));
    assert_eq!(
        report.missing_dimensions.len(),
        4,
        "{:?}",
        report.missing_dimensions
    );
}
