// tests/persist_report.rs
use news_credibility::config::AnalysisConfig;
use news_credibility::gateway::{
    CompletionGateway, RetryPolicy, ScriptedCompletion, ScriptedSearch, SearchGateway,
};
use news_credibility::persist::{content_hash, save};
use news_credibility::render::{render_text, Lang};
use news_credibility::{CredibilityAnalyzer, CredibilityReport, ServiceHealth};
use std::sync::Arc;
use std::time::Duration;

const ARTICLE: &str = "据新华社报道，今年一季度全国粮食产量同比增长百分之三点五。\
    专家表示：「这一增长主要得益于良好的天气条件」。";

async fn canned_report() -> CredibilityReport {
    let health = Arc::new(ServiceHealth::new(true, true));
    let policy = RetryPolicy::new(2, Duration::from_millis(100));
    CredibilityAnalyzer::new(
        Arc::new(CompletionGateway::new(
            Arc::new(ScriptedCompletion::canned()),
            health.clone(),
            policy.clone(),
        )),
        Arc::new(SearchGateway::new(
            Arc::new(ScriptedSearch::empty()),
            health,
            policy,
        )),
        AnalysisConfig::default(),
    )
    .analyze(ARTICLE, None)
    .await
    .unwrap()
}

#[tokio::test]
async fn saves_text_and_report_side_by_side() {
    let report = canned_report().await;
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("saved");

    let files = save(&out, ARTICLE, &report).unwrap();

    let key = format!(
        "{}_{}",
        report.analyzed_at.format("%Y%m%d_%H%M%S"),
        content_hash(ARTICLE)
    );
    assert_eq!(files.text, out.join(format!("{key}_news.txt")));
    assert_eq!(files.report, out.join(format!("{key}_analysis.json")));
    assert_eq!(std::fs::read_to_string(&files.text).unwrap(), ARTICLE);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files.report).unwrap()).unwrap();
    assert!((json["overall_score"].as_f64().unwrap() - report.overall_score).abs() < 1e-12);
    assert_eq!(json["dimension_scores"].as_object().unwrap().len(), 5);
    assert!(json["missing_dimensions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|d| d == "cross_validation"));
}

#[tokio::test]
async fn both_languages_render_every_dimension() {
    let report = canned_report().await;
    let en = render_text(&report, Lang::En);
    let zh = render_text(&report, Lang::Zh);
    assert!(en.contains("absent"));
    assert!(zh.contains("缺失"));
    assert_ne!(en, zh);
}
