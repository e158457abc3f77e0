//! `ai_content` and `language_neutrality`: sections of the holistic reply.

use super::{DimensionScorer, Evidence, ScoreContext, ScorerReport};
use crate::aggregate::{DimensionName, DimensionScore};
use crate::parse::{AI_CONTENT_SECTION, NEUTRALITY_SECTION};
use async_trait::async_trait;
use serde_json::json;

/// Higher means more human-written.
pub struct AiContentScorer;

/// Higher means more neutral language.
pub struct NeutralityScorer;

#[async_trait]
impl DimensionScorer for AiContentScorer {
    fn dimension(&self) -> DimensionName {
        DimensionName::AiContent
    }

    async fn score(&self, ctx: &ScoreContext) -> ScorerReport {
        section_report(ctx, self.dimension(), AI_CONTENT_SECTION).await
    }
}

#[async_trait]
impl DimensionScorer for NeutralityScorer {
    fn dimension(&self) -> DimensionName {
        DimensionName::LanguageNeutrality
    }

    async fn score(&self, ctx: &ScoreContext) -> ScorerReport {
        section_report(ctx, self.dimension(), NEUTRALITY_SECTION).await
    }
}

/// Mean of the section fields the reply actually contained.
async fn section_report(ctx: &ScoreContext, dim: DimensionName, section: &str) -> ScorerReport {
    let outcome = match ctx.holistic().await {
        Ok(o) => o,
        Err(e) => return ScorerReport::absent(dim, e.to_string()),
    };
    let rec = &outcome.record;
    let Some(body) = rec.sections.get(section) else {
        return ScorerReport::absent(dim, format!("completion reply had no '{section}' section"));
    };

    let found: Vec<(&String, f64)> = body
        .scores
        .iter()
        .filter(|(k, _)| !rec.defaulted.contains(&format!("{section}.{k}")))
        .map(|(k, v)| (k, *v))
        .collect();
    if found.is_empty() {
        return ScorerReport::absent(dim, format!("completion reply had no '{section}' scores"))
            .with_warnings(outcome.degraded_warning(dim.as_str()));
    }

    let mean = found.iter().map(|(_, v)| v).sum::<f64>() / found.len() as f64;
    let missing = body.scores.len() - found.len();

    let evidence = Evidence {
        summary: body.analysis.clone(),
        details: found.iter().map(|(k, v)| format!("{k}: {v:.2}")).collect(),
        data: json!({
            "section": section,
            "scores": body.scores,
            "fields_found": found.len(),
        }),
    };

    let mut report = ScorerReport::present(dim, DimensionScore::measured(mean), evidence)
        .with_warnings(outcome.degraded_warning(dim.as_str()));
    if missing > 0 {
        report = report.with_warning(format!(
            "{dim}: {missing} of {} '{section}' fields missing from the reply; mean of the rest used",
            body.scores.len()
        ));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{ScriptedCompletion, ScriptedSearch};
    use crate::health::ServiceHealth;
    use crate::score::testing::context;

    const FULL: &str = r#"{
        "总体评分": 0.7,
        "AI生成内容": {"表达模式": 0.6, "词汇多样性": 0.8, "句子变化": 0.7, "上下文连贯性": 0.9, "人类特征": 0.5, "分析": "human"},
        "语言中立性": {"情感词汇": 0.4, "情感平衡": 0.6}
    }"#;

    fn ctx(reply: &str) -> ScoreContext {
        context(
            "text",
            ScriptedCompletion::always(reply),
            ScriptedSearch::empty(),
            ServiceHealth::new(true, true),
        )
    }

    #[tokio::test]
    async fn full_section_mean() {
        let r = AiContentScorer.score(&ctx(FULL)).await;
        assert!((r.score.unwrap().value - 0.7).abs() < 1e-9);
        assert_eq!(r.evidence.summary, "human");
        assert!(r.warnings.is_empty());
    }

    #[tokio::test]
    async fn partial_section_warns() {
        let r = NeutralityScorer.score(&ctx(FULL)).await;
        assert!((r.score.unwrap().value - 0.5).abs() < 1e-9);
        assert!(r.warnings[0].contains("3 of 5"));
    }

    #[tokio::test]
    async fn missing_section_is_absent() {
        let r = NeutralityScorer.score(&ctx(r#"{"总体评分": 0.7}"#)).await;
        assert!(r.is_absent());
    }
}
