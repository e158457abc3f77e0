//! `deepseek_analysis`: the completion service's overall judgment.

use super::{DimensionScorer, Evidence, ScoreContext, ScorerReport};
use crate::aggregate::{DimensionName, DimensionScore};
use async_trait::async_trait;
use serde_json::json;

pub struct HolisticScorer;

#[async_trait]
impl DimensionScorer for HolisticScorer {
    fn dimension(&self) -> DimensionName {
        DimensionName::DeepseekAnalysis
    }

    async fn score(&self, ctx: &ScoreContext) -> ScorerReport {
        let dim = self.dimension();
        let outcome = match ctx.holistic().await {
            Ok(o) => o,
            Err(e) => return ScorerReport::absent(dim, e.to_string()),
        };
        let rec = &outcome.record;
        if !rec.overall_found() {
            return ScorerReport::absent(dim, "completion reply had no overall score")
                .with_warnings(outcome.degraded_warning(dim.as_str()));
        }

        let details = rec
            .category_scores
            .iter()
            .filter(|(k, _)| rec.category_found(k))
            .map(|(k, v)| format!("{k}: {v:.2}"))
            .collect();
        let evidence = Evidence {
            summary: rec.narrative.clone(),
            details,
            data: json!({
                "category_scores": rec.category_scores,
                "sub_scores": rec.sub_scores,
                "parse_strategy": outcome.strategy.as_str(),
                "defaulted": rec.defaulted,
            }),
        };

        ScorerReport::present(dim, DimensionScore::measured(rec.overall), evidence)
            .with_warnings(outcome.degraded_warning(dim.as_str()))
            .with_issues(rec.caveats.iter().cloned())
    }
}
