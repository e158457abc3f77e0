//! Plain-text and JSON rendering of a `CredibilityReport`.

use crate::aggregate::{DimensionName, Provenance};
use crate::citation::VerificationStatus;
use crate::report::{CredibilityReport, Rating};
use std::fmt::Write as _;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    Zh,
}

impl FromStr for Lang {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Lang::En),
            "zh" | "cn" | "chinese" => Ok(Lang::Zh),
            other => Err(format!("unsupported language '{other}' (use en or zh)")),
        }
    }
}

struct Labels {
    title: &'static str,
    overall: &'static str,
    rating: &'static str,
    dimensions: &'static str,
    absent: &'static str,
    substituted: &'static str,
    weight: &'static str,
    citations: &'static str,
    warnings: &'static str,
    issues: &'static str,
    services: &'static str,
    up: &'static str,
    down: &'static str,
}

const EN: Labels = Labels {
    title: "News credibility report",
    overall: "Overall score",
    rating: "Rating",
    dimensions: "Dimensions",
    absent: "absent",
    substituted: "substituted",
    weight: "weight",
    citations: "Citations",
    warnings: "Warnings",
    issues: "Issues",
    services: "Services",
    up: "available",
    down: "unavailable",
};

const ZH: Labels = Labels {
    title: "新闻可信度分析报告",
    overall: "总体评分",
    rating: "可信度等级",
    dimensions: "各维度评分",
    absent: "缺失",
    substituted: "替代值",
    weight: "权重",
    citations: "引用",
    warnings: "警告",
    issues: "问题",
    services: "服务状态",
    up: "可用",
    down: "不可用",
};

fn rating_label(r: Rating, lang: Lang) -> &'static str {
    match (lang, r) {
        (Lang::En, r) => r.as_str(),
        (Lang::Zh, Rating::High) => "高",
        (Lang::Zh, Rating::Medium) => "中",
        (Lang::Zh, Rating::Low) => "低",
        (Lang::Zh, Rating::VeryLow) => "很低",
    }
}

fn dimension_label(d: DimensionName, lang: Lang) -> &'static str {
    match (lang, d) {
        (Lang::En, DimensionName::AiContent) => "AI-generated content",
        (Lang::En, DimensionName::LanguageNeutrality) => "Language neutrality",
        (Lang::En, DimensionName::SourceCitationQuality) => "Sources and citations",
        (Lang::En, DimensionName::DeepseekAnalysis) => "LLM holistic analysis",
        (Lang::En, DimensionName::CrossValidation) => "Search cross-validation",
        (Lang::Zh, DimensionName::AiContent) => "AI生成内容",
        (Lang::Zh, DimensionName::LanguageNeutrality) => "语言中立性",
        (Lang::Zh, DimensionName::SourceCitationQuality) => "来源与引用质量",
        (Lang::Zh, DimensionName::DeepseekAnalysis) => "DeepSeek综合分析",
        (Lang::Zh, DimensionName::CrossValidation) => "交叉验证",
    }
}

pub fn render_text(report: &CredibilityReport, lang: Lang) -> String {
    let l = match lang {
        Lang::En => &EN,
        Lang::Zh => &ZH,
    };
    let mut out = String::new();
    let _ = writeln!(out, "{}", l.title);
    let _ = writeln!(out, "{}", "=".repeat(40));
    let _ = writeln!(out, "{}: {:.2}", l.overall, report.overall_score);
    let _ = writeln!(out, "{}: {}", l.rating, rating_label(report.rating, lang));
    let _ = writeln!(out, "{}", report.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC"));

    let _ = writeln!(out, "\n{}:", l.dimensions);
    for d in DimensionName::ALL {
        let name = dimension_label(d, lang);
        match report.dimension_scores.get(&d).copied().flatten() {
            Some(v) => {
                let w = report.effective_weights.get(&d).copied().unwrap_or(0.0);
                let mark = match report.dimension_provenance.get(&d) {
                    Some(Provenance::Substituted) => format!(" ({})", l.substituted),
                    _ => String::new(),
                };
                let _ = writeln!(out, "  {name}: {v:.2}  [{} {:.0}%]{mark}", l.weight, w * 100.0);
            }
            None => {
                let _ = writeln!(out, "  {name}: {}", l.absent);
            }
        }
        if let Some(ev) = report.dimension_evidence.get(&d) {
            if !ev.summary.is_empty() {
                let _ = writeln!(out, "      {}", ev.summary);
            }
        }
    }

    if !report.citations.is_empty() {
        let _ = writeln!(out, "\n{} ({}):", l.citations, report.citations.len());
        for c in &report.citations {
            let score = c
                .truthfulness_score
                .map(|s| format!("{s:.2}"))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  [{}] {} ({}) {}",
                status_label(c.verification_status, lang),
                shorten(&c.content, 60),
                c.source,
                score
            );
        }
    }

    for (title, lines) in [(l.issues, &report.issues), (l.warnings, &report.warnings)] {
        if !lines.is_empty() {
            let _ = writeln!(out, "\n{title}:");
            for line in lines {
                let _ = writeln!(out, "  - {line}");
            }
        }
    }

    let _ = writeln!(out, "\n{}:", l.services);
    for s in &report.service_status {
        let _ = writeln!(
            out,
            "  {}: {}",
            s.service,
            if s.available { l.up } else { l.down }
        );
    }
    out
}

pub fn render_json(report: &CredibilityReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn status_label(s: VerificationStatus, lang: Lang) -> &'static str {
    match (lang, s) {
        (Lang::En, s) => s.as_str(),
        (Lang::Zh, VerificationStatus::Verified) => "已验证",
        (Lang::Zh, VerificationStatus::Failed) => "未通过",
        (Lang::Zh, VerificationStatus::Unverified) => "未验证",
        (Lang::Zh, VerificationStatus::Skipped) => "已跳过",
    }
}

fn shorten(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}…")
    }
}
