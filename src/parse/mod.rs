//! Response parser cascade.
//!
//! Turns a completion reply into a `ParsedScoreRecord`. Strategies are tried
//! in order and the first one that recognizes at least one known field wins:
//!
//! 1. strict JSON over the whole reply
//! 2. strict JSON over the first balanced `{...}` span
//! 3. strict JSON over the repaired span (quotes, colons, trailing commas, bare keys)
//! 4. permissive literal reader over the repaired span
//! 5. labeled free-text extraction
//! 6. defaults
//!
//! `parse` never fails. Which strategy won is reported so callers can surface
//! degraded parses as warnings.

pub mod labeled;
pub mod loose;
pub mod repair;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Neutral value for any score the reply did not provide.
pub const DEFAULT_SCORE: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSection {
    pub scores: BTreeMap<String, f64>,
    pub analysis: String,
}

impl ScoreSection {
    pub fn mean(&self) -> Option<f64> {
        if self.scores.is_empty() {
            None
        } else {
            Some(self.scores.values().sum::<f64>() / self.scores.len() as f64)
        }
    }
}

/// Always total: every field has a value, and `defaulted` names the score
/// fields that were filled in rather than read from the reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedScoreRecord {
    pub overall: f64,
    pub category_scores: BTreeMap<String, f64>,
    pub sub_scores: BTreeMap<String, f64>,
    pub sections: BTreeMap<String, ScoreSection>,
    pub narrative: String,
    pub caveats: Vec<String>,
    pub defaulted: BTreeSet<String>,
}

impl ParsedScoreRecord {
    fn empty() -> Self {
        Self {
            overall: DEFAULT_SCORE,
            category_scores: BTreeMap::new(),
            sub_scores: BTreeMap::new(),
            sections: BTreeMap::new(),
            narrative: String::new(),
            caveats: Vec::new(),
            defaulted: BTreeSet::new(),
        }
    }

    /// Every known field at its default.
    pub fn defaults(schema: &RecordSchema) -> Self {
        let mut rec = Self::empty();
        rec.defaulted.insert("overall".to_string());
        for name in schema.categories.members.iter().chain(schema.scalars) {
            rec.category_scores.insert(name.to_string(), DEFAULT_SCORE);
            rec.defaulted.insert(format!("category.{name}"));
        }
        for spec in schema.sections {
            let mut section = ScoreSection::default();
            for key in spec.scores {
                section.scores.insert(key.to_string(), DEFAULT_SCORE);
                rec.defaulted.insert(format!("{}.{key}", spec.name));
            }
            rec.sections.insert(spec.name.to_string(), section);
        }
        rec
    }

    pub fn overall_found(&self) -> bool {
        !self.defaulted.contains("overall")
    }

    pub fn category(&self, name: &str) -> Option<f64> {
        self.category_scores.get(name).copied()
    }

    pub fn category_found(&self, name: &str) -> bool {
        self.category_scores.contains_key(name)
            && !self.defaulted.contains(&format!("category.{name}"))
    }

    /// How many of a section's score fields came from the reply.
    pub fn section_found_count(&self, name: &str) -> usize {
        self.sections
            .get(name)
            .map(|s| {
                s.scores
                    .keys()
                    .filter(|k| !self.defaulted.contains(&format!("{name}.{k}")))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Which strategy produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStrategy {
    Strict,
    BalancedSpan,
    Repaired,
    Loose,
    Labeled,
    Defaulted,
}

impl ParseStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseStrategy::Strict => "strict",
            ParseStrategy::BalancedSpan => "balanced-span",
            ParseStrategy::Repaired => "repaired",
            ParseStrategy::Loose => "loose",
            ParseStrategy::Labeled => "labeled",
            ParseStrategy::Defaulted => "defaulted",
        }
    }

    /// A balanced span is still strict JSON; anything after that rewrote or
    /// guessed at the reply.
    pub fn is_degraded(self) -> bool {
        !matches!(self, ParseStrategy::Strict | ParseStrategy::BalancedSpan)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub record: ParsedScoreRecord,
    pub strategy: ParseStrategy,
}

impl ParseOutcome {
    /// Warning line for degraded parses, `None` otherwise.
    pub fn degraded_warning(&self, what: &str) -> Option<String> {
        self.strategy.is_degraded().then(|| {
            format!(
                "{what}: completion reply parsed with fallback strategy '{}'",
                self.strategy.as_str()
            )
        })
    }
}

/// Labels a family of replies uses.
#[derive(Debug, Clone, Copy)]
pub struct FieldGroup {
    /// Keys of the nested object holding the group.
    pub containers: &'static [&'static str],
    /// Members that get a default when missing.
    pub members: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct SectionSpec {
    pub name: &'static str,
    pub scores: &'static [&'static str],
    pub analysis: &'static [&'static str],
}

#[derive(Debug, Clone, Copy)]
pub struct RecordSchema {
    pub overall: &'static [&'static str],
    pub categories: FieldGroup,
    /// Top-level numeric fields stored alongside the categories.
    pub scalars: &'static [&'static str],
    /// Container keys for free-form sub-scores.
    pub sub_scores: &'static [&'static str],
    pub sections: &'static [SectionSpec],
    pub narrative: &'static [&'static str],
    pub caveats: &'static [&'static str],
}

impl RecordSchema {
    /// Labels that delimit top-level spans.
    pub fn top_labels(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        out.extend(self.overall);
        out.extend(self.categories.containers);
        out.extend(self.scalars);
        out.extend(self.sub_scores);
        out.extend(self.sections.iter().map(|s| s.name));
        out.extend(self.narrative);
        out.extend(self.caveats);
        out
    }

    pub fn all_labels(&self) -> Vec<&'static str> {
        let mut out = self.top_labels();
        out.extend(self.categories.members);
        for s in self.sections {
            out.extend(s.scores);
            out.extend(s.analysis);
        }
        out
    }
}

pub const AI_CONTENT_SECTION: &str = "AI生成内容";
pub const NEUTRALITY_SECTION: &str = "语言中立性";

/// Whole-article analysis reply.
pub const HOLISTIC: RecordSchema = RecordSchema {
    overall: &["总体评分", "overall_score", "overall"],
    categories: FieldGroup {
        containers: &["各大类评分", "category_scores"],
        members: &["内容真实性", "信息准确性", "来源可靠性", "语言客观性", "逻辑连贯性", "引用质量"],
    },
    scalars: &[],
    sub_scores: &["细分点评分", "sub_scores"],
    sections: &[
        SectionSpec {
            name: AI_CONTENT_SECTION,
            scores: &["表达模式", "词汇多样性", "句子变化", "上下文连贯性", "人类特征"],
            analysis: &["分析", "analysis"],
        },
        SectionSpec {
            name: NEUTRALITY_SECTION,
            scores: &["情感词汇", "情感平衡", "极端表述", "煽动性表达", "主观评价"],
            analysis: &["分析", "analysis"],
        },
    ],
    narrative: &["详细分析", "analysis", "summary"],
    caveats: &["可信度判断的疑点", "caveats", "issues"],
};

/// Citation-vs-evidence judgment: `{truthfulness, authority, rationale}`.
pub const CITATION_JUDGMENT: RecordSchema = RecordSchema {
    overall: &["truthfulness", "真实性", "可信度"],
    categories: FieldGroup {
        containers: &[],
        members: &[],
    },
    scalars: &["authority"],
    sub_scores: &[],
    sections: &[],
    narrative: &["rationale", "理由", "分析"],
    caveats: &[],
};

/// Verification-point judgment: `{评分, 结论}`.
pub const EVIDENCE_JUDGMENT: RecordSchema = RecordSchema {
    overall: &["评分", "score"],
    categories: FieldGroup {
        containers: &[],
        members: &[],
    },
    scalars: &[],
    sub_scores: &[],
    sections: &[],
    narrative: &["结论", "conclusion"],
    caveats: &[],
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyMiss {
    #[error("no JSON found")]
    NoStructure,
    #[error("not an object")]
    NotAnObject,
    #[error("no known field present")]
    NoKnownFields,
}

type Strategy = fn(&str, &RecordSchema) -> Result<ParsedScoreRecord, StrategyMiss>;

const STRATEGIES: &[(ParseStrategy, Strategy)] = &[
    (ParseStrategy::Strict, strict_whole),
    (ParseStrategy::BalancedSpan, strict_span),
    (ParseStrategy::Repaired, repaired_span),
    (ParseStrategy::Loose, loose_span),
    (ParseStrategy::Labeled, labeled_text),
];

/// Run the cascade. Total.
pub fn parse(raw: &str, schema: &RecordSchema) -> ParseOutcome {
    for (tag, strategy) in STRATEGIES {
        match strategy(raw, schema) {
            Ok(record) => return finish(record, *tag),
            Err(miss) => {
                tracing::trace!(target: "parse", strategy = tag.as_str(), reason = %miss, "strategy missed");
            }
        }
    }
    let mut record = ParsedScoreRecord::defaults(schema);
    // Keep the raw reply visible when nothing could be read from it.
    record.narrative = raw.trim().chars().take(500).collect();
    finish(record, ParseStrategy::Defaulted)
}

fn finish(record: ParsedScoreRecord, strategy: ParseStrategy) -> ParseOutcome {
    tracing::debug!(target: "parse", strategy = strategy.as_str(), defaulted = record.defaulted.len(), "reply parsed");
    if strategy.is_degraded() {
        crate::metrics::record_parse_degraded(strategy.as_str());
    }
    ParseOutcome { record, strategy }
}

fn strict_whole(raw: &str, schema: &RecordSchema) -> Result<ParsedScoreRecord, StrategyMiss> {
    let v: Value = serde_json::from_str(raw.trim()).map_err(|_| StrategyMiss::NoStructure)?;
    record_from_value(&v, schema)
}

fn strict_span(raw: &str, schema: &RecordSchema) -> Result<ParsedScoreRecord, StrategyMiss> {
    let span = repair::balanced_span(raw, '{').ok_or(StrategyMiss::NoStructure)?;
    let v: Value = serde_json::from_str(span).map_err(|_| StrategyMiss::NoStructure)?;
    record_from_value(&v, schema)
}

fn repaired_span(raw: &str, schema: &RecordSchema) -> Result<ParsedScoreRecord, StrategyMiss> {
    let fixed = repair::repair(repair::candidate_span(raw));
    let v: Value = serde_json::from_str(&fixed).map_err(|_| StrategyMiss::NoStructure)?;
    record_from_value(&v, schema)
}

fn loose_span(raw: &str, schema: &RecordSchema) -> Result<ParsedScoreRecord, StrategyMiss> {
    let fixed = repair::repair(repair::candidate_span(raw));
    let v = loose::parse_loose(&fixed).ok_or(StrategyMiss::NoStructure)?;
    record_from_value(&v, schema)
}

fn labeled_text(raw: &str, schema: &RecordSchema) -> Result<ParsedScoreRecord, StrategyMiss> {
    labeled::extract(raw, schema).ok_or(StrategyMiss::NoKnownFields)
}

/// Read a record out of a JSON object, defaulting whatever is missing.
pub fn record_from_value(v: &Value, schema: &RecordSchema) -> Result<ParsedScoreRecord, StrategyMiss> {
    let obj = v.as_object().ok_or(StrategyMiss::NotAnObject)?;
    let mut rec = ParsedScoreRecord::empty();
    let mut found = false;

    match first_key(obj, schema.overall).and_then(as_score) {
        Some(s) => {
            rec.overall = s;
            found = true;
        }
        None => {
            rec.defaulted.insert("overall".to_string());
        }
    }

    if let Some(group) = first_key(obj, schema.categories.containers).and_then(Value::as_object) {
        found = true;
        for (k, val) in group {
            if let Some(s) = as_score(val) {
                rec.category_scores.insert(k.clone(), s);
            }
        }
    }
    for name in schema.categories.members {
        if !rec.category_scores.contains_key(*name) {
            rec.category_scores.insert(name.to_string(), DEFAULT_SCORE);
            rec.defaulted.insert(format!("category.{name}"));
        }
    }
    for name in schema.scalars {
        match obj.get(*name).and_then(as_score) {
            Some(s) => {
                rec.category_scores.insert(name.to_string(), s);
                found = true;
            }
            None => {
                rec.category_scores.insert(name.to_string(), DEFAULT_SCORE);
                rec.defaulted.insert(format!("category.{name}"));
            }
        }
    }

    if let Some(group) = first_key(obj, schema.sub_scores).and_then(Value::as_object) {
        found = true;
        for (k, val) in group {
            if let Some(s) = as_score(val) {
                rec.sub_scores.insert(k.clone(), s);
            }
        }
    }

    for spec in schema.sections {
        let body = obj.get(spec.name).and_then(Value::as_object);
        found |= body.is_some();
        let mut section = ScoreSection::default();
        for key in spec.scores {
            match body.and_then(|b| b.get(*key)).and_then(as_score) {
                Some(s) => {
                    section.scores.insert(key.to_string(), s);
                }
                None => {
                    section.scores.insert(key.to_string(), DEFAULT_SCORE);
                    rec.defaulted.insert(format!("{}.{key}", spec.name));
                }
            }
        }
        if let Some(text) = body.and_then(|b| first_key(b, spec.analysis)).map(as_text) {
            section.analysis = text;
        }
        rec.sections.insert(spec.name.to_string(), section);
    }

    if let Some(text) = first_key(obj, schema.narrative).map(as_text) {
        rec.narrative = text;
        found = true;
    }

    if let Some(c) = first_key(obj, schema.caveats) {
        found = true;
        rec.caveats = match c {
            Value::Array(items) => items.iter().map(as_text).filter(|s| !s.is_empty()).collect(),
            other => as_text(other)
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        };
    }

    if found {
        Ok(rec)
    } else {
        Err(StrategyMiss::NoKnownFields)
    }
}

/// Strict → balanced span (object or array, whichever opens first) →
/// repaired → loose. For replies that are lists rather than score records.
pub fn parse_value(raw: &str) -> Option<(Value, ParseStrategy)> {
    if let Ok(v) = serde_json::from_str::<Value>(raw.trim()) {
        if v.is_object() || v.is_array() {
            return Some((v, ParseStrategy::Strict));
        }
    }

    let open = match (raw.find('{'), raw.find('[')) {
        (Some(o), Some(a)) if a < o => '[',
        (Some(_), _) => '{',
        (None, Some(_)) => '[',
        (None, None) => return None,
    };
    let span = repair::balanced_span(raw, open);
    if let Some(v) = span.and_then(|s| serde_json::from_str::<Value>(s).ok()) {
        return Some((v, ParseStrategy::BalancedSpan));
    }

    let start = raw.find(open).unwrap_or(0);
    let fixed = repair::repair(span.unwrap_or(&raw[start..]));
    if let Ok(v) = serde_json::from_str::<Value>(&fixed) {
        return Some((v, ParseStrategy::Repaired));
    }
    loose::parse_loose(&fixed).map(|v| (v, ParseStrategy::Loose))
}

fn first_key<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Numbers, numeric strings and percentages → clamped score.
pub fn as_score(v: &Value) -> Option<f64> {
    let raw = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let t = s.trim();
            match t.strip_suffix('%') {
                Some(p) => p.trim().parse::<f64>().ok()? / 100.0,
                None => t.parse::<f64>().ok()?,
            }
        }
        _ => return None,
    };
    clamp_score(raw)
}

/// Finite values clamped into [0,1]; non-finite values are rejected.
pub fn clamp_score(v: f64) -> Option<f64> {
    v.is_finite().then(|| v.clamp(0.0, 1.0))
}

pub fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
