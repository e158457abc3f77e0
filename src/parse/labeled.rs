//! Labeled free-text extraction: the last structural-free strategy.
//!
//! Numbers are found with `"<label>" [:：] <number>` anywhere in the reply;
//! narrative and caveat fields take the text between their label and the
//! next known label.

use super::{clamp_score, ParsedScoreRecord, RecordSchema, ScoreSection};
use once_cell::sync::OnceCell;
use regex::Regex;

pub(super) fn extract(raw: &str, schema: &RecordSchema) -> Option<ParsedScoreRecord> {
    let top = schema.top_labels();
    let labels = schema.all_labels();
    let mut rec = ParsedScoreRecord::empty();
    let mut found = false;

    if let Some(v) = schema.overall.iter().find_map(|l| labeled_number(raw, l)) {
        rec.overall = v;
        found = true;
    } else {
        rec.defaulted.insert("overall".to_string());
    }

    for name in schema.categories.members.iter().chain(schema.scalars) {
        match labeled_number(raw, name) {
            Some(v) => {
                rec.category_scores.insert(name.to_string(), v);
                found = true;
            }
            None => {
                rec.category_scores.insert(name.to_string(), super::DEFAULT_SCORE);
                rec.defaulted.insert(format!("category.{name}"));
            }
        }
    }

    if !schema.sub_scores.is_empty() {
        for (k, v) in compound_numbers(raw) {
            rec.sub_scores.insert(k, v);
            found = true;
        }
    }

    for spec in schema.sections {
        let own_span = label_range(raw, spec.name)
            .map(|(_, end)| cut_at_next_label(&raw[end..], spec.name, &top));
        let span = own_span.unwrap_or(raw);
        let mut section = ScoreSection::default();
        for key in spec.scores {
            match labeled_number(span, key) {
                Some(v) => {
                    section.scores.insert(key.to_string(), v);
                    found = true;
                }
                None => {
                    section.scores.insert(key.to_string(), super::DEFAULT_SCORE);
                    rec.defaulted.insert(format!("{}.{key}", spec.name));
                }
            }
        }
        // Section commentary only when the section itself is labeled.
        if let Some(text) = own_span.and_then(|own| {
            spec.analysis
                .iter()
                .find_map(|l| text_after_label(own, l, &labels))
        }) {
            section.analysis = text;
        }
        rec.sections.insert(spec.name.to_string(), section);
    }

    if let Some(text) = schema
        .narrative
        .iter()
        .find_map(|l| text_after_label(raw, l, &labels))
    {
        rec.narrative = text;
        found = true;
    }

    if let Some((label, end)) = schema
        .caveats
        .iter()
        .find_map(|l| label_range(raw, l).map(|(_, e)| (*l, e)))
    {
        let body = cut_at_next_label(&raw[end..], label, &labels);
        rec.caveats = split_items(body);
        found = found || !rec.caveats.is_empty();
    }

    found.then_some(rec)
}

/// `"label" : 0.82`, `label：82%`, `'label' = .5` → clamped score.
pub(super) fn labeled_number(hay: &str, label: &str) -> Option<f64> {
    let pattern = format!(
        r#"(?:^|[^\p{{L}}\p{{N}}_])["'“]?{}["'”]?\s*[:：=]\s*["'“]?(-?\d+(?:\.\d+)?|-?\.\d+)\s*(%)?"#,
        regex::escape(label)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(hay)?;
    let mut v: f64 = caps.get(1)?.as_str().parse().ok()?;
    if caps.get(2).is_some() {
        v /= 100.0;
    }
    clamp_score(v)
}

/// Keys shaped like `大类_细分` with numeric values.
fn compound_numbers(hay: &str) -> Vec<(String, f64)> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"["']?([\p{Han}A-Za-z0-9]+_[\p{Han}A-Za-z0-9]+)["']?\s*[:：]\s*(-?\d+(?:\.\d+)?)"#)
            .expect("valid regex")
    });
    re.captures_iter(hay)
        .filter_map(|c| {
            let v = clamp_score(c.get(2)?.as_str().parse().ok()?)?;
            Some((c.get(1)?.as_str().to_string(), v))
        })
        .collect()
}

/// Byte range of the best occurrence of `label`: quoted first, then bare.
fn label_range(hay: &str, label: &str) -> Option<(usize, usize)> {
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        let needle = format!("{open}{label}{close}");
        if let Some(i) = hay.find(&needle) {
            return Some((i, i + needle.len()));
        }
    }
    hay.find(label).map(|i| (i, i + label.len()))
}

fn cut_at_next_label<'a>(rest: &'a str, current: &str, labels: &[&str]) -> &'a str {
    let end = labels
        .iter()
        .filter(|l| **l != current && !current.contains(**l))
        .filter_map(|l| label_range(rest, l).map(|(s, _)| s))
        .min()
        .unwrap_or(rest.len());
    &rest[..end]
}

fn text_after_label(hay: &str, label: &str, labels: &[&str]) -> Option<String> {
    let (_, end) = label_range(hay, label)?;
    let body = cut_at_next_label(&hay[end..], label, labels);
    let text = trim_value(body);
    (!text.is_empty()).then(|| text.to_string())
}

fn trim_value(s: &str) -> &str {
    s.trim_matches(|c: char| {
        c.is_whitespace()
            || matches!(
                c,
                '"' | '\'' | '“' | '”' | ',' | '，' | ':' | '：' | '{' | '}' | '[' | ']'
            )
    })
}

fn split_items(body: &str) -> Vec<String> {
    static RE_QUOTED: OnceCell<Regex> = OnceCell::new();
    static RE_BULLET: OnceCell<Regex> = OnceCell::new();
    let quoted = RE_QUOTED.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("valid regex"));
    let items: Vec<String> = quoted
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !items.is_empty() {
        return items;
    }
    let bullet =
        RE_BULLET.get_or_init(|| Regex::new(r"^\s*(?:[-*•]|\d+[.、)])\s*").expect("valid regex"));
    trim_value(body)
        .split(['\n', '；', ';'])
        .map(|line| bullet.replace(line, "").trim().to_string())
        .map(|line| trim_value(&line).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_variants() {
        assert_eq!(labeled_number(r#""总体评分": 0.82"#, "总体评分"), Some(0.82));
        assert_eq!(labeled_number("总体评分：0.6", "总体评分"), Some(0.6));
        assert_eq!(labeled_number("score = 75%", "score"), Some(0.75));
        assert_eq!(labeled_number("score: 7", "score"), Some(1.0));
        assert_eq!(labeled_number("nothing", "score"), None);
    }

    #[test]
    fn narrative_stops_at_next_label() {
        let labels = ["详细分析", "可信度判断的疑点"];
        let raw = "详细分析: 文章结构清晰，来源明确。 可信度判断的疑点: 1. 缺少数据";
        assert_eq!(
            text_after_label(raw, "详细分析", &labels).unwrap(),
            "文章结构清晰，来源明确。"
        );
    }

    #[test]
    fn caveat_items_from_bullets_and_quotes() {
        assert_eq!(
            split_items(": [\"no date\", \"single source\"]"),
            vec!["no date", "single source"]
        );
        assert_eq!(split_items(":\n1. no date\n2. single source"), vec!["no date", "single source"]);
    }

    #[test]
    fn compound_keys() {
        let got = compound_numbers(r#"内容真实性_事实核查: 0.7, "来源可靠性_信息来源": 0.4"#);
        assert_eq!(got.len(), 2);
        assert_eq!(got[1], ("来源可靠性_信息来源".to_string(), 0.4));
    }
}
