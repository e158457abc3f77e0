//! Regex extraction of quoted and attributed claims.

use super::{Citation, CitationKind, UNSPECIFIED_SOURCE};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Shorter quotes are dropped at extraction time (names, scare quotes).
const MIN_QUOTE_CHARS: usize = 6;
/// Attributed content must be longer than this to count.
const MIN_ATTRIBUTED_CHARS: usize = 11;
const ATTRIBUTED_MAX_CHARS: usize = 100;
const CONTEXT_CHARS: usize = 50;
const SOURCE_WINDOW_CHARS: usize = 60;

static QUOTE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""([^"\n]{1,400})""#,
        r"“([^”\n]{1,400})”",
        r"‘([^’\n]{1,400})’",
        r"(?:^|[^\w])'([^'\n]{1,400})'(?:[^\w]|$)",
        r"「([^」]{1,400})」",
        r"『([^』]{1,400})』",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid quote regex"))
    .collect()
});

/// Attribution phrases. Group 1, when present, is the source.
static ATTRIBUTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\baccording to\s+([^,，.。;；:\n]{2,60})[,，:]?\s*",
        r"(?i)\bit (?:is|was|has been) reported that\s+",
        r"\b((?:[A-Z][\w.'-]*)(?:\s+[A-Z][\w.'-]*){0,4}|the\s+[\w-]+(?:\s+[\w-]+){0,2})\s+(?:stated|said|announced|reported|claimed)\s+that\s+",
        r"据([^，。,；\n]{1,20}?)(?:称|表示|介绍|透露|报道)[，,：:]?",
        r"根据([^，。,；\n]{1,20}?)的(?:说法|数据|报道|消息)[，,]?",
        r"引述([^，。,；\n]{1,20}?)的话[，,]?",
        r"据(?:报道|悉|了解)[，,]?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid attribution regex"))
    .collect()
});

static SOURCE_AFTER: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"^\s*[,，]?\s*(?:said|says|stated|added|noted|explained|according to)\s+([^,.;!?\n"“]{2,40})"#,
        r"^\s*[,，]?\s*((?:the\s+)?\w[\w\s'.-]{1,40}?)\s+(?:said|says|stated|added|noted)\b",
        r"^\s*[，,]?\s*([\p{Han}A-Za-z]{2,20}?)(?:称|表示|说|指出|强调)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid source regex"))
    .collect()
});

static SOURCE_BEFORE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"((?:[A-Z][\w.'-]*)(?:\s+[A-Z][\w.'-]*){0,4}|the\s+[\w-]+(?:\s+[\w-]+){0,2})\s+(?:said|says|stated|added|noted)\s*[:,]?\s*$",
        r"(?i)according to\s+([^,，.。;:]{2,40})[,，:]?\s*$",
        r"据([^，。,；]{2,20}?)(?:称|表示|介绍|透露|说)[：:，,]?\s*$",
        r"([\p{Han}]{2,20}?)(?:称|表示|说|指出|强调)[：:，,]?\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid source regex"))
    .collect()
});

/// Extract every quoted or attributed claim, deduplicated by exact content,
/// ordered by position.
pub fn extract_citations(text: &str) -> Vec<Citation> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for re in QUOTE_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let content = clean_content(m.as_str());
            if content.chars().count() < MIN_QUOTE_CHARS || !seen.insert(content.clone()) {
                continue;
            }
            // Span including the quote marks.
            let (qs, qe) = outer_span(text, m.start(), m.end());
            let source = source_near_quote(text, qs, qe);
            out.push(Citation::extracted(
                content,
                source,
                context(text, qs, qe, CONTEXT_CHARS),
                CitationKind::DirectQuote,
                (m.start(), m.end()),
            ));
        }
    }

    for re in ATTRIBUTION_PATTERNS.iter() {
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let start = whole.end();
            let end = sentence_end(text, start, ATTRIBUTED_MAX_CHARS);
            let content = clean_content(&text[start..end]);
            if content.chars().count() < MIN_ATTRIBUTED_CHARS || !seen.insert(content.clone()) {
                continue;
            }
            let source = caps
                .get(1)
                .map(|s| clean_source(s.as_str()))
                .filter(|s| source_len_ok(s))
                .unwrap_or_else(|| UNSPECIFIED_SOURCE.to_string());
            out.push(Citation::extracted(
                content,
                source,
                context(text, whole.start(), end, CONTEXT_CHARS),
                CitationKind::IndirectAttribution,
                (start, end),
            ));
        }
    }

    out.sort_by_key(|c| c.position);
    out
}

fn clean_content(s: &str) -> String {
    s.trim()
        .trim_end_matches([',', '，', ';', '；'])
        .trim()
        .to_string()
}

fn clean_source(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| matches!(c, ',' | '，' | '"' | '“' | '”' | ':' | '：'))
        .trim()
        .to_string()
}

fn source_len_ok(s: &str) -> bool {
    (2..=40).contains(&s.chars().count())
}

/// Widen `[start, end)` by one char on each side (the quote marks).
fn outer_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let qs = text[..start]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(start);
    let qe = text[end..]
        .chars()
        .next()
        .map(|c| end + c.len_utf8())
        .unwrap_or(end);
    (qs, qe)
}

fn source_near_quote(text: &str, qs: usize, qe: usize) -> String {
    let after = &text[qe..fwd_chars(text, qe, SOURCE_WINDOW_CHARS)];
    let before = &text[back_chars(text, qs, SOURCE_WINDOW_CHARS)..qs];
    SOURCE_AFTER
        .iter()
        .filter_map(|re| re.captures(after))
        .chain(SOURCE_BEFORE.iter().filter_map(|re| re.captures(before)))
        .filter_map(|c| c.get(1).map(|m| clean_source(m.as_str())))
        .find(|s| source_len_ok(s))
        .unwrap_or_else(|| UNSPECIFIED_SOURCE.to_string())
}

/// End of the sentence starting at `start`, at most `max_chars` away.
/// A `.` only ends a sentence when followed by whitespace or end of text.
fn sentence_end(text: &str, start: usize, max_chars: usize) -> usize {
    let limit = fwd_chars(text, start, max_chars);
    let window = &text[start..limit];
    let mut it = window.char_indices().peekable();
    while let Some((i, c)) = it.next() {
        let ends = match c {
            '。' | '！' | '？' | '!' | '?' => true,
            '.' => it.peek().map(|(_, n)| n.is_whitespace()).unwrap_or(true),
            _ => false,
        };
        if ends {
            return start + i + c.len_utf8();
        }
    }
    limit
}

fn context(text: &str, start: usize, end: usize, radius: usize) -> String {
    text[back_chars(text, start, radius)..fwd_chars(text, end, radius)]
        .trim()
        .to_string()
}

fn back_chars(text: &str, idx: usize, n: usize) -> usize {
    text[..idx]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(idx)
}

fn fwd_chars(text: &str, idx: usize, n: usize) -> usize {
    text[idx..]
        .char_indices()
        .nth(n)
        .map(|(i, _)| idx + i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_quote_with_trailing_attribution() {
        let text = r#"Officials were upbeat. "GDP grew 3% last year," said the ministry on Monday."#;
        let cs = extract_citations(text);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].content, "GDP grew 3% last year");
        assert_eq!(cs[0].source, "the ministry on Monday");
        assert_eq!(cs[0].kind, CitationKind::DirectQuote);
        assert!(cs[0].context.contains("said the ministry"));
    }

    #[test]
    fn cjk_quotes_and_attribution() {
        let text = "据新华社报道，今年一季度全国粮食产量同比增长百分之三点五。专家表示：「这一增长主要得益于良好的天气条件」。";
        let cs = extract_citations(text);
        let kinds: Vec<_> = cs.iter().map(|c| c.kind).collect();
        assert!(kinds.contains(&CitationKind::DirectQuote));
        assert!(kinds.contains(&CitationKind::IndirectAttribution));
        let indirect = cs
            .iter()
            .find(|c| c.kind == CitationKind::IndirectAttribution)
            .unwrap();
        assert_eq!(indirect.source, "新华社");
        assert!(indirect.content.starts_with("今年一季度"));
        let direct = cs.iter().find(|c| c.kind == CitationKind::DirectQuote).unwrap();
        assert_eq!(direct.source, "专家");
    }

    #[test]
    fn according_to_phrase() {
        let text = "According to the central bank, inflation slowed to 2.1 percent in May. Markets rallied.";
        let cs = extract_citations(text);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].source, "the central bank");
        assert_eq!(cs[0].content, "inflation slowed to 2.1 percent in May.");
    }

    #[test]
    fn short_quotes_and_duplicates_are_dropped() {
        let text = r#"He called it "fake". Later: "we will rebuild the bridge". Again: "we will rebuild the bridge"."#;
        let cs = extract_citations(text);
        assert_eq!(cs.len(), 1);
        assert_eq!(cs[0].content, "we will rebuild the bridge");
        assert_eq!(cs[0].source, UNSPECIFIED_SOURCE);
    }

    #[test]
    fn apostrophes_are_not_quotes() {
        let cs = extract_citations("It's the company's view that prices won't fall soon.");
        assert!(cs.is_empty());
    }

    #[test]
    fn positions_point_into_text() {
        let text = "前言。「这是一个足够长的引用内容」后记。";
        let cs = extract_citations(text);
        let (s, e) = cs[0].position;
        assert_eq!(&text[s..e], cs[0].content);
    }
}
