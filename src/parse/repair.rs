//! Span extraction and bounded syntactic repairs for almost-JSON replies.

use once_cell::sync::OnceCell;
use regex::Regex;

/// First balanced span starting at the first `open` (`{` or `[`).
/// Brackets inside double-quoted strings are ignored. `None` when the
/// first opener is never closed.
pub fn balanced_span(raw: &str, open: char) -> Option<&str> {
    let close = match open {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };
    let start = raw.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in raw[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    let end = start + i + ch.len_utf8();
                    return Some(&raw[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

/// The span later strategies work on: the balanced object if there is one,
/// otherwise everything from the first `{` (truncated replies), otherwise
/// the whole input.
pub fn candidate_span(raw: &str) -> &str {
    if let Some(span) = balanced_span(raw, '{') {
        return span;
    }
    match raw.find('{') {
        Some(i) => &raw[i..],
        None => raw.trim(),
    }
}

/// Normalize quotes and colons, drop trailing commas, quote bare keys.
pub fn repair(span: &str) -> String {
    static RE_TRAILING_COMMA: OnceCell<Regex> = OnceCell::new();
    static RE_BARE_KEY: OnceCell<Regex> = OnceCell::new();

    // Typographic quotes → ASCII
    let mut out = span
        .replace(['\u{201C}', '\u{201D}', '\u{201E}', '\u{201F}', '\u{2033}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // Single-quoted dicts only when no double quote is present at all,
    // otherwise apostrophes inside values would be mangled.
    if !out.contains('"') {
        out = out.replace('\'', "\"");
    }

    // Full-width punctuation
    out = out.replace('：', ":").replace('，', ",");

    let re_comma =
        RE_TRAILING_COMMA.get_or_init(|| Regex::new(r",\s*([}\]])").expect("valid regex"));
    let re_key = RE_BARE_KEY.get_or_init(|| {
        Regex::new(r#"([{,]\s*)([^\s"'{}\[\],:]+)\s*:"#).expect("valid regex")
    });
    map_unquoted(&out, |seg| {
        let seg = re_comma.replace_all(seg, "$1");
        re_key.replace_all(&seg, "$1\"$2\":").into_owned()
    })
}

/// Apply `f` to the parts of `s` outside double-quoted strings.
/// An unterminated string runs to the end and is left untouched.
fn map_unquoted(s: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(s.len());
    let mut seg_start = 0;
    let mut in_str = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_str {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_str = false;
                out.push_str(&s[seg_start..=i]);
                seg_start = i + 1;
            }
        } else if c == '"' {
            out.push_str(&f(&s[seg_start..i]));
            seg_start = i;
            in_str = true;
        }
    }
    let rest = &s[seg_start..];
    if in_str {
        out.push_str(rest);
    } else {
        out.push_str(&f(rest));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_skips_prose_and_nested_objects() {
        let raw = r#"Here you go: {"a": {"b": 1}, "c": "}"} trailing words"#;
        assert_eq!(balanced_span(raw, '{'), Some(r#"{"a": {"b": 1}, "c": "}"}"#));
    }

    #[test]
    fn unbalanced_span_is_none() {
        assert_eq!(balanced_span(r#"{"a": {"b": 1}"#, '{'), None);
        assert_eq!(candidate_span("x {\"a\": 1"), "{\"a\": 1");
    }

    #[test]
    fn array_span() {
        assert_eq!(balanced_span("keywords: [\"a\", \"b\"] done", '['), Some("[\"a\", \"b\"]"));
    }

    #[test]
    fn repairs_trailing_commas_and_bare_keys() {
        let fixed = repair("{overall: 0.8, tags: [1, 2,], }");
        let v: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["overall"], 0.8);
        assert_eq!(v["tags"][1], 2);
    }

    #[test]
    fn string_values_are_not_rewritten() {
        let fixed = repair(r#"{"详细分析": "a, b: c", "疑点": "x,]", 总体评分: 0.8,}"#);
        assert_eq!(
            fixed,
            r#"{"详细分析": "a, b: c", "疑点": "x,]", "总体评分": 0.8}"#
        );
        let v: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["详细分析"], "a, b: c");
    }

    #[test]
    fn repairs_full_width_colon_and_curly_quotes() {
        let fixed = repair("{“总体评分”： 0.82，“详细分析”： “ok”}");
        let v: serde_json::Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(v["总体评分"], 0.82);
        assert_eq!(v["详细分析"], "ok");
    }

    #[test]
    fn single_quotes_only_without_double_quotes() {
        let v: serde_json::Value = serde_json::from_str(&repair("{'a': 0.5}")).unwrap();
        assert_eq!(v["a"], 0.5);
        let kept = repair(r#"{"note": "it's fine"}"#);
        assert!(kept.contains("it's"));
    }
}
