//! # Source trust
//!
//! Configurable mapping from information sources (outlets, agencies,
//! institutions) and article domains to trust weights in `[0.0, 1.0]`.
//!
//! - Loads from JSON (`config/source_trust.json`) or falls back to `default_seed()`.
//! - Case-insensitive lookup with punctuation/dash normalization.
//! - Aliases map alternative spellings to canonical names.
//! - Lookup order: alias → exact → contained name → default.
//! - Domains match by suffix (`news.bbc.co.uk` → `bbc.co.uk`).

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

pub const DEFAULT_SOURCE_TRUST_PATH: &str = "config/source_trust.json";

/// Weight at or above which a source counts as reputable.
pub const REPUTABLE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceTrust {
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Domain suffix → weight.
    #[serde(default)]
    pub domains: HashMap<String, f64>,
}

fn default_default_weight() -> f64 {
    0.5
}

impl Default for SourceTrust {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceTrust {
    /// Falls back to `default_seed()` when the file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path.as_ref()) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                tracing::warn!(target: "config", error = %e, "invalid source trust file; using seed");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// Known weight for `source`, or `None` when nothing matches.
    pub fn lookup(&self, source: &str) -> Option<f64> {
        let s = normalize(source);
        if s.is_empty() {
            return None;
        }

        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.weights.get(&normalize(canon)) {
                return Some(clamp01(w));
            }
        }

        if let Some(&w) = self.weights.get(&s) {
            return Some(clamp01(w));
        }

        // Longest contained key wins so "new york times" beats "times".
        let mut best: Option<(&str, f64)> = None;
        for (k, &w) in self.weights.iter().chain(
            self.aliases
                .iter()
                .filter_map(|(a, c)| self.weights.get(&normalize(c)).map(|w| (a, w))),
        ) {
            if contains_name(&s, k) && best.map_or(true, |(b, _)| k.len() > b.len()) {
                best = Some((k.as_str(), w));
            }
        }
        best.map(|(_, w)| clamp01(w))
    }

    pub fn weight_for(&self, source: &str) -> f64 {
        self.lookup(source).unwrap_or_else(|| clamp01(self.default_weight))
    }

    pub fn is_reputable(&self, source: &str) -> bool {
        self.lookup(source)
            .is_some_and(|w| w >= REPUTABLE_THRESHOLD)
    }

    /// Trust for an article URL's host, matched by domain suffix.
    pub fn domain_weight(&self, url: &str) -> Option<(String, f64)> {
        let host = host_of(url)?;
        self.domains
            .iter()
            .filter(|(suffix, _)| host == **suffix || host.ends_with(&format!(".{suffix}")))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, &w)| (host.clone(), clamp01(w)))
    }

    /// Built-in seed: wire services, major outlets, journals and institutions.
    pub fn default_seed() -> Self {
        let mut weights = HashMap::new();
        let mut aliases = HashMap::new();
        let mut domains = HashMap::new();

        for (k, v) in [
            ("新华社", 0.92),
            ("人民日报", 0.9),
            ("央视", 0.9),
            ("中国日报", 0.88),
            ("路透社", 0.9),
            ("法新社", 0.88),
            ("美联社", 0.9),
            ("纽约时报", 0.86),
            ("华盛顿邮报", 0.85),
            ("卫报", 0.84),
            ("金融时报", 0.86),
            ("柳叶刀", 0.92),
            ("新英格兰医学杂志", 0.92),
            ("中国科学院", 0.9),
            ("中国社会科学院", 0.88),
            ("国家统计局", 0.92),
            ("reuters", 0.9),
            ("associated press", 0.9),
            ("agence france presse", 0.88),
            ("bbc", 0.88),
            ("cnn", 0.82),
            ("new york times", 0.86),
            ("washington post", 0.85),
            ("the guardian", 0.84),
            ("financial times", 0.86),
            ("bloomberg", 0.85),
            ("nature journal", 0.92),
            ("the lancet", 0.92),
            ("world health organization", 0.9),
            ("harvard university", 0.88),
            ("oxford university", 0.88),
            ("mit", 0.88),
            ("ministry", 0.8),
            ("统计局", 0.88),
            ("外交部", 0.85),
        ] {
            weights.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("中央电视台", "央视"),
            ("cctv", "央视"),
            ("xinhua", "新华社"),
            ("新华网", "新华社"),
            ("people's daily", "人民日报"),
            ("china daily", "中国日报"),
            ("ap", "associated press"),
            ("afp", "agence france presse"),
            ("nyt", "new york times"),
            ("nytimes", "new york times"),
            ("ft", "financial times"),
            ("guardian", "the guardian"),
            ("lancet", "the lancet"),
            ("世界卫生组织", "world health organization"),
            ("哈佛大学", "harvard university"),
            ("牛津大学", "oxford university"),
            ("麻省理工学院", "mit"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        for (d, v) in [
            ("nytimes.com", 0.9),
            ("washingtonpost.com", 0.9),
            ("wsj.com", 0.9),
            ("economist.com", 0.9),
            ("bbc.co.uk", 0.9),
            ("bbc.com", 0.9),
            ("reuters.com", 0.9),
            ("apnews.com", 0.9),
            ("bloomberg.com", 0.9),
            ("ft.com", 0.9),
            ("cnn.com", 0.9),
            ("theguardian.com", 0.9),
            ("npr.org", 0.9),
            ("people.com.cn", 0.9),
            ("xinhuanet.com", 0.9),
            ("chinadaily.com.cn", 0.9),
            ("cctv.com", 0.9),
            ("thepaper.cn", 0.9),
            ("caixin.com", 0.9),
            ("nature.com", 0.9),
            ("science.org", 0.9),
            ("who.int", 0.9),
            ("gov.cn", 0.9),
            ("edu.cn", 0.9),
            ("gov", 0.9),
            ("edu", 0.9),
            ("forbes.com", 0.7),
            ("sina.com.cn", 0.7),
            ("sohu.com", 0.7),
            ("qq.com", 0.7),
            ("163.com", 0.7),
            ("wikipedia.org", 0.7),
            ("zhihu.com", 0.7),
            ("medium.com", 0.7),
        ] {
            domains.insert(d.to_string(), v);
        }

        Self {
            default_weight: 0.5,
            weights,
            aliases,
            domains,
        }
    }
}

/// Lowercase, dashes/punctuation to spaces, collapse whitespace.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '‚', '’', '"', '“', '”'], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// ASCII names must match whole words; CJK names match as substrings.
fn contains_name(haystack: &str, name: &str) -> bool {
    if name.is_ascii() {
        format!(" {haystack} ").contains(&format!(" {name} "))
    } else {
        haystack.contains(name)
    }
}

fn host_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
