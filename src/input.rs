// src/input.rs
//! Article text acquisition: URL, file, literal text or stdin.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; news-credibility/0.1)";

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),
    #[error("no text to analyze")]
    Empty,
}

/// Where the article comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    Url(String),
    File(PathBuf),
    Text(String),
    Stdin,
}

/// Article text plus the URL it came from, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub text: String,
    pub url: Option<String>,
}

pub async fn load(source: &InputSource) -> Result<Article, InputError> {
    let (text, url) = match source {
        InputSource::Url(url) => (fetch_url(url).await?, Some(url.clone())),
        InputSource::File(path) => (read_file(path)?, None),
        InputSource::Text(t) => (t.clone(), None),
        InputSource::Stdin => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(InputError::Stdin)?;
            (buf, None)
        }
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(InputError::Empty);
    }
    Ok(Article { text, url })
}

fn read_file(path: &Path) -> Result<String, InputError> {
    std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })
}

async fn fetch_url(url: &str) -> Result<String, InputError> {
    let fail = |reason: String| InputError::Fetch {
        url: url.to_string(),
        reason,
    };
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| fail(e.to_string()))?;
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| fail(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {status}")));
    }
    let body = resp.text().await.map_err(|e| fail(e.to_string()))?;
    tracing::info!(target: "input", url, bytes = body.len(), "article fetched");
    Ok(html_to_text(&body))
}

/// Drop scripts, styles and tags, decode entities, keep paragraph breaks.
pub fn html_to_text(html: &str) -> String {
    static RE_BLOCKS: OnceCell<Regex> = OnceCell::new();
    static RE_BREAKS: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_SPACES: OnceCell<Regex> = OnceCell::new();
    let blocks = RE_BLOCKS.get_or_init(|| {
        Regex::new(r"(?is)<(script|style|noscript|head)[^>]*>.*?</(?:script|style|noscript|head)>")
            .expect("valid regex")
    });
    let breaks = RE_BREAKS
        .get_or_init(|| Regex::new(r"(?i)<br\s*/?>|</(?:p|div|h[1-6]|li|tr)>").expect("valid regex"));
    let tags = RE_TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]+>").expect("valid regex"));
    let spaces = RE_SPACES.get_or_init(|| Regex::new(r"[ \t\u{a0}]+").expect("valid regex"));

    let out = blocks.replace_all(html, "");
    let out = breaks.replace_all(&out, "\n");
    let out = tags.replace_all(&out, "");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = spaces.replace_all(&out, " ");

    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_is_reduced_to_paragraphs() {
        let html = "<html><head><title>x</title></head><body><script>var a=1;</script>\
            <h1>Title</h1><p>First&nbsp;&nbsp;para &amp; more.</p><p>“Quoted”<br>line</p></body></html>";
        assert_eq!(html_to_text(html), "Title\nFirst para & more.\n“Quoted”\nline");
    }

    #[tokio::test]
    async fn literal_text_is_trimmed_and_empty_rejected() {
        let a = load(&InputSource::Text("  hello  ".into())).await.unwrap();
        assert_eq!(a.text, "hello");
        assert!(a.url.is_none());
        assert!(matches!(
            load(&InputSource::Text("   ".into())).await,
            Err(InputError::Empty)
        ));
    }

    #[tokio::test]
    async fn file_input() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.txt");
        std::fs::write(&p, "article body").unwrap();
        assert_eq!(load(&InputSource::File(p)).await.unwrap().text, "article body");
        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            load(&InputSource::File(missing)).await,
            Err(InputError::Read { .. })
        ));
    }
}
