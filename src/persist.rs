// src/persist.rs
//! Saves the article and its report as two companion files:
//! `{YYYYmmdd_HHMMSS}_{hash8}_news.txt` and `{...}_analysis.json`.

use crate::report::CredibilityReport;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SAVE_DIR: &str = "saved_news";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cannot write to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedFiles {
    pub text: PathBuf,
    pub report: PathBuf,
}

/// First 8 hex chars of SHA-256 over the text.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(8);
    for b in digest.iter().take(4) {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

pub fn file_key(text: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}", at.format("%Y%m%d_%H%M%S"), content_hash(text))
}

pub fn save(dir: &Path, text: &str, report: &CredibilityReport) -> Result<SavedFiles, PersistError> {
    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PersistError::Io { path, source }
    };
    fs::create_dir_all(dir).map_err(io(dir))?;

    let key = file_key(text, report.analyzed_at);
    let files = SavedFiles {
        text: dir.join(format!("{key}_news.txt")),
        report: dir.join(format!("{key}_analysis.json")),
    };
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&files.text, text).map_err(io(&files.text))?;
    fs::write(&files.report, json).map_err(io(&files.report))?;

    tracing::info!(
        target: "persist",
        text = %files.text.display(),
        report = %files.report.display(),
        "analysis saved"
    );
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hash_is_stable_and_short() {
        // sha256("abc") = ba7816bf...
        assert_eq!(content_hash("abc"), "ba7816bf");
    }

    #[test]
    fn key_uses_timestamp_then_hash() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(file_key("abc", at), "20240309_070501_ba7816bf");
    }
}
