//! Search gateway over a SearXNG instance.
//!
//! Search availability flaps more than completion availability, so callers
//! run `refresh()` once at the start of each batch instead of trusting the
//! flag written by the startup probe.

use super::{run_with_retry, AttemptFailure, GatewayError, RetryPolicy};
use crate::config::services::ServiceConfig;
use crate::health::{Service, ServiceHealth};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

const USER_AGENT: &str = "news-credibility/0.1";

/// Public instances tried, in order, when the primary is unreachable.
pub const PUBLIC_INSTANCES: &[&str] = &[
    "https://searx.be",
    "https://search.mdosch.de",
    "https://search.ononoki.org",
    "https://searx.tiekoetter.com",
    "https://searx.gnu.style",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

impl SearchResult {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// One query attempt. An empty vec is a valid "no matches" answer.
    async fn query(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>, AttemptFailure>;
    /// Is the backend reachable right now?
    async fn probe(&self, timeout: Duration) -> bool;
    fn name(&self) -> &'static str;
}

pub fn build_search_backend(cfg: &ServiceConfig) -> Arc<dyn SearchBackend> {
    if cfg.mock_mode {
        return Arc::new(ScriptedSearch::empty());
    }
    Arc::new(SearxngBackend::from_config(cfg))
}

// ------------------------------------------------------------
// SearXNG backend
// ------------------------------------------------------------

pub struct SearxngBackend {
    primary: String,
    fallbacks: Vec<String>,
    active: RwLock<String>,
    language: String,
}

impl SearxngBackend {
    pub fn new(base_url: &str) -> Self {
        let primary = normalize_base_url(base_url);
        Self {
            active: RwLock::new(primary.clone()),
            primary,
            fallbacks: Vec::new(),
            language: "zh-CN".to_string(),
        }
    }

    pub fn with_public_fallbacks(mut self) -> Self {
        self.fallbacks = PUBLIC_INSTANCES.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn from_config(cfg: &ServiceConfig) -> Self {
        let backend = Self::new(&cfg.search_url);
        if cfg.use_public_search {
            backend.with_public_fallbacks()
        } else {
            backend
        }
    }

    pub fn active_url(&self) -> String {
        self.active
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|_| self.primary.clone())
    }

    fn client(timeout: Duration) -> Result<reqwest::Client, AttemptFailure> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .build()
            .map_err(|e| AttemptFailure::Connect(e.to_string()))
    }

    async fn probe_instance(&self, base: &str, timeout: Duration) -> bool {
        let Ok(http) = Self::client(timeout) else {
            return false;
        };
        let resp = http
            .get(format!("{base}/search"))
            .query(&[("q", "test"), ("format", "json")])
            .send()
            .await;
        match resp {
            Ok(r) if r.status().is_success() => r
                .json::<serde_json::Value>()
                .await
                .map(|v| v.get("results").is_some())
                .unwrap_or(false),
            Ok(r) => {
                tracing::debug!(target: "gateway", instance = base, status = r.status().as_u16(), "search probe rejected");
                false
            }
            Err(e) => {
                tracing::debug!(target: "gateway", instance = base, error = %e, "search probe failed");
                false
            }
        }
    }
}

#[derive(Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxItem>,
}

#[derive(Deserialize)]
struct SearxItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SearchBackend for SearxngBackend {
    async fn query(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<SearchResult>, AttemptFailure> {
        let base = self.active_url();
        let http = Self::client(timeout)?;
        let resp = http
            .get(format!("{base}/search"))
            .query(&[
                ("q", query),
                ("format", "json"),
                ("categories", "general"),
                ("language", self.language.as_str()),
                ("safesearch", "0"),
            ])
            .send()
            .await
            .map_err(|e| AttemptFailure::from_reqwest(&e, timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptFailure::from_status(status.as_u16()));
        }
        let body: SearxResponse = resp
            .json()
            .await
            .map_err(|e| AttemptFailure::Malformed(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .take(limit)
            .map(|it| SearchResult {
                title: it.title,
                url: it.url,
                snippet: it.content,
            })
            .collect())
    }

    async fn probe(&self, timeout: Duration) -> bool {
        let current = self.active_url();
        if self.probe_instance(&current, timeout).await {
            return true;
        }
        let candidates = std::iter::once(&self.primary)
            .chain(self.fallbacks.iter())
            .filter(|c| **c != current);
        for candidate in candidates {
            if self.probe_instance(candidate, timeout).await {
                if let Ok(mut active) = self.active.write() {
                    *active = candidate.clone();
                }
                tracing::info!(target: "gateway", instance = %candidate, "switched search instance");
                return true;
            }
        }
        false
    }

    fn name(&self) -> &'static str {
        "searxng"
    }
}

/// Add a scheme if missing and strip trailing `/` and `/search`.
pub fn normalize_base_url(raw: &str) -> String {
    let mut url = raw.trim().to_string();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        url = format!("http://{url}");
    }
    while url.ends_with('/') {
        url.pop();
    }
    if let Some(stripped) = url.strip_suffix("/search") {
        url = stripped.to_string();
    }
    url
}

// ------------------------------------------------------------
// Scripted backend
// ------------------------------------------------------------

type SearchResponder = dyn Fn(&str) -> Result<Vec<SearchResult>, AttemptFailure> + Send + Sync;

/// Queue first, then responder; with neither, every query is an empty success.
pub struct ScriptedSearch {
    queue: Mutex<VecDeque<Result<Vec<SearchResult>, AttemptFailure>>>,
    responder: Option<Box<SearchResponder>>,
    reachable: bool,
    queries: Mutex<Vec<String>>,
    probes: Mutex<u32>,
}

impl ScriptedSearch {
    pub fn empty() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            reachable: true,
            queries: Mutex::new(Vec::new()),
            probes: Mutex::new(0),
        }
    }

    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<Vec<SearchResult>, AttemptFailure> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(f)),
            ..Self::empty()
        }
    }

    pub fn always(results: Vec<SearchResult>) -> Self {
        Self::with_responder(move |_| Ok(results.clone()))
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::failing(AttemptFailure::Connect("connection refused".into()))
        }
    }

    pub fn failing(failure: AttemptFailure) -> Self {
        Self::with_responder(move |_| Err(failure.clone()))
    }

    pub fn push(self, result: Result<Vec<SearchResult>, AttemptFailure>) -> Self {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(result);
        }
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.lock().map(|p| *p).unwrap_or(0)
    }
}

#[async_trait]
impl SearchBackend for ScriptedSearch {
    async fn query(
        &self,
        query: &str,
        limit: usize,
        _timeout: Duration,
    ) -> Result<Vec<SearchResult>, AttemptFailure> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        let out = match (queued, &self.responder) {
            (Some(r), _) => r,
            (None, Some(f)) => f(query),
            (None, None) => Ok(Vec::new()),
        };
        out.map(|mut v| {
            v.truncate(limit);
            v
        })
    }

    async fn probe(&self, _timeout: Duration) -> bool {
        if let Ok(mut p) = self.probes.lock() {
            *p += 1;
        }
        self.reachable
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

// ------------------------------------------------------------
// Gateway
// ------------------------------------------------------------

pub struct SearchGateway {
    backend: Arc<dyn SearchBackend>,
    health: Arc<ServiceHealth>,
    policy: RetryPolicy,
    probe_timeout: Duration,
    disabled: AtomicBool,
}

impl SearchGateway {
    pub fn new(backend: Arc<dyn SearchBackend>, health: Arc<ServiceHealth>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            health,
            policy,
            probe_timeout: Duration::from_secs(10),
            disabled: AtomicBool::new(false),
        }
    }

    /// Keep search down for the rest of the run; later refreshes do not probe.
    pub fn disable(&self) {
        self.disabled.store(true, Ordering::SeqCst);
        self.health.mark(Service::Search, false);
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> &Arc<ServiceHealth> {
        &self.health
    }

    pub fn is_available(&self) -> bool {
        self.health.is_available(Service::Search)
    }

    /// Re-probe connectivity and record the answer.
    pub async fn refresh(&self) -> bool {
        if self.is_disabled() {
            return false;
        }
        let ok = self.backend.probe(self.probe_timeout).await;
        self.health.mark(Service::Search, ok);
        ok
    }

    /// Start of a batch: re-probe, then fail fast if still down.
    pub async fn begin_batch(&self) -> Result<(), GatewayError> {
        if self.refresh().await {
            Ok(())
        } else {
            Err(GatewayError::ServiceUnavailable {
                service: Service::Search,
            })
        }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, GatewayError> {
        if !self.is_available() {
            return Err(GatewayError::ServiceUnavailable {
                service: Service::Search,
            });
        }

        let backend = &self.backend;
        match run_with_retry(&self.policy, Service::Search, move |_, timeout| {
            backend.query(query, limit, timeout)
        })
        .await
        {
            Ok(results) => {
                tracing::debug!(target: "gateway", service = "search", hits = results.len(), "search done");
                Ok(results)
            }
            Err(exhausted) => {
                self.health.mark(Service::Search, false);
                tracing::error!(
                    target: "gateway",
                    service = "search",
                    backend = self.backend.name(),
                    attempts = exhausted.attempts,
                    error = %exhausted.last,
                    "search retries exhausted"
                );
                Err(GatewayError::exhausted(Service::Search, exhausted))
            }
        }
    }
}
