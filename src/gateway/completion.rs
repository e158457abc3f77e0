//! Completion gateway: backend abstraction + retrying, health-aware wrapper.
//!
//! `CompletionBackend` does exactly one remote call per invocation. The
//! gateway owns the retry policy and the availability flag, so the same
//! wrapper runs over the real DeepSeek backend and over scripted test
//! backends.

use super::{run_with_retry, AttemptFailure, GatewayError, RetryPolicy};
use crate::config::services::ServiceConfig;
use crate::health::{Service, ServiceHealth};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const USER_AGENT: &str = "news-credibility/0.1";
const PROBE_PROMPT: &str = "请简单回复'连接正常'测试连接";

/// One prompt plus sampling knobs. JSON mode is a hint; callers still parse
/// the reply through the cascade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: 0.3,
            max_tokens: 4000,
            json_mode: true,
        }
    }

    pub fn probe() -> Self {
        Self {
            prompt: PROBE_PROMPT.to_string(),
            temperature: 0.3,
            max_tokens: 50,
            json_mode: false,
        }
    }
}

/// Low-level provider: one attempt, no retries, no health bookkeeping.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn send(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<String, AttemptFailure>;
    fn name(&self) -> &'static str;
}

/// Build a backend according to config and environment variables.
///
/// * If `CREDIBILITY_TEST_MODE=mock`, returns a deterministic scripted backend.
/// * Otherwise the DeepSeek (OpenAI-compatible) backend.
pub fn build_completion_backend(cfg: &ServiceConfig) -> Arc<dyn CompletionBackend> {
    if cfg.mock_mode {
        return Arc::new(ScriptedCompletion::canned());
    }
    Arc::new(DeepSeekBackend::from_config(cfg))
}

// ------------------------------------------------------------
// DeepSeek backend
// ------------------------------------------------------------

pub struct DeepSeekBackend {
    api_url: String,
    api_key: String,
    model: String,
}

impl DeepSeekBackend {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_config(cfg: &ServiceConfig) -> Self {
        Self::new(&cfg.completion_url, &cfg.completion_api_key, &cfg.completion_model)
    }
}

#[async_trait]
impl CompletionBackend for DeepSeekBackend {
    async fn send(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<String, AttemptFailure> {
        if self.api_key.trim().is_empty() {
            return Err(AttemptFailure::Misconfigured("DEEPSEEK_API_KEY is not set".into()));
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<ResponseFormat>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        // Fresh client per attempt; a pooled connection that already timed
        // out once is not reused.
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|e| AttemptFailure::Connect(e.to_string()))?;

        let resp = http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| AttemptFailure::from_reqwest(&e, timeout))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptFailure::from_status(status.as_u16()));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| AttemptFailure::from_reqwest(&e, timeout))?;

        match serde_json::from_str::<Resp>(&body) {
            Ok(parsed) => {
                let content = parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .unwrap_or_default();
                if content.trim().is_empty() {
                    Err(AttemptFailure::Malformed("empty completion".into()))
                } else {
                    Ok(content)
                }
            }
            // Not the chat envelope: hand the raw body to the parser cascade.
            Err(_) if !body.trim().is_empty() => Ok(body),
            Err(e) => Err(AttemptFailure::Malformed(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "deepseek"
    }
}

// ------------------------------------------------------------
// Scripted backend (tests / offline demo)
// ------------------------------------------------------------

type Responder = dyn Fn(&str) -> Result<String, AttemptFailure> + Send + Sync;

/// Replays queued results first, then falls back to the responder. With
/// neither, every call fails with HTTP 500.
#[derive(Default)]
pub struct ScriptedCompletion {
    queue: Mutex<VecDeque<Result<String, AttemptFailure>>>,
    responder: Option<Box<Responder>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call returns `reply`.
    pub fn always(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        Self::with_responder(move |_| Ok(reply.clone()))
    }

    /// Every call fails with `failure`.
    pub fn failing(failure: AttemptFailure) -> Self {
        Self::with_responder(move |_| Err(failure.clone()))
    }

    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, AttemptFailure> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(f)),
            ..Self::default()
        }
    }

    /// One reply covering every field the analysis prompts ask for.
    pub fn canned() -> Self {
        Self::always(CANNED_REPLY)
    }

    pub fn push(self, result: Result<String, AttemptFailure>) -> Self {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(result);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedCompletion {
    async fn send(
        &self,
        request: &CompletionRequest,
        _timeout: Duration,
    ) -> Result<String, AttemptFailure> {
        if let Ok(mut p) = self.prompts.lock() {
            p.push(request.prompt.clone());
        }
        let queued = self.queue.lock().ok().and_then(|mut q| q.pop_front());
        match (queued, &self.responder) {
            (Some(r), _) => r,
            (None, Some(f)) => f(&request.prompt),
            (None, None) => Err(AttemptFailure::Status(500)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

const CANNED_REPLY: &str = r#"{
  "总体评分": 0.7,
  "各大类评分": {"内容真实性": 0.7, "信息准确性": 0.7, "来源可靠性": 0.65, "语言客观性": 0.75, "逻辑连贯性": 0.8, "引用质量": 0.6},
  "细分点评分": {},
  "AI生成内容": {"表达模式": 0.7, "词汇多样性": 0.7, "句子变化": 0.7, "上下文连贯性": 0.7, "人类特征": 0.7, "分析": "mock"},
  "语言中立性": {"情感词汇": 0.75, "情感平衡": 0.75, "极端表述": 0.75, "煽动性表达": 0.75, "主观评价": 0.75, "分析": "mock"},
  "详细分析": "mock analysis",
  "可信度判断的疑点": [],
  "keywords": ["mock"],
  "truthfulness": 0.7,
  "authority": 0.6,
  "rationale": "mock",
  "验证点": [],
  "评分": 0.7,
  "结论": "mock"
}"#;

// ------------------------------------------------------------
// Gateway
// ------------------------------------------------------------

pub struct CompletionGateway {
    backend: Arc<dyn CompletionBackend>,
    health: Arc<ServiceHealth>,
    policy: RetryPolicy,
    probe_timeout: Duration,
}

impl CompletionGateway {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        health: Arc<ServiceHealth>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            health,
            policy,
            probe_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn health(&self) -> &Arc<ServiceHealth> {
        &self.health
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn is_available(&self) -> bool {
        self.health.is_available(Service::Completion)
    }

    /// Complete with default sampling (temperature 0.3, 4000 tokens, JSON hint).
    pub async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        self.complete_with(&CompletionRequest::new(prompt)).await
    }

    pub async fn complete_with(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        if !self.is_available() {
            return Err(GatewayError::ServiceUnavailable {
                service: Service::Completion,
            });
        }

        let backend = &self.backend;
        match run_with_retry(&self.policy, Service::Completion, move |_, timeout| {
            backend.send(request, timeout)
        })
        .await
        {
            Ok(text) => Ok(text),
            Err(exhausted) => {
                self.health.mark(Service::Completion, false);
                tracing::error!(
                    target: "gateway",
                    service = "completion",
                    backend = self.backend.name(),
                    attempts = exhausted.attempts,
                    error = %exhausted.last,
                    "completion retries exhausted"
                );
                Err(GatewayError::exhausted(Service::Completion, exhausted))
            }
        }
    }

    /// Single cheap request; the only path that can set the flag back to true.
    pub async fn probe(&self) -> bool {
        let req = CompletionRequest::probe();
        let ok = match tokio::time::timeout(self.probe_timeout, self.backend.send(&req, self.probe_timeout)).await {
            Ok(Ok(text)) => !text.trim().is_empty(),
            Ok(Err(e)) => {
                tracing::warn!(target: "gateway", service = "completion", error = %e, "probe failed");
                false
            }
            Err(_) => {
                tracing::warn!(target: "gateway", service = "completion", "probe timed out");
                false
            }
        };
        self.health.mark(Service::Completion, ok);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_millis(50)).with_backoff_unit(Duration::from_millis(1))
    }

    fn gateway(backend: ScriptedCompletion, available: bool) -> (CompletionGateway, Arc<ScriptedCompletion>) {
        let backend = Arc::new(backend);
        let health = Arc::new(ServiceHealth::new(available, true));
        let gw = CompletionGateway::new(backend.clone(), health, fast_policy());
        (gw, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_flag_fails_fast_without_network() {
        let (gw, backend) = gateway(ScriptedCompletion::always("{}"), false);
        let err = gw.complete("hi").await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::ServiceUnavailable {
                service: Service::Completion
            }
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_flip_the_flag() {
        let (gw, backend) = gateway(ScriptedCompletion::failing(AttemptFailure::Status(500)), true);
        let err = gw.complete("hi").await.unwrap_err();
        match err {
            GatewayError::ServiceError { attempts, cause, .. } => {
                assert_eq!(attempts, 4);
                assert_eq!(cause, AttemptFailure::Status(500));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.calls(), 4);
        assert!(!gw.is_available());

        // Flag stays down; next call makes no attempt.
        let again = gw.complete("hi").await.unwrap_err();
        assert!(matches!(again, GatewayError::ServiceUnavailable { .. }));
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let scripted = ScriptedCompletion::always("ok")
            .push(Err(AttemptFailure::RateLimited))
            .push(Err(AttemptFailure::Connect("reset".into())));
        let (gw, backend) = gateway(scripted, true);
        assert_eq!(gw.complete("hi").await.unwrap(), "ok");
        assert_eq!(backend.calls(), 3);
        assert!(gw.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_restores_flag() {
        let (gw, _) = gateway(ScriptedCompletion::always("连接正常"), false);
        assert!(!gw.is_available());
        assert!(gw.probe().await);
        assert!(gw.is_available());
        assert!(gw.health().last_checked(Service::Completion).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_marks_down() {
        let (gw, _) = gateway(ScriptedCompletion::failing(AttemptFailure::Status(401)), true);
        assert!(!gw.probe().await);
        assert!(!gw.is_available());
    }

    #[tokio::test]
    async fn missing_api_key_is_not_retried() {
        let backend = DeepSeekBackend::new("http://127.0.0.1:9", "", "deepseek-chat");
        let err = backend
            .send(&CompletionRequest::new("x"), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AttemptFailure::Misconfigured(_)));
    }

    #[test]
    fn probe_request_is_small() {
        let r = CompletionRequest::probe();
        assert_eq!(r.max_tokens, 50);
        assert!(!r.json_mode);
    }
}
