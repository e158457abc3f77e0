// src/bootstrap.rs
use crate::config::ServiceConfig;
use crate::gateway::{
    build_completion_backend, build_search_backend, CompletionGateway, RetryPolicy, SearchGateway,
};
use crate::health::{Service, ServiceHealth, ServiceStatus};
use std::sync::Arc;
use tracing::{info, warn};

/// Which gateways may touch the network for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toggles {
    /// `--no-ai`: completion stays unavailable.
    pub no_completion: bool,
    /// `--offline`: both services stay unavailable.
    pub offline: bool,
}

/// Gateways sharing one `ServiceHealth`.
pub struct ServiceRuntime {
    pub cfg: ServiceConfig,
    pub health: Arc<ServiceHealth>,
    pub completion: Arc<CompletionGateway>,
    pub search: Arc<SearchGateway>,
    toggles: Toggles,
}

impl ServiceRuntime {
    pub fn new(cfg: ServiceConfig, toggles: Toggles) -> Self {
        // Safe diagnostics: only endpoints, mode and key length
        info!(
            target: "bootstrap",
            completion_url = %cfg.completion_url,
            search_url = %cfg.search_url,
            public_search = cfg.use_public_search,
            mock = cfg.mock_mode,
            key_len = cfg.completion_api_key.len(),
            "service config loaded"
        );
        let health = Arc::new(ServiceHealth::unknown());
        let completion = Arc::new(CompletionGateway::new(
            build_completion_backend(&cfg),
            health.clone(),
            RetryPolicy::completion_default().with_base_timeout(cfg.completion_base_timeout),
        ));
        let search = Arc::new(SearchGateway::new(
            build_search_backend(&cfg),
            health.clone(),
            RetryPolicy::search_default().with_base_timeout(cfg.search_base_timeout),
        ));
        Self {
            cfg,
            health,
            completion,
            search,
            toggles,
        }
    }

    /// Probe both services and set the flags. Disabled services are marked
    /// unavailable without a probe.
    pub async fn probe_services(&self) -> Vec<ServiceStatus> {
        let completion_off = self.toggles.offline || self.toggles.no_completion;
        if completion_off {
            self.health.mark(Service::Completion, false);
            info!(target: "bootstrap", "completion service disabled");
        } else if !self.cfg.has_completion_key() {
            self.health.mark(Service::Completion, false);
            warn!(target: "bootstrap", "DEEPSEEK_API_KEY not set; completion service unavailable");
        }

        let probe_completion = async {
            if !completion_off && self.cfg.has_completion_key() {
                self.completion.probe().await;
            }
        };
        let probe_search = async {
            if self.toggles.offline {
                self.search.disable();
                info!(target: "bootstrap", "search service disabled");
            } else {
                self.search.refresh().await;
            }
        };
        tokio::join!(probe_completion, probe_search);

        let status = self.health.snapshot();
        for s in &status {
            if s.available {
                info!(target: "bootstrap", service = %s.service, "service available");
            } else {
                warn!(target: "bootstrap", service = %s.service, "service unavailable");
            }
        }
        status
    }
}
