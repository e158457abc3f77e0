//! Shared availability state for the two external services.
//!
//! `ServiceHealth` is created once per process (or per test) and handed to the
//! gateways as `Arc<ServiceHealth>`. Each service has one atomic flag plus the
//! unix-millis timestamp of the last time somebody wrote it. Reads and writes
//! are independent; a stale read costs at most one wasted attempt.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// External services tracked by `ServiceHealth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Completion,
    Search,
}

impl Service {
    pub fn as_str(self) -> &'static str {
        match self {
            Service::Completion => "completion",
            Service::Search => "search",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct Flag {
    available: AtomicBool,
    /// 0 = never checked.
    checked_at_ms: AtomicI64,
}

impl Flag {
    fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
            checked_at_ms: AtomicI64::new(0),
        }
    }
}

#[derive(Debug)]
pub struct ServiceHealth {
    completion: Flag,
    search: Flag,
}

/// Point-in-time copy of one flag, for reports and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: Service,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl ServiceHealth {
    /// Both flags start with the given values and no timestamp.
    pub fn new(completion: bool, search: bool) -> Self {
        Self {
            completion: Flag::new(completion),
            search: Flag::new(search),
        }
    }

    /// Everything down until a probe says otherwise.
    pub fn unknown() -> Self {
        Self::new(false, false)
    }

    fn flag(&self, service: Service) -> &Flag {
        match service {
            Service::Completion => &self.completion,
            Service::Search => &self.search,
        }
    }

    pub fn is_available(&self, service: Service) -> bool {
        self.flag(service).available.load(Ordering::Acquire)
    }

    /// Write the flag and stamp it with the current time.
    pub fn mark(&self, service: Service, available: bool) {
        let flag = self.flag(service);
        let prev = flag.available.swap(available, Ordering::AcqRel);
        flag.checked_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        if prev != available {
            if available {
                tracing::info!(target: "health", service = %service, "service marked available");
            } else {
                tracing::warn!(target: "health", service = %service, "service marked unavailable");
            }
        }
    }

    pub fn last_checked(&self, service: Service) -> Option<DateTime<Utc>> {
        match self.flag(service).checked_at_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn status(&self, service: Service) -> ServiceStatus {
        ServiceStatus {
            service,
            available: self.is_available(service),
            checked_at: self.last_checked(service),
        }
    }

    pub fn snapshot(&self) -> Vec<ServiceStatus> {
        vec![
            self.status(Service::Completion),
            self.status(Service::Search),
        ]
    }
}

impl Default for ServiceHealth {
    fn default() -> Self {
        Self::unknown()
    }
}
