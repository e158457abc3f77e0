//! Counter names and thin recording helpers.
//!
//! No exporter is installed here; when the embedding process installs a
//! `metrics` recorder the series show up, otherwise the calls are no-ops.

use crate::health::Service;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

pub const COMPLETION_ATTEMPTS: &str = "completion_attempts_total";
pub const COMPLETION_FAILURES: &str = "completion_failures_total";
pub const SEARCH_ATTEMPTS: &str = "search_attempts_total";
pub const SEARCH_FAILURES: &str = "search_failures_total";
pub const PARSE_DEGRADED: &str = "parse_degraded_total";
pub const DIMENSION_ABSENT: &str = "dimension_absent_total";

/// One-time metrics registration.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(COMPLETION_ATTEMPTS, "Completion requests attempted.");
        describe_counter!(COMPLETION_FAILURES, "Completion attempts that failed.");
        describe_counter!(SEARCH_ATTEMPTS, "Search requests attempted.");
        describe_counter!(SEARCH_FAILURES, "Search attempts that failed.");
        describe_counter!(
            PARSE_DEGRADED,
            "Completion responses parsed by a fallback strategy."
        );
        describe_counter!(
            DIMENSION_ABSENT,
            "Dimensions that produced no score for a request."
        );
    });
}

pub(crate) fn record_attempt(service: Service) {
    ensure_described();
    match service {
        Service::Completion => counter!(COMPLETION_ATTEMPTS).increment(1),
        Service::Search => counter!(SEARCH_ATTEMPTS).increment(1),
    }
}

pub(crate) fn record_attempt_failure(service: Service) {
    match service {
        Service::Completion => counter!(COMPLETION_FAILURES).increment(1),
        Service::Search => counter!(SEARCH_FAILURES).increment(1),
    }
}

pub(crate) fn record_parse_degraded(strategy: &'static str) {
    ensure_described();
    counter!(PARSE_DEGRADED, "strategy" => strategy).increment(1);
}

pub(crate) fn record_dimension_absent(dimension: &'static str) {
    ensure_described();
    counter!(DIMENSION_ABSENT, "dimension" => dimension).increment(1);
}
