//! Health Tracker: classifies proxy outcomes and updates the atomic state on
//! the matched candidate. Grounded on the teacher's `CircuitBreaker` atomic
//! discipline (`services/circuit_breaker.rs`) — state only ever moves through
//! relaxed atomic stores, with a single lock reserved for the rarely-written
//! compound fields (`last_error`, the smoothing bookkeeping).

use crate::models::graph::{now_ms, Graph};

/// Default quarantine window applied after a failure.
const DEFAULT_QUARANTINE_SECS: i64 = 30;
/// Quarantine window applied after a 502/503 specifically — raised above
/// the default since these most often mean the upstream is mid-restart and
/// needs longer than usual to come back.
const BAD_GATEWAY_QUARANTINE_SECS: i64 = 60;
/// Half-life of the exponentially-weighted error rate used for
/// observability; does not affect quarantine decisions directly.
const SMOOTHING_HALF_LIFE_SECS: f64 = 60.0;

/// The result of one proxied request, as observed by the Proxy Layer.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The upstream returned a response with this HTTP status.
    Status(u16),
    /// The request never reached the upstream, or the connection failed
    /// before a status line was read.
    TransportError(String),
}

impl Outcome {
    fn is_failure(&self) -> bool {
        match self {
            Outcome::Status(code) => *code >= 500,
            Outcome::TransportError(_) => true,
        }
    }

    fn quarantine_secs(&self) -> i64 {
        match self {
            Outcome::Status(502) | Outcome::Status(503) => BAD_GATEWAY_QUARANTINE_SECS,
            _ => DEFAULT_QUARANTINE_SECS,
        }
    }

    fn status_for_record(&self) -> i64 {
        match self {
            Outcome::Status(code) => *code as i64,
            Outcome::TransportError(_) => -1,
        }
    }

    fn message(&self) -> String {
        match self {
            Outcome::Status(code) => format!("upstream responded with status {code}"),
            Outcome::TransportError(detail) => detail.clone(),
        }
    }
}

/// Updates the matched candidate's health state in place. A no-op (with a
/// warning log) if the candidate no longer exists in `graph` — this can
/// happen if a reload removed it between dispatch and outcome reporting.
pub fn report_outcome(
    graph: &Graph,
    token: &str,
    service_type: &str,
    provider_name: &str,
    key_name: &str,
    outcome: Outcome,
) {
    let health = match graph.find_candidate_health(token, service_type, provider_name, key_name) {
        Some(health) => health,
        None => {
            log::warn!(
                "dropping outcome for {provider_name}/{key_name} (service \"{service_type}\"): \
                 candidate no longer present in the installed configuration"
            );
            return;
        }
    };

    health.record_request(outcome.status_for_record());

    if outcome.is_failure() {
        health.record_error();
        health.set_last_error(outcome.message());
        health.quarantine_until(now_ms() + outcome.quarantine_secs() * 1000);
    } else {
        health.clear_last_error();
        health.clear_quarantine();
    }

    health.update_smoothed(outcome.is_failure(), SMOOTHING_HALF_LIFE_SECS);
}
