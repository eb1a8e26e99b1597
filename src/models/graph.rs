//! The validated, installed configuration graph and its runtime state.
//!
//! A [`Graph`] is produced once by [`crate::config::parser::parse_and_validate`]
//! and then owned exclusively by the [`crate::config::manager::ConfigManager`].
//! Everything here is either immutable after construction (topology) or
//! lock-free/atomic (per-candidate health), matching the concurrency
//! discipline the circuit breaker in the teacher crate establishes.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

/// Process-wide monotonic origin. All candidate timestamps are milliseconds
/// elapsed since this instant, so they fit in a lock-free `AtomicI64` without
/// depending on wall-clock stability.
static CLOCK_ORIGIN: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds elapsed since the process started monitoring candidates.
pub fn now_ms() -> i64 {
    CLOCK_ORIGIN.elapsed().as_millis() as i64
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Header { name: String, prefix: String },
    Query { name: String },
}

impl Default for Auth {
    fn default() -> Self {
        Auth::Header {
            name: "Authorization".to_string(),
            prefix: "Bearer ".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Service {
    pub service_type: String,
    pub base_url: String,
    pub auth: Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin,
    WeightedRoundRobin,
    AdaptiveRoundRobin,
    StickyHealthy,
}

/// Smoothed (exponentially weighted) error rate bookkeeping for one candidate.
/// Guarded by a single lock since `last_update_ms`, `failures`, and `samples`
/// always move together — there is no benefit to splitting them into
/// independent atomics, unlike the monotonic counters below.
#[derive(Debug)]
struct SmoothedState {
    last_update_ms: i64,
    failures: f64,
    samples: f64,
}

impl Default for SmoothedState {
    fn default() -> Self {
        Self {
            last_update_ms: now_ms(),
            failures: 0.0,
            samples: 0.0,
        }
    }
}

/// Runtime, non-serialized health state attached to one candidate in one
/// installed [`Graph`]. Reset whenever the graph is replaced — this is
/// intentional (§3 Lifecycle).
#[derive(Debug)]
pub struct CandidateHealth {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    last_status: AtomicI64,
    last_updated_ms: AtomicI64,
    unhealthy_until_ms: AtomicI64,
    last_error: RwLock<String>,
    smoothed_rate_bits: AtomicU64,
    smoothed: RwLock<SmoothedState>,
}

impl Default for CandidateHealth {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            last_status: AtomicI64::new(0),
            last_updated_ms: AtomicI64::new(0),
            unhealthy_until_ms: AtomicI64::new(0),
            last_error: RwLock::new(String::new()),
            smoothed_rate_bits: AtomicU64::new(0.0f64.to_bits()),
            smoothed: RwLock::new(SmoothedState::default()),
        }
    }
}

impl CandidateHealth {
    pub fn is_eligible(&self) -> bool {
        let until = self.unhealthy_until_ms.load(Ordering::Relaxed);
        until == 0 || until <= now_ms()
    }

    pub fn quarantine_until(&self, until_ms: i64) {
        self.unhealthy_until_ms.store(until_ms, Ordering::Relaxed);
    }

    pub fn clear_quarantine(&self) {
        self.unhealthy_until_ms.store(0, Ordering::Relaxed);
    }

    pub fn record_request(&self, status: i64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.last_status.store(status, Ordering::Relaxed);
        self.last_updated_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_last_error(&self, message: String) {
        *self.last_error.write().unwrap() = message;
    }

    pub fn clear_last_error(&self) {
        self.last_error.write().unwrap().clear();
    }

    pub fn smoothed_error_rate(&self) -> f64 {
        f64::from_bits(self.smoothed_rate_bits.load(Ordering::Relaxed))
    }

    /// Updates the exponentially-weighted failure rate with a half-life of
    /// `half_life_secs`, then caches the result for lock-free reads.
    pub fn update_smoothed(&self, failed: bool, half_life_secs: f64) {
        let mut state = self.smoothed.write().unwrap();
        let now = now_ms();
        let dt_secs = ((now - state.last_update_ms).max(0) as f64) / 1000.0;
        let tau = half_life_secs / std::f64::consts::LN_2;
        let decay = if tau > 0.0 {
            (-dt_secs / tau).exp()
        } else {
            0.0
        };
        state.failures *= decay;
        state.samples *= decay;
        state.samples += 1.0;
        if failed {
            state.failures += 1.0;
        }
        state.last_update_ms = now;

        let rate = if state.samples > 0.0 {
            (state.failures / state.samples).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.smoothed_rate_bits
            .store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CandidateRuntimeStatus {
        CandidateRuntimeStatus {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            last_status: self.last_status.load(Ordering::Relaxed),
            last_updated_ms: self.last_updated_ms.load(Ordering::Relaxed),
            unhealthy_until_ms: self.unhealthy_until_ms.load(Ordering::Relaxed),
            last_error: self.last_error.read().unwrap().clone(),
            smoothed_error_rate: self.smoothed_error_rate(),
        }
    }
}

/// Observability snapshot of one candidate's runtime state at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CandidateRuntimeStatus {
    pub total_requests: u64,
    pub total_errors: u64,
    pub last_status: i64,
    pub last_updated_ms: i64,
    pub unhealthy_until_ms: i64,
    pub last_error: String,
    pub smoothed_error_rate: f64,
}

#[derive(Debug)]
pub struct Candidate {
    pub provider_name: String,
    pub key_name: String,
    pub weight: u32,
    pub enabled: bool,
    pub tags: Vec<String>,
    pub health: CandidateHealth,
}

impl Candidate {
    pub fn is_eligible(&self) -> bool {
        self.enabled && self.health.is_eligible()
    }
}

/// Scheduler cursor state for one aggregated route. Lives alongside the
/// route's candidates for the lifetime of the installed graph and is reset
/// on reload along with candidate health, matching §9's design note.
#[derive(Debug, Default)]
pub struct SchedulerState {
    pub round_robin_cursor: AtomicU64,
    pub sticky_index: AtomicU64,
    pub sticky_set: std::sync::atomic::AtomicBool,
}

#[derive(Debug)]
pub struct UserServiceRoute {
    pub strategy: Strategy,
    pub candidates: Vec<Candidate>,
    pub scheduler_state: SchedulerState,
}

#[derive(Debug)]
pub struct User {
    pub display_name: String,
    pub token: String,
    pub service_routes: HashMap<String, UserServiceRoute>,
}

#[derive(Debug)]
pub struct Provider {
    pub name: String,
    pub named_keys: HashMap<String, String>,
    pub services: Vec<Service>,
}

impl Provider {
    pub fn service(&self, service_type: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.service_type == service_type)
    }
}

/// The fully validated, installed configuration. Immutable topology; mutable
/// only through the atomics embedded in each [`Candidate`]'s
/// [`CandidateHealth`] and each route's [`SchedulerState`].
#[derive(Debug)]
pub struct Graph {
    pub providers: Vec<Provider>,
    pub users: Vec<User>,
    provider_index: HashMap<String, usize>,
    user_token_index: HashMap<String, usize>,
}

impl Graph {
    pub fn new(providers: Vec<Provider>, users: Vec<User>) -> Self {
        let provider_index = providers
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        let user_token_index = users
            .iter()
            .enumerate()
            .map(|(i, u)| (u.token.clone(), i))
            .collect();
        Self {
            providers,
            users,
            provider_index,
            user_token_index,
        }
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.provider_index.get(name).map(|&i| &self.providers[i])
    }

    pub fn user_by_token(&self, token: &str) -> Option<&User> {
        self.user_token_index.get(token).map(|&i| &self.users[i])
    }

    pub fn service_types(&self) -> Vec<String> {
        let mut set: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for provider in &self.providers {
            for service in &provider.services {
                set.insert(service.service_type.clone());
            }
        }
        set.into_iter().collect()
    }

    /// Locates a candidate's health by exact `(provider-name, key-name)`
    /// tuple within a given user/service-type route, per §4.2's
    /// outcome-reporting contract (identity is never by index).
    pub fn find_candidate_health(
        &self,
        token: &str,
        service_type: &str,
        provider_name: &str,
        key_name: &str,
    ) -> Option<&CandidateHealth> {
        let user = self.user_by_token(token)?;
        let route = user.service_routes.get(service_type)?;
        route
            .candidates
            .iter()
            .find(|c| c.provider_name == provider_name && c.key_name == key_name)
            .map(|c| &c.health)
    }
}

/// A resolved dispatch decision: which upstream, with which credential.
/// Transient — discarded once the request finishes.
#[derive(Debug, Clone)]
pub struct Route {
    pub user_display_name: String,
    pub user_token: String,
    pub provider_name: String,
    pub service: Service,
    pub key_name: String,
    pub key_value: String,
}
