//! Owns the single installed [`Graph`] and brokers every read/write against
//! it. Readers never block on the file system or the health tracker; they
//! only ever clone an `Arc` under a read lock, matching the teacher's
//! `ConfigWatcher` discipline (§4.2).

use crate::health::Outcome;
use crate::models::error::GatewayError;
use crate::models::graph::{CandidateRuntimeStatus, Graph};
use crate::router;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub struct ConfigManager {
    current: RwLock<Option<Arc<Graph>>>,
    version: AtomicU64,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            version: AtomicU64::new(0),
        }
    }

    /// Parses and validates `text`, then installs it as the current graph in
    /// a single write-lock acquisition. On failure the previously installed
    /// graph, if any, is left untouched.
    pub fn load(&self, text: &str) -> Result<u64, GatewayError> {
        let graph = crate::config::parser::parse_and_validate(text)?;
        let mut guard = self.current.write().unwrap();
        *guard = Some(Arc::new(graph));
        drop(guard);
        Ok(self.version.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }

    /// Clones the installed graph's `Arc` under a brief read lock.
    pub fn current(&self) -> Result<Arc<Graph>, GatewayError> {
        self.current
            .read()
            .unwrap()
            .clone()
            .ok_or(GatewayError::ConfigNotLoaded)
    }

    /// Resolves a caller token and service-type into a dispatchable [`Route`],
    /// returning the [`Arc<Graph>`] it was resolved against so the caller can
    /// later report the outcome against the exact same installed graph.
    pub fn resolve(
        &self,
        token: &str,
        service_type: &str,
    ) -> Result<(Arc<Graph>, crate::models::graph::Route), GatewayError> {
        let graph = self.current()?;
        let route = router::resolve(&graph, token, service_type)?;
        Ok((graph, route))
    }

    /// Reports the outcome of a dispatched request against the graph it was
    /// resolved from. Never touches the `RwLock` — only the atomics on the
    /// matched candidate's [`CandidateHealth`] move.
    pub fn report_outcome(
        &self,
        graph: &Graph,
        token: &str,
        service_type: &str,
        provider_name: &str,
        key_name: &str,
        outcome: Outcome,
    ) {
        crate::health::report_outcome(graph, token, service_type, provider_name, key_name, outcome);
    }

    pub fn list_service_types(&self) -> Vec<String> {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .map(|g| g.service_types())
            .unwrap_or_default()
    }

    /// Process-level summary used by the liveness probe — distinct from the
    /// per-candidate `runtime_status` operation below.
    pub fn process_status(&self) -> ProcessStatus {
        let guard = self.current.read().unwrap();
        ProcessStatus {
            loaded: guard.is_some(),
            version: self.version(),
            provider_count: guard.as_ref().map(|g| g.providers.len()).unwrap_or(0),
            user_count: guard.as_ref().map(|g| g.users.len()).unwrap_or(0),
        }
    }

    /// §4.2's `runtime_status(token, service-type)` operation: the health
    /// snapshot of every candidate on one user's route, in declared order.
    pub fn runtime_status(
        &self,
        token: &str,
        service_type: &str,
    ) -> Result<Vec<CandidateStatusEntry>, GatewayError> {
        let graph = self.current()?;
        let user = graph.user_by_token(token).ok_or(GatewayError::UserNotFound)?;
        let route = user
            .service_routes
            .get(service_type)
            .ok_or_else(|| GatewayError::ServiceNotFound {
                display_name: user.display_name.clone(),
                service_type: service_type.to_string(),
            })?;

        Ok(route
            .candidates
            .iter()
            .map(|candidate| CandidateStatusEntry {
                provider_name: candidate.provider_name.clone(),
                key_name: candidate.key_name.clone(),
                enabled: candidate.enabled,
                weight: candidate.weight,
                health: candidate.health.snapshot(),
            })
            .collect())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessStatus {
    pub loaded: bool,
    pub version: u64,
    pub provider_count: usize,
    pub user_count: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CandidateStatusEntry {
    pub provider_name: String,
    pub key_name: String,
    pub enabled: bool,
    pub weight: u32,
    pub health: CandidateRuntimeStatus,
}
