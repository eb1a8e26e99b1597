//! Process-level settings, read once at startup from environment variables.
//! Grounded on the teacher's `config/settings.rs::load_settings` — an env
//! var names the config path, with a default, and the path is canonicalized
//! before use.

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "./gateway.yaml";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RELOAD_POLL_SECS: u64 = 5;
/// Default gateway prefix per §6's external interface — every proxied
/// request is mounted at `/<gateway-prefix>/<service-type>/...`.
const DEFAULT_GATEWAY_PREFIX: &str = "piapi";

#[derive(Debug, Clone)]
pub struct Settings {
    pub config_path: PathBuf,
    pub listen_addr: String,
    pub response_timeout: Duration,
    pub reload_poll_interval: Duration,
    pub gateway_prefix: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            config_path: std::env::var("GATEWAY_CONFIG_PATH")
                .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
                .into(),
            listen_addr: std::env::var("GATEWAY_LISTEN_ADDR")
                .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string()),
            response_timeout: Duration::from_secs(
                env_u64("GATEWAY_RESPONSE_TIMEOUT_SECS", DEFAULT_RESPONSE_TIMEOUT_SECS),
            ),
            reload_poll_interval: Duration::from_secs(
                env_u64("GATEWAY_RELOAD_POLL_SECS", DEFAULT_RELOAD_POLL_SECS),
            ),
            gateway_prefix: std::env::var("GATEWAY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_PREFIX.to_string())
                .trim_matches('/')
                .to_string(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
