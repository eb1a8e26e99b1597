//! Shared application state handed to every actix-web worker thread.

use crate::config::ConfigManager;
use crate::proxy::ProxyClient;
use std::sync::Arc;

pub struct AppState {
    pub config_manager: Arc<ConfigManager>,
    pub proxy_client: ProxyClient,
}
