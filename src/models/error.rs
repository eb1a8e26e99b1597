//! Error taxonomy for the gateway, mapped to the HTTP responses callers see.

use actix_web::{HttpResponse, http::StatusCode};
use serde_json::json;

/// Errors raised while decoding and validating a configuration document.
///
/// Pure data: the parser never touches I/O, so every variant already carries
/// enough context to explain *where* in the document validation failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("provider[{index}]: {reason}")]
    Provider { index: usize, reason: String },

    #[error("provider[{provider_index}].named_keys[{key_index}]: {reason}")]
    NamedKey {
        provider_index: usize,
        key_index: usize,
        reason: String,
    },

    #[error("provider[{provider_index}].services[{service_index}]: {reason}")]
    Service {
        provider_index: usize,
        service_index: usize,
        reason: String,
    },

    #[error("user[{index}]: {reason}")]
    User { index: usize, reason: String },

    #[error("user[{user_index}].service_routes[\"{service_type}\"]: {reason}")]
    ServiceRoute {
        user_index: usize,
        service_type: String,
        reason: String,
    },

    #[error(
        "user[{user_index}].service_routes[\"{service_type}\"].candidates[{candidate_index}]: {reason}"
    )]
    Candidate {
        user_index: usize,
        service_type: String,
        candidate_index: usize,
        reason: String,
    },

    #[error("document: {0}")]
    Decode(String),
}

/// Gateway error kinds, each mapped to exactly one caller-visible HTTP status
/// per the error table. Internal detail is carried in the `Display` text and
/// logged; it is never echoed verbatim in the JSON body beyond what the table
/// allows.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("a caller token is required")]
    TokenRequired,

    #[error("a service-type path segment is required")]
    ServiceTypeRequired,

    #[error("no configuration has been loaded")]
    ConfigNotLoaded,

    #[error("unknown user token")]
    UserNotFound,

    #[error("user {display_name} has no route for service-type \"{service_type}\"")]
    ServiceNotFound {
        display_name: String,
        service_type: String,
    },

    #[error("no eligible upstream candidate for service-type \"{service_type}\"")]
    NoActiveUpstream { service_type: String },

    #[error("configuration rejected: {0}")]
    Malformed(#[from] ConfigError),

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("invalid upstream base URL: {0}")]
    InvalidUpstreamUrl(String),
}

impl GatewayError {
    /// The status code this error maps to when surfaced to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::TokenRequired | GatewayError::ServiceTypeRequired => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::ConfigNotLoaded => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UserNotFound => StatusCode::UNAUTHORIZED,
            GatewayError::ServiceNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::NoActiveUpstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Malformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            GatewayError::InvalidUpstreamUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            GatewayError::TokenRequired => "token_required",
            GatewayError::ServiceTypeRequired => "service_type_required",
            GatewayError::ConfigNotLoaded => "config_not_loaded",
            GatewayError::UserNotFound => "user_not_found",
            GatewayError::ServiceNotFound { .. } => "service_not_found",
            GatewayError::NoActiveUpstream { .. } => "no_active_upstream",
            GatewayError::Malformed(_) => "malformed_config",
            GatewayError::UpstreamTransport(_) => "upstream_transport",
            GatewayError::InvalidUpstreamUrl(_) => "invalid_upstream_url",
        }
    }
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        GatewayError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string(),
            "type": self.kind(),
        }))
    }
}
