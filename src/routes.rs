//! HTTP surface wiring: the catch-all proxy route plus the liveness probe.
//! Grounded on `routes/http.rs::configure_route` (payload limits, catch-all
//! `/{tail:.*}` resource) and `routes/health.rs` for the probe shape.
//!
//! Per §6, every proxied request is mounted under a fixed gateway prefix
//! (`/<gateway-prefix>/<service-type>/...`, default `piapi`) rather than at
//! the application root; `/healthz` stays unprefixed since it is a plain
//! liveness probe, not part of the proxy contract.

use crate::app::AppState;
use crate::models::error::GatewayError;
use actix_web::{web, HttpRequest, HttpResponse};

const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn configure(gateway_prefix: &str) -> impl Fn(&mut web::ServiceConfig) + Clone + 'static {
    let scope_path = format!("/{}", gateway_prefix.trim_matches('/'));
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES));
        cfg.route("/healthz", web::get().to(healthz));
        cfg.service(
            web::scope(&scope_path).service(
                web::resource("/{service_type}/{tail:.*}").route(web::route().to(proxy_request)),
            ),
        );
    }
}

async fn healthz(state: web::Data<AppState>) -> HttpResponse {
    let status = state.config_manager.process_status();
    HttpResponse::Ok().json(status)
}

async fn proxy_request(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Bytes,
) -> Result<HttpResponse, GatewayError> {
    let (service_type, tail) = path.into_inner();
    let token = extract_token(&req)?;

    let (graph, route) = state.config_manager.resolve(&token, &service_type)?;

    state
        .proxy_client
        .dispatch(
            &state.config_manager,
            &graph,
            &route,
            req.method(),
            &tail,
            req.query_string(),
            req.headers(),
            body,
        )
        .await
}

/// Extracts the caller's gateway token from the inbound `Authorization`
/// header, accepting both a bare token and a `Bearer <token>` form.
fn extract_token(req: &HttpRequest) -> Result<String, GatewayError> {
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .ok_or(GatewayError::TokenRequired)?;
    let raw = header.to_str().map_err(|_| GatewayError::TokenRequired)?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();
    if token.is_empty() {
        return Err(GatewayError::TokenRequired);
    }
    Ok(token.to_string())
}
