//! Proxy Layer: builds the outbound request for a resolved [`Route`],
//! injects the upstream credential, dispatches it, and streams the response
//! back without letting a request-side timeout cut off a long-lived
//! response body.
//!
//! Grounded on the teacher's `services/http.rs::RouteHandler`: one
//! `reqwest::Client` built once with connection pooling knobs, a hop-by-hop
//! header skip-list, and a catch-all route shape.

use crate::health::Outcome;
use crate::models::error::GatewayError;
use crate::models::graph::{Auth, Graph, Route};
use actix_web::http::Method as ActixMethod;
use actix_web::web::Bytes;
use actix_web::{http::header::HeaderMap as ActixHeaderMap, HttpResponse};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap as ReqwestHeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Request headers that are never forwarded upstream: connection-management
/// headers that are meaningless across a hop, plus `authorization` and
/// `content-length`, which the proxy always recomputes itself.
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "connection",
    "upgrade",
    "proxy-connection",
    "authorization",
    "content-length",
];

/// Response headers that describe the hop-by-hop framing of the upstream
/// connection rather than the payload, and so are not copied onto the
/// response actix sends back to the caller.
const SKIPPED_RESPONSE_HEADERS: &[&str] = &["connection", "transfer-encoding", "content-length"];

pub struct ProxyClient {
    client: reqwest::Client,
    response_timeout: Duration,
}

impl ProxyClient {
    /// `response_timeout` bounds only the wait for the upstream's response
    /// headers; once headers arrive the body is streamed with no further
    /// deadline (REDESIGN FLAG: a long-lived streaming response must not be
    /// cut off by a request-shaped timeout).
    pub fn new(response_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("static reqwest client configuration must be valid");
        Self {
            client,
            response_timeout,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn dispatch(
        &self,
        manager: &crate::config::ConfigManager,
        graph: &Graph,
        route: &Route,
        method: &ActixMethod,
        tail: &str,
        query_string: &str,
        inbound_headers: &ActixHeaderMap,
        body: Bytes,
    ) -> Result<HttpResponse, GatewayError> {
        let service_type = route.service.service_type.clone();
        let report = |outcome: Outcome| {
            manager.report_outcome(
                graph,
                &route.user_token,
                &service_type,
                &route.provider_name,
                &route.key_name,
                outcome,
            )
        };

        let url = match build_url(route, tail, query_string) {
            Ok(url) => url,
            Err(err) => return Err(err),
        };
        let reqwest_method = convert_method(method)?;
        let headers = match build_request_headers(route, inbound_headers) {
            Ok(headers) => headers,
            Err(err) => return Err(err),
        };

        let request = self
            .client
            .request(reqwest_method, url)
            .headers(headers)
            .body(body);

        let sent = tokio::time::timeout(self.response_timeout, request.send()).await;
        let response = match sent {
            Err(_) => {
                report(Outcome::TransportError("upstream response timed out".to_string()));
                return Err(GatewayError::UpstreamTransport(
                    "upstream response timed out".to_string(),
                ));
            }
            Ok(Err(err)) => {
                report(Outcome::TransportError(err.to_string()));
                return Err(GatewayError::UpstreamTransport(err.to_string()));
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        report(Outcome::Status(status.as_u16()));

        let mut builder = HttpResponse::build(
            actix_web::http::StatusCode::from_u16(status.as_u16())
                .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
        );
        for (name, value) in response.headers() {
            if SKIPPED_RESPONSE_HEADERS.contains(&name.as_str()) {
                continue;
            }
            builder.insert_header((name.as_str(), value.as_bytes()));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| actix_web::error::PayloadError::Io(std::io::Error::other(e))));

        Ok(builder.streaming(stream))
    }
}

fn build_url(route: &Route, tail: &str, query_string: &str) -> Result<reqwest::Url, GatewayError> {
    let mut url = reqwest::Url::parse(&route.service.base_url)
        .map_err(|e| GatewayError::InvalidUpstreamUrl(e.to_string()))?;

    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| GatewayError::InvalidUpstreamUrl("base_url cannot be a base".to_string()))?;
        for segment in tail.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
    }

    if !query_string.is_empty() {
        let combined = match url.query() {
            Some(base_query) if !base_query.is_empty() => format!("{base_query}&{query_string}"),
            _ => query_string.to_string(),
        };
        url.set_query(Some(&combined));
    }

    if let Auth::Query { name } = &route.service.auth {
        url.query_pairs_mut().append_pair(name, &route.key_value);
    }

    Ok(url)
}

fn convert_method(method: &ActixMethod) -> Result<reqwest::Method, GatewayError> {
    reqwest::Method::from_bytes(method.as_str().as_bytes())
        .map_err(|_| GatewayError::UpstreamTransport(format!("unsupported method {method}")))
}

fn build_request_headers(
    route: &Route,
    inbound: &ActixHeaderMap,
) -> Result<ReqwestHeaderMap, GatewayError> {
    let mut headers = ReqwestHeaderMap::new();

    for (name, value) in inbound.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if SKIPPED_REQUEST_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        let header_name = HeaderName::from_bytes(name.as_str().as_bytes())
            .map_err(|e| GatewayError::UpstreamTransport(e.to_string()))?;
        let header_value = HeaderValue::from_bytes(value.as_bytes())
            .map_err(|e| GatewayError::UpstreamTransport(e.to_string()))?;
        headers.insert(header_name, header_value);
    }

    if let Auth::Header { name, prefix } = &route.service.auth {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| GatewayError::InvalidUpstreamUrl(e.to_string()))?;
        let header_value = HeaderValue::from_str(&format!("{prefix}{}", route.key_value))
            .map_err(|e| GatewayError::InvalidUpstreamUrl(e.to_string()))?;
        headers.insert(header_name, header_value);
    }

    Ok(headers)
}
