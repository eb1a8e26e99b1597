//! Resolver / Router: turns `(caller token, service-type)` into a
//! dispatchable [`Route`], delegating candidate selection to the
//! [`crate::scheduler`].

use crate::models::error::GatewayError;
use crate::models::graph::{Graph, Route};
use crate::scheduler;

pub fn resolve(graph: &Graph, token: &str, service_type: &str) -> Result<Route, GatewayError> {
    if token.is_empty() {
        return Err(GatewayError::TokenRequired);
    }
    if service_type.is_empty() {
        return Err(GatewayError::ServiceTypeRequired);
    }

    let user = graph.user_by_token(token).ok_or(GatewayError::UserNotFound)?;

    let route = user
        .service_routes
        .get(service_type)
        .ok_or_else(|| GatewayError::ServiceNotFound {
            display_name: user.display_name.clone(),
            service_type: service_type.to_string(),
        })?;

    let candidate_index = scheduler::select(route).ok_or_else(|| GatewayError::NoActiveUpstream {
        service_type: service_type.to_string(),
    })?;
    let candidate = &route.candidates[candidate_index];

    // Both lookups below are guaranteed to succeed by the parser's
    // cross-reference validation; a miss here means the installed graph was
    // built inconsistently, which we treat as "nothing is currently
    // dispatchable" rather than panicking.
    let unavailable = || GatewayError::NoActiveUpstream {
        service_type: service_type.to_string(),
    };
    let provider = graph.provider(&candidate.provider_name).ok_or_else(unavailable)?;
    let service = provider.service(service_type).ok_or_else(unavailable)?;
    let key_value = provider
        .named_keys
        .get(&candidate.key_name)
        .ok_or_else(unavailable)?;

    Ok(Route {
        user_display_name: user.display_name.clone(),
        user_token: token.to_string(),
        provider_name: provider.name.clone(),
        service: service.clone(),
        key_name: candidate.key_name.clone(),
        key_value: key_value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_and_validate;

    const YAML: &str = r#"
providers:
  - name: acme
    named_keys:
      primary: sk-live-123
    services:
      - type: chat
        base_url: https://api.acme.example
users:
  - display_name: Alice
    token: alice-token
    service_routes:
      chat:
        provider_name: acme
        key_name: primary
"#;

    #[test]
    fn resolves_known_user_and_service() {
        let graph = parse_and_validate(YAML).unwrap();
        let route = resolve(&graph, "alice-token", "chat").unwrap();
        assert_eq!(route.provider_name, "acme");
        assert_eq!(route.key_value, "sk-live-123");
        assert_eq!(route.service.base_url, "https://api.acme.example");
    }

    #[test]
    fn empty_token_is_rejected() {
        let graph = parse_and_validate(YAML).unwrap();
        assert!(matches!(
            resolve(&graph, "", "chat"),
            Err(GatewayError::TokenRequired)
        ));
    }

    #[test]
    fn unknown_token_is_unauthorized() {
        let graph = parse_and_validate(YAML).unwrap();
        assert!(matches!(
            resolve(&graph, "nope", "chat"),
            Err(GatewayError::UserNotFound)
        ));
    }

    #[test]
    fn unknown_service_type_is_not_found() {
        let graph = parse_and_validate(YAML).unwrap();
        assert!(matches!(
            resolve(&graph, "alice-token", "embeddings"),
            Err(GatewayError::ServiceNotFound { .. })
        ));
    }

    #[test]
    fn quarantined_only_candidate_yields_no_active_upstream() {
        let graph = parse_and_validate(YAML).unwrap();
        let health = graph
            .find_candidate_health("alice-token", "chat", "acme", "primary")
            .unwrap();
        health.quarantine_until(crate::models::graph::now_ms() + 60_000);
        assert!(matches!(
            resolve(&graph, "alice-token", "chat"),
            Err(GatewayError::NoActiveUpstream { .. })
        ));
    }
}
