//! Pure decode-and-validate: YAML text in, a validated [`Graph`] or a
//! [`ConfigError`] out. No I/O, no clock, no global state — easy to test.

use crate::models::config::{AuthDoc, CandidateDoc, ConfigDocument, ProviderDoc, ServiceDoc, UserDoc};
use crate::models::error::ConfigError;
use crate::models::graph::{
    Auth, Candidate, CandidateHealth, Graph, Provider, SchedulerState, Service, Strategy, User,
    UserServiceRoute,
};
use std::collections::{HashMap, HashSet};

const DEFAULT_HEADER_NAME: &str = "Authorization";
const DEFAULT_HEADER_PREFIX: &str = "Bearer ";

/// Decodes and validates a configuration document. Any violation aborts
/// immediately with the first [`ConfigError`] encountered — there is no
/// warnings-vs-errors split here, unlike the teacher's `ValidationResult`.
pub fn parse_and_validate(text: &str) -> Result<Graph, ConfigError> {
    let doc: ConfigDocument =
        serde_yaml::from_str(text).map_err(|e| ConfigError::Decode(e.to_string()))?;

    let providers = build_providers(&doc.providers)?;
    let provider_lookup: HashMap<&str, &ProviderDoc> =
        doc.providers.iter().map(|p| (p.name.as_str(), p)).collect();
    let users = build_users(&doc.users, &provider_lookup)?;

    Ok(Graph::new(providers, users))
}

fn build_providers(docs: &[ProviderDoc]) -> Result<Vec<Provider>, ConfigError> {
    let mut seen_names: HashSet<&str> = HashSet::new();
    let mut providers = Vec::with_capacity(docs.len());

    for (index, doc) in docs.iter().enumerate() {
        let name = doc.name.trim();
        if name.is_empty() {
            return Err(ConfigError::Provider {
                index,
                reason: "name must not be empty".to_string(),
            });
        }
        if !seen_names.insert(name) {
            return Err(ConfigError::Provider {
                index,
                reason: format!("duplicate provider name \"{name}\""),
            });
        }

        let mut named_keys = HashMap::with_capacity(doc.named_keys.len());
        for (key_index, (key_name, secret)) in doc.named_keys.iter().enumerate() {
            if key_name.trim().is_empty() {
                return Err(ConfigError::NamedKey {
                    provider_index: index,
                    key_index,
                    reason: "key name must not be empty".to_string(),
                });
            }
            if secret.trim().is_empty() {
                return Err(ConfigError::NamedKey {
                    provider_index: index,
                    key_index,
                    reason: format!("secret for key \"{key_name}\" must not be empty"),
                });
            }
            named_keys.insert(key_name.clone(), secret.clone());
        }

        let services = build_services(index, &doc.services)?;

        providers.push(Provider {
            name: name.to_string(),
            named_keys,
            services,
        });
    }

    Ok(providers)
}

fn build_services(provider_index: usize, docs: &[ServiceDoc]) -> Result<Vec<Service>, ConfigError> {
    let mut seen_types: HashSet<&str> = HashSet::new();
    let mut services = Vec::with_capacity(docs.len());

    for (service_index, doc) in docs.iter().enumerate() {
        let service_type = doc.service_type.trim();
        if service_type.is_empty() {
            return Err(ConfigError::Service {
                provider_index,
                service_index,
                reason: "type must not be empty".to_string(),
            });
        }
        if !seen_types.insert(service_type) {
            return Err(ConfigError::Service {
                provider_index,
                service_index,
                reason: format!("duplicate service type \"{service_type}\""),
            });
        }

        let base_url = doc.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Service {
                provider_index,
                service_index,
                reason: "base_url must not be empty".to_string(),
            });
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Service {
                provider_index,
                service_index,
                reason: format!("base_url \"{base_url}\" must start with http:// or https://"),
            });
        }

        let auth = match &doc.auth {
            None => Auth::default(),
            Some(AuthDoc::Header { name, prefix }) => Auth::Header {
                name: name.clone().unwrap_or_else(|| DEFAULT_HEADER_NAME.to_string()),
                prefix: prefix.clone().unwrap_or_else(|| DEFAULT_HEADER_PREFIX.to_string()),
            },
            Some(AuthDoc::Query { name }) => {
                if name.trim().is_empty() {
                    return Err(ConfigError::Service {
                        provider_index,
                        service_index,
                        reason: "auth query name must not be empty".to_string(),
                    });
                }
                Auth::Query {
                    name: name.trim().to_string(),
                }
            }
        };

        services.push(Service {
            service_type: service_type.to_string(),
            base_url: base_url.to_string(),
            auth,
        });
    }

    Ok(services)
}

fn build_users(
    docs: &[UserDoc],
    providers: &HashMap<&str, &ProviderDoc>,
) -> Result<Vec<User>, ConfigError> {
    let mut seen_tokens: HashSet<&str> = HashSet::new();
    let mut users = Vec::with_capacity(docs.len());

    for (index, doc) in docs.iter().enumerate() {
        let token = doc.token.trim();
        if token.is_empty() {
            return Err(ConfigError::User {
                index,
                reason: "token must not be empty".to_string(),
            });
        }
        if !seen_tokens.insert(token) {
            return Err(ConfigError::User {
                index,
                reason: "duplicate token".to_string(),
            });
        }

        let display_name = if doc.display_name.trim().is_empty() {
            token.to_string()
        } else {
            doc.display_name.trim().to_string()
        };

        let mut service_routes = HashMap::with_capacity(doc.service_routes.len());
        for (service_type, route_doc) in &doc.service_routes {
            if service_type.trim().is_empty() {
                return Err(ConfigError::ServiceRoute {
                    user_index: index,
                    service_type: service_type.clone(),
                    reason: "service-type key must not be empty".to_string(),
                });
            }

            let route = build_route(index, service_type, route_doc, providers)?;
            service_routes.insert(service_type.clone(), route);
        }

        users.push(User {
            display_name,
            token: token.to_string(),
            service_routes,
        });
    }

    Ok(users)
}

fn build_route(
    user_index: usize,
    service_type: &str,
    doc: &crate::models::config::UserServiceRouteDoc,
    providers: &HashMap<&str, &ProviderDoc>,
) -> Result<UserServiceRoute, ConfigError> {
    let candidate_docs: Vec<CandidateDoc> = match (&doc.candidates, &doc.provider_name, &doc.key_name)
    {
        (Some(candidates), None, None) => candidates.clone(),
        (None, Some(provider_name), Some(key_name)) => vec![CandidateDoc {
            provider_name: provider_name.clone(),
            key_name: key_name.clone(),
            weight: None,
            enabled: None,
            tags: Vec::new(),
        }],
        (None, None, None) => {
            return Err(ConfigError::ServiceRoute {
                user_index,
                service_type: service_type.to_string(),
                reason: "must specify either provider_name/key_name or candidates".to_string(),
            });
        }
        _ => {
            return Err(ConfigError::ServiceRoute {
                user_index,
                service_type: service_type.to_string(),
                reason: "must not mix provider_name/key_name with candidates".to_string(),
            });
        }
    };

    if candidate_docs.is_empty() {
        return Err(ConfigError::ServiceRoute {
            user_index,
            service_type: service_type.to_string(),
            reason: "candidates must not be empty".to_string(),
        });
    }

    let strategy = match doc.strategy.as_deref() {
        None => Strategy::RoundRobin,
        Some("round_robin") => Strategy::RoundRobin,
        Some("weighted_round_robin") => Strategy::WeightedRoundRobin,
        Some("adaptive_round_robin") => Strategy::AdaptiveRoundRobin,
        Some("sticky_healthy") => Strategy::StickyHealthy,
        Some(other) => {
            return Err(ConfigError::ServiceRoute {
                user_index,
                service_type: service_type.to_string(),
                reason: format!("unknown strategy \"{other}\""),
            });
        }
    };

    let mut candidates = Vec::with_capacity(candidate_docs.len());
    for (candidate_index, candidate_doc) in candidate_docs.iter().enumerate() {
        candidates.push(build_candidate(
            user_index,
            service_type,
            candidate_index,
            candidate_doc,
            providers,
        )?);
    }

    Ok(UserServiceRoute {
        strategy,
        candidates,
        scheduler_state: SchedulerState::default(),
    })
}

fn build_candidate(
    user_index: usize,
    service_type: &str,
    candidate_index: usize,
    doc: &CandidateDoc,
    providers: &HashMap<&str, &ProviderDoc>,
) -> Result<Candidate, ConfigError> {
    let err = |reason: String| ConfigError::Candidate {
        user_index,
        service_type: service_type.to_string(),
        candidate_index,
        reason,
    };

    let provider_name = doc.provider_name.trim();
    let provider = providers
        .get(provider_name)
        .ok_or_else(|| err(format!("unknown provider \"{provider_name}\"")))?;

    if provider.services.iter().all(|s| s.service_type != service_type) {
        return Err(err(format!(
            "provider \"{provider_name}\" has no service of type \"{service_type}\""
        )));
    }

    let key_name = doc.key_name.trim();
    if !provider.named_keys.contains_key(key_name) {
        return Err(err(format!(
            "provider \"{provider_name}\" has no named key \"{key_name}\""
        )));
    }

    let weight = match doc.weight {
        None => 1,
        Some(w) if w >= 1 => w as u32,
        Some(w) => return Err(err(format!("weight {w} must be at least 1"))),
    };

    Ok(Candidate {
        provider_name: provider_name.to_string(),
        key_name: key_name.to_string(),
        weight,
        enabled: doc.enabled.unwrap_or(true),
        tags: doc.tags.clone(),
        health: CandidateHealth::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
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
"#
    }

    #[test]
    fn parses_minimal_single_candidate_route() {
        let graph = parse_and_validate(minimal_yaml()).expect("should parse");
        let user = graph.user_by_token("alice-token").expect("user present");
        let route = user.service_routes.get("chat").expect("route present");
        assert_eq!(route.candidates.len(), 1);
        assert_eq!(route.candidates[0].provider_name, "acme");
        assert_eq!(route.candidates[0].key_name, "primary");
    }

    #[test]
    fn rejects_duplicate_provider_names() {
        let yaml = r#"
providers:
  - name: acme
    services:
      - type: chat
        base_url: https://a.example
  - name: acme
    services:
      - type: chat
        base_url: https://b.example
users: []
"#;
        let err = parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Provider { .. }));
    }

    #[test]
    fn rejects_route_referencing_unknown_key() {
        let yaml = r#"
providers:
  - name: acme
    named_keys:
      primary: sk-live-123
    services:
      - type: chat
        base_url: https://api.acme.example
users:
  - token: alice-token
    service_routes:
      chat:
        provider_name: acme
        key_name: missing
"#;
        let err = parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Candidate { .. }));
    }

    #[test]
    fn rejects_mixed_legacy_and_aggregated_form() {
        let yaml = r#"
providers:
  - name: acme
    named_keys:
      primary: sk-live-123
    services:
      - type: chat
        base_url: https://api.acme.example
users:
  - token: alice-token
    service_routes:
      chat:
        provider_name: acme
        key_name: primary
        candidates:
          - provider_name: acme
            key_name: primary
"#;
        let err = parse_and_validate(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ServiceRoute { .. }));
    }

    #[test]
    fn weighted_route_builds_multiple_candidates() {
        let yaml = r#"
providers:
  - name: acme
    named_keys:
      a: sk-a
      b: sk-b
    services:
      - type: chat
        base_url: https://api.acme.example
users:
  - token: alice-token
    service_routes:
      chat:
        strategy: weighted_round_robin
        candidates:
          - provider_name: acme
            key_name: a
            weight: 3
          - provider_name: acme
            key_name: b
            weight: 1
"#;
        let graph = parse_and_validate(yaml).expect("should parse");
        let user = graph.user_by_token("alice-token").unwrap();
        let route = user.service_routes.get("chat").unwrap();
        assert_eq!(route.candidates.len(), 2);
        assert_eq!(route.candidates[0].weight, 3);
        assert!(matches!(route.strategy, Strategy::WeightedRoundRobin));
    }
}
