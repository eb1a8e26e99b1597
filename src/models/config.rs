//! Declarative configuration document shape.
//!
//! These types mirror the on-disk YAML document verbatim — they carry no
//! validation and no cross-reference resolution. [`crate::config::parser`]
//! consumes a [`ConfigDocument`] and produces a validated
//! [`crate::models::graph::Graph`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConfigDocument {
    #[serde(default)]
    pub providers: Vec<ProviderDoc>,
    #[serde(default)]
    pub users: Vec<UserDoc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderDoc {
    pub name: String,
    #[serde(default)]
    pub named_keys: HashMap<String, String>,
    #[serde(default)]
    pub services: Vec<ServiceDoc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceDoc {
    #[serde(rename = "type")]
    pub service_type: String,
    pub base_url: String,
    #[serde(default)]
    pub auth: Option<AuthDoc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum AuthDoc {
    Header {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        prefix: Option<String>,
    },
    Query {
        name: String,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserDoc {
    #[serde(default)]
    pub display_name: String,
    pub token: String,
    #[serde(default)]
    pub service_routes: HashMap<String, UserServiceRouteDoc>,
}

/// A service route in source form: either the single-candidate legacy
/// shorthand (`provider_name`/`key_name`) or the aggregated form
/// (`strategy`/`candidates`). Both fields are optional here; the parser
/// decides which shape applies and rejects anything that is neither.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct UserServiceRouteDoc {
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub key_name: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub candidates: Option<Vec<CandidateDoc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CandidateDoc {
    pub provider_name: String,
    pub key_name: String,
    #[serde(default)]
    pub weight: Option<i64>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub tags: Vec<String>,
}
