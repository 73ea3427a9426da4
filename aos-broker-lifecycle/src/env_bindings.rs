//! Environment bindings stored as node properties on the backend
//!
//! The document lives at `/v2/stacks/{id}/nodes/{node_id}/properties` with
//! the shape `{env: {BIND_SERVICES: {service: [entry, ...]}}}`. Fields this
//! crate does not know about are carried through untouched so a
//! read-modify-write never drops them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Bindings per dependent service; entries are unique by name within a list
pub type BindServices = BTreeMap<String, Vec<BindingEntry>>;

/// One dependent service instance exposed to the application
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BindingEntry {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub plan: String,
    /// Opaque credential blob, never inspected
    #[serde(default)]
    pub credentials: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    Add,
    Del,
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingMode::Add => f.write_str("ADD"),
            BindingMode::Del => f.write_str("DEL"),
        }
    }
}

/// Node property document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeProperties {
    #[serde(default, deserialize_with = "null_as_default")]
    pub env: EnvSection,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnvSection {
    #[serde(rename = "BIND_SERVICES", default, deserialize_with = "non_empty_services")]
    pub bind_services: BindServices,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `null` reads the same as a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Service lists that are `null` or empty are dropped, so an empty list and
/// an absent service are the same state
fn non_empty_services<'de, D>(deserializer: D) -> Result<BindServices, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<Vec<BindingEntry>>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(service, entries)| entries.filter(|e| !e.is_empty()).map(|e| (service, e)))
        .collect())
}

impl NodeProperties {
    /// Parse a properties body; an empty body means no bindings yet
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(body)
    }

    /// Apply one merge step to the bindings of this document
    pub fn apply(mut self, service_name: &str, entry: BindingEntry, mode: BindingMode) -> Self {
        let services = std::mem::take(&mut self.env.bind_services);
        self.env.bind_services = merge_binding(services, service_name, entry, mode);
        self
    }
}

/// Add or remove one binding entry.
///
/// Adding an entry whose name is already listed and deleting one that is
/// not listed both leave the bindings unchanged. A service whose list
/// becomes empty after a delete is removed.
pub fn merge_binding(
    mut services: BindServices,
    service_name: &str,
    entry: BindingEntry,
    mode: BindingMode,
) -> BindServices {
    match mode {
        BindingMode::Add => {
            let entries = services.entry(service_name.to_string()).or_default();
            if entries.iter().any(|e| e.name == entry.name) {
                tracing::warn!(
                    service = service_name,
                    binding = %entry.name,
                    "Binding already present, nothing to add"
                );
                return services;
            }
            entries.push(entry);
        }
        BindingMode::Del => {
            let Some(entries) = services.get_mut(service_name) else {
                tracing::warn!(service = service_name, "Service has no bindings, nothing to delete");
                return services;
            };
            let Some(idx) = entries.iter().position(|e| e.name == entry.name) else {
                tracing::warn!(
                    service = service_name,
                    binding = %entry.name,
                    "Binding already absent, nothing to delete"
                );
                return services;
            };
            entries.remove(idx);
            if entries.is_empty() {
                services.remove(service_name);
            }
        }
    }
    services
}
