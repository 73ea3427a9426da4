//! Wire types of the AOS orchestration API and the backend state model

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

// ============================================================================
// Backend lifecycle state
// ============================================================================

/// Application state as reported by the backend.
///
/// The backend owns the transitions; the set is open-ended, so anything not
/// listed is kept verbatim in [`BackendState::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendState {
    Pending,
    Processing,
    Running,
    Stopped,
    PartialStopped,
    Abnormal,
    /// The backend answered 404 for the application
    AppNotExist,
    Other(String),
}

impl BackendState {
    pub fn as_str(&self) -> &str {
        match self {
            BackendState::Pending => "Pending",
            BackendState::Processing => "Processing",
            BackendState::Running => "Running",
            BackendState::Stopped => "Stopped",
            BackendState::PartialStopped => "PartialStopped",
            BackendState::Abnormal => "Abnormal",
            BackendState::AppNotExist => "app_not_exist",
            BackendState::Other(s) => s,
        }
    }
}

impl From<String> for BackendState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => BackendState::Pending,
            "Processing" => BackendState::Processing,
            "Running" => BackendState::Running,
            "Stopped" => BackendState::Stopped,
            "PartialStopped" => BackendState::PartialStopped,
            "Abnormal" => BackendState::Abnormal,
            "app_not_exist" => BackendState::AppNotExist,
            _ => BackendState::Other(s),
        }
    }
}

impl fmt::Display for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Stack requests and responses
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct CreateStackRequest<'a> {
    pub name: &'a str,
    pub template_id: &'a str,
    pub inputs_json: &'a Map<String, Value>,
    pub project_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateStackResponse {
    pub guid: String,
}

/// Start request; the backend expects a JSON-patch style envelope
#[derive(Debug, Serialize)]
pub(crate) struct StartStackRequest {
    pub op: &'static str,
    pub path: &'static str,
    pub lifecycle: &'static str,
}

#[derive(Debug, Serialize)]
pub(crate) struct LifecycleAction<'a> {
    pub lifecycle: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<&'a Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StackStatus {
    #[serde(default)]
    pub status: String,
}

// ============================================================================
// Nodes
// ============================================================================

/// A deployable component of an application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeDescriptor {
    #[serde(rename = "id")]
    pub node_id: String,
    #[serde(rename = "number_of_instances", default)]
    pub instance_count: u32,
    #[serde(rename = "type", default)]
    pub node_type: String,
}

/// Where a node can be reached from outside the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub port: u16,
    pub host_ip: String,
}

/// `GET /v2/stacks/{id}/nodes/{node_id}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct NodeDetail {
    #[serde(default)]
    pub runtime_properties: RuntimeProperties,
    #[serde(default)]
    pub instances: NodeInstances,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RuntimeProperties {
    #[serde(rename = "Service", default)]
    pub service: Option<ServiceInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServiceInfo {
    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ServicePort {
    #[serde(rename = "nodePort", default)]
    pub node_port: Option<Number>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NodeInstances {
    #[serde(default)]
    pub items: Vec<NodeInstance>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NodeInstance {
    #[serde(default)]
    pub status: NodeInstanceStatus,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NodeInstanceStatus {
    #[serde(rename = "hostIP", default)]
    pub host_ip: String,
}

/// Which part of the node document was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingNodeField {
    Service,
    Ports,
    NodePort,
    Instances,
    HostIp,
}

impl fmt::Display for MissingNodeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MissingNodeField::Service => "runtime properties have no Service entry",
            MissingNodeField::Ports => "service exposes no ports",
            MissingNodeField::NodePort => "first service port has no valid nodePort",
            MissingNodeField::Instances => "node has no instances",
            MissingNodeField::HostIp => "first instance has no hostIP",
        };
        f.write_str(msg)
    }
}

impl NodeDetail {
    /// `Service.ports[0].nodePort` and `instances.items[0].status.hostIP`
    pub fn network_info(&self) -> Result<NetworkInfo, MissingNodeField> {
        let service = self
            .runtime_properties
            .service
            .as_ref()
            .ok_or(MissingNodeField::Service)?;
        let first_port = service.ports.first().ok_or(MissingNodeField::Ports)?;
        let port = first_port
            .node_port
            .as_ref()
            .and_then(|n| n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)))
            .and_then(|n| u16::try_from(n).ok())
            .filter(|p| *p != 0)
            .ok_or(MissingNodeField::NodePort)?;

        let instance = self.instances.items.first().ok_or(MissingNodeField::Instances)?;
        if instance.status.host_ip.is_empty() {
            return Err(MissingNodeField::HostIp);
        }

        Ok(NetworkInfo {
            port,
            host_ip: instance.status.host_ip.clone(),
        })
    }
}

// ============================================================================
// Outputs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OutputsResponse {
    #[serde(default)]
    pub outputs: HashMap<String, OutputEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OutputEntry {
    #[serde(default)]
    pub value: Value,
    #[allow(dead_code)]
    #[serde(default)]
    pub description: String,
}

impl OutputsResponse {
    /// Plain name -> value map; descriptions are dropped
    pub fn into_values(self) -> HashMap<String, Value> {
        self.outputs
            .into_iter()
            .map(|(name, entry)| (name, entry.value))
            .collect()
    }
}

/// Render a port output that may be a string or a number
pub fn port_from_output(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => n.as_u64().map(|p| p.to_string()),
        _ => None,
    }
}
