use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Instance type reported back to the platform for every provisioned instance
pub const INSTANCE_TYPE: &str = "aos";

/// State returned by the last-operation polling endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PollState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl PollState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::InProgress => "in progress",
            PollState::Succeeded => "succeeded",
            PollState::Failed => "failed",
        }
    }

    /// Whether the caller can stop polling
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::InProgress)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The asynchronous broker operation a poll refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BrokerOperation {
    Create,
    Update,
    Delete,
}

impl BrokerOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerOperation::Create => "create",
            BrokerOperation::Update => "update",
            BrokerOperation::Delete => "delete",
        }
    }
}

impl fmt::Display for BrokerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(BrokerOperation::Create),
            "update" => Ok(BrokerOperation::Update),
            "delete" => Ok(BrokerOperation::Delete),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

// ============================================================================
// Provision / Update / Deprovision
// ============================================================================

/// Body of `PUT /v2/service_instances/{instance_id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateInstanceRequest {
    /// Human-readable service name chosen by the user
    pub instance_name: String,
    /// Blueprint (template) to instantiate on the backend
    pub blueprint_id: String,
    /// Blueprint input parameters, passed through untouched
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Space the instance belongs to; used as the backend project id
    #[serde(default)]
    pub space_guid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BaseInfo {
    pub actual_id: String,
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub actual_name: String,
}

/// Response for provision and update requests
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateInstanceResponse {
    /// Opaque instance handle the platform hands back on every later call
    pub userdata: String,
    pub base_info: BaseInfo,
}

impl CreateInstanceResponse {
    pub fn new(app_id: impl Into<String>, stack_name: impl Into<String>) -> Self {
        let app_id = app_id.into();
        Self {
            userdata: app_id.clone(),
            base_info: BaseInfo {
                actual_id: app_id,
                instance_type: INSTANCE_TYPE.to_string(),
                actual_name: stack_name.into(),
            },
        }
    }
}

/// Body of deprovision requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserdataRequest {
    pub userdata: String,
}

/// Body of `PATCH /v2/service_instances/{instance_id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateInstanceRequest {
    pub userdata: String,
    #[serde(default)]
    pub parameters: Option<Map<String, Value>>,
}

// ============================================================================
// Bindings
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreateBindingRequest {
    #[serde(default)]
    pub userdata: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateBindingResponse {
    pub credentials: Map<String, Value>,
    pub userdata: String,
}

// ============================================================================
// Polling
// ============================================================================

/// Query string of the last-operation endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LastOperationQuery {
    #[serde(default)]
    pub userdata: String,
    #[serde(default)]
    pub operation: String,
}

/// Result of one last-operation poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LastOperation {
    pub userdata: String,
    pub state: PollState,
    /// Empty unless the operation succeeded and the address could be resolved
    #[serde(default)]
    pub dashboard_url: String,
}

impl LastOperation {
    pub fn new(userdata: impl Into<String>, state: PollState) -> Self {
        Self {
            userdata: userdata.into(),
            state,
            dashboard_url: String::new(),
        }
    }
}

/// Body of the instance status endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceStatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl InstanceStatusResponse {
    pub fn available() -> Self {
        Self { status: "available".to_string(), message: None }
    }

    pub fn unavailable(message: Option<&str>) -> Self {
        Self {
            status: "unavailable".to_string(),
            message: message.map(str::to_string),
        }
    }
}
