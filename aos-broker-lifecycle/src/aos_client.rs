//! Typed client for the AOS orchestration REST API
//!
//! One method per backend capability. Each performs a single request, except
//! [`AosClient::update_environment_bindings`] which is a read-then-write pair.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::env_bindings::{BindingEntry, BindingMode, NodeProperties};
use crate::error::GatewayError;
use crate::names::{api, lifecycle};
use crate::types::{
    BackendState, CreateStackRequest, CreateStackResponse, LifecycleAction, NetworkInfo,
    NodeDescriptor, NodeDetail, OutputsResponse, StackStatus, StartStackRequest,
};

/// Connection settings for the orchestration API
#[derive(Debug, Clone)]
pub struct AosConfig {
    /// Base URL, e.g. `http://aos.internal:8080`
    pub endpoint: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for AosConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

type LockMap = HashMap<String, Arc<Mutex<()>>>;

#[derive(Debug, Clone)]
pub struct AosClient {
    http: reqwest::Client,
    endpoint: String,
    /// One lock per (app, node) so binding read-modify-writes don't interleave
    binding_locks: Arc<Mutex<LockMap>>,
}

impl AosClient {
    pub fn new(config: AosConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            binding_locks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    // ------------------------------------------------------------------------
    // Stack lifecycle
    // ------------------------------------------------------------------------

    /// Create an application from a blueprint and return its instance handle.
    /// Not retried: a second attempt would create a second application.
    pub async fn create_application(
        &self,
        name: &str,
        template_id: &str,
        inputs: &Map<String, Value>,
        token: &str,
        project_id: &str,
    ) -> Result<String, GatewayError> {
        const OP: &str = "create application";

        let body = CreateStackRequest {
            name,
            template_id,
            inputs_json: inputs,
            project_id,
        };
        let req = self.http.post(self.url(api::STACKS)).json(&body);
        let resp = self.send(OP, req, token).await?;
        let body = expect_success(OP, resp).await?;
        let created: CreateStackResponse = decode(OP, &body)?;

        if created.guid.is_empty() {
            return Err(GatewayError::partial(OP, "response carries no guid"));
        }
        tracing::info!(app_id = %created.guid, stack_name = name, "Application created");
        Ok(created.guid)
    }

    /// Ask the backend to start a defined application. Success only means the
    /// request was accepted.
    pub async fn start_application(&self, app_id: &str, token: &str) -> Result<(), GatewayError> {
        const OP: &str = "start application";

        let body = StartStackRequest {
            op: "replace",
            path: "/spec/lifecycle",
            lifecycle: lifecycle::CREATE,
        };
        let req = self.http.put(self.url(&actions_path(OP, app_id)?)).json(&body);
        let resp = self.send(OP, req, token).await?;
        expect_success(OP, resp).await?;

        tracing::info!(app_id, "Application start accepted");
        Ok(())
    }

    /// Top-level status of an application. A 404 is reported as
    /// [`BackendState::AppNotExist`], not as an error.
    pub async fn query_status(&self, app_id: &str, token: &str) -> Result<BackendState, GatewayError> {
        const OP: &str = "query status";

        let req = self.http.get(self.url(&stack_path(OP, app_id)?));
        let resp = self.send(OP, req, token).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(app_id, "Application not found");
            return Ok(BackendState::AppNotExist);
        }

        let body = expect_success(OP, resp).await?;
        let status: StackStatus = decode(OP, &body)?;
        Ok(BackendState::from(status.status))
    }

    /// Delete an application. 2xx, 404 and 410 all count as deleted.
    pub async fn delete_application(&self, app_id: &str, token: &str) -> Result<(), GatewayError> {
        const OP: &str = "delete application";

        let req = self.http.delete(self.url(&stack_path(OP, app_id)?));
        let resp = self.send(OP, req, token).await?;
        let status = resp.status();

        if status.is_success() || status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            tracing::info!(app_id, status = status.as_u16(), "Application delete accepted");
            return Ok(());
        }

        let body = read_body(OP, resp).await?;
        Err(GatewayError::Rejected {
            operation: OP,
            status: status.as_u16(),
            body,
        })
    }

    /// Whether the application is gone. Only a 404 confirms deletion; every
    /// other answer, including other error codes, means it may still exist.
    pub async fn confirm_deleted(&self, app_id: &str, token: &str) -> Result<bool, GatewayError> {
        const OP: &str = "confirm deletion";

        let req = self.http.get(self.url(&stack_path(OP, app_id)?));
        let resp = self.send(OP, req, token).await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            tracing::info!(app_id, "Application deletion confirmed");
            return Ok(true);
        }

        tracing::debug!(app_id, status = status.as_u16(), "Application still exists");
        Ok(false)
    }

    /// Send an `upgrade` action carrying the full parameter map
    pub async fn update_instance_inputs(
        &self,
        app_id: &str,
        token: &str,
        parameters: &Map<String, Value>,
    ) -> Result<(), GatewayError> {
        const OP: &str = "update inputs";

        let body = LifecycleAction {
            lifecycle: lifecycle::UPGRADE,
            inputs: Some(parameters),
        };
        let req = self.http.put(self.url(&actions_path(OP, app_id)?)).json(&body);
        let resp = self.send(OP, req, token).await?;
        let body = expect_success(OP, resp).await?;

        tracing::info!(app_id, params = parameters.len(), response = %body, "Inputs update accepted");
        Ok(())
    }

    /// Send a `reconfigure` action with no parameters
    pub async fn reconfigure(&self, app_id: &str, token: &str) -> Result<(), GatewayError> {
        const OP: &str = "reconfigure";

        let body = LifecycleAction {
            lifecycle: lifecycle::RECONFIGURE,
            inputs: None,
        };
        let req = self.http.put(self.url(&actions_path(OP, app_id)?)).json(&body);
        let resp = self.send(OP, req, token).await?;
        expect_success(OP, resp).await?;

        tracing::info!(app_id, "Reconfigure accepted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Nodes and outputs
    // ------------------------------------------------------------------------

    pub async fn list_nodes(
        &self,
        app_id: &str,
        token: &str,
        node_type: &str,
    ) -> Result<Vec<NodeDescriptor>, GatewayError> {
        const OP: &str = "list nodes";

        let path = format!("{}/nodes", stack_path(OP, app_id)?);
        let req = self.http.get(self.url(&path)).query(&[("node_type", node_type)]);
        let resp = self.send(OP, req, token).await?;
        let body = expect_success(OP, resp).await?;
        decode(OP, &body)
    }

    /// Blueprint outputs as a plain name -> value map
    pub async fn read_outputs(
        &self,
        app_id: &str,
        token: &str,
    ) -> Result<HashMap<String, Value>, GatewayError> {
        const OP: &str = "read outputs";

        let path = format!("{}/outputs", stack_path(OP, app_id)?);
        let req = self.http.get(self.url(&path));
        let resp = self.send(OP, req, token).await?;
        let body = expect_success(OP, resp).await?;
        let outputs: OutputsResponse = decode(OP, &body)?;
        Ok(outputs.into_values())
    }

    /// Node port and host IP of a node. Each missing piece is reported as
    /// [`GatewayError::PartialData`] rather than defaulted.
    pub async fn read_node_network_info(
        &self,
        app_id: &str,
        node_id: &str,
        token: &str,
    ) -> Result<NetworkInfo, GatewayError> {
        const OP: &str = "read node network info";

        let path = node_path(OP, app_id, node_id)?;
        let req = self.http.get(self.url(&path));
        let resp = self.send(OP, req, token).await?;
        let body = expect_success(OP, resp).await?;
        let detail: NodeDetail = decode(OP, &body)?;

        detail.network_info().map_err(|missing| {
            tracing::warn!(app_id, node_id, "Node network info incomplete: {}", missing);
            GatewayError::partial(OP, missing.to_string())
        })
    }

    // ------------------------------------------------------------------------
    // Environment bindings
    // ------------------------------------------------------------------------

    /// Current node properties; an empty body is an empty document
    pub async fn read_environment(
        &self,
        app_id: &str,
        node_id: &str,
        token: &str,
    ) -> Result<NodeProperties, GatewayError> {
        const OP: &str = "read environment";

        let path = format!("{}/properties", node_path(OP, app_id, node_id)?);
        let req = self.http.get(self.url(&path));
        let resp = self.send(OP, req, token).await?;
        let body = expect_success(OP, resp).await?;
        NodeProperties::from_body(&body).map_err(|source| GatewayError::Decode { operation: OP, source })
    }

    /// Replace the node properties document
    pub async fn write_environment(
        &self,
        app_id: &str,
        node_id: &str,
        token: &str,
        properties: &NodeProperties,
    ) -> Result<(), GatewayError> {
        const OP: &str = "write environment";

        let path = format!("{}/properties", node_path(OP, app_id, node_id)?);
        let req = self.http.put(self.url(&path)).json(properties);
        let resp = self.send(OP, req, token).await?;
        expect_success(OP, resp).await?;
        Ok(())
    }

    /// Read the binding document, add or remove one entry, write it back.
    ///
    /// Callers sharing this client are serialized per node. Writers going
    /// through another process can still race; the last write wins.
    pub async fn update_environment_bindings(
        &self,
        app_id: &str,
        node_id: &str,
        token: &str,
        service_name: &str,
        entry: BindingEntry,
        mode: BindingMode,
    ) -> Result<(), GatewayError> {
        let lock = self.binding_lock(app_id, node_id).await;
        let _guard = lock.lock().await;

        let binding = entry.name.clone();
        let properties = self
            .read_environment(app_id, node_id, token)
            .await?
            .apply(service_name, entry, mode);
        self.write_environment(app_id, node_id, token, &properties).await?;

        tracing::info!(app_id, node_id, service = service_name, %binding, %mode, "Environment bindings written");
        Ok(())
    }

    async fn binding_lock(&self, app_id: &str, node_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.binding_locks.lock().await;
        locks
            .entry(format!("{}/{}", app_id, node_id))
            .or_default()
            .clone()
    }

    // ------------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn send(
        &self,
        operation: &'static str,
        req: RequestBuilder,
        token: &str,
    ) -> Result<Response, GatewayError> {
        req.header(api::AUTH_HEADER, token)
            .send()
            .await
            .map_err(|source| {
                tracing::error!("{}: request to AOS failed: {}", operation, source);
                GatewayError::Transport { operation, source }
            })
    }
}

/// Ids become single path segments; empty ones and ones that would change
/// the addressed resource are refused
fn check_id(operation: &'static str, what: &str, id: &str) -> Result<(), GatewayError> {
    let detail = if id.is_empty() {
        format!("{} id is empty", what)
    } else if id.contains(['/', '?', '#']) {
        format!("{} id '{}' contains a reserved character", what, id)
    } else {
        return Ok(());
    };
    Err(GatewayError::InvalidRequest { operation, detail })
}

fn stack_path(operation: &'static str, app_id: &str) -> Result<String, GatewayError> {
    check_id(operation, "application", app_id)?;
    Ok(format!("{}/{}", api::STACKS, app_id))
}

fn actions_path(operation: &'static str, app_id: &str) -> Result<String, GatewayError> {
    Ok(format!("{}/actions", stack_path(operation, app_id)?))
}

fn node_path(operation: &'static str, app_id: &str, node_id: &str) -> Result<String, GatewayError> {
    let stack = stack_path(operation, app_id)?;
    check_id(operation, "node", node_id)?;
    Ok(format!("{}/nodes/{}", stack, node_id))
}

async fn read_body(operation: &'static str, resp: Response) -> Result<String, GatewayError> {
    resp.text()
        .await
        .map_err(|source| GatewayError::Transport { operation, source })
}

/// Body of a 2xx response, or `Rejected` carrying the backend's message
async fn expect_success(operation: &'static str, resp: Response) -> Result<String, GatewayError> {
    let status = resp.status();
    let body = read_body(operation, resp).await?;

    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "{}: AOS rejected request: {}", operation, body);
        return Err(GatewayError::Rejected {
            operation,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(operation: &'static str, body: &str) -> Result<T, GatewayError> {
    serde_json::from_str(body).map_err(|source| {
        tracing::warn!("{}: unexpected response body: {}", operation, source);
        GatewayError::Decode { operation, source }
    })
}
