//! Lifecycle driver: broker verbs in, gateway calls out
//!
//! Every method performs a short, fixed sequence of backend calls and
//! returns. Nothing is retried here and nothing is polled in the background;
//! the platform repeats [`LifecycleDriver::poll`] until the state is terminal.

use aos_broker_models::{BrokerOperation, LastOperation, PollState};
use serde_json::{Map, Value};

use crate::aos_client::AosClient;
use crate::env_bindings::{BindingEntry, BindingMode};
use crate::error::{GatewayError, LifecycleError};
use crate::names::{self, APPLICATION_NODE_TYPE, PORT_OUTPUT, STACK_PREFIX};
use crate::status::{deletion_state, progress_state};
use crate::types::{port_from_output, BackendState};

/// Everything needed to provision one service instance
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionRequest {
    /// Platform-assigned instance id
    pub instance_id: String,
    /// Human-readable service name
    pub service_name: String,
    /// Blueprint to instantiate
    pub template_id: String,
    pub parameters: Map<String, Value>,
    pub project_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Instance handle; the platform stores it and passes it back
    pub app_id: String,
    pub stack_name: String,
}

#[derive(Debug, Clone)]
pub struct LifecycleDriver {
    client: AosClient,
    /// Path appended to `host:port` in dashboard URLs
    service_uri: String,
}

impl LifecycleDriver {
    pub fn new(client: AosClient, service_uri: impl Into<String>) -> Self {
        Self {
            client,
            service_uri: service_uri.into(),
        }
    }

    pub fn client(&self) -> &AosClient {
        &self.client
    }

    /// Create the application and ask the backend to start it.
    ///
    /// A start failure leaves the created application in place; the error
    /// carries its handle so the caller can clean it up.
    pub async fn provision(
        &self,
        req: &ProvisionRequest,
        token: &str,
    ) -> Result<Provisioned, LifecycleError> {
        let stack_name = names::stack_name(STACK_PREFIX, &req.service_name, &req.instance_id);
        tracing::info!(
            instance_id = %req.instance_id,
            stack_name = %stack_name,
            template_id = %req.template_id,
            "Provisioning instance"
        );

        let app_id = self
            .client
            .create_application(&stack_name, &req.template_id, &req.parameters, token, &req.project_id)
            .await
            .map_err(|source| LifecycleError::Create {
                stack_name: stack_name.clone(),
                source,
            })?;

        if let Err(source) = self.client.start_application(&app_id, token).await {
            tracing::error!(app_id = %app_id, "Application created but not started: {}", source);
            return Err(LifecycleError::Start { app_id, stack_name, source });
        }

        Ok(Provisioned { app_id, stack_name })
    }

    /// Delete the application; already-gone counts as success
    pub async fn deprovision(&self, app_id: &str, token: &str) -> Result<(), LifecycleError> {
        tracing::info!(app_id, "Deprovisioning instance");
        self.client
            .delete_application(app_id, token)
            .await
            .map_err(|source| LifecycleError::Delete {
                app_id: app_id.to_string(),
                source,
            })
    }

    /// Push new blueprint inputs. No parameters means nothing to do.
    pub async fn update(
        &self,
        app_id: &str,
        token: &str,
        parameters: Option<&Map<String, Value>>,
    ) -> Result<(), LifecycleError> {
        let Some(parameters) = parameters.filter(|p| !p.is_empty()) else {
            tracing::info!(app_id, "Update without parameters, nothing to send");
            return Ok(());
        };

        tracing::info!(app_id, params = parameters.len(), "Updating instance inputs");
        self.client
            .update_instance_inputs(app_id, token, parameters)
            .await
            .map_err(|source| LifecycleError::Update {
                app_id: app_id.to_string(),
                source,
            })
    }

    /// Current state of an asynchronous operation. Never fails: query errors
    /// read as in progress.
    pub async fn poll(&self, app_id: &str, operation: BrokerOperation, token: &str) -> LastOperation {
        let state = match operation {
            BrokerOperation::Create | BrokerOperation::Update => {
                let observed = self.client.query_status(app_id, token).await;
                match &observed {
                    Ok(BackendState::Abnormal) => {
                        tracing::error!(app_id, %operation, "Application is Abnormal")
                    }
                    Ok(status) => tracing::debug!(app_id, %operation, %status, "Application status"),
                    Err(e) => tracing::warn!(app_id, %operation, "Query app status failed: {}", e),
                }
                progress_state(&observed)
            }
            BrokerOperation::Delete => {
                let confirmed = self.client.confirm_deleted(app_id, token).await;
                if let Err(e) = &confirmed {
                    tracing::warn!(app_id, "Check app delete status failed: {}", e);
                }
                deletion_state(&confirmed)
            }
        };

        let mut result = LastOperation::new(app_id, state);
        if state == PollState::Succeeded && operation != BrokerOperation::Delete {
            result.dashboard_url = self.best_effort_dashboard_url(app_id, token).await;
        }

        tracing::info!(app_id, %operation, state = %result.state, "Polled last operation");
        result
    }

    /// Backend state, for the instance status endpoint
    pub async fn instance_status(&self, app_id: &str, token: &str) -> Result<BackendState, GatewayError> {
        self.client.query_status(app_id, token).await
    }

    /// Id of the application's single node; the first match is used
    pub async fn application_node(&self, app_id: &str, token: &str) -> Result<String, LifecycleError> {
        let nodes = self.client.list_nodes(app_id, token, APPLICATION_NODE_TYPE).await?;
        nodes
            .into_iter()
            .next()
            .map(|node| node.node_id)
            .ok_or_else(|| LifecycleError::NodeNotFound {
                app_id: app_id.to_string(),
                node_type: APPLICATION_NODE_TYPE.to_string(),
            })
    }

    /// `http://{host}:{port}{service_uri}`.
    ///
    /// The host comes from the node, the port from the blueprint outputs:
    /// the node's own port is the one recorded at creation and goes stale
    /// after an update.
    pub async fn dashboard_url(&self, app_id: &str, token: &str) -> Result<String, LifecycleError> {
        let node_id = self.application_node(app_id, token).await?;
        let network = self.client.read_node_network_info(app_id, &node_id, token).await?;
        let outputs = self.client.read_outputs(app_id, token).await?;

        let port = outputs
            .get(PORT_OUTPUT)
            .and_then(port_from_output)
            .ok_or_else(|| {
                GatewayError::partial("resolve dashboard", format!("output '{}' missing or not a port", PORT_OUTPUT))
            })?;

        Ok(format!("http://{}:{}{}", network.host_ip, port, self.service_uri))
    }

    async fn best_effort_dashboard_url(&self, app_id: &str, token: &str) -> String {
        match self.dashboard_url(app_id, token).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(app_id, "Dashboard URL unavailable: {}", e);
                String::new()
            }
        }
    }

    // ------------------------------------------------------------------------
    // Environment bindings
    // ------------------------------------------------------------------------

    /// Expose a dependent service to the application and reconfigure it
    pub async fn bind_environment(
        &self,
        app_id: &str,
        token: &str,
        service_name: &str,
        entry: BindingEntry,
    ) -> Result<(), LifecycleError> {
        self.change_environment(app_id, token, service_name, entry, BindingMode::Add).await
    }

    /// Remove a dependent service from the application and reconfigure it
    pub async fn unbind_environment(
        &self,
        app_id: &str,
        token: &str,
        service_name: &str,
        binding_name: &str,
    ) -> Result<(), LifecycleError> {
        let entry = BindingEntry {
            name: binding_name.to_string(),
            ..BindingEntry::default()
        };
        self.change_environment(app_id, token, service_name, entry, BindingMode::Del).await
    }

    async fn change_environment(
        &self,
        app_id: &str,
        token: &str,
        service_name: &str,
        entry: BindingEntry,
        mode: BindingMode,
    ) -> Result<(), LifecycleError> {
        let node_id = self.application_node(app_id, token).await?;
        self.client
            .update_environment_bindings(app_id, &node_id, token, service_name, entry, mode)
            .await?;
        self.client.reconfigure(app_id, token).await?;
        Ok(())
    }
}
