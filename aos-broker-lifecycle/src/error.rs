//! Error types for the gateway and the lifecycle driver

use thiserror::Error;

/// Failure of a single orchestration API operation.
///
/// A "not found" answer is not an error: status queries report
/// [`crate::BackendState::AppNotExist`] and delete confirmation returns `true`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The backend could not be reached or the exchange broke off
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a status outside the accepted set
    #[error("{operation}: rejected with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The response body does not have the expected shape
    #[error("{operation}: malformed response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A nested field the caller depends on is absent
    #[error("{operation}: {detail}")]
    PartialData {
        operation: &'static str,
        detail: String,
    },

    /// The request could not be built from the given arguments
    #[error("{operation}: {detail}")]
    InvalidRequest {
        operation: &'static str,
        detail: String,
    },
}

impl GatewayError {
    pub(crate) fn partial(operation: &'static str, detail: impl Into<String>) -> Self {
        GatewayError::PartialData { operation, detail: detail.into() }
    }

    /// HTTP status of a rejected request
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of a synchronous broker operation
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to create application '{stack_name}': {source}")]
    Create {
        stack_name: String,
        #[source]
        source: GatewayError,
    },

    /// The application exists on the backend but was never started.
    /// It is not rolled back; a later deprovision removes it.
    #[error("application {app_id} ('{stack_name}') created but failed to start: {source}")]
    Start {
        app_id: String,
        stack_name: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to delete application {app_id}: {source}")]
    Delete {
        app_id: String,
        #[source]
        source: GatewayError,
    },

    #[error("failed to update inputs of application {app_id}: {source}")]
    Update {
        app_id: String,
        #[source]
        source: GatewayError,
    },

    #[error("application {app_id} has no node of type {node_type}")]
    NodeNotFound { app_id: String, node_type: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl LifecycleError {
    /// Instance handle that was issued before the failure, if any
    pub fn issued_app_id(&self) -> Option<&str> {
        match self {
            LifecycleError::Start { app_id, .. } => Some(app_id),
            _ => None,
        }
    }
}
