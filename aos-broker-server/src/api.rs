use std::sync::Arc;

use anyhow::Result;
use aos_broker_lifecycle::{BackendState, LifecycleDriver, LifecycleError, ProvisionRequest};
use aos_broker_models::{
    BrokerOperation, CreateBindingRequest, CreateBindingResponse, CreateInstanceRequest,
    CreateInstanceResponse, InstanceStatusResponse, LastOperationQuery, PollState,
    UpdateInstanceRequest, UserdataRequest,
};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Shared API state
#[derive(Clone)]
pub struct AppState {
    pub driver: Arc<LifecycleDriver>,
}

/// Create the broker router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v2/catalog", get(catalog))
        .route(
            "/v2/service_instances/:instance_id",
            put(create_instance).delete(delete_instance).patch(update_instance),
        )
        .route(
            "/v2/service_instances/:instance_id/service_bindings/:binding_id",
            put(create_binding).delete(delete_binding),
        )
        .route("/v2/service_instances/:instance_id/last_operation", get(last_operation))
        .route("/v2/service_instances/:instance_id/status", get(instance_status))
        .route("/v2/provision", get(provision_page))
        .route("/v2/update", get(update_page))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the broker server; returns when the shutdown future resolves
pub async fn start_server(
    addr: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("✓ Broker listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

fn auth_token(headers: &HeaderMap) -> String {
    headers
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn parse_body<T: DeserializeOwned>(body: &Bytes, what: &str) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::warn!("Unmarshal {} request body failed: {}", what, e);
        AppError::BadRequest(format!("Unmarshal {} request body failed", what))
    })
}

// ============================================================================
// Health
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "aos-broker",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The platform probes the catalog to decide whether the broker is up
async fn catalog() -> impl IntoResponse {
    (StatusCode::OK, Json("broker status ok"))
}

// ============================================================================
// Service instances
// ============================================================================

async fn create_instance(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: CreateInstanceRequest = parse_body(&body, "create")?;
    let token = auth_token(&headers);

    let provision = ProvisionRequest {
        instance_id,
        service_name: req.instance_name,
        template_id: req.blueprint_id,
        parameters: req.parameters,
        project_id: req.space_guid,
    };

    match state.driver.provision(&provision, &token).await {
        Ok(done) => {
            let resp = CreateInstanceResponse::new(done.app_id, done.stack_name);
            Ok((StatusCode::ACCEPTED, Json(resp)).into_response())
        }
        Err(e) => {
            tracing::warn!("Provision failed: {}", e);
            let resp = match &e {
                LifecycleError::Start { app_id, stack_name, .. } => {
                    CreateInstanceResponse::new(app_id.clone(), stack_name.clone())
                }
                LifecycleError::Create { stack_name, .. } => CreateInstanceResponse::new("", stack_name.clone()),
                _ => CreateInstanceResponse::new("", ""),
            };
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(resp)).into_response())
        }
    }
}

async fn delete_instance(
    State(state): State<AppState>,
    Path(_instance_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: UserdataRequest = parse_body(&body, "delete")?;
    let token = auth_token(&headers);

    state
        .driver
        .deprovision(&req.userdata, &token)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({}))).into_response())
}

async fn update_instance(
    State(state): State<AppState>,
    Path(_instance_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: UpdateInstanceRequest = parse_body(&body, "update")?;
    let token = auth_token(&headers);
    tracing::info!(app_id = %req.userdata, "Update instance request");

    state
        .driver
        .update(&req.userdata, &token, req.parameters.as_ref())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let resp = CreateInstanceResponse::new(req.userdata, "");
    Ok((StatusCode::ACCEPTED, Json(resp)).into_response())
}

// ============================================================================
// Polling and status
// ============================================================================

async fn last_operation(
    State(state): State<AppState>,
    Path(_instance_id): Path<String>,
    Query(query): Query<LastOperationQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let operation: BrokerOperation = query.operation.parse().map_err(AppError::BadRequest)?;
    let token = auth_token(&headers);

    let result = state.driver.poll(&query.userdata, operation, &token).await;

    let status = if result.state == PollState::Failed {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)).into_response())
}

/// The request body is the raw instance handle
async fn instance_status(
    State(state): State<AppState>,
    Path(_instance_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let app_id = String::from_utf8_lossy(&body).trim().to_string();
    if app_id.is_empty() {
        return Err(AppError::BadRequest("request body invalid".to_string()));
    }
    let token = auth_token(&headers);

    let (status, body) = match state.driver.instance_status(&app_id, &token).await {
        Ok(BackendState::Running) => (StatusCode::OK, InstanceStatusResponse::available()),
        Ok(BackendState::AppNotExist) => {
            (StatusCode::GONE, InstanceStatusResponse::unavailable(Some("app not exist")))
        }
        Ok(other) => {
            tracing::info!(app_id = %app_id, status = %other, "Instance not available");
            (StatusCode::OK, InstanceStatusResponse::unavailable(Some("app status not ok")))
        }
        Err(e) => {
            tracing::error!(app_id = %app_id, "Query app status from AOS failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, InstanceStatusResponse::unavailable(None))
        }
    };
    Ok((status, Json(body)).into_response())
}

// ============================================================================
// Bindings
// ============================================================================

/// Credential issuance is not implemented; callers get placeholder credentials
async fn create_binding(
    Path((_instance_id, _binding_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, AppError> {
    let req: CreateBindingRequest = parse_body(&body, "create binding")?;

    let mut credentials = serde_json::Map::new();
    credentials.insert("username".to_string(), "testUser".into());
    credentials.insert("password".to_string(), "testPassword".into());

    let resp = CreateBindingResponse {
        credentials,
        userdata: req.userdata,
    };
    Ok((StatusCode::OK, Json(resp)).into_response())
}

async fn delete_binding(Path((_instance_id, _binding_id)): Path<(String, String)>) -> impl IntoResponse {
    (StatusCode::OK, Json("Binding was deleted"))
}

// ============================================================================
// Custom provision / update pages
// ============================================================================

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(rename = "backUrl", default)]
    back_url: String,
    #[serde(rename = "preInfo", default)]
    pre_info: String,
}

fn redirect(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

async fn provision_page(Query(query): Query<PageQuery>) -> Response {
    tracing::info!(back_url = %query.back_url, "Provision page");
    redirect(query.back_url)
}

async fn update_page(Query(query): Query<PageQuery>) -> Response {
    tracing::info!(back_url = %query.back_url, pre_info = %query.pre_info, "Update page");
    if query.pre_info.is_empty() {
        redirect(query.back_url)
    } else {
        redirect(format!("{}?parameters={}", query.back_url, query.pre_info))
    }
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
