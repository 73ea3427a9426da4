//! In-process fake of the AOS orchestration API
//!
//! Serves the `/v2/stacks` routes from an in-memory table on an ephemeral
//! port. Tests seed stacks, flip failure switches and inspect the recorded
//! requests through the shared handle.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aos_broker_lifecycle::{AosClient, AosConfig, LifecycleDriver};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;

pub const TOKEN: &str = "test-token";
pub const APP_NODE_TYPE: &str = "hwpaas.nodes.Application";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub token: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct FakeStack {
    pub name: String,
    pub template_id: String,
    pub project_id: String,
    pub inputs: Value,
    pub status: String,
    /// Lifecycle action bodies received, in order
    pub actions: Vec<Value>,
    /// Node list entries (`{id, number_of_instances, type}`)
    pub nodes: Vec<Value>,
    /// Node detail documents by node id
    pub node_details: HashMap<String, Value>,
    pub outputs: Value,
    /// Raw properties bodies by node id
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct FakeAos {
    pub stacks: HashMap<String, FakeStack>,
    pub next_id: u32,
    pub requests: Vec<RecordedRequest>,
    /// Answer `POST /v2/stacks` with 500
    pub fail_create: bool,
    /// Answer `POST /v2/stacks` with 201 but no guid
    pub create_without_guid: bool,
    /// Answer actions with 500
    pub fail_actions: bool,
    /// Answer `GET /v2/stacks/{id}` with this status instead
    pub get_status_override: Option<u16>,
    /// Answer `DELETE /v2/stacks/{id}` with this status instead
    pub delete_status_override: Option<u16>,
    /// Answer `GET /v2/stacks/{id}` with a non-JSON body
    pub garbage_status_body: bool,
}

pub type Shared = Arc<Mutex<FakeAos>>;

impl FakeAos {
    /// Seed an application with one application node that is fully reachable
    pub fn with_running_app(app_id: &str) -> Self {
        let mut fake = FakeAos::default();
        fake.stacks.insert(app_id.to_string(), running_stack());
        fake
    }

    pub fn stack(&mut self, app_id: &str) -> &mut FakeStack {
        self.stacks.entry(app_id.to_string()).or_default()
    }
}

pub fn running_stack() -> FakeStack {
    let mut node_details = HashMap::new();
    node_details.insert(
        "node-1".to_string(),
        json!({
            "runtime_properties": {"Service": {"ports": [{"nodePort": 30080}]}},
            "instances": {"items": [{"status": {"hostIP": "10.0.0.7"}}]}
        }),
    );
    FakeStack {
        name: "i-orders-abcde".to_string(),
        status: "Running".to_string(),
        nodes: vec![
            json!({"id": "node-1", "number_of_instances": 1, "type": APP_NODE_TYPE}),
            json!({"id": "db-node", "number_of_instances": 1, "type": "hwpaas.nodes.Database"}),
        ],
        node_details,
        outputs: json!({"outputs": {"address_port": {"value": "31500", "description": "public port"}}}),
        ..FakeStack::default()
    }
}

/// Start the fake and return its base URL and shared state
pub async fn spawn(fake: FakeAos) -> (String, Shared) {
    let shared: Shared = Arc::new(Mutex::new(fake));

    let app = Router::new()
        .route("/v2/stacks", axum::routing::post(create_stack))
        .route("/v2/stacks/:id", get(get_stack).delete(delete_stack))
        .route("/v2/stacks/:id/actions", put(stack_action))
        .route("/v2/stacks/:id/nodes", get(list_nodes))
        .route("/v2/stacks/:id/nodes/:node_id", get(get_node))
        .route(
            "/v2/stacks/:id/nodes/:node_id/properties",
            get(get_properties).put(put_properties),
        )
        .route("/v2/stacks/:id/outputs", get(get_outputs))
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake AOS");
    let addr = listener.local_addr().expect("fake AOS address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake AOS server");
    });

    (format!("http://{}", addr), shared)
}

pub fn client(base_url: &str) -> AosClient {
    AosClient::new(AosConfig {
        endpoint: base_url.to_string(),
        timeout: Duration::from_secs(5),
    })
    .expect("build client")
}

pub fn driver(base_url: &str) -> LifecycleDriver {
    LifecycleDriver::new(client(base_url), "/console")
}

/// A client pointed at a port nothing listens on
pub fn unreachable_client() -> AosClient {
    AosClient::new(AosConfig {
        endpoint: "http://127.0.0.1:1".to_string(),
        timeout: Duration::from_secs(2),
    })
    .expect("build client")
}

fn record(fake: &mut FakeAos, method: Method, path: String, headers: &HeaderMap, body: &[u8]) {
    fake.requests.push(RecordedRequest {
        method,
        path,
        token: headers
            .get("X-Auth-Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(body).into_owned(),
    });
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, r#"{"error":"stack not found"}"#).into_response()
}

async fn create_stack(State(state): State<Shared>, headers: HeaderMap, body: Bytes) -> Response {
    let mut fake = state.lock().await;
    record(&mut fake, Method::POST, "/v2/stacks".to_string(), &headers, &body);

    if fake.fail_create {
        return (StatusCode::INTERNAL_SERVER_ERROR, "quota exceeded").into_response();
    }
    if fake.create_without_guid {
        return (StatusCode::CREATED, Json(json!({}))).into_response();
    }
    let Ok(req) = serde_json::from_slice::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, "bad json").into_response();
    };

    fake.next_id += 1;
    let app_id = format!("app-{}", fake.next_id);
    let stack = FakeStack {
        name: req["name"].as_str().unwrap_or_default().to_string(),
        template_id: req["template_id"].as_str().unwrap_or_default().to_string(),
        project_id: req["project_id"].as_str().unwrap_or_default().to_string(),
        inputs: req["inputs_json"].clone(),
        status: "Pending".to_string(),
        ..FakeStack::default()
    };
    fake.stacks.insert(app_id.clone(), stack);

    (StatusCode::CREATED, Json(json!({"guid": app_id}))).into_response()
}

async fn get_stack(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let mut fake = state.lock().await;
    record(&mut fake, Method::GET, format!("/v2/stacks/{}", id), &headers, b"");

    if let Some(code) = fake.get_status_override {
        return (status(code), "overridden").into_response();
    }
    if fake.garbage_status_body {
        return (StatusCode::OK, "<html>gateway</html>").into_response();
    }
    match fake.stacks.get(&id) {
        Some(stack) => Json(json!({"name": stack.name, "status": stack.status})).into_response(),
        None => not_found(),
    }
}

async fn delete_stack(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let mut fake = state.lock().await;
    record(&mut fake, Method::DELETE, format!("/v2/stacks/{}", id), &headers, b"");

    if let Some(code) = fake.delete_status_override {
        return (status(code), "delete refused: stack is locked").into_response();
    }
    match fake.stacks.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(),
    }
}

async fn stack_action(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut fake = state.lock().await;
    record(&mut fake, Method::PUT, format!("/v2/stacks/{}/actions", id), &headers, &body);

    if fake.fail_actions {
        return (StatusCode::INTERNAL_SERVER_ERROR, "action rejected").into_response();
    }
    let action: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    match fake.stacks.get_mut(&id) {
        Some(stack) => {
            if action["lifecycle"] == "create" || action["lifecycle"] == "upgrade" {
                stack.status = "Processing".to_string();
            }
            stack.actions.push(action);
            StatusCode::ACCEPTED.into_response()
        }
        None => not_found(),
    }
}

async fn list_nodes(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut fake = state.lock().await;
    record(&mut fake, Method::GET, format!("/v2/stacks/{}/nodes", id), &headers, b"");

    let Some(stack) = fake.stacks.get(&id) else {
        return not_found();
    };
    let nodes: Vec<Value> = stack
        .nodes
        .iter()
        .filter(|n| match query.get("node_type") {
            Some(t) => n["type"] == t.as_str(),
            None => true,
        })
        .cloned()
        .collect();
    Json(Value::Array(nodes)).into_response()
}

async fn get_node(
    State(state): State<Shared>,
    Path((id, node_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let mut fake = state.lock().await;
    record(&mut fake, Method::GET, format!("/v2/stacks/{}/nodes/{}", id, node_id), &headers, b"");

    match fake.stacks.get(&id).and_then(|s| s.node_details.get(&node_id)) {
        Some(detail) => Json(detail.clone()).into_response(),
        None => not_found(),
    }
}

async fn get_outputs(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    let mut fake = state.lock().await;
    record(&mut fake, Method::GET, format!("/v2/stacks/{}/outputs", id), &headers, b"");

    match fake.stacks.get(&id) {
        Some(stack) => Json(stack.outputs.clone()).into_response(),
        None => not_found(),
    }
}

async fn get_properties(
    State(state): State<Shared>,
    Path((id, node_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let mut fake = state.lock().await;
    let path = format!("/v2/stacks/{}/nodes/{}/properties", id, node_id);
    record(&mut fake, Method::GET, path, &headers, b"");

    match fake.stacks.get(&id) {
        Some(stack) => (
            StatusCode::OK,
            stack.properties.get(&node_id).cloned().unwrap_or_default(),
        )
            .into_response(),
        None => not_found(),
    }
}

async fn put_properties(
    State(state): State<Shared>,
    Path((id, node_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut fake = state.lock().await;
    let path = format!("/v2/stacks/{}/nodes/{}/properties", id, node_id);
    record(&mut fake, Method::PUT, path, &headers, &body);

    match fake.stacks.get_mut(&id) {
        Some(stack) => {
            stack
                .properties
                .insert(node_id, String::from_utf8_lossy(&body).into_owned());
            StatusCode::OK.into_response()
        }
        None => not_found(),
    }
}
