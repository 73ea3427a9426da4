use anyhow::{Context, Result};
use aos_broker_lifecycle::{BindingEntry, LifecycleError, ProvisionRequest};
use aos_broker_models::{BrokerOperation, CreateInstanceResponse, PollState};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::Config;

/// `--token`, falling back to `AOS_TOKEN`
fn resolve_token(token: Option<String>) -> Result<String> {
    match token {
        Some(token) => Ok(token),
        None => std::env::var("AOS_TOKEN").context("No token given: pass --token or set AOS_TOKEN"),
    }
}

fn to_parameters(params: Vec<(String, String)>) -> Map<String, Value> {
    params.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
}

pub async fn run_provision(
    service_name: String,
    blueprint: String,
    space: String,
    instance_id: Option<String>,
    params: Vec<(String, String)>,
    token: Option<String>,
) -> Result<()> {
    let token = resolve_token(token)?;
    let driver = super::build_driver(&Config::load()?)?;

    let req = ProvisionRequest {
        instance_id: instance_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        service_name,
        template_id: blueprint,
        parameters: to_parameters(params),
        project_id: space,
    };

    match driver.provision(&req, &token).await {
        Ok(done) => {
            let resp = CreateInstanceResponse::new(done.app_id, done.stack_name);
            println!("{}", serde_json::to_string_pretty(&resp)?);
            println!();
            println!("Poll with: aos-broker poll {} --operation create", resp.userdata);
            Ok(())
        }
        Err(e) => {
            if let LifecycleError::Start { app_id, .. } = &e {
                eprintln!("✗ Application {} was created but not started; delete it with:", app_id);
                eprintln!("  aos-broker deprovision {}", app_id);
            }
            Err(e.into())
        }
    }
}

pub async fn run_status(app_id: String, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let driver = super::build_driver(&Config::load()?)?;

    let state = driver.instance_status(&app_id, &token).await?;
    println!("{:<20} {}", "APPLICATION", "STATUS");
    println!("{:<20} {}", app_id, state);
    Ok(())
}

pub async fn run_poll(app_id: String, operation: BrokerOperation, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let driver = super::build_driver(&Config::load()?)?;

    let result = driver.poll(&app_id, operation, &token).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.state == PollState::Failed {
        anyhow::bail!("Operation '{}' failed for application {}", operation, app_id);
    }
    Ok(())
}

pub async fn run_deprovision(app_id: String, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let driver = super::build_driver(&Config::load()?)?;

    driver.deprovision(&app_id, &token).await?;
    println!("✓ Delete requested for {}", app_id);
    println!("  Poll with: aos-broker poll {} --operation delete", app_id);
    Ok(())
}

pub async fn run_bind(app_id: String, service: String, entry: BindingEntry, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let driver = super::build_driver(&Config::load()?)?;

    let name = entry.name.clone();
    driver.bind_environment(&app_id, &token, &service, entry).await?;
    println!("✓ Bound {}/{} to {}", service, name, app_id);
    Ok(())
}

pub async fn run_unbind(app_id: String, service: String, name: String, token: Option<String>) -> Result<()> {
    let token = resolve_token(token)?;
    let driver = super::build_driver(&Config::load()?)?;

    driver.unbind_environment(&app_id, &token, &service, &name).await?;
    println!("✓ Unbound {}/{} from {}", service, name, app_id);
    Ok(())
}
