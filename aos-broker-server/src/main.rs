use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod cli;
mod commands;
mod config;

use cli::{Args, Mode};

/// Initialize tracing with two outputs:
/// 1. Console (stderr) for interactive use
/// 2. File (`<log dir>/broker.log`) for persistence
fn initialize_tracing() -> Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,\
         aos_broker_server=debug,\
         aos_broker_lifecycle=debug,\
         tower_http=info,\
         hyper=warn,\
         reqwest=warn"
            .into()
    });

    let log_dir = config::log_dir();
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::never(&log_dir, "broker.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Dropping the guard stops file logging
    std::mem::forget(guard);

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let console_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::debug!("Tracing initialized, file: {}", log_dir.join("broker.log").display());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    initialize_tracing()?;

    match args.mode {
        Mode::Serve { port } => commands::server::run_server(port).await,
        Mode::Provision {
            service_name,
            blueprint,
            space,
            instance_id,
            params,
            token,
        } => {
            commands::instance::run_provision(service_name, blueprint, space, instance_id, params, token).await
        }
        Mode::Status { app_id, token } => commands::instance::run_status(app_id, token).await,
        Mode::Poll { app_id, operation, token } => {
            commands::instance::run_poll(app_id, operation.into(), token).await
        }
        Mode::Deprovision { app_id, token } => commands::instance::run_deprovision(app_id, token).await,
        Mode::Bind {
            app_id,
            service,
            name,
            label,
            plan,
            tags,
            credentials,
            token,
        } => {
            let entry = aos_broker_lifecycle::BindingEntry {
                name,
                label,
                tags,
                plan,
                credentials,
            };
            commands::instance::run_bind(app_id, service, entry, token).await
        }
        Mode::Unbind { app_id, service, name, token } => {
            commands::instance::run_unbind(app_id, service, name, token).await
        }
    }
}
