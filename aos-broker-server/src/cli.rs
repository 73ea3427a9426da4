use clap::{Parser, Subcommand, ValueEnum};

use aos_broker_models::BrokerOperation;

/// AOS Broker - Open Service Broker front end for the AOS orchestration service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Run the broker HTTP server
    Serve {
        /// Listen port (default: BROKER_PORT or 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create and start an application from a blueprint
    Provision {
        /// Human-readable service name
        service_name: String,

        /// Blueprint (template) id
        #[arg(long)]
        blueprint: String,

        /// Project / space id
        #[arg(long, default_value = "")]
        space: String,

        /// Instance id (default: random UUID)
        #[arg(long)]
        instance_id: Option<String>,

        /// Blueprint input as key=value (repeatable)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Bearer token (default: AOS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Show the backend state of an application
    Status {
        /// Instance handle (AOS application id)
        app_id: String,

        /// Bearer token (default: AOS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Poll an asynchronous operation once
    Poll {
        /// Instance handle (AOS application id)
        app_id: String,

        /// Operation being polled
        #[arg(short, long, value_enum, default_value = "create")]
        operation: OperationArg,

        /// Bearer token (default: AOS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Delete an application
    Deprovision {
        /// Instance handle (AOS application id)
        app_id: String,

        /// Bearer token (default: AOS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Add an environment binding to the application node
    Bind {
        /// Instance handle (AOS application id)
        app_id: String,

        /// Dependent service name (key under BIND_SERVICES)
        #[arg(long)]
        service: String,

        /// Binding entry name
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        label: String,

        #[arg(long, default_value = "")]
        plan: String,

        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Opaque credential blob
        #[arg(long, default_value = "")]
        credentials: String,

        /// Bearer token (default: AOS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Remove an environment binding from the application node
    Unbind {
        /// Instance handle (AOS application id)
        app_id: String,

        /// Dependent service name (key under BIND_SERVICES)
        #[arg(long)]
        service: String,

        /// Binding entry name
        #[arg(long)]
        name: String,

        /// Bearer token (default: AOS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationArg {
    Create,
    Update,
    Delete,
}

impl From<OperationArg> for BrokerOperation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Create => BrokerOperation::Create,
            OperationArg::Update => BrokerOperation::Update,
            OperationArg::Delete => BrokerOperation::Delete,
        }
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poll() {
        let args = Args::try_parse_from(["aos-broker", "poll", "app-1", "--operation", "delete"]).unwrap();
        match args.mode {
            Mode::Poll { app_id, operation, token } => {
                assert_eq!(app_id, "app-1");
                assert_eq!(BrokerOperation::from(operation), BrokerOperation::Delete);
                assert_eq!(token, None);
            }
            other => panic!("unexpected mode: {:?}", other),
        }
    }

    #[test]
    fn test_parse_bind_with_tags() {
        let args = Args::try_parse_from([
            "aos-broker", "bind", "app-1",
            "--service", "mysql", "--name", "db-1",
            "--tag", "a", "--tag", "b",
        ])
        .unwrap();
        match args.mode {
            Mode::Bind { service, name, tags, label, .. } => {
                assert_eq!(service, "mysql");
                assert_eq!(name, "db-1");
                assert_eq!(tags, vec!["a", "b"]);
                assert_eq!(label, "");
            }
            other => panic!("unexpected mode: {:?}", other),
        }
    }

    #[test]
    fn test_parse_provision_params() {
        let args = Args::try_parse_from([
            "aos-broker", "provision", "orders",
            "--blueprint", "bp-1",
            "--param", "replicas=2", "--param", "opts=a=b",
        ])
        .unwrap();
        match args.mode {
            Mode::Provision { service_name, blueprint, params, instance_id, .. } => {
                assert_eq!(service_name, "orders");
                assert_eq!(blueprint, "bp-1");
                assert_eq!(instance_id, None);
                assert_eq!(
                    params,
                    vec![
                        ("replicas".to_string(), "2".to_string()),
                        ("opts".to_string(), "a=b".to_string()),
                    ]
                );
            }
            other => panic!("unexpected mode: {:?}", other),
        }
    }

    #[test]
    fn test_parse_key_value_rejects_malformed() {
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
        assert_eq!(parse_key_value("k=").unwrap(), ("k".to_string(), String::new()));
    }

    #[test]
    fn test_serve_port_optional() {
        let args = Args::try_parse_from(["aos-broker", "serve"]).unwrap();
        assert!(matches!(args.mode, Mode::Serve { port: None }));
    }
}
