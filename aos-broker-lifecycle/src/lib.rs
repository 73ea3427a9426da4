//! AOS Broker Lifecycle - maps Open Service Broker operations onto the AOS
//! application-orchestration API
//!
//! This crate provides the backend gateway ([`AosClient`]) that speaks the
//! orchestration REST API, and the lifecycle driver ([`LifecycleDriver`]) that
//! turns broker verbs into gateway calls and backend states into poll states.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use aos_broker_lifecycle::{AosClient, AosConfig, LifecycleDriver};
//! use aos_broker_models::BrokerOperation;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AosClient::new(AosConfig {
//!     endpoint: "http://aos.internal:8080".to_string(),
//!     timeout: Duration::from_secs(30),
//! })?;
//! let driver = LifecycleDriver::new(client, "/console");
//!
//! let op = driver.poll("app-guid", BrokerOperation::Create, "token").await;
//! println!("{}", op.state);
//! # Ok(())
//! # }
//! ```

pub mod aos_client;
pub mod driver;
pub mod env_bindings;
pub mod error;
pub mod names;
pub mod status;
pub mod types;

pub use aos_client::{AosClient, AosConfig};
pub use driver::{LifecycleDriver, ProvisionRequest, Provisioned};
pub use env_bindings::{merge_binding, BindServices, BindingEntry, BindingMode, NodeProperties};
pub use error::{GatewayError, LifecycleError};
pub use names::stack_name;
pub use types::{BackendState, NetworkInfo, NodeDescriptor};
