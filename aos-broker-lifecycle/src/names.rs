//! Name constants for the AOS orchestration API and stack naming

/// Orchestration API routing
pub mod api {
    /// Root of every stack resource
    pub const STACKS: &str = "/v2/stacks";

    /// Header carrying the caller's bearer token
    pub const AUTH_HEADER: &str = "X-Auth-Token";
}

/// Lifecycle actions accepted by `PUT /v2/stacks/{id}/actions`
pub mod lifecycle {
    /// Moves a defined application to running
    pub const CREATE: &str = "create";

    /// Re-applies blueprint inputs
    pub const UPGRADE: &str = "upgrade";

    /// Re-reads node properties (environment) without new inputs
    pub const RECONFIGURE: &str = "reconfigure";
}

/// Node type of the single application component in broker blueprints
pub const APPLICATION_NODE_TYPE: &str = "hwpaas.nodes.Application";

/// Blueprint output holding the externally reachable port
pub const PORT_OUTPUT: &str = "address_port";

/// Prefix of every stack created by the broker
pub const STACK_PREFIX: &str = "i";

const SERVICE_NAME_MAX_CHARS: usize = 12;
const INSTANCE_ID_MAX_CHARS: usize = 5;

/// Derive the backend stack name for a service instance.
///
/// `{prefix}-{service name, 12 chars}-{instance id, 5 chars}` with any
/// trailing `-` removed. Two instances whose ids share a 5-char prefix and
/// whose service names match collide.
pub fn stack_name(prefix: &str, service_name: &str, instance_id: &str) -> String {
    let service: String = service_name.chars().take(SERVICE_NAME_MAX_CHARS).collect();
    let instance: String = instance_id.chars().take(INSTANCE_ID_MAX_CHARS).collect();

    format!("{}-{}-{}", prefix, service, instance)
        .trim_end_matches('-')
        .to_string()
}
