//! Method name constants and the capability each gated method requires
//! (spec §4.4.1/§4.4.2, §9 "Capability gating").

use mcplex_types::{ClientCapabilities, ServerCapabilities};

pub mod server_bound {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCE_TEMPLATES_LIST: &str = "resources/templates/list";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const COMPLETION_COMPLETE: &str = "completion/complete";
    pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
    pub const PING: &str = "ping";
    pub const CANCELLED: &str = "notifications/cancelled";
    pub const PROGRESS: &str = "notifications/progress";
    pub const ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
}

pub mod client_bound {
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    pub const ROOTS_LIST: &str = "roots/list";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
    pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    pub const LOGGING_MESSAGE: &str = "notifications/message";
    pub const PROGRESS: &str = "notifications/progress";
    pub const CANCELLED: &str = "notifications/cancelled";
}

/// Methods that MUST succeed before the handshake completes — everything
/// else is gated to the `Operational` state (spec §4.4 "Calls to most
/// methods before Operational MUST fail").
pub fn allowed_before_operational(method: &str) -> bool {
    matches!(
        method,
        server_bound::INITIALIZE | server_bound::INITIALIZED | server_bound::PING | server_bound::CANCELLED
    )
}

/// Returns `false` if the server-bound `method` requires a capability the
/// peer never advertised. Methods with no capability requirement (ping,
/// cancellation, initialize) always return `true`.
pub fn server_method_permitted(method: &str, caps: &ServerCapabilities) -> bool {
    match method {
        server_bound::TOOLS_LIST | server_bound::TOOLS_CALL => caps.tools.is_some(),
        server_bound::RESOURCES_LIST
        | server_bound::RESOURCES_READ
        | server_bound::RESOURCE_TEMPLATES_LIST => caps.resources.is_some(),
        server_bound::RESOURCES_SUBSCRIBE | server_bound::RESOURCES_UNSUBSCRIBE => {
            caps.resources.is_some_and(|r| r.subscribe)
        }
        server_bound::PROMPTS_LIST | server_bound::PROMPTS_GET => caps.prompts.is_some(),
        server_bound::COMPLETION_COMPLETE => caps.completion.is_some(),
        server_bound::LOGGING_SET_LEVEL => caps.logging.is_some(),
        _ => true,
    }
}

/// Same check for the client-bound direction: a server must not send
/// `sampling/createMessage` or `elicitation/create` unless the client
/// declared the matching handler at construction (spec §4.4.2).
pub fn client_method_permitted(method: &str, caps: &ClientCapabilities) -> bool {
    match method {
        client_bound::SAMPLING_CREATE_MESSAGE => caps.sampling.is_some(),
        client_bound::ELICITATION_CREATE => caps.elicitation.is_some(),
        client_bound::ROOTS_LIST => caps.roots.is_some(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_types::ListChangedCapability;

    #[test]
    fn tools_call_requires_tools_capability() {
        let caps = ServerCapabilities::default();
        assert!(!server_method_permitted(server_bound::TOOLS_CALL, &caps));

        let caps = ServerCapabilities {
            tools: Some(ListChangedCapability { list_changed: true }),
            ..Default::default()
        };
        assert!(server_method_permitted(server_bound::TOOLS_CALL, &caps));
    }

    #[test]
    fn ping_and_initialize_are_always_permitted() {
        assert!(allowed_before_operational(server_bound::PING));
        assert!(allowed_before_operational(server_bound::INITIALIZE));
        assert!(!allowed_before_operational(server_bound::TOOLS_CALL));
    }

    #[test]
    fn subscribe_requires_subscribe_subflag_not_just_resources() {
        let caps = ServerCapabilities {
            resources: Some(mcplex_types::ResourcesCapability {
                list_changed: true,
                subscribe: false,
            }),
            ..Default::default()
        };
        assert!(!server_method_permitted(server_bound::RESOURCES_SUBSCRIBE, &caps));
    }
}
