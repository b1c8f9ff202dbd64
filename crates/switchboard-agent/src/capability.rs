// ABOUTME: Capabilities an agent can invoke: remote tools or other agents exposed as tools.
// ABOUTME: CapabilitySet keeps them in registration order and rejects duplicate names.

use std::fmt;
use std::sync::Arc;

use serde_json::json;
use switchboard_core::{CapabilityDescriptor, Error, Tool, capability_name};

use crate::agent::Agent;

/// Argument an AgentCapability expects from the calling model.
pub const REQUEST_ARGUMENT: &str = "request";

/// Something an agent may invoke by name.
#[derive(Clone)]
pub enum Capability {
    Tool(Arc<dyn Tool>),
    Agent(AgentCapability),
}

impl Capability {
    pub fn descriptor(&self) -> &CapabilityDescriptor {
        match self {
            Capability::Tool(tool) => tool.descriptor(),
            Capability::Agent(agent) => &agent.descriptor,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor().name
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Tool(tool) => f.debug_tuple("Tool").field(&tool.descriptor().name).finish(),
            Capability::Agent(agent) => f.debug_tuple("Agent").field(&agent.descriptor.name).finish(),
        }
    }
}

/// An agent wrapped so another agent can call it with `{"request": "..."}`.
#[derive(Clone)]
pub struct AgentCapability {
    descriptor: CapabilityDescriptor,
    agent: Arc<Agent>,
}

impl AgentCapability {
    pub fn new(agent: Arc<Agent>) -> Self {
        let description = agent
            .description()
            .map(String::from)
            .unwrap_or_else(|| format!("Delegate a request to {}", agent.name()));
        let descriptor = CapabilityDescriptor::new(
            capability_name(agent.name()),
            description,
            json!({
                "type": "object",
                "properties": {
                    REQUEST_ARGUMENT: {
                        "type": "string",
                        "description": "What the agent should do, in plain language"
                    }
                },
                "required": [REQUEST_ARGUMENT]
            }),
        );
        Self { descriptor, agent }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }
}

/// Ordered capabilities with unique names.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    entries: Vec<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) -> Result<(), Error> {
        if self.get(capability.name()).is_some() {
            return Err(Error::Configuration(format!(
                "duplicate capability name: {}",
                capability.name()
            )));
        }
        self.entries.push(capability);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.iter().find(|c| c.name() == name)
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.entries.iter().map(|c| c.descriptor().clone()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, StaticTool};
    use switchboard_core::ErrorKind;

    fn tool(name: &str) -> Capability {
        Capability::Tool(Arc::new(StaticTool::ok(name, "{}")))
    }

    #[test]
    fn insert_rejects_duplicate_names() {
        let mut set = CapabilitySet::new();
        set.insert(tool("get_issue")).unwrap();
        set.insert(tool("search")).unwrap();

        let err = set.insert(tool("get_issue")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(set.names(), vec!["get_issue", "search"]);
    }

    #[test]
    fn agent_capability_exposes_request_schema() {
        let agent = Agent::builder("MCP Jira Agent", ScriptedBackend::sequence(vec![]))
            .description("Looks up Jira tickets")
            .build()
            .unwrap();
        let capability = AgentCapability::new(Arc::new(agent));

        let descriptor = capability.descriptor();
        assert_eq!(descriptor.name, "mcp_jira_agent");
        assert_eq!(descriptor.description, "Looks up Jira tickets");
        assert_eq!(descriptor.parameters["required"][0], REQUEST_ARGUMENT);
        assert_eq!(
            descriptor.parameters["properties"][REQUEST_ARGUMENT]["type"],
            "string"
        );
    }

    #[test]
    fn agent_capability_defaults_description() {
        let agent = Agent::builder("TicketAgent", ScriptedBackend::sequence(vec![]))
            .build()
            .unwrap();
        let capability = AgentCapability::new(Arc::new(agent));
        assert_eq!(capability.descriptor().name, "ticketagent");
        assert!(capability.descriptor().description.contains("TicketAgent"));
    }
}
