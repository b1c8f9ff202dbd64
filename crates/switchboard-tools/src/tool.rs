// ABOUTME: RemoteTool: a discovered MCP tool that invokes through a weak reference to its session.
// ABOUTME: Tools never keep a connection alive; once the provider closes, calls fail cleanly.

use std::sync::Weak;

use async_trait::async_trait;
use serde_json::{Value, json};
use switchboard_core::{CapabilityDescriptor, InvocationError, Tool};

use crate::session::McpSession;

/// A tool offered by one MCP server.
pub struct RemoteTool {
    descriptor: CapabilityDescriptor,
    server: String,
    session: Weak<McpSession>,
}

impl RemoteTool {
    pub fn new(descriptor: CapabilityDescriptor, server: String, session: Weak<McpSession>) -> Self {
        Self {
            descriptor,
            server,
            session,
        }
    }

    /// Name of the server this tool was discovered on.
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl std::fmt::Debug for RemoteTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTool")
            .field("name", &self.descriptor.name)
            .field("server", &self.server)
            .finish()
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, arguments: Value) -> Result<String, InvocationError> {
        let arguments = match arguments {
            Value::Null => json!({}),
            Value::Object(_) => arguments,
            other => {
                return Err(InvocationError::new(format!(
                    "arguments for '{}' must be a JSON object, got {}",
                    self.descriptor.name, other
                )));
            }
        };

        let session = self
            .session
            .upgrade()
            .filter(|s| !s.is_closed())
            .ok_or_else(|| {
                InvocationError::new(format!("connection to '{}' is closed", self.server))
            })?;

        tracing::debug!(server = %self.server, tool = %self.descriptor.name, "calling remote tool");
        session.call_tool(&self.descriptor.name, arguments).await
    }
}
