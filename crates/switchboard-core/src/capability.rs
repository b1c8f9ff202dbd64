// ABOUTME: Capability descriptors plus the Tool and ToolSource traits that tool providers implement.
// ABOUTME: Agents see tools only through these seams, never through a concrete transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Provider-agnostic description of something an agent can invoke.
/// Backend adapters reformat it into their own tool/function format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the invocation arguments; always an object schema.
    pub parameters: Value,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        let parameters = if parameters.is_object() {
            parameters
        } else {
            json!({"type": "object", "properties": {}})
        };
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Failure of a single tool invocation. Covers malformed arguments,
/// remote-side errors, closed connections and timeouts.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct InvocationError {
    pub message: String,
}

impl InvocationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A remote or local tool an agent can call.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    /// Invoke the tool with JSON arguments and return its textual result.
    async fn invoke(&self, arguments: Value) -> Result<String, InvocationError>;
}

/// A live connection that hands out tools and must be closed explicitly.
#[async_trait]
pub trait ToolSource: Send + Sync {
    /// The tools discovered on this connection.
    fn tools(&self) -> Vec<Arc<dyn Tool>>;

    /// Release the underlying transport. Safe to call more than once.
    async fn close(&self);
}

/// Turn a display name into a function-call-safe capability name:
/// lowercase ASCII alphanumerics, `_` and `-`, everything else collapsed to `_`.
pub fn capability_name(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    for ch in display_name.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "agent".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_replaces_non_object_schema() {
        let d = CapabilityDescriptor::new("get_issue", "Fetch an issue", Value::Null);
        assert_eq!(d.parameters.get("type").and_then(|t| t.as_str()), Some("object"));

        let schema = json!({"type": "object", "properties": {"key": {"type": "string"}}});
        let d = CapabilityDescriptor::new("get_issue", "Fetch an issue", schema.clone());
        assert_eq!(d.parameters, schema);
    }

    #[test]
    fn capability_name_is_function_safe() {
        assert_eq!(capability_name("MCP Jira Agent"), "mcp_jira_agent");
        assert_eq!(capability_name("  TicketAgent "), "ticketagent");
        assert_eq!(capability_name("ops/on-call  bot!"), "ops_on-call_bot");
        assert_eq!(capability_name("???"), "agent");
    }

    #[test]
    fn invocation_error_displays_message() {
        let err = InvocationError::new("issue TICKET-9 not found");
        assert_eq!(err.to_string(), "issue TICKET-9 not found");
    }
}
