// ABOUTME: JSON-RPC 2.0 framing and the subset of MCP messages switchboard uses.
// ABOUTME: Covers initialize, tools/list pagination and tools/call results.

use serde::Deserialize;
use serde_json::{Value, json};
use switchboard_core::CapabilityDescriptor;

use crate::error::ToolError;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Build a JSON-RPC request object.
pub fn request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

/// Build a JSON-RPC notification object (no id, no reply expected).
pub fn notification(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params
    })
}

/// Params for the `initialize` handshake.
pub fn initialize_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": "switchboard",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

/// An inbound JSON-RPC message, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Response {
        id: u64,
        result: Result<Value, (i64, String)>,
    },
    Request {
        id: Value,
        method: String,
    },
    Notification {
        method: String,
    },
}

impl Incoming {
    /// Classify a parsed JSON value. Returns None for anything that is not
    /// recognizably JSON-RPC.
    pub fn classify(value: &Value) -> Option<Incoming> {
        let obj = value.as_object()?;
        let method = obj.get("method").and_then(|m| m.as_str());
        let id = obj.get("id").filter(|id| !id.is_null());

        match (method, id) {
            (Some(method), Some(id)) => Some(Incoming::Request {
                id: id.clone(),
                method: method.to_string(),
            }),
            (Some(method), None) => Some(Incoming::Notification {
                method: method.to_string(),
            }),
            (None, Some(id)) => {
                let id = id.as_u64()?;
                if let Some(err) = obj.get("error") {
                    let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
                    let message = err
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    return Some(Incoming::Response {
                        id,
                        result: Err((code, message)),
                    });
                }
                Some(Incoming::Response {
                    id,
                    result: Ok(obj.get("result").cloned().unwrap_or(Value::Null)),
                })
            }
            (None, None) => None,
        }
    }
}

/// Turn a classified response payload into a transport result.
pub fn into_result(result: Result<Value, (i64, String)>) -> Result<Value, ToolError> {
    result.map_err(|(code, message)| ToolError::Rpc { code, message })
}

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl McpTool {
    pub fn into_descriptor(self) -> CapabilityDescriptor {
        CapabilityDescriptor::new(
            self.name,
            self.description.unwrap_or_default(),
            self.input_schema,
        )
    }
}

/// One page of `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

/// The result of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(rename = "structuredContent", default)]
    pub structured_content: Option<Value>,
}

impl CallToolResult {
    /// Flatten content blocks into a single string for the model. Text blocks
    /// are used verbatim; other block kinds are kept as compact JSON.
    pub fn text(&self) -> String {
        let parts: Vec<String> = self
            .content
            .iter()
            .map(|block| match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => block
                    .get("text")
                    .and_then(|t| t.as_str())
                    .unwrap_or("")
                    .to_string(),
                _ => block.to_string(),
            })
            .collect();

        if parts.is_empty() {
            return self
                .structured_content
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default();
        }
        parts.join("\n")
    }
}
