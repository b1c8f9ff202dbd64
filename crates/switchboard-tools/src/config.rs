// ABOUTME: Configuration for the set of MCP servers a ToolProvider connects to.
// ABOUTME: Validates required environment values before any subprocess or connection is attempted.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// How to reach one MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Spawn a subprocess and speak newline-delimited JSON-RPC over its stdio.
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    /// POST JSON-RPC messages to an HTTP endpoint.
    #[serde(alias = "streamable_http")]
    Http {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

/// One named MCP server entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub transport: TransportConfig,
    /// Names of `env` (stdio) or `headers` (http) entries that must be non-empty.
    #[serde(default)]
    pub required_env: Vec<String>,
}

impl ServerConfig {
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: TransportConfig::Stdio {
                command: command.into(),
                args,
                env: BTreeMap::new(),
            },
            required_env: Vec::new(),
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self {
            transport: TransportConfig::Http {
                url: url.into(),
                headers: BTreeMap::new(),
            },
            required_env: Vec::new(),
        }
    }

    /// Set a value passed to the server (env var for stdio, header for http).
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self.transport {
            TransportConfig::Stdio { env, .. } => env.insert(key.into(), value.into()),
            TransportConfig::Http { headers, .. } => headers.insert(key.into(), value.into()),
        };
        self
    }

    /// Mark a value as required; it must be present and non-empty.
    pub fn require(mut self, key: impl Into<String>) -> Self {
        self.required_env.push(key.into());
        self
    }

    fn value(&self, key: &str) -> Option<&str> {
        match &self.transport {
            TransportConfig::Stdio { env, .. } => env.get(key).map(String::as_str),
            TransportConfig::Http { headers, .. } => headers.get(key).map(String::as_str),
        }
    }

    /// Check this entry without touching the network or spawning anything.
    pub fn validate(&self, server: &str) -> Result<(), ToolError> {
        match &self.transport {
            TransportConfig::Stdio { command, .. } if command.trim().is_empty() => {
                return Err(ToolError::Configuration(format!(
                    "server '{}': command is empty",
                    server
                )));
            }
            TransportConfig::Http { url, .. } => {
                reqwest::Url::parse(url).map_err(|e| {
                    ToolError::Configuration(format!(
                        "server '{}': invalid url '{}': {}",
                        server, url, e
                    ))
                })?;
            }
            _ => {}
        }

        for key in &self.required_env {
            match self.value(key) {
                Some(v) if !v.trim().is_empty() => {}
                Some(_) => {
                    return Err(ToolError::Configuration(format!(
                        "server '{}': required value {} is empty",
                        server, key
                    )));
                }
                None => {
                    return Err(ToolError::Configuration(format!(
                        "server '{}': required value {} is not set",
                        server, key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// The full set of servers to discover tools from, keyed by server name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProviderConfig {
    pub servers: BTreeMap<String, ServerConfig>,
    /// Bound on spawning/handshaking plus the initial tool listing.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bound on every later request, including tool calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ToolProviderConfig {
    fn default() -> Self {
        Self {
            servers: BTreeMap::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ToolProviderConfig {
    pub fn with_server(mut self, name: impl Into<String>, server: ServerConfig) -> Self {
        self.servers.insert(name.into(), server);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load a `{"servers": {...}}` document from disk.
    pub fn from_json_file(path: &Path) -> Result<Self, ToolError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ToolError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ToolError::Configuration(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Validate every server. Runs before any connection is attempted.
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.servers.is_empty() {
            return Err(ToolError::Configuration(
                "no tool servers configured".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ToolError::Configuration(
                "tool timeouts must be positive".to_string(),
            ));
        }
        for (name, server) in &self.servers {
            server.validate(name)?;
        }
        Ok(())
    }
}
