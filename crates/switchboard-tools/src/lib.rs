// ABOUTME: Tool provider for switchboard: discovers and invokes tools on MCP servers.
// ABOUTME: Servers are reached over a stdio subprocess or HTTP and must be closed explicitly.

pub mod config;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod session;
pub mod tool;
pub mod transport;

pub use config::{ServerConfig, ToolProviderConfig, TransportConfig};
pub use error::ToolError;
pub use provider::ToolProvider;
pub use tool::RemoteTool;
