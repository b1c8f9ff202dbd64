// ABOUTME: Error type for MCP tool discovery and transport failures.
// ABOUTME: Converts into the orchestration taxonomy as Configuration or Connection errors.

use thiserror::Error;

/// Errors raised while configuring, connecting to, or talking with an MCP server.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("invalid tool configuration: {0}")]
    Configuration(String),

    #[error("failed to start tool server: {0}")]
    Spawn(String),

    #[error("handshake failed: {0}")]
    Handshake(String),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("connection closed")]
    Closed,
}

impl From<ToolError> for switchboard_core::Error {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Configuration(msg) => switchboard_core::Error::Configuration(msg),
            other => switchboard_core::Error::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::ErrorKind;

    #[test]
    fn configuration_maps_to_configuration_everything_else_to_connection() {
        let err: switchboard_core::Error =
            ToolError::Configuration("JIRA_URL is empty".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("JIRA_URL"));

        for tool_err in [
            ToolError::Spawn("docker: not found".into()),
            ToolError::Handshake("bad version".into()),
            ToolError::Timeout(std::time::Duration::from_secs(30)),
            ToolError::Closed,
        ] {
            let err: switchboard_core::Error = tool_err.into();
            assert_eq!(err.kind(), ErrorKind::Connection);
        }
    }
}
