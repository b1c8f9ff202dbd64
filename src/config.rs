// ABOUTME: Configuration loading for the switchboard binary: CLI flags plus environment variables.
// ABOUTME: Timeouts, the MCP server image and an optional tools config file come from the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

pub const DEFAULT_TICKET: &str = "AUT-633";
pub const DEFAULT_JIRA_IMAGE: &str = "ghcr.io/sooperset/mcp-atlassian:latest";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid number of seconds: {value}")]
    InvalidSeconds { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("SWITCHBOARD_TOOLS_CONFIG points to a missing file: {0}")]
    MissingToolsConfig(PathBuf),
}

/// Ask a supervisor agent about an issue-tracker ticket.
#[derive(Debug, Clone, Parser)]
#[command(name = "switchboard", version, about)]
pub struct Cli {
    /// Ticket key to look up.
    #[arg(long, env = "SWITCHBOARD_TICKET", default_value = DEFAULT_TICKET)]
    pub ticket: String,

    /// Full request text. Defaults to asking for the ticket's details.
    #[arg(long, env = "SWITCHBOARD_REQUEST")]
    pub request: Option<String>,

    /// Maximum invocation rounds per agent run.
    #[arg(
        long,
        env = "SWITCHBOARD_MAX_TURNS",
        default_value_t = 8,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub max_turns: u16,
}

impl Cli {
    fn custom_request(&self) -> Option<&str> {
        self.request.as_deref().filter(|r| !r.trim().is_empty())
    }

    /// The request sent to the supervisor.
    pub fn request_text(&self) -> String {
        match self.custom_request() {
            Some(request) => request.to_string(),
            None => format!("Please get the details for ticket {}", self.ticket),
        }
    }

    /// Banner naming the ticket, shown only when the ticket is what gets asked about.
    pub fn banner(&self) -> Option<String> {
        match self.custom_request() {
            Some(_) => None,
            None => Some(format!("🎫 Retrieving Jira ticket: {}", self.ticket)),
        }
    }
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_timeout: Duration,
    /// Set only when SWITCHBOARD_TOOL_TIMEOUT_SECS is; otherwise the tools
    /// config decides.
    pub tool_timeout: Option<Duration>,
    /// Set only when SWITCHBOARD_CONNECT_TIMEOUT_SECS is.
    pub connect_timeout: Option<Duration>,
    pub jira_image: String,
    pub tools_config: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - SWITCHBOARD_BACKEND_TIMEOUT_SECS: bound on each model call (default: 120)
    /// - SWITCHBOARD_TOOL_TIMEOUT_SECS: bound on each tool call (default: tools config, then 60)
    /// - SWITCHBOARD_CONNECT_TIMEOUT_SECS: bound on MCP handshake and discovery (default: tools config, then 30)
    /// - SWITCHBOARD_JIRA_MCP_IMAGE: container image for the Jira MCP server
    /// - SWITCHBOARD_TOOLS_CONFIG: JSON file replacing the built-in server map (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_timeout =
            seconds("SWITCHBOARD_BACKEND_TIMEOUT_SECS")?.unwrap_or(Duration::from_secs(120));
        let tool_timeout = seconds("SWITCHBOARD_TOOL_TIMEOUT_SECS")?;
        let connect_timeout = seconds("SWITCHBOARD_CONNECT_TIMEOUT_SECS")?;

        let jira_image = std::env::var("SWITCHBOARD_JIRA_MCP_IMAGE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_JIRA_IMAGE.to_string());

        let tools_config = std::env::var("SWITCHBOARD_TOOLS_CONFIG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        if let Some(path) = &tools_config
            && !path.is_file()
        {
            return Err(ConfigError::MissingToolsConfig(path.clone()));
        }

        Ok(Self {
            backend_timeout,
            tool_timeout,
            connect_timeout,
            jira_image,
            tools_config,
        })
    }
}

/// Read a positive number of seconds; `None` when the variable is unset or blank.
fn seconds(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    let value = match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => return Ok(None),
    };
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidSeconds { var, value: value.clone() })?;
    if secs == 0 {
        return Err(ConfigError::ZeroTimeout(var));
    }
    Ok(Some(Duration::from_secs(secs)))
}
