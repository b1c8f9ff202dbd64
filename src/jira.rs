// ABOUTME: Wiring for the issue-tracker deployment: the Jira MCP server, the Jira agent and the supervisor.
// ABOUTME: Instructions here are plain prompts; ticket semantics live entirely in the model and the server.

use std::sync::Arc;

use switchboard_agent::{Agent, AgentConfig, ModelBackend, Supervisor};
use switchboard_core::{Error, ToolSource};
use switchboard_tools::{ServerConfig, ToolProvider, ToolProviderConfig};

use crate::config::AppConfig;

pub const JIRA_SERVER: &str = "mcp-atlassian";
pub const JIRA_AGENT_NAME: &str = "MCP Jira Agent";
pub const SUPERVISOR_NAME: &str = "Supervisor Agent";

/// Values forwarded to the Jira MCP container; each must be set and non-empty.
pub const JIRA_VARS: [&str; 3] = ["JIRA_URL", "JIRA_USERNAME", "JIRA_API_TOKEN"];

pub const JIRA_INSTRUCTIONS: &str = "\
You're an expert MCP agent that helps users interact with Jira tickets effectively. \
You have access to comprehensive Jira operations through MCP tools that were automatically discovered. \
Key responsibilities:
1. When retrieving ticket information, provide clear, structured summaries
2. If a description is missing, ask the user to provide it
3. If a description is not in BDD format, explain BDD format and ask for correction
4. When searching tickets, use appropriate JQL queries
5. Always validate input parameters before making Jira calls
6. Use the available MCP tools: jira_get_issue, jira_search etc.

BDD Format Examples:
- Given [initial context]
- When [action occurs]
- Then [expected outcome]

Or:
- Scenario: [scenario name]
- Given [preconditions]
- When [action]
- Then [expected result]";

pub const JIRA_DESCRIPTION: &str =
    "Retrieves, searches and summarizes Jira tickets using the Jira MCP tools.";

pub const SUPERVISOR_INSTRUCTIONS: &str = "\
You are a supervisor managing specialist agents including the MCP Jira Agent. \
Your job is to analyze user requests and delegate tasks to the appropriate agents. \
For Jira-related requests (ticket creation, retrieval, updates, searches), \
delegate to the MCP Jira Agent. \
Always provide context and clear instructions when delegating tasks. \
The Jira agent has full access to all Jira MCP tools automatically.";

/// The built-in Jira MCP server: a container over stdio that receives the
/// three Jira values through its environment.
pub fn jira_server(image: &str, lookup: impl Fn(&str) -> Option<String>) -> ServerConfig {
    let mut args: Vec<String> = vec!["run".into(), "-i".into(), "--rm".into()];
    for var in JIRA_VARS {
        args.push("-e".into());
        args.push(var.into());
    }
    args.push(image.into());

    let mut server = ServerConfig::stdio("docker", args);
    for var in JIRA_VARS {
        server = server
            .with_value(var, lookup(var).unwrap_or_default())
            .require(var);
    }
    server
}

/// The server map to discover tools from: the file named by
/// SWITCHBOARD_TOOLS_CONFIG, or the built-in Jira server. Timeouts set in the
/// environment replace those in the file.
pub fn tool_provider_config(
    config: &AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ToolProviderConfig, Error> {
    let mut tools = match &config.tools_config {
        Some(path) => ToolProviderConfig::from_json_file(path)?,
        None => ToolProviderConfig::default()
            .with_server(JIRA_SERVER, jira_server(&config.jira_image, lookup)),
    };
    if let Some(timeout) = config.connect_timeout {
        tools.connect_timeout_secs = timeout.as_secs();
    }
    if let Some(timeout) = config.tool_timeout {
        tools.request_timeout_secs = timeout.as_secs();
    }
    Ok(tools)
}

/// Discover the Jira tools and build the agent that owns them.
pub async fn build_jira_agent(
    backend: Arc<dyn ModelBackend>,
    tools: &ToolProviderConfig,
    agent_config: AgentConfig,
) -> Result<(Agent, Arc<dyn ToolSource>), Error> {
    let provider = Arc::new(ToolProvider::discover(tools).await?);
    tracing::info!(
        count = provider.remote_tools().len(),
        tools = ?provider.tool_names(),
        "discovered MCP Jira tools"
    );

    let agent = Agent::builder(JIRA_AGENT_NAME, backend)
        .description(JIRA_DESCRIPTION)
        .instructions(JIRA_INSTRUCTIONS)
        .config(agent_config)
        .tools(provider.tools())
        .build();

    match agent {
        Ok(agent) => {
            let source: Arc<dyn ToolSource> = provider;
            Ok((agent, source))
        }
        Err(err) => {
            provider.close().await;
            Err(err)
        }
    }
}

pub fn build_supervisor(
    backend: Arc<dyn ModelBackend>,
    jira_agent: Arc<Agent>,
    agent_config: AgentConfig,
) -> Result<Supervisor, Error> {
    Supervisor::builder(SUPERVISOR_NAME, backend)
        .instructions(SUPERVISOR_INSTRUCTIONS)
        .config(agent_config)
        .agent(jira_agent)
        .build()
}
