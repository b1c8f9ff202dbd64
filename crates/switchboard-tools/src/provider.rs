// ABOUTME: ToolProvider: discovers tools across every configured MCP server and owns the sessions.
// ABOUTME: Validates all configuration first and closes partial connections when discovery fails.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use switchboard_core::{Tool, ToolSource};

use crate::config::{ServerConfig, ToolProviderConfig};
use crate::error::ToolError;
use crate::session::McpSession;
use crate::tool::RemoteTool;

/// The owner of every MCP session opened by one discovery. Tools handed out
/// by the provider hold only weak references; `close` releases everything.
pub struct ToolProvider {
    sessions: Vec<Arc<McpSession>>,
    tools: Vec<Arc<RemoteTool>>,
    closed: AtomicBool,
}

impl ToolProvider {
    /// Connect to every server in `config` and collect their tools.
    ///
    /// Discovery is not cheap: each call opens new connections, so callers
    /// should discover once and reuse the provider.
    pub async fn discover(config: &ToolProviderConfig) -> Result<Self, ToolError> {
        config.validate()?;

        let mut sessions: Vec<Arc<McpSession>> = Vec::new();
        let mut tools: Vec<Arc<RemoteTool>> = Vec::new();
        let mut seen = HashSet::new();

        for (name, server) in &config.servers {
            let (session, server_tools) = match Self::discover_server(name, server, config).await
            {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(server = %name, error = %e, "tool discovery failed");
                    close_all(&sessions).await;
                    return Err(e);
                }
            };
            sessions.push(session);

            for tool in server_tools {
                let tool_name = tool.descriptor().name.clone();
                if !seen.insert(tool_name.clone()) {
                    close_all(&sessions).await;
                    return Err(ToolError::Configuration(format!(
                        "tool '{}' is offered by more than one server",
                        tool_name
                    )));
                }
                tools.push(tool);
            }
        }

        tracing::info!(
            servers = sessions.len(),
            tools = tools.len(),
            "discovered MCP tools"
        );

        Ok(Self {
            sessions,
            tools,
            closed: AtomicBool::new(false),
        })
    }

    async fn discover_server(
        name: &str,
        server: &ServerConfig,
        config: &ToolProviderConfig,
    ) -> Result<(Arc<McpSession>, Vec<Arc<RemoteTool>>), ToolError> {
        let session = Arc::new(
            McpSession::open(
                name,
                server,
                config.connect_timeout(),
                config.request_timeout(),
            )
            .await?,
        );

        let descriptors = match session.list_tools().await {
            Ok(d) => d,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        tracing::debug!(server = %name, tools = descriptors.len(), "listed server tools");

        let tools = descriptors
            .into_iter()
            .map(|d| {
                Arc::new(RemoteTool::new(
                    d,
                    name.to_string(),
                    Arc::downgrade(&session),
                ))
            })
            .collect();
        Ok((session, tools))
    }

    /// The discovered tools, in server-name order.
    pub fn remote_tools(&self) -> &[Arc<RemoteTool>] {
        &self.tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.descriptor().name.clone())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close every session. Later invocations of this provider's tools fail.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        close_all(&self.sessions).await;
    }
}

async fn close_all(sessions: &[Arc<McpSession>]) {
    futures::future::join_all(sessions.iter().map(|s| s.close())).await;
}

#[async_trait]
impl ToolSource for ToolProvider {
    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .map(|t| Arc::clone(t) as Arc<dyn Tool>)
            .collect()
    }

    async fn close(&self) {
        ToolProvider::close(self).await;
    }
}
