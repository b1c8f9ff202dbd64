// ABOUTME: End-to-end smoke tests for supervisor -> sub-agent -> MCP tool delegation.
// ABOUTME: Uses scripted model backends and a shell-script MCP server, so no network or LLM is needed.

use std::sync::Arc;

use serde_json::{Value, json};
use switchboard_agent::testing::{MemoryToolSource, ScriptedBackend, StaticTool};
use switchboard_agent::{Agent, AgentCell, BackendResponse, ProviderProfile, Supervisor};
use switchboard_core::{ErrorKind, Message, ToolSource};
use switchboard_tools::{ServerConfig, ToolProvider, ToolProviderConfig};
use tokio_util::sync::CancellationToken;

/// A backend that calls `capability` once, then answers with whatever the
/// capability returned. Failed results are answered with an apology.
fn relay_backend(capability: &'static str, arguments: Value) -> Arc<ScriptedBackend> {
    ScriptedBackend::new(move |request| {
        let result = request.conversation.iter().rev().find_map(|m| match m {
            Message::CapabilityResult {
                content, is_error, ..
            } => Some((content.clone(), *is_error)),
            _ => None,
        });
        Ok(match result {
            Some((content, false)) => BackendResponse::text(format!("Ticket details: {}", content)),
            Some((content, true)) => {
                BackendResponse::text(format!("Sorry, I could not retrieve that ticket ({})", content))
            }
            None => BackendResponse::call(capability, arguments.clone()),
        })
    })
}

#[cfg(unix)]
mod tracker {
    use super::*;

    /// A minimal MCP server in POSIX sh serving one `get_issue` tool.
    const FAKE_TRACKER: &str = r#"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"tracker","version":"0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"get_issue","description":"Get an issue by key","inputSchema":{"type":"object","properties":{"key":{"type":"string"}},"required":["key"]}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*TICKET-404*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"issue TICKET-404 not found"}],"isError":true}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"{\\"summary\\": \\"Fix bug\\", \\"status\\": \\"Open\\"}"}]}}\n' "$id" ;;
  esac
done
"#;

    pub fn tracker_config() -> ToolProviderConfig {
        ToolProviderConfig::default().with_server(
            "tracker",
            ServerConfig::stdio("sh", vec!["-c".into(), FAKE_TRACKER.into()]),
        )
    }

    /// Build a TicketAgent over the fake tracker inside `cell`, plus a
    /// supervisor that delegates `request` to it.
    pub async fn supervisor_for(cell: &AgentCell, key: &str) -> (Supervisor, Arc<ScriptedBackend>) {
        let ticket_backend = relay_backend("get_issue", json!({ "key": key }));
        let agent_backend = Arc::clone(&ticket_backend);
        let ticket_agent = cell
            .get_or_try_init(|| async move {
                let provider = Arc::new(ToolProvider::discover(&tracker_config()).await?);
                let agent = Agent::builder("TicketAgent", agent_backend)
                    .description("Looks up tickets in the tracker")
                    .tools(provider.tools())
                    .build()?;
                let source: Arc<dyn ToolSource> = provider;
                Ok::<_, switchboard_core::Error>((agent, source))
            })
            .await
            .unwrap();

        let supervisor = Supervisor::builder(
            "Supervisor",
            relay_backend("ticketagent", json!({ "request": format!("get {}", key) })),
        )
        .instructions("Delegate ticket questions to TicketAgent.")
        .agent(ticket_agent)
        .build()
        .unwrap();

        (supervisor, ticket_backend)
    }

    #[tokio::test]
    async fn supervisor_delegates_ticket_lookup_end_to_end() {
        let cell = AgentCell::new();
        let (supervisor, ticket_backend) = supervisor_for(&cell, "TICKET-1").await;

        let run = supervisor
            .run("Please get the details for ticket TICKET-1")
            .await
            .unwrap();

        assert!(run.text.contains("Fix bug"), "got: {}", run.text);
        assert!(run.text.contains("Open"), "got: {}", run.text);
        assert_eq!(run.rounds, 1);
        assert_eq!(run.trace[0].capability, "ticketagent");

        // The sub-agent saw only the delegated request, on a fresh history.
        let first = &ticket_backend.requests()[0];
        assert_eq!(first.conversation, vec![Message::user("get TICKET-1")]);
        assert_eq!(first.capabilities, vec!["get_issue"]);

        cell.shutdown().await;
        assert!(cell.get().is_none());
    }

    #[tokio::test]
    async fn failed_lookup_is_reported_without_retry() {
        let cell = AgentCell::new();
        let (supervisor, ticket_backend) = supervisor_for(&cell, "TICKET-404").await;

        let run = supervisor
            .run("Please get the details for ticket TICKET-404")
            .await
            .unwrap();

        assert!(run.text.contains("could not retrieve"), "got: {}", run.text);
        assert_eq!(ticket_backend.call_count(), 2, "no blind retry of get_issue");
        let last = ticket_backend.requests()[1].conversation.last().cloned();
        assert!(last.is_some_and(|m| m.is_error_result()));

        cell.shutdown().await;
    }

    #[tokio::test]
    async fn tools_fail_after_shutdown() {
        let cell = AgentCell::new();
        let (_supervisor, _) = supervisor_for(&cell, "TICKET-1").await;
        let agent = cell.get().unwrap();

        cell.shutdown().await;

        let tool = match agent.capabilities().get("get_issue") {
            Some(switchboard_agent::Capability::Tool(tool)) => Arc::clone(tool),
            other => panic!("expected get_issue tool, got {:?}", other),
        };
        let err = tool.invoke(json!({"key": "TICKET-1"})).await.unwrap_err();
        assert!(err.message.contains("closed"), "got: {}", err);
    }
}

#[tokio::test]
async fn missing_required_value_fails_before_connecting() {
    let server = ServerConfig::stdio("switchboard-no-such-binary", vec![])
        .with_value("JIRA_URL", "https://example.atlassian.net")
        .with_value("JIRA_API_TOKEN", "")
        .require("JIRA_URL")
        .require("JIRA_API_TOKEN");
    let config = ToolProviderConfig::default().with_server("mcp-atlassian", server);

    let err: switchboard_core::Error = match ToolProvider::discover(&config).await {
        Err(err) => err.into(),
        Ok(_) => panic!("discovery should fail"),
    };
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("JIRA_API_TOKEN"));
}

#[test]
fn unsupported_provider_is_rejected() {
    let err = ProviderProfile::from_vars(|key| match key {
        "API_HOST" => Some("watsonx".to_string()),
        _ => None,
    })
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn unknown_capability_never_reaches_the_backend_again() {
    let backend = ScriptedBackend::new(|_| Ok(BackendResponse::call("jira_delete_project", json!({}))));
    let get_issue = Arc::new(StaticTool::ok("get_issue", "{}"));
    let agent = Agent::builder("TicketAgent", backend.clone())
        .tool(get_issue.clone())
        .build()
        .unwrap();

    let err = agent.run("delete everything").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnknownCapability);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(get_issue.call_count(), 0);
}

#[tokio::test]
async fn supervisor_respects_step_budget() {
    let sub_backend = ScriptedBackend::text("still working");
    let sub = Arc::new(Agent::builder("TicketAgent", sub_backend.clone()).build().unwrap());
    let supervisor_backend =
        ScriptedBackend::new(|_| Ok(BackendResponse::call("ticketagent", json!({"request": "again"}))));
    let supervisor = Supervisor::builder("Supervisor", supervisor_backend)
        .agent(sub)
        .max_turns(5)
        .build()
        .unwrap();

    let err = supervisor.run("loop").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StepBudgetExceeded);
    assert_eq!(sub_backend.call_count(), 5);
}

#[tokio::test]
async fn interrupted_request_still_closes_shared_tools() {
    let get_issue: Arc<dyn switchboard_core::Tool> = Arc::new(StaticTool::ok("get_issue", "{}"));
    let source = MemoryToolSource::new(vec![get_issue]);
    let cell = AgentCell::new();
    let jira_agent = cell
        .get_or_try_init(|| {
            let source = Arc::clone(&source);
            async move {
                let agent = Agent::builder("TicketAgent", ScriptedBackend::text("unused"))
                    .tools(source.tools())
                    .build()?;
                let source: Arc<dyn ToolSource> = source;
                Ok::<_, switchboard_core::Error>((agent, source))
            }
        })
        .await
        .unwrap();

    let slow = ScriptedBackend::delayed(std::time::Duration::from_secs(30), |_| {
        Ok(BackendResponse::text("too late"))
    });
    let supervisor = Supervisor::builder("Supervisor", slow)
        .agent(jira_agent)
        .build()
        .unwrap();

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        })
    };
    let err = supervisor
        .run_until_cancelled("Please get the details for ticket TICKET-1", Vec::new(), &cancel)
        .await
        .unwrap_err();
    interrupt.await.unwrap();
    cell.shutdown().await;

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(source.is_closed());
    assert_eq!(source.close_calls(), 1);
}
