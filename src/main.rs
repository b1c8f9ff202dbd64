// ABOUTME: Entry point for the switchboard binary.
// ABOUTME: Loads .env, builds the Jira agent and supervisor, asks one question, prints the answer.
// ABOUTME: Ctrl-C cancels the request; the shared agent's tool servers are closed on every exit path.

mod config;
mod jira;

use std::future::Future;
use std::process::ExitCode;
use std::sync::{Arc, LazyLock};

use clap::Parser;
use switchboard_agent::{AgentCell, AgentConfig, ProviderProfile, create_backend};
use switchboard_core::Error;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, Cli};

/// The Jira agent and its MCP connection, built on first use and shared
/// for the life of the process.
static JIRA_AGENT: LazyLock<AgentCell> = LazyLock::new(AgentCell::new);

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("switchboard=info")),
        )
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on(tokio::signal::ctrl_c(), cancel.clone()));

    let result = run(&cli, &cancel).await;

    interrupt.abort();
    JIRA_AGENT.shutdown().await;

    match result {
        Ok(text) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let kind = err
                .downcast_ref::<Error>()
                .map(|e| e.kind().to_string())
                .unwrap_or_else(|| "configuration".to_string());
            tracing::error!(kind = %kind, error = %format!("{:#}", err), "request failed");
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Cancel `cancel` once `signal` completes successfully.
async fn cancel_on<S>(signal: S, cancel: CancellationToken)
where
    S: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::warn!("interrupted, cancelling request");
            cancel.cancel();
        }
        Err(e) => tracing::debug!(error = %e, "interrupt handler unavailable"),
    }
}

async fn run(cli: &Cli, cancel: &CancellationToken) -> anyhow::Result<String> {
    let config = AppConfig::from_env()?;
    let profile = ProviderProfile::from_env()?;
    tracing::info!(
        provider = profile.name(),
        model = profile.model(),
        "model backend selected"
    );
    let backend = create_backend(&profile, config.backend_timeout)?;

    let tools = jira::tool_provider_config(&config, |key| std::env::var(key).ok())?;
    let agent_config = AgentConfig {
        max_turns: usize::from(cli.max_turns),
        backend_timeout: config.backend_timeout,
        tool_timeout: tools.request_timeout(),
        ..AgentConfig::default()
    };

    let jira_agent = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled.into()),
        agent = JIRA_AGENT.get_or_try_init(|| {
            jira::build_jira_agent(Arc::clone(&backend), &tools, agent_config.clone())
        }) => agent?,
    };
    let supervisor = jira::build_supervisor(backend, jira_agent, agent_config)?;

    if let Some(banner) = cli.banner() {
        println!("{}", banner);
    }

    let run = supervisor
        .run_until_cancelled(&cli.request_text(), Vec::new(), cancel)
        .await?;
    tracing::debug!(
        run_id = %run.run_id,
        rounds = run.rounds,
        failed_invocations = run.failed_invocations(),
        "supervisor run complete"
    );
    Ok(run.text)
}
