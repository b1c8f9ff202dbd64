// ABOUTME: Agent: instructions, a model backend and a capability set driven by a bounded loop.
// ABOUTME: Each run resubmits history until the model stops requesting capabilities.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

use switchboard_core::{
    CapabilityCall, CapabilityDescriptor, Error, Message, Run, RunState, TraceEntry, Tool,
};

use crate::capability::{AgentCapability, Capability, CapabilitySet, REQUEST_ARGUMENT};
use crate::runtime::{BackendError, BackendResponse, CompletionRequest, ModelBackend};

pub const DEFAULT_MAX_TURNS: usize = 8;
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

/// What happens when the model asks for more capabilities after the step
/// budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BudgetPolicy {
    /// End the run with StepBudgetExceeded.
    #[default]
    Fail,
    /// End the run successfully with the latest assistant text.
    ReturnPartial,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Maximum number of invocation rounds per run.
    pub max_turns: usize,
    pub budget_policy: BudgetPolicy,
    pub backend_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            budget_policy: BudgetPolicy::default(),
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

/// An immutable agent definition. Runs borrow it, so one agent can serve
/// many concurrent requests.
pub struct Agent {
    name: String,
    description: Option<String>,
    instructions: String,
    backend: Arc<dyn ModelBackend>,
    capabilities: CapabilitySet,
    config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("provider", &self.backend.provider_name())
            .field("capabilities", &self.capabilities.names())
            .field("config", &self.config)
            .finish()
    }
}

/// Mutable bookkeeping for one run.
struct RunContext {
    run_id: Ulid,
    state: RunState,
    rounds: usize,
    trace: Vec<TraceEntry>,
    history: Vec<Message>,
    latest_text: Option<String>,
}

impl RunContext {
    fn advance(&mut self, next: RunState) {
        match self.state.advance(next) {
            Ok(state) => self.state = state,
            Err(err) => {
                tracing::error!(run_id = %self.run_id, error = %err, "run state machine violated");
                self.state = next;
            }
        }
    }
}

impl Agent {
    pub fn builder(name: impl Into<String>, backend: Arc<dyn ModelBackend>) -> AgentBuilder {
        AgentBuilder::new(name, backend)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    /// Run a request on a fresh history.
    pub async fn run(&self, request: &str) -> Result<Run, Error> {
        self.run_with_history(request, Vec::new()).await
    }

    /// Run a request after prior conversation turns.
    pub async fn run_with_history(&self, request: &str, history: Vec<Message>) -> Result<Run, Error> {
        let cancel = CancellationToken::new();
        self.run_until_cancelled(request, history, &cancel).await
    }

    /// Run a request, aborting the pending backend call or invocation with
    /// `Error::Cancelled` once `cancel` fires. Nested agent runs share the token.
    pub fn run_until_cancelled<'a>(
        &'a self,
        request: &'a str,
        history: Vec<Message>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Run, Error>> {
        Box::pin(self.execute(request, history, cancel))
    }

    async fn execute(
        &self,
        request: &str,
        history: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<Run, Error> {
        let started_at = Utc::now();
        let mut ctx = RunContext {
            run_id: Ulid::new(),
            state: RunState::AwaitingBackend,
            rounds: 0,
            trace: Vec::new(),
            history,
            latest_text: None,
        };
        ctx.history.push(Message::user(request));

        tracing::info!(agent = %self.name, run_id = %ctx.run_id, "run started");

        match self.drive(request, &mut ctx, cancel).await {
            Ok(text) => {
                tracing::info!(
                    agent = %self.name,
                    run_id = %ctx.run_id,
                    rounds = ctx.rounds,
                    failed_invocations = ctx.trace.iter().filter(|t| t.outcome.is_err()).count(),
                    "run finished"
                );
                Ok(Run {
                    run_id: ctx.run_id,
                    agent: self.name.clone(),
                    text,
                    rounds: ctx.rounds,
                    trace: ctx.trace,
                    history: ctx.history,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(err) => {
                ctx.advance(RunState::Failed);
                tracing::warn!(
                    agent = %self.name,
                    run_id = %ctx.run_id,
                    kind = %err.kind(),
                    error = %err,
                    "run failed"
                );
                Err(err)
            }
        }
    }

    /// The request/respond loop. Returns the final text.
    async fn drive(
        &self,
        request: &str,
        ctx: &mut RunContext,
        cancel: &CancellationToken,
    ) -> Result<String, Error> {
        let descriptors = self.capabilities.descriptors();

        loop {
            let response = self.complete(&descriptors, &ctx.history, cancel).await?;
            ctx.advance(RunState::BackendResponded);

            if let Some(text) = response.text.as_deref().filter(|t| !t.is_empty()) {
                ctx.latest_text = Some(text.to_string());
            }

            if response.is_final() {
                ctx.advance(RunState::Succeeded);
                ctx.history.push(Message::assistant(response.text.clone(), Vec::new()));
                return Ok(response.text.unwrap_or_default());
            }

            let resolved = self.resolve(&response)?;

            if ctx.rounds >= self.config.max_turns {
                return match self.config.budget_policy {
                    BudgetPolicy::Fail => Err(Error::StepBudgetExceeded {
                        agent: self.name.clone(),
                        budget: self.config.max_turns,
                    }),
                    BudgetPolicy::ReturnPartial => {
                        tracing::warn!(
                            agent = %self.name,
                            run_id = %ctx.run_id,
                            budget = self.config.max_turns,
                            "step budget spent, returning partial answer"
                        );
                        ctx.advance(RunState::Succeeded);
                        Ok(ctx.latest_text.clone().unwrap_or_default())
                    }
                };
            }

            ctx.advance(RunState::CapabilityRequested);
            ctx.rounds += 1;
            ctx.history
                .push(Message::assistant(response.text.clone(), response.calls.clone()));

            tracing::debug!(
                agent = %self.name,
                run_id = %ctx.run_id,
                round = ctx.rounds,
                calls = resolved.len(),
                "invoking capabilities"
            );

            for (call, capability) in resolved {
                ctx.advance(RunState::Invoking);
                let outcome = self.invoke(capability, call, request, cancel).await?;

                if let Err(message) = &outcome {
                    tracing::warn!(
                        agent = %self.name,
                        run_id = %ctx.run_id,
                        round = ctx.rounds,
                        capability = %call.name,
                        error = %message,
                        "capability invocation failed"
                    );
                }

                ctx.history.push(Message::result(call, outcome.clone()));
                ctx.trace.push(TraceEntry {
                    round: ctx.rounds,
                    capability: call.name.clone(),
                    arguments: call.arguments.clone(),
                    outcome,
                });
            }

            ctx.advance(RunState::AwaitingBackend);
        }
    }

    /// Look up every requested capability before invoking any of them.
    fn resolve<'r>(
        &self,
        response: &'r BackendResponse,
    ) -> Result<Vec<(&'r CapabilityCall, &Capability)>, Error> {
        response
            .calls
            .iter()
            .map(|call| match self.capabilities.get(&call.name) {
                Some(capability) => Ok((call, capability)),
                None => Err(Error::UnknownCapability {
                    agent: self.name.clone(),
                    name: call.name.clone(),
                }),
            })
            .collect()
    }

    async fn complete(
        &self,
        descriptors: &[CapabilityDescriptor],
        history: &[Message],
        cancel: &CancellationToken,
    ) -> Result<BackendResponse, Error> {
        let request = CompletionRequest {
            instructions: &self.instructions,
            capabilities: descriptors,
            conversation: history,
        };
        let timeout = self.config.backend_timeout;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(timeout, self.backend.complete(&request)) => match result {
                Ok(response) => response.map_err(Error::from),
                Err(_) => Err(BackendError::Timeout(timeout).into()),
            },
        }
    }

    /// Invoke one capability. The inner `Err` is an invocation failure for
    /// the model to see; the outer `Err` aborts the run.
    async fn invoke(
        &self,
        capability: &Capability,
        call: &CapabilityCall,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<Result<String, String>, Error> {
        match capability {
            Capability::Tool(tool) => self.invoke_tool(tool.as_ref(), call, cancel).await,
            Capability::Agent(agent) => invoke_agent(agent, call, request, cancel).await,
        }
    }

    async fn invoke_tool(
        &self,
        tool: &dyn Tool,
        call: &CapabilityCall,
        cancel: &CancellationToken,
    ) -> Result<Result<String, String>, Error> {
        let timeout = self.config.tool_timeout;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(timeout, tool.invoke(call.arguments.clone())) => Ok(match result {
                Ok(Ok(content)) => Ok(content),
                Ok(Err(err)) => Err(err.message),
                Err(_) => Err(format!("'{}' timed out after {:?}", call.name, timeout)),
            }),
        }
    }
}

/// Run a nested agent on a fresh history. Setup, connection and cancellation
/// failures abort the caller; anything else is reported back to its model.
async fn invoke_agent(
    capability: &AgentCapability,
    call: &CapabilityCall,
    request: &str,
    cancel: &CancellationToken,
) -> Result<Result<String, String>, Error> {
    let nested_request = call
        .arguments
        .get(REQUEST_ARGUMENT)
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(request);

    match capability
        .agent()
        .run_until_cancelled(nested_request, Vec::new(), cancel)
        .await
    {
        Ok(run) => Ok(Ok(run.text)),
        Err(err) if err.is_fatal_for_caller() => Err(err),
        Err(err) => Ok(Err(err.to_string())),
    }
}

/// Builder for [`Agent`]. Validation happens in [`AgentBuilder::build`].
pub struct AgentBuilder {
    name: String,
    description: Option<String>,
    instructions: String,
    backend: Arc<dyn ModelBackend>,
    config: AgentConfig,
    capabilities: Vec<Capability>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>, backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instructions: String::new(),
            backend,
            config: AgentConfig::default(),
            capabilities: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.config.max_turns = max_turns;
        self
    }

    pub fn budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.config.budget_policy = policy;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.capabilities.push(Capability::Tool(tool));
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.capabilities
            .extend(tools.into_iter().map(Capability::Tool));
        self
    }

    /// Expose another agent as a capability.
    pub fn agent(mut self, agent: Arc<Agent>) -> Self {
        self.capabilities
            .push(Capability::Agent(AgentCapability::new(agent)));
        self
    }

    pub fn build(self) -> Result<Agent, Error> {
        if self.name.trim().is_empty() {
            return Err(Error::Configuration("agent name must not be empty".to_string()));
        }
        if self.config.max_turns == 0 {
            return Err(Error::Configuration(format!(
                "agent '{}': max_turns must be at least 1",
                self.name
            )));
        }
        if self.config.backend_timeout.is_zero() || self.config.tool_timeout.is_zero() {
            return Err(Error::Configuration(format!(
                "agent '{}': timeouts must be positive",
                self.name
            )));
        }

        let mut capabilities = CapabilitySet::new();
        for capability in self.capabilities {
            capabilities.insert(capability).map_err(|err| {
                Error::Configuration(format!("agent '{}': {}", self.name, err))
            })?;
        }

        tracing::debug!(
            agent = %self.name,
            capabilities = ?capabilities.names(),
            provider = self.backend.provider_name(),
            model = self.backend.model_name(),
            "agent built"
        );

        Ok(Agent {
            name: self.name,
            description: self.description,
            instructions: self.instructions,
            backend: self.backend,
            capabilities,
            config: self.config,
        })
    }
}
