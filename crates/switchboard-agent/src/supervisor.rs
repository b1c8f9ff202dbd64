// ABOUTME: Supervisor: an Agent whose capability set holds only other agents.
// ABOUTME: Routing between subordinates is left entirely to the supervisor's model.

use std::ops::Deref;
use std::sync::Arc;

use switchboard_core::Error;

use crate::agent::{Agent, AgentBuilder, AgentConfig, BudgetPolicy};
use crate::runtime::ModelBackend;

/// A top-level agent that delegates to subordinate agents.
#[derive(Debug)]
pub struct Supervisor {
    agent: Agent,
    subordinates: Vec<Arc<Agent>>,
}

impl Supervisor {
    pub fn builder(name: impl Into<String>, backend: Arc<dyn ModelBackend>) -> SupervisorBuilder {
        SupervisorBuilder {
            inner: Agent::builder(name, backend),
            subordinates: Vec::new(),
        }
    }

    pub fn subordinates(&self) -> &[Arc<Agent>] {
        &self.subordinates
    }

    pub fn into_agent(self) -> Agent {
        self.agent
    }
}

impl Deref for Supervisor {
    type Target = Agent;

    fn deref(&self) -> &Agent {
        &self.agent
    }
}

/// Builder that only accepts agents as capabilities.
pub struct SupervisorBuilder {
    inner: AgentBuilder,
    subordinates: Vec<Arc<Agent>>,
}

impl SupervisorBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.inner = self.inner.description(description);
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.inner = self.inner.instructions(instructions);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.inner = self.inner.config(config);
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.inner = self.inner.max_turns(max_turns);
        self
    }

    pub fn budget_policy(mut self, policy: BudgetPolicy) -> Self {
        self.inner = self.inner.budget_policy(policy);
        self
    }

    pub fn agent(mut self, agent: Arc<Agent>) -> Self {
        self.subordinates.push(agent);
        self
    }

    pub fn build(self) -> Result<Supervisor, Error> {
        if self.subordinates.is_empty() {
            return Err(Error::Configuration(
                "a supervisor needs at least one subordinate agent".to_string(),
            ));
        }

        let mut inner = self.inner;
        for agent in &self.subordinates {
            inner = inner.agent(Arc::clone(agent));
        }

        Ok(Supervisor {
            agent: inner.build()?,
            subordinates: self.subordinates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::runtime::BackendResponse;
    use crate::testing::{ScriptedBackend, StaticTool};
    use serde_json::json;
    use switchboard_core::ErrorKind;

    fn ticket_agent() -> Arc<Agent> {
        let backend = ScriptedBackend::sequence(vec![
            BackendResponse::call("get_issue", json!({"key": "TICKET-1"})),
            BackendResponse::text("TICKET-1 'Fix bug' is Open"),
        ]);
        Arc::new(
            Agent::builder("TicketAgent", backend)
                .description("Looks up tickets")
                .tool(Arc::new(StaticTool::ok(
                    "get_issue",
                    r#"{"summary":"Fix bug","status":"Open"}"#,
                )))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn requires_a_subordinate() {
        let err = Supervisor::builder("Supervisor Agent", ScriptedBackend::text("x"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn capabilities_are_only_agents() {
        let supervisor = Supervisor::builder("Supervisor Agent", ScriptedBackend::text("x"))
            .agent(ticket_agent())
            .build()
            .unwrap();

        assert_eq!(supervisor.subordinates().len(), 1);
        assert_eq!(supervisor.capabilities().names(), vec!["ticketagent"]);
        assert!(supervisor
            .capabilities()
            .iter()
            .all(|c| matches!(c, Capability::Agent(_))));
    }

    #[test]
    fn duplicate_subordinate_names_are_rejected() {
        let err = Supervisor::builder("Supervisor Agent", ScriptedBackend::text("x"))
            .agent(ticket_agent())
            .agent(ticket_agent())
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn delegates_and_relays_the_answer() {
        let backend = ScriptedBackend::new(|request| {
            let delegated = request.conversation.iter().find_map(|m| match m {
                switchboard_core::Message::CapabilityResult { content, .. } => Some(content.clone()),
                _ => None,
            });
            Ok(match delegated {
                Some(answer) => BackendResponse::text(format!("Here you go: {}", answer)),
                None => BackendResponse::call("ticketagent", json!({"request": "get TICKET-1"})),
            })
        });
        let supervisor = Supervisor::builder("Supervisor Agent", backend)
            .instructions("Delegate ticket questions.")
            .agent(ticket_agent())
            .build()
            .unwrap();

        let run = supervisor.run("What is TICKET-1?").await.unwrap();
        assert!(run.text.contains("Fix bug"));
        assert!(run.text.contains("Open"));
        assert_eq!(run.agent, "Supervisor Agent");
    }
}
