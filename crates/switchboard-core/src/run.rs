// ABOUTME: Run results, per-call trace entries, and the per-run state machine.
// ABOUTME: RunState::advance rejects transitions the agent loop must never take.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ulid::Ulid;

use crate::message::Message;

/// States of a single `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    AwaitingBackend,
    BackendResponded,
    CapabilityRequested,
    Invoking,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid run state transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed)
    }

    /// Move to `next` if the transition is allowed. Any non-terminal state
    /// may fail; `Invoking -> Invoking` covers several calls in one round.
    pub fn advance(self, next: RunState) -> Result<RunState, InvalidTransition> {
        use RunState::*;
        let allowed = match (self, next) {
            (Succeeded | Failed, _) => false,
            (_, Failed) => true,
            (AwaitingBackend, BackendResponded) => true,
            (BackendResponded, CapabilityRequested | Succeeded) => true,
            (CapabilityRequested, Invoking) => true,
            (Invoking, Invoking | AwaitingBackend) => true,
            _ => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// One capability invocation made during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub round: usize,
    pub capability: String,
    pub arguments: Value,
    /// `Ok` holds the tool result, `Err` the invocation error message.
    pub outcome: Result<String, String>,
}

/// The outcome of one `Agent::run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub run_id: Ulid,
    pub agent: String,
    pub text: String,
    /// Number of invocation rounds performed.
    pub rounds: usize,
    pub trace: Vec<TraceEntry>,
    pub history: Vec<Message>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl Run {
    /// Count of trace entries whose invocation failed.
    pub fn failed_invocations(&self) -> usize {
        self.trace.iter().filter(|t| t.outcome.is_err()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn happy_path_with_one_round() {
        let path = [
            RunState::BackendResponded,
            RunState::CapabilityRequested,
            RunState::Invoking,
            RunState::Invoking,
            RunState::AwaitingBackend,
            RunState::BackendResponded,
            RunState::Succeeded,
        ];
        let mut state = RunState::AwaitingBackend;
        for next in path {
            state = state.advance(next).expect("transition should be allowed");
        }
        assert!(state.is_terminal());
    }

    #[test]
    fn any_live_state_can_fail() {
        for state in [
            RunState::AwaitingBackend,
            RunState::BackendResponded,
            RunState::CapabilityRequested,
            RunState::Invoking,
        ] {
            assert_eq!(state.advance(RunState::Failed), Ok(RunState::Failed));
        }
    }

    #[test]
    fn terminal_states_are_final_and_shortcuts_rejected() {
        assert!(RunState::Succeeded.advance(RunState::AwaitingBackend).is_err());
        assert!(RunState::Failed.advance(RunState::Failed).is_err());
        assert!(RunState::AwaitingBackend.advance(RunState::Invoking).is_err());
        assert!(RunState::AwaitingBackend.advance(RunState::Succeeded).is_err());
        assert!(RunState::CapabilityRequested.advance(RunState::Succeeded).is_err());

        let err = RunState::Invoking.advance(RunState::Succeeded).unwrap_err();
        assert_eq!(err.from, RunState::Invoking);
        assert!(err.to_string().contains("Succeeded"));
    }

    #[test]
    fn failed_invocations_counts_errors() {
        let now = Utc::now();
        let run = Run {
            run_id: Ulid::new(),
            agent: "TicketAgent".into(),
            text: "done".into(),
            rounds: 2,
            trace: vec![
                TraceEntry {
                    round: 1,
                    capability: "get_issue".into(),
                    arguments: json!({"key": "A-1"}),
                    outcome: Err("not found".into()),
                },
                TraceEntry {
                    round: 2,
                    capability: "search".into(),
                    arguments: json!({"jql": "project = A"}),
                    outcome: Ok("[]".into()),
                },
            ],
            history: vec![],
            started_at: now,
            finished_at: now,
        };
        assert_eq!(run.failed_invocations(), 1);
    }
}
