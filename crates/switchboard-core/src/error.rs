// ABOUTME: Error taxonomy for agent orchestration, shared by every switchboard crate.
// ABOUTME: Each variant maps to one ErrorKind so callers can tell failures apart.

use thiserror::Error;

/// Errors that terminate a run or prevent one from starting.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid setup. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A tool source could not be reached or the handshake failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The model backend call failed or timed out.
    #[error("backend error: {0}")]
    Backend(String),

    /// A capability invocation failed. Runs never return this: invocation
    /// failures travel as [`InvocationError`](crate::InvocationError) and are
    /// fed back to the model. The variant completes the kind taxonomy for
    /// callers that invoke capabilities outside a run.
    #[error("invocation of '{capability}' failed: {message}")]
    Invocation { capability: String, message: String },

    /// The model asked for a capability the agent does not hold.
    #[error("agent '{agent}' requested unknown capability '{name}'")]
    UnknownCapability { agent: String, name: String },

    /// The agent kept requesting capabilities past its step budget.
    #[error("agent '{agent}' exceeded its step budget of {budget} rounds")]
    StepBudgetExceeded { agent: String, budget: usize },

    #[error("run cancelled")]
    Cancelled,
}

/// Discriminant of [`Error`] without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Backend,
    Invocation,
    UnknownCapability,
    StepBudgetExceeded,
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Backend(_) => ErrorKind::Backend,
            Error::Invocation { .. } => ErrorKind::Invocation,
            Error::UnknownCapability { .. } => ErrorKind::UnknownCapability,
            Error::StepBudgetExceeded { .. } => ErrorKind::StepBudgetExceeded,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// True for errors that must abort the whole run, even when raised by a
    /// nested agent acting as a capability.
    pub fn is_fatal_for_caller(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Connection | ErrorKind::Cancelled
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Connection => "connection",
            ErrorKind::Backend => "backend",
            ErrorKind::Invocation => "invocation",
            ErrorKind::UnknownCapability => "unknown_capability",
            ErrorKind::StepBudgetExceeded => "step_budget_exceeded",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}
