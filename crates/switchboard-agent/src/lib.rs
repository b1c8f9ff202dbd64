// ABOUTME: Agent system for switchboard: model backends, agents, and supervisor delegation.
// ABOUTME: Agents run a bounded tool-calling loop; supervisors delegate to agents exposed as capabilities.

pub mod agent;
pub mod capability;
pub mod cell;
pub mod client;
pub mod profile;
pub mod providers;
pub mod runtime;
pub mod supervisor;
pub mod testing;

pub use agent::{Agent, AgentBuilder, AgentConfig, BudgetPolicy};
pub use capability::{AgentCapability, Capability, CapabilitySet};
pub use cell::AgentCell;
pub use client::{create_backend, create_backend_from_env};
pub use profile::ProviderProfile;
pub use runtime::{BackendError, BackendResponse, CompletionRequest, ModelBackend};
pub use supervisor::{Supervisor, SupervisorBuilder};

/// Serialize all tests that read/write env vars to prevent race conditions.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
