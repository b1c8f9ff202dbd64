// ABOUTME: Core library for switchboard, containing the types shared by tools, backends and agents.
// ABOUTME: Defines capabilities, conversation messages, run traces, the run state machine and errors.

pub mod capability;
pub mod error;
pub mod message;
pub mod run;

pub use capability::{CapabilityDescriptor, InvocationError, Tool, ToolSource, capability_name};
pub use error::{Error, ErrorKind};
pub use message::{CapabilityCall, Message};
pub use run::{Run, RunState, TraceEntry};
