//! Remote-controllable debug engine for embedded script interpreters.
//!
//! The embedder owns the interpreter; this crate owns the debugging
//! session. Instrumentation events (calls, returns, line advances) are fed
//! into an [`Engine`], which runs the execution-control state machine,
//! suspends the debuggee thread on breakpoints and steps, and talks to a
//! remote controller over the [`transport`] crate's framed connection.
//! Interpreter reflection and source loading stay behind the
//! [`interpreter::Interpreter`] and [`sources::SourceStore`] seams.

pub mod breakpoints;
pub mod context;
pub mod interpreter;
pub mod registry;
pub mod sources;
pub mod state;

mod engine;
mod error;
mod internals;

pub use context::{ContextId, StepMark};
pub use engine::{ConnectConfig, Engine, Event, HookEvent, HookOutcome};
pub use error::CommandError;
pub use registry::{Registry, RuntimeHandle};
pub use state::ExecutionState;

#[cfg(test)]
pub(crate) mod test_support;
