//! Public engine facade.
//!
//! The [`Engine`] is a cheap-to-clone handle over the locked internals. The
//! embedder installs it next to its interpreter, feeds it hook events from
//! the interpreter's instrumentation, and drives local control through the
//! same operations a remote controller has.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use codec::{BacktraceFrame, Breakpoint, LogLevel, SourceText, Variable};
use crossbeam_channel::Receiver;
use transport::connector::{self, Confirmed};
use transport::io::Transport;
use transport::{Connection, ConnectionEvent, Dispatcher, TransportError};

use crate::context::ContextId;
use crate::error::CommandError;
use crate::internals::EngineInternals;
use crate::interpreter::{Interpreter, LocalScopes};
use crate::state::ExecutionState;

/// How long one pass of the suspension loop waits for controller traffic.
const SUSPEND_POLL: Duration = Duration::from_secs(1);

/// What a subscribed embedder sees of the engine's activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StateChanged { suspended: bool },
    /// Where the debuggee is suspended. `is_live` is false for forced
    /// re-notifications of a position already reported.
    SourcePosition {
        key: String,
        line: u32,
        is_live: bool,
    },
    /// Script output, tagged with the position it came from when known.
    LogOutput {
        level: LogLevel,
        text: String,
        key: Option<String>,
        line: Option<u32>,
    },
}

/// Instrumentation events the embedder forwards from its interpreter.
#[derive(Debug, Clone)]
pub enum HookEvent {
    /// A function was entered.
    Call,
    /// A function is about to return.
    Return,
    /// Execution reached a new line.
    Line { key: String, line: u32 },
}

/// What the embedder must do after a hook event.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Continue,
    /// Stop running the script; the session is over.
    Abort,
}

/// Where to find the controller.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    pub handshake_timeout: Duration,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 51123,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    internals: Arc<Mutex<EngineInternals>>,
    dispatcher: Dispatcher,
    events: Receiver<Event>,
}

impl Engine {
    /// Dial the controller and return a connected engine. When the
    /// controller is not reachable the script still has to run: this falls
    /// back to a detached engine that ignores hook events, and says so on
    /// the log path.
    #[tracing::instrument(skip(interpreter))]
    pub fn connect(interpreter: Box<dyn Interpreter>, config: &ConnectConfig) -> Self {
        let confirmed = connector::dial(&config.host, config.port)
            .and_then(|transport| connector::confirm(transport, config.handshake_timeout));
        match confirmed {
            Ok(confirmed) => Self::attached(interpreter, confirmed),
            Err(error) => {
                tracing::warn!(%error, host = %config.host, port = config.port, "controller not reachable");
                let engine = Self::detached(interpreter);
                engine.log_output(
                    LogLevel::Warning,
                    "debug controller not reachable, continuing without debugger",
                );
                engine
            }
        }
    }

    /// Connect over an already-established transport. Used by tests with
    /// the in-memory pair, and by embedders that manage their own sockets.
    pub fn with_transport<T: Transport>(
        interpreter: Box<dyn Interpreter>,
        transport: T,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let confirmed = connector::confirm(transport, handshake_timeout)?;
        Ok(Self::attached(interpreter, confirmed))
    }

    /// An engine with no controller. Hook events pass straight through.
    pub fn detached(interpreter: Box<dyn Interpreter>) -> Self {
        Self::build(interpreter, None, Dispatcher::new())
    }

    fn attached<R, W>(interpreter: Box<dyn Interpreter>, confirmed: Confirmed<R, W>) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (sink_tx, sink_rx) = crossbeam_channel::unbounded();
        let connection = confirmed.into_connection(sink_tx);
        let dispatcher = Dispatcher::new();
        spawn_forwarder(dispatcher.clone(), sink_rx);
        Self::build(interpreter, Some(connection), dispatcher)
    }

    fn build(
        interpreter: Box<dyn Interpreter>,
        connection: Option<Connection>,
        dispatcher: Dispatcher,
    ) -> Self {
        let (publisher, events) = crossbeam_channel::unbounded();
        let internals = EngineInternals::new(interpreter, connection, dispatcher.clone(), publisher);
        Self {
            internals: Arc::new(Mutex::new(internals)),
            dispatcher,
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineInternals> {
        self.internals.lock().unwrap()
    }

    // ---- hook entry point -------------------------------------------------

    /// Feed one instrumentation event through the engine. Blocks the
    /// calling (debuggee) thread for as long as the engine is suspended.
    pub fn dispatch_hook(&self, event: HookEvent) -> HookOutcome {
        let mut internals = self.lock();
        if internals.state() == ExecutionState::Quit {
            return HookOutcome::Abort;
        }
        if !internals.is_enabled() {
            return HookOutcome::Continue;
        }

        match event {
            HookEvent::Call => {
                internals.on_call();
                return HookOutcome::Continue;
            }
            HookEvent::Return => {
                internals.on_return();
                return HookOutcome::Continue;
            }
            HookEvent::Line { key, line } => internals.on_line(&key, line),
        }

        loop {
            internals.drain_commands();
            if internals.state() == ExecutionState::Quit {
                return HookOutcome::Abort;
            }
            if self.dispatcher.is_disconnected() {
                internals.handle_disconnect();
                return HookOutcome::Abort;
            }
            if internals.state() != ExecutionState::Break {
                return HookOutcome::Continue;
            }
            internals.notify_suspension();

            // wait without the lock so the facade stays responsive
            drop(internals);
            self.dispatcher.wait(SUSPEND_POLL);
            internals = self.lock();
        }
    }

    // ---- execution control ------------------------------------------------

    pub fn start(&self) {
        self.lock().request_state(ExecutionState::Normal);
    }

    pub fn suspend(&self) {
        self.lock().request_state(ExecutionState::Break);
    }

    pub fn resume(&self) {
        self.lock().request_state(ExecutionState::Normal);
    }

    pub fn step_over(&self) {
        self.lock().request_state(ExecutionState::StepOver);
    }

    pub fn step_into(&self) {
        self.lock().request_state(ExecutionState::StepInto);
    }

    pub fn step_return(&self) {
        self.lock().request_state(ExecutionState::StepReturn);
    }

    /// End the session; the next hook event aborts the script.
    pub fn quit(&self) {
        self.lock().request_state(ExecutionState::Quit);
    }

    pub fn state(&self) -> ExecutionState {
        self.lock().state()
    }

    // ---- breakpoints ------------------------------------------------------

    pub fn set_breakpoint(&self, breakpoint: Breakpoint) {
        self.lock().set_breakpoint(breakpoint);
    }

    pub fn remove_breakpoint(&self, key: &str, line: u32) {
        self.lock().remove_breakpoint(key, line);
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.lock().breakpoints()
    }

    /// The next breakpoint after a position, in source order.
    pub fn next_breakpoint_after(&self, key: &str, line: u32) -> Option<Breakpoint> {
        self.lock().next_breakpoint_after(key, line)
    }

    // ---- inspection -------------------------------------------------------

    pub fn evaluate(
        &self,
        expression: &str,
        level: Option<u32>,
    ) -> Result<String, CommandError> {
        self.lock().interpreter_mut().evaluate(expression, level)
    }

    pub fn locals(&self, level: u32, scopes: LocalScopes) -> Result<Vec<Variable>, CommandError> {
        self.lock().interpreter_mut().locals(level, scopes)
    }

    pub fn globals(&self) -> Result<Vec<Variable>, CommandError> {
        self.lock().interpreter_mut().globals()
    }

    pub fn backtrace(&self) -> Result<Vec<BacktraceFrame>, CommandError> {
        self.lock().interpreter_mut().backtrace()
    }

    // ---- sources, logging, contexts ---------------------------------------

    /// Register source text with the engine and announce it to the
    /// controller.
    pub fn add_source(&self, source: SourceText) {
        self.lock().add_source(source);
    }

    /// Forward script output to the controller and to local subscribers.
    pub fn log_output(&self, level: LogLevel, text: &str) {
        self.lock().log_output(level, text);
    }

    /// A nested execution context (coroutine, spawned chunk) started.
    pub fn begin_context(&self) -> ContextId {
        self.lock().begin_context()
    }

    pub fn end_context(&self, id: ContextId) {
        self.lock().end_context(id);
    }

    /// Subscribe to engine activity. Events are fanned to one consumer;
    /// call once and distribute downstream if more are needed.
    pub fn events(&self) -> Receiver<Event> {
        self.events.clone()
    }
}

fn spawn_forwarder(dispatcher: Dispatcher, sink_rx: Receiver<ConnectionEvent>) {
    thread::Builder::new()
        .name("engine-inbound".to_string())
        .spawn(move || {
            for event in sink_rx {
                dispatcher.on_event(event);
            }
        })
        .expect("spawning engine inbound thread");
}
