//! Engine state behind the facade's mutex.
//!
//! Everything here runs with the engine lock held. The debuggee thread
//! enters through the hook methods (`on_call`, `on_return`, `on_line`,
//! `drain_commands`, `notify_suspension`); the embedder's own thread enters
//! through the facade. Neither path blocks while holding the lock: the
//! bounded wait of the suspension loop happens in the facade after the lock
//! is dropped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use codec::{payloads, Breakpoint, Command, CommandKind, LogLevel, SourceText, Variable};
use crossbeam_channel::Sender;
use serde::Serialize;
use transport::{Connection, Dispatcher};

use crate::breakpoints::BreakpointTable;
use crate::context::{ContextId, ContextStack, StepMark};
use crate::engine::Event;
use crate::error::{invariant_violation, CommandError};
use crate::interpreter::{Interpreter, LocalScopes};
use crate::sources::{MemorySourceStore, SourceStore};
use crate::state::{self, Decision, ExecutionState};

pub(crate) struct EngineInternals {
    state: ExecutionState,
    contexts: ContextStack,
    step_mark: Option<StepMark>,
    breakpoints: BreakpointTable,
    interpreter: Box<dyn Interpreter>,
    sources: MemorySourceStore,
    connection: Option<Connection>,
    dispatcher: Dispatcher,
    publisher: Sender<Event>,
    /// False when running without a controller; the hook is then a no-op.
    enabled: bool,
    /// Monotonic counter stamped on every suspension notification.
    update_count: u32,
    /// Suspension notifications the controller has not yet acknowledged.
    /// Shared with the dispatcher's pending-response table.
    outstanding_acks: Arc<AtomicUsize>,
    /// A `ForceSourceRefresh` arrived; re-notify even if already notified.
    must_refresh: bool,
    /// The current suspension has been reported to the controller.
    suspension_notified: bool,
    next_command_id: u32,
    next_context_id: u64,
    /// Last (source key, line) the hook reported.
    position: Option<(String, u32)>,
}

impl EngineInternals {
    pub(crate) fn new(
        interpreter: Box<dyn Interpreter>,
        connection: Option<Connection>,
        dispatcher: Dispatcher,
        publisher: Sender<Event>,
    ) -> Self {
        let enabled = connection.is_some();
        Self {
            state: ExecutionState::Initial,
            contexts: ContextStack::new(ContextId(0)),
            step_mark: None,
            breakpoints: BreakpointTable::new(),
            interpreter,
            sources: MemorySourceStore::new(),
            connection,
            dispatcher,
            publisher,
            enabled,
            update_count: 0,
            outstanding_acks: Arc::new(AtomicUsize::new(0)),
            must_refresh: false,
            suspension_notified: false,
            next_command_id: 0,
            next_context_id: 1,
            position: None,
        }
    }

    pub(crate) fn state(&self) -> ExecutionState {
        self.state
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    // ---- outbound traffic -------------------------------------------------

    fn fresh_command_id(&mut self) -> u32 {
        self.next_command_id = self.next_command_id.wrapping_add(1);
        self.next_command_id
    }

    fn send(&self, command: Command) {
        if let Some(connection) = &self.connection {
            if let Err(error) = connection.send(command) {
                tracing::debug!(%error, "dropping outbound command, connection gone");
            }
        }
    }

    /// Fire-and-forget notification with a fresh correlation id.
    fn notify<T: Serialize>(&mut self, kind: CommandKind, body: &T) {
        let id = self.fresh_command_id();
        match Command::with_body(kind, id, body) {
            Ok(command) => self.send(command),
            Err(error) => tracing::error!(%error, ?kind, "failed to encode notification"),
        }
    }

    fn reply<T: Serialize>(
        &mut self,
        id: u32,
        kind: CommandKind,
        body: &T,
    ) -> Result<(), CommandError> {
        let command = Command::with_body(kind, id, body)?;
        self.send(command);
        Ok(())
    }

    fn reply_ok(&self, id: u32) {
        self.send(Command::plain(CommandKind::Succeeded, id));
    }

    fn fail(&mut self, id: u32, error: &CommandError) {
        let body = payloads::Failure {
            message: error.to_string(),
        };
        match Command::with_body(CommandKind::Failed, id, &body) {
            Ok(command) => self.send(command),
            Err(error) => tracing::error!(%error, "failed to encode failure reply"),
        }
    }

    // ---- execution state --------------------------------------------------

    pub(crate) fn request_state(&mut self, requested: ExecutionState) {
        let acks_outstanding = self.outstanding_acks.load(Ordering::SeqCst) > 0;
        match state::decide(self.state, requested, acks_outstanding) {
            Decision::Ignore => {
                tracing::trace!(current = ?self.state, ?requested, "state request ignored");
            }
            Decision::Reject => {
                invariant_violation("illegal execution state transition requested");
            }
            Decision::Enter => {
                let previous = self.state;
                tracing::debug!(?previous, next = ?requested, "execution state change");
                self.state = requested;
                match requested {
                    ExecutionState::Break => {
                        self.step_mark = None;
                        self.suspension_notified = false;
                    }
                    ExecutionState::Normal => {
                        self.step_mark = None;
                    }
                    step if step.is_stepping() => {
                        self.step_mark = Some(self.contexts.mark());
                    }
                    _ => {}
                }
                if requested == ExecutionState::Break {
                    self.notify_state(true);
                } else if previous == ExecutionState::Break
                    && requested != ExecutionState::Quit
                {
                    self.notify_state(false);
                }
            }
        }
    }

    fn notify_state(&mut self, suspended: bool) {
        self.notify(
            CommandKind::ChangedState,
            &payloads::ChangedState { suspended },
        );
        let _ = self.publisher.send(Event::StateChanged { suspended });
    }

    /// Tear down after the connection dropped mid-session. The script is
    /// aborted rather than left running with half a debugger attached.
    pub(crate) fn handle_disconnect(&mut self) {
        tracing::warn!("controller connection lost, aborting debuggee");
        self.request_state(ExecutionState::Quit);
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }

    // ---- inbound commands -------------------------------------------------

    /// Process everything currently queued, in arrival order. Responses to
    /// our own notifications are settled against the waiter table and never
    /// reach interpretation.
    pub(crate) fn drain_commands(&mut self) {
        while let Some(command) = self.dispatcher.try_pop() {
            if self.dispatcher.resolve(&command) {
                continue;
            }
            if command.kind() == CommandKind::EndConnection {
                tracing::info!("controller ended the session");
                self.request_state(ExecutionState::Quit);
                if let Some(connection) = self.connection.take() {
                    connection.close();
                }
                return;
            }
            self.interpret(command);
        }
    }

    fn interpret(&mut self, command: Command) {
        let id = command.id();
        let kind = command.kind();
        tracing::debug!(?kind, id, "interpreting command");
        if let Err(error) = self.execute(&command) {
            tracing::debug!(%error, ?kind, "command failed");
            self.fail(id, &error);
        }
    }

    fn execute(&mut self, command: &Command) -> Result<(), CommandError> {
        let id = command.id();
        match command.kind() {
            CommandKind::Break => self.request_state(ExecutionState::Break),
            CommandKind::Resume => self.request_state(ExecutionState::Normal),
            CommandKind::StepOver => self.request_state(ExecutionState::StepOver),
            CommandKind::StepInto => self.request_state(ExecutionState::StepInto),
            CommandKind::StepReturn => self.request_state(ExecutionState::StepReturn),
            CommandKind::ForceSourceRefresh => self.must_refresh = true,
            CommandKind::SetUpdateCount => {
                let body: payloads::SetUpdateCount = command.body()?;
                // counters only move forward, even across reconnects
                self.update_count = self.update_count.max(body.count);
            }
            CommandKind::SaveSource => {
                let body: payloads::SaveSource = command.body()?;
                self.sources.save(&body.key, body.lines)?;
                self.reply_ok(id);
            }
            CommandKind::SetBreakpoint => {
                let breakpoint: Breakpoint = command.body()?;
                self.breakpoints.set(breakpoint);
                self.broadcast_breakpoints();
            }
            CommandKind::RemoveBreakpoint => {
                let breakpoint: Breakpoint = command.body()?;
                self.breakpoints.remove(&breakpoint.key, breakpoint.line);
                self.broadcast_breakpoints();
            }
            CommandKind::ChangedBreakpointList => {
                let body: payloads::BreakpointList = command.body()?;
                self.breakpoints.replace_all(body.breakpoints);
            }
            CommandKind::EvalToVar => {
                let body: payloads::Eval = command.body()?;
                let value = self.interpreter.evaluate(&body.expression, body.level)?;
                self.reply(id, CommandKind::ValueString, &payloads::ValueString { value })?;
            }
            CommandKind::EvalToMultiVar => {
                let body: payloads::Eval = command.body()?;
                let vars = self
                    .interpreter
                    .evaluate_multi(&body.expression, body.level)?;
                self.reply(id, CommandKind::ValueVarList, &payloads::VarList { vars })?;
            }
            CommandKind::EvalsToVarList => {
                let body: payloads::Evals = command.body()?;
                // per-expression failures become error-valued entries so one
                // bad watch does not hide the rest
                let mut vars = Vec::with_capacity(body.expressions.len());
                for expression in &body.expressions {
                    match self.interpreter.evaluate(expression, body.level) {
                        Ok(value) => vars.push(Variable {
                            name: expression.clone(),
                            type_name: String::new(),
                            value,
                        }),
                        Err(error) => vars.push(Variable {
                            name: expression.clone(),
                            type_name: "error".to_string(),
                            value: error.to_string(),
                        }),
                    }
                }
                self.reply(id, CommandKind::ValueVarList, &payloads::VarList { vars })?;
            }
            CommandKind::RequestFieldVarList => {
                let body: payloads::FieldsRequest = command.body()?;
                let vars = self.interpreter.fields(&body.var)?;
                self.reply(id, CommandKind::ValueVarList, &payloads::VarList { vars })?;
            }
            CommandKind::RequestLocalVarList => {
                let body: payloads::LocalsRequest = command.body()?;
                let scopes = LocalScopes {
                    locals: body.include_locals,
                    upvalues: body.include_upvalues,
                    environment: body.include_environment,
                };
                let vars = self.interpreter.locals(body.level, scopes)?;
                self.reply(id, CommandKind::ValueVarList, &payloads::VarList { vars })?;
            }
            CommandKind::RequestGlobalVarList => {
                let vars = self.interpreter.globals()?;
                self.reply(id, CommandKind::ValueVarList, &payloads::VarList { vars })?;
            }
            CommandKind::RequestRegistryVarList => {
                let vars = self.interpreter.registry()?;
                self.reply(id, CommandKind::ValueVarList, &payloads::VarList { vars })?;
            }
            CommandKind::RequestStackList => {
                let vars = self.interpreter.stack()?;
                self.reply(id, CommandKind::ValueVarList, &payloads::VarList { vars })?;
            }
            CommandKind::RequestSource => {
                let body: payloads::RequestSource = command.body()?;
                let source = self
                    .sources
                    .get(&body.key)
                    .cloned()
                    .ok_or(CommandError::UnknownSource { key: body.key })?;
                self.reply(id, CommandKind::ValueSource, &payloads::ValueSource { source })?;
            }
            CommandKind::RequestBacktraceList => {
                let frames = self.interpreter.backtrace()?;
                self.reply(
                    id,
                    CommandKind::ValueBacktraceList,
                    &payloads::BacktraceList { frames },
                )?;
            }
            CommandKind::StartConnection | CommandKind::EndConnection => {
                // the handshake consumes StartConnection, drain_commands
                // consumes EndConnection
                tracing::debug!("ignoring connection marker");
            }
            kind if kind.is_response() => {
                tracing::trace!(?kind, "response with no registered waiter");
            }
            kind => {
                tracing::debug!(?kind, "command is not handled on the probe side");
            }
        }
        Ok(())
    }

    fn broadcast_breakpoints(&mut self) {
        let body = payloads::BreakpointList {
            breakpoints: self.breakpoints.all(),
        };
        self.notify(CommandKind::ChangedBreakpointList, &body);
    }

    // ---- suspension -------------------------------------------------------

    /// Report the current suspension to the controller, once per suspension
    /// unless a forced refresh re-arms it. The notification registers a
    /// response waiter: resuming stays gated until the controller
    /// acknowledges it.
    pub(crate) fn notify_suspension(&mut self) {
        if self.suspension_notified && !self.must_refresh {
            return;
        }
        let Some((key, line)) = self.position.clone() else {
            return;
        };
        let is_refresh = self.suspension_notified;
        self.must_refresh = false;
        self.suspension_notified = true;

        if !self.sources.contains(&key) {
            let title = source_title(&key);
            self.sources.add(&key, &title);
            self.notify(
                CommandKind::AddedSource,
                &payloads::AddedSource {
                    key: key.clone(),
                    title,
                },
            );
        }

        self.update_count += 1;
        let body = payloads::UpdateSource {
            key: key.clone(),
            line,
            update_count: self.update_count,
            is_refresh,
        };
        let id = self.fresh_command_id();
        match Command::with_body(CommandKind::UpdateSource, id, &body) {
            Ok(command) => {
                if self.connection.is_some() {
                    self.dispatcher
                        .register_waiter(id, Arc::clone(&self.outstanding_acks));
                }
                tracing::debug!(key = %key, line, update_count = self.update_count, is_refresh, "reporting suspension");
                self.send(command);
            }
            Err(error) => tracing::error!(%error, "failed to encode suspension notification"),
        }
        let _ = self.publisher.send(Event::SourcePosition {
            key,
            line,
            is_live: !is_refresh,
        });
    }

    // ---- hook events ------------------------------------------------------

    pub(crate) fn on_call(&mut self) {
        self.contexts.enter_call();
    }

    pub(crate) fn on_return(&mut self) {
        if self.state == ExecutionState::StepReturn {
            if let Some(mark) = self.step_mark {
                if self.contexts.mark_satisfied(mark) {
                    self.request_state(ExecutionState::Break);
                }
            }
        }
        self.contexts.leave_call();
    }

    pub(crate) fn on_line(&mut self, key: &str, line: u32) {
        self.position = Some((key.to_string(), line));

        // the first line event is what actually starts the run
        if self.state == ExecutionState::Initial {
            self.request_state(ExecutionState::Normal);
        }

        match self.state {
            ExecutionState::Quit | ExecutionState::Break => return,
            ExecutionState::StepInto => self.request_state(ExecutionState::Break),
            ExecutionState::StepOver => {
                if let Some(mark) = self.step_mark {
                    if self.contexts.mark_satisfied(mark) {
                        self.request_state(ExecutionState::Break);
                    }
                }
            }
            // step-return fires on the return path, never on a line event
            _ => {}
        }

        if self.state != ExecutionState::Break {
            let hit = self
                .breakpoints
                .find(key, line)
                .map(|bp| bp.enabled)
                .unwrap_or(false);
            if hit {
                tracing::debug!(key, line, "breakpoint hit");
                self.request_state(ExecutionState::Break);
            }
        }
    }

    // ---- contexts ---------------------------------------------------------

    pub(crate) fn begin_context(&mut self) -> ContextId {
        let id = ContextId(self.next_context_id);
        self.next_context_id += 1;
        self.contexts.push(id);
        id
    }

    pub(crate) fn end_context(&mut self, id: ContextId) {
        // a pending depth-tracking step whose context is going away stops
        // at the caller; step-into needs no escape, any next line breaks
        if matches!(
            self.state,
            ExecutionState::StepOver | ExecutionState::StepReturn
        ) {
            if let Some(mark) = self.step_mark {
                if mark.context == id {
                    self.contexts.pop(id);
                    self.request_state(ExecutionState::Break);
                    return;
                }
            }
        }
        self.contexts.pop(id);
    }

    // ---- facade support ---------------------------------------------------

    pub(crate) fn set_breakpoint(&mut self, breakpoint: Breakpoint) {
        self.breakpoints.set(breakpoint);
        self.broadcast_breakpoints();
    }

    pub(crate) fn remove_breakpoint(&mut self, key: &str, line: u32) {
        if self.breakpoints.remove(key, line).is_some() {
            self.broadcast_breakpoints();
        }
    }

    pub(crate) fn breakpoints(&self) -> Vec<Breakpoint> {
        self.breakpoints.all()
    }

    pub(crate) fn next_breakpoint_after(&self, key: &str, line: u32) -> Option<Breakpoint> {
        self.breakpoints.next_after(key, line).cloned()
    }

    pub(crate) fn add_source(&mut self, source: SourceText) {
        let notice = payloads::AddedSource {
            key: source.key.clone(),
            title: source.title.clone(),
        };
        self.sources.insert(source);
        self.notify(CommandKind::AddedSource, &notice);
    }

    pub(crate) fn log_output(&mut self, level: LogLevel, text: &str) {
        let (key, line) = match &self.position {
            Some((key, line)) => (Some(key.clone()), Some(*line)),
            None => (None, None),
        };
        self.notify(
            CommandKind::OutputLog,
            &payloads::OutputLog {
                level,
                text: text.to_string(),
                key: key.clone(),
                line,
            },
        );
        let _ = self.publisher.send(Event::LogOutput {
            level,
            text: text.to_string(),
            key,
            line,
        });
    }

    pub(crate) fn interpreter_mut(&mut self) -> &mut dyn Interpreter {
        self.interpreter.as_mut()
    }
}

/// Human-facing title for a source key: the file name for `@path` keys, the
/// key itself otherwise.
fn source_title(key: &str) -> String {
    let path = key.strip_prefix('@').unwrap_or(key);
    std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_titles_strip_chunk_prefix_and_path() {
        assert_eq!(source_title("@scripts/main.lua"), "main.lua");
        assert_eq!(source_title("@main.lua"), "main.lua");
        assert_eq!(source_title("=stdin"), "=stdin");
    }
}
