//! JSON payload bodies, one struct per carried command.
//!
//! Commands that carry a single wire type (`SetBreakpoint`,
//! `RemoveBreakpoint`, `ValueVar`) use [`Breakpoint`] / [`Variable`]
//! directly as their body.

use serde::{Deserialize, Serialize};

use crate::types::{BacktraceFrame, Breakpoint, LogLevel, SourceText, Variable};

/// `ChangedState` notification: the debuggee suspended or resumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedState {
    pub suspended: bool,
}

/// `UpdateSource` notification: where the debuggee is suspended.
///
/// `is_refresh` marks a re-notification of an already-reported suspension
/// (forced refresh) as opposed to a fresh stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSource {
    pub key: String,
    pub line: u32,
    pub update_count: u32,
    pub is_refresh: bool,
}

/// `AddedSource` notification: the probe saw a source key for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedSource {
    pub key: String,
    pub title: String,
}

/// `OutputLog` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLog {
    pub level: LogLevel,
    pub text: String,
    pub key: Option<String>,
    pub line: Option<u32>,
}

/// `EvalToVar` / `EvalToMultiVar` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eval {
    pub expression: String,
    /// Stack level to evaluate in; `None` means the innermost frame.
    pub level: Option<u32>,
}

/// `EvalsToVarList` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evals {
    pub expressions: Vec<String>,
    pub level: Option<u32>,
}

/// `RequestLocalVarList` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalsRequest {
    pub level: u32,
    pub include_locals: bool,
    pub include_upvalues: bool,
    pub include_environment: bool,
}

/// `RequestFieldVarList` request: the fields of one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsRequest {
    pub var: Variable,
}

/// `SetUpdateCount` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUpdateCount {
    pub count: u32,
}

/// `SaveSource` request: replace the stored text for `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSource {
    pub key: String,
    pub lines: Vec<String>,
}

/// `RequestSource` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSource {
    pub key: String,
}

/// `Failed` response: a well-formed command whose precondition failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
}

/// `ValueString` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueString {
    pub value: String,
}

/// `ValueSource` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSource {
    pub source: SourceText,
}

/// `ValueVarList` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarList {
    pub vars: Vec<Variable>,
}

/// `ValueBacktraceList` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktraceList {
    pub frames: Vec<BacktraceFrame>,
}

/// `ValueBreakpointList` / `ChangedBreakpointList` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointList {
    pub breakpoints: Vec<Breakpoint>,
}
