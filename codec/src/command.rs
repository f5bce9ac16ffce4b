use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::frame::CodecError;

/// Every command the probe and the controller exchange.
///
/// Discriminants are the on-wire `type` field and must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandKind {
    // connection lifecycle
    StartConnection = 0,
    EndConnection = 1,

    // execution control
    Break = 10,
    Resume = 11,
    StepOver = 12,
    StepInto = 13,
    StepReturn = 14,
    ForceSourceRefresh = 15,
    SetUpdateCount = 16,
    SaveSource = 17,

    // breakpoints
    SetBreakpoint = 20,
    RemoveBreakpoint = 21,
    ChangedBreakpointList = 22,

    // evaluation
    EvalToVar = 30,
    EvalToMultiVar = 31,
    EvalsToVarList = 32,

    // inspection requests
    RequestFieldVarList = 40,
    RequestLocalVarList = 41,
    RequestGlobalVarList = 42,
    RequestRegistryVarList = 43,
    RequestStackList = 44,
    RequestSource = 45,
    RequestBacktraceList = 46,

    // notifications from the probe
    ChangedState = 50,
    UpdateSource = 51,
    AddedSource = 52,
    OutputLog = 53,

    // responses
    Succeeded = 60,
    Failed = 61,
    ValueString = 62,
    ValueSource = 63,
    ValueBreakpointList = 64,
    ValueVar = 65,
    ValueVarList = 66,
    ValueBacktraceList = 67,
}

impl CommandKind {
    pub(crate) fn from_u32(raw: u32) -> Option<Self> {
        use CommandKind::*;
        let kind = match raw {
            0 => StartConnection,
            1 => EndConnection,
            10 => Break,
            11 => Resume,
            12 => StepOver,
            13 => StepInto,
            14 => StepReturn,
            15 => ForceSourceRefresh,
            16 => SetUpdateCount,
            17 => SaveSource,
            20 => SetBreakpoint,
            21 => RemoveBreakpoint,
            22 => ChangedBreakpointList,
            30 => EvalToVar,
            31 => EvalToMultiVar,
            32 => EvalsToVarList,
            40 => RequestFieldVarList,
            41 => RequestLocalVarList,
            42 => RequestGlobalVarList,
            43 => RequestRegistryVarList,
            44 => RequestStackList,
            45 => RequestSource,
            46 => RequestBacktraceList,
            50 => ChangedState,
            51 => UpdateSource,
            52 => AddedSource,
            53 => OutputLog,
            60 => Succeeded,
            61 => Failed,
            62 => ValueString,
            63 => ValueSource,
            64 => ValueBreakpointList,
            65 => ValueVar,
            66 => ValueVarList,
            67 => ValueBacktraceList,
            _ => return None,
        };
        Some(kind)
    }

    /// A response correlated to an earlier request by id.
    pub fn is_response(self) -> bool {
        use CommandKind::*;
        matches!(
            self,
            Succeeded
                | Failed
                | ValueString
                | ValueSource
                | ValueBreakpointList
                | ValueVar
                | ValueVarList
                | ValueBacktraceList
        )
    }
}

/// One framed protocol message. Immutable once constructed; ownership moves
/// through queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
    id: u32,
    payload: Bytes,
}

impl Command {
    /// A command with no payload.
    pub fn plain(kind: CommandKind, id: u32) -> Self {
        Self {
            kind,
            id,
            payload: Bytes::new(),
        }
    }

    /// A command carrying a JSON-encoded body.
    pub fn with_body<T: Serialize>(kind: CommandKind, id: u32, body: &T) -> Result<Self, CodecError> {
        let payload = serde_json::to_vec(body)?;
        Ok(Self {
            kind,
            id,
            payload: payload.into(),
        })
    }

    pub(crate) fn from_wire(kind: CommandKind, id: u32, payload: Bytes) -> Self {
        Self { kind, id, payload }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Correlation id linking a request to its eventual response.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Decode the JSON payload body.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}
