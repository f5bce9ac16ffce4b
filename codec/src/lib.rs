//! Wire protocol for the remote debug probe.
//!
//! Every message travels as a fixed 12-byte header (command kind,
//! correlation id, payload length, all big-endian `u32`) followed by exactly
//! `payload length` raw bytes. Payload bodies are JSON-encoded serde
//! structs; the header stays binary so the read side can frame the stream
//! without parsing any body it has not fully received.

mod command;
mod frame;
pub mod payloads;
pub mod types;

pub use command::{Command, CommandKind};
pub use frame::{decode, encode, CodecError, HEADER_LEN, MAX_PAYLOAD_LEN};
pub use types::{BacktraceFrame, Breakpoint, LogLevel, SourceText, Variable};
