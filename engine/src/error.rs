use codec::CodecError;

/// Why a controller command could not be carried out. The message of the
/// variant travels back to the controller in a `Failed` reply.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("invalid stack level {level}")]
    InvalidStackLevel { level: u32 },

    #[error("unknown source key {key:?}")]
    UnknownSource { key: String },

    #[error("evaluation failed: {0}")]
    Eval(String),

    #[error("malformed command payload: {0}")]
    Payload(#[from] CodecError),
}

/// A broken internal assumption. Logged and carried past so a misbehaving
/// controller cannot take the host process down with it.
pub(crate) fn invariant_violation(message: &str) {
    tracing::error!(message, "engine invariant violated");
}
