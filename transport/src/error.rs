#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The connection has been closed; the command was not sent.
    #[error("not connected")]
    NotConnected,
    /// Every resolved endpoint refused the connection.
    #[error("no endpoint accepted the connection")]
    ConnectFailed,
    /// The peer never confirmed the protocol, or confirmed it wrongly.
    #[error("peer did not confirm the connection")]
    HandshakeFailed,
    #[error("protocol error: {0}")]
    Protocol(#[from] codec::CodecError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
