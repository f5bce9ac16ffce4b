use std::net::TcpStream;
use std::time::Duration;

use super::Transport;
use crate::TransportError;

/// How long a blocked read waits before reporting `WouldBlock`.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// TCP-backed [`Transport`].
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Wrap an established stream, configuring the read timeout the poll
    /// loops depend on.
    pub fn new(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        Ok(Self { stream })
    }
}

impl Transport for TcpTransport {
    type Reader = TcpStream;
    type Writer = TcpStream;

    fn split(self) -> Result<(Self::Reader, Self::Writer), TransportError> {
        let reader = self.stream.try_clone()?;
        Ok((reader, self.stream))
    }
}
