//! Connection-lifecycle negotiation.
//!
//! Two roles produce a raw stream: [`Listener`] binds and accepts one
//! incoming connection, [`dial`] resolves a host name and tries every
//! candidate endpoint in order. Either way the stream is not trusted until
//! [`confirm`] has seen the mutual `StartConnection` exchange: both ends
//! send the zero-payload marker and must also receive it. This catches a
//! stream that was accepted or opened but whose peer is not actually the
//! expected protocol endpoint (a stray TCP probe, a port scanner) before
//! any real command traffic flows.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use codec::{Command, CommandKind};
use crossbeam_channel::Sender;

use crate::io::{TcpTransport, Transport};
use crate::{Connection, ConnectionEvent, TransportError};

/// Listening role: bind a local endpoint and accept one peer.
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    pub fn bind(port: u16) -> Result<Self, TransportError> {
        let inner = TcpListener::bind(("0.0.0.0", port))?;
        tracing::debug!(port, "listening");
        Ok(Self { inner })
    }

    /// The actual bound port; useful when binding port 0.
    pub fn local_port(&self) -> Result<u16, TransportError> {
        Ok(self.inner.local_addr()?.port())
    }

    /// Block until one peer connects. The stream still needs [`confirm`].
    pub fn accept(&self) -> Result<TcpTransport, TransportError> {
        let (stream, peer) = self.inner.accept()?;
        tracing::debug!(%peer, "accepted stream");
        TcpTransport::new(stream)
    }
}

/// Dialing role: resolve `host:port` and try every candidate in order.
///
/// Only after exhausting all candidates does this report `ConnectFailed`.
pub fn dial(host: &str, port: u16) -> Result<TcpTransport, TransportError> {
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| {
            tracing::debug!(host, port, error = %e, "failed to resolve");
            TransportError::ConnectFailed
        })?
        .collect();
    dial_candidates(candidates)
}

/// Attempt candidate endpoints in the order given.
pub fn dial_candidates(
    candidates: impl IntoIterator<Item = SocketAddr>,
) -> Result<TcpTransport, TransportError> {
    for addr in candidates {
        tracing::debug!(%addr, "trying endpoint");
        match TcpStream::connect(addr) {
            Ok(stream) => {
                tracing::debug!(%addr, "connected");
                return TcpTransport::new(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, error = %e, "endpoint failed, trying next");
            }
        }
    }
    Err(TransportError::ConnectFailed)
}

/// A mutually-confirmed stream, ready to become a [`Connection`].
pub struct Confirmed<R, W> {
    reader: R,
    writer: W,
    residual: BytesMut,
}

impl<R, W> Confirmed<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    pub fn into_connection(self, sink: Sender<ConnectionEvent>) -> Connection {
        Connection::from_parts(self.reader, self.writer, self.residual, sink)
    }
}

/// Perform the symmetric handshake on a raw stream.
///
/// Sends the zero-payload `StartConnection` marker and waits up to
/// `timeout` to receive the same from the peer. Both directions must
/// succeed; an IO error, a deadline expiry, or any frame other than the
/// bare marker fails the attempt and the half-open stream is discarded.
pub fn confirm<T: Transport>(
    transport: T,
    timeout: Duration,
) -> Result<Confirmed<T::Reader, T::Writer>, TransportError> {
    let (mut reader, mut writer) = transport.split()?;

    let mut frame = BytesMut::new();
    codec::encode(&Command::plain(CommandKind::StartConnection, 0), &mut frame);
    writer.write_all(&frame).map_err(|e| {
        tracing::debug!(error = %e, "failed to send confirmation marker");
        TransportError::HandshakeFailed
    })?;
    writer.flush().map_err(|_| TransportError::HandshakeFailed)?;

    tracing::debug!("confirming whether the connection is correct");
    let deadline = Instant::now() + timeout;
    let mut buf = BytesMut::new();
    let mut chunk = [0u8; 256];
    loop {
        match codec::decode(&mut buf) {
            Ok(Some(command))
                if command.kind() == CommandKind::StartConnection
                    && command.payload().is_empty() =>
            {
                tracing::debug!("peer confirmed the connection");
                return Ok(Confirmed {
                    reader,
                    writer,
                    residual: buf,
                });
            }
            Ok(Some(command)) => {
                tracing::debug!(kind = ?command.kind(), "unexpected frame during confirmation");
                return Err(TransportError::HandshakeFailed);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "malformed frame during confirmation");
                return Err(TransportError::HandshakeFailed);
            }
        }

        if Instant::now() >= deadline {
            tracing::debug!("timed out waiting for confirmation");
            return Err(TransportError::HandshakeFailed);
        }

        match reader.read(&mut chunk) {
            Ok(0) => {
                tracing::debug!("stream closed during confirmation");
                return Err(TransportError::HandshakeFailed);
            }
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                tracing::debug!(error = %e, "io error during confirmation");
                return Err(TransportError::HandshakeFailed);
            }
        }
    }
}
