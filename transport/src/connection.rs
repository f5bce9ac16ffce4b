use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

use bytes::BytesMut;
use codec::Command;
use crossbeam_channel::Sender;

use crate::io::Transport;
use crate::TransportError;

/// Why a connection went away. Delivered exactly once per connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called locally.
    Requested,
    /// The peer shut the stream down.
    PeerClosed,
    Io(String),
    Protocol(String),
}

/// What the read side delivers to the connection's owner.
#[derive(Debug)]
pub enum ConnectionEvent {
    Command(Command),
    Closed(CloseReason),
}

/// A live duplex command channel.
///
/// Cheap to clone; the underlying stream lives as long as any handle or
/// in-flight operation references it. Callbacks fire on the connection's
/// own threads after the original call stack has unwound, which is why
/// ownership is shared rather than borrowed.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Shared>,
}

struct Shared {
    outbound: Mutex<Option<Sender<Command>>>,
    closed: AtomicBool,
    close_reported: AtomicBool,
}

impl Shared {
    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// The first caller wins; later teardown paths stay silent.
    fn report_closed(&self, sink: &Sender<ConnectionEvent>, reason: CloseReason) {
        if !self.close_reported.swap(true, Ordering::SeqCst) {
            tracing::debug!(?reason, "connection closed");
            let _ = sink.send(ConnectionEvent::Closed(reason));
        }
    }
}

impl Connection {
    /// Frame an already-confirmed transport. Inbound commands and the final
    /// close notification arrive on `sink`.
    pub fn start<T: Transport>(
        transport: T,
        sink: Sender<ConnectionEvent>,
    ) -> Result<Self, TransportError> {
        let (reader, writer) = transport.split()?;
        Ok(Self::from_parts(reader, writer, BytesMut::new(), sink))
    }

    /// `residual` holds bytes already read past the handshake.
    pub(crate) fn from_parts<R, W>(
        reader: R,
        writer: W,
        residual: BytesMut,
        sink: Sender<ConnectionEvent>,
    ) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (outbound, outbound_rx) = crossbeam_channel::unbounded::<Command>();
        let inner = Arc::new(Shared {
            outbound: Mutex::new(Some(outbound)),
            closed: AtomicBool::new(false),
            close_reported: AtomicBool::new(false),
        });

        spawn_writer(Arc::downgrade(&inner), writer, outbound_rx, sink.clone());
        spawn_reader(Arc::downgrade(&inner), reader, residual, sink);

        Self { inner }
    }

    /// Queue a command for sending. Writes drain strictly in FIFO order; a
    /// later send never overtakes an earlier one.
    pub fn send(&self, command: Command) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        let guard = self.inner.outbound.lock().unwrap();
        guard
            .as_ref()
            .ok_or(TransportError::NotConnected)?
            .send(command)
            .map_err(|_| TransportError::NotConnected)
    }

    /// Schedule teardown. Idempotent; pending writes are discarded and
    /// further `send` calls fail with `NotConnected`.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            // disconnect the writer thread's queue
            self.inner.outbound.lock().unwrap().take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

fn spawn_writer(
    shared: Weak<Shared>,
    mut writer: impl Write + Send + 'static,
    outbound_rx: crossbeam_channel::Receiver<Command>,
    sink: Sender<ConnectionEvent>,
) {
    thread::Builder::new()
        .name("connection-writer".to_string())
        .spawn(move || {
            let mut buf = BytesMut::new();
            while let Ok(command) = outbound_rx.recv() {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                if shared.closed.load(Ordering::SeqCst) {
                    // discard anything still queued
                    return;
                }
                buf.clear();
                codec::encode(&command, &mut buf);
                tracing::trace!(kind = ?command.kind(), id = command.id(), "writing frame");
                if let Err(e) = writer.write_all(&buf).and_then(|()| writer.flush()) {
                    shared.mark_closed();
                    shared.report_closed(&sink, CloseReason::Io(e.to_string()));
                    return;
                }
            }
        })
        .expect("spawning connection writer thread");
}

fn spawn_reader(
    shared: Weak<Shared>,
    mut reader: impl Read + Send + 'static,
    residual: BytesMut,
    sink: Sender<ConnectionEvent>,
) {
    thread::Builder::new()
        .name("connection-reader".to_string())
        .spawn(move || {
            let mut buf = residual;
            let mut chunk = [0u8; 4096];
            loop {
                // deliver every complete frame already buffered, in order
                loop {
                    match codec::decode(&mut buf) {
                        Ok(Some(command)) => {
                            tracing::trace!(kind = ?command.kind(), id = command.id(), "read frame");
                            let _ = sink.send(ConnectionEvent::Command(command));
                        }
                        Ok(None) => break,
                        Err(e) => {
                            if let Some(shared) = shared.upgrade() {
                                shared.mark_closed();
                                shared.report_closed(&sink, CloseReason::Protocol(e.to_string()));
                            }
                            return;
                        }
                    }
                }

                let Some(strong) = shared.upgrade() else {
                    return;
                };
                if strong.closed.load(Ordering::SeqCst) {
                    strong.report_closed(&sink, CloseReason::Requested);
                    return;
                }
                drop(strong);

                match reader.read(&mut chunk) {
                    Ok(0) => {
                        if let Some(shared) = shared.upgrade() {
                            shared.mark_closed();
                            shared.report_closed(&sink, CloseReason::PeerClosed);
                        }
                        return;
                    }
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    Err(e)
                        if matches!(
                            e.kind(),
                            ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                        ) => {}
                    Err(e) => {
                        if let Some(shared) = shared.upgrade() {
                            shared.mark_closed();
                            shared.report_closed(&sink, CloseReason::Io(e.to_string()));
                        }
                        return;
                    }
                }
            }
        })
        .expect("spawning connection reader thread");
}
