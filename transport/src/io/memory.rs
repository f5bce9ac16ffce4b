//! In-memory transport for tests: channels instead of sockets.

use std::io::{self, Read, Write};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::Transport;
use crate::TransportError;

/// Mirrors the TCP read-timeout behaviour so poll loops see `WouldBlock`.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// One end of a connected in-memory pair.
pub struct InMemoryTransport {
    reader: InMemoryReader,
    writer: InMemoryWriter,
}

pub struct InMemoryReader {
    buffer: Vec<u8>,
    pos: usize,
    rx: Receiver<Vec<u8>>,
}

pub struct InMemoryWriter {
    tx: Sender<Vec<u8>>,
}

impl InMemoryTransport {
    /// A connected pair: data written to one end is read from the other.
    pub fn pair() -> (Self, Self) {
        let (left_tx, right_rx) = crossbeam_channel::unbounded();
        let (right_tx, left_rx) = crossbeam_channel::unbounded();

        let left = Self {
            reader: InMemoryReader {
                buffer: Vec::new(),
                pos: 0,
                rx: left_rx,
            },
            writer: InMemoryWriter { tx: left_tx },
        };
        let right = Self {
            reader: InMemoryReader {
                buffer: Vec::new(),
                pos: 0,
                rx: right_rx,
            },
            writer: InMemoryWriter { tx: right_tx },
        };
        (left, right)
    }
}

impl Transport for InMemoryTransport {
    type Reader = InMemoryReader;
    type Writer = InMemoryWriter;

    fn split(self) -> Result<(Self::Reader, Self::Writer), TransportError> {
        Ok((self.reader, self.writer))
    }
}

impl Read for InMemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buffer.len() {
            match self.rx.recv_timeout(RECV_TIMEOUT) {
                Ok(data) => {
                    self.buffer = data;
                    self.pos = 0;
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data available"));
                }
                // peer dropped: EOF
                Err(RecvTimeoutError::Disconnected) => return Ok(0),
            }
        }

        let available = &self.buffer[self.pos..];
        let len = available.len().min(buf.len());
        buf[..len].copy_from_slice(&available[..len]);
        self.pos += len;
        Ok(len)
    }
}

impl Write for InMemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(buf.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
