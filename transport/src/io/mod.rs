//! IO abstraction under the framed connection.
//!
//! The [`Transport`] trait lets the same connection logic run over TCP or
//! over in-memory channels in tests. Readers are expected to be configured
//! with a timeout: when no data arrives in time they return `WouldBlock`,
//! which is what lets the read loop notice shutdown without a dedicated
//! wakeup mechanism.

use std::io::{Read, Write};

use crate::TransportError;

mod memory;
mod tcp;

pub use memory::InMemoryTransport;
pub use tcp::TcpTransport;

/// A duplex byte stream that can be split into independently owned halves.
///
/// Both halves must be `Send + 'static`: the reader moves into a background
/// thread while the writer is driven from the connection's writer thread.
pub trait Transport: Send + 'static {
    type Reader: Read + Send + 'static;
    type Writer: Write + Send + 'static;

    fn split(self) -> Result<(Self::Reader, Self::Writer), TransportError>;
}
