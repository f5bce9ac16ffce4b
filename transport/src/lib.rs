//! Framed command transport between the debug probe and its controller.
//!
//! A [`Connection`] moves [`codec::Command`]s over a duplex byte stream,
//! decoupled from the caller's thread: sends are drained in strict FIFO
//! order by a writer thread, and a reader thread reassembles inbound frames
//! and feeds them to a sink channel. [`connector`] produces connections,
//! requiring both peers to confirm the protocol with a `StartConnection`
//! marker before any real traffic is trusted. The [`Dispatcher`] is the
//! bridge to the engine: a thread-safe inbound FIFO plus the table matching
//! response commands to outstanding requests.

pub mod connector;
pub mod dispatcher;
pub mod io;

mod connection;
mod error;

pub use connection::{CloseReason, Connection, ConnectionEvent};
pub use connector::{confirm, dial, Confirmed, Listener};
pub use dispatcher::Dispatcher;
pub use error::TransportError;
