use std::io::IsTerminal;
use std::time::Duration;

use codec::{Command, CommandKind};
use eyre::Result;
use tracing_subscriber::EnvFilter;
use transport::{
    io::InMemoryTransport, CloseReason, Connection, ConnectionEvent, TransportError,
};

// test suite "constructor"
#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .json()
            .try_init();
    }

    // error traces
    let _ = color_eyre::install();
}

fn connected_pair() -> Result<(
    Connection,
    crossbeam_channel::Receiver<ConnectionEvent>,
    Connection,
    crossbeam_channel::Receiver<ConnectionEvent>,
)> {
    let (left, right) = InMemoryTransport::pair();
    let (left_tx, left_rx) = crossbeam_channel::unbounded();
    let (right_tx, right_rx) = crossbeam_channel::unbounded();
    let left = Connection::start(left, left_tx)?;
    let right = Connection::start(right, right_tx)?;
    Ok((left, left_rx, right, right_rx))
}

fn recv_command(rx: &crossbeam_channel::Receiver<ConnectionEvent>) -> Result<Command> {
    match rx.recv_timeout(Duration::from_secs(5))? {
        ConnectionEvent::Command(command) => Ok(command),
        ConnectionEvent::Closed(reason) => eyre::bail!("connection closed: {reason:?}"),
    }
}

#[test]
fn commands_arrive_in_send_order() -> Result<()> {
    let (left, _left_rx, _right, right_rx) = connected_pair()?;

    for id in 0..20u32 {
        let command = if id % 3 == 0 {
            Command::with_body(
                CommandKind::OutputLog,
                id,
                &codec::payloads::OutputLog {
                    level: codec::LogLevel::Message,
                    text: format!("message {id}"),
                    key: None,
                    line: None,
                },
            )?
        } else {
            Command::plain(CommandKind::Break, id)
        };
        left.send(command)?;
    }

    for id in 0..20u32 {
        let command = recv_command(&right_rx)?;
        assert_eq!(command.id(), id, "frame {id} arrived out of order");
    }
    Ok(())
}

#[test]
fn both_directions_carry_traffic() -> Result<()> {
    let (left, left_rx, right, right_rx) = connected_pair()?;

    left.send(Command::plain(CommandKind::Break, 1))?;
    right.send(Command::plain(CommandKind::Succeeded, 1))?;

    assert_eq!(recv_command(&right_rx)?.kind(), CommandKind::Break);
    assert_eq!(recv_command(&left_rx)?.kind(), CommandKind::Succeeded);
    Ok(())
}

#[test]
fn send_after_close_fails() -> Result<()> {
    let (left, _left_rx, _right, _right_rx) = connected_pair()?;

    left.close();
    assert!(left.is_closed());
    let err = left.send(Command::plain(CommandKind::Break, 1)).unwrap_err();
    assert!(matches!(err, TransportError::NotConnected));
    Ok(())
}

#[test]
fn close_is_idempotent() -> Result<()> {
    let (left, left_rx, _right, _right_rx) = connected_pair()?;

    left.close();
    left.close();

    // exactly one close notification
    match left_rx.recv_timeout(Duration::from_secs(5))? {
        ConnectionEvent::Closed(CloseReason::Requested) => {}
        other => eyre::bail!("unexpected event: {other:?}"),
    }
    assert!(left_rx
        .recv_timeout(Duration::from_millis(300))
        .is_err());
    Ok(())
}

#[test]
fn peer_drop_reports_closed() -> Result<()> {
    let (left, left_rx, right, _right_rx) = connected_pair()?;

    right.close();
    drop(right);

    match left_rx.recv_timeout(Duration::from_secs(5))? {
        ConnectionEvent::Closed(CloseReason::PeerClosed) => {}
        other => eyre::bail!("unexpected event: {other:?}"),
    }
    // the close is observed before it is reported
    assert!(left.is_closed());
    Ok(())
}
