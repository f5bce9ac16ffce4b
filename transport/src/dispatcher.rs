//! Inbound command queue shared between the connection threads and the
//! thread being debugged.
//!
//! The connection's reader thread pushes commands in arrival order; the
//! suspended thread drains them between bounded waits. Responses to
//! request/response exchanges are intercepted here: a waiter registers an
//! outstanding-reply counter keyed by correlation id, and [`Dispatcher::resolve`]
//! decrements it when the matching response arrives, so replies never reach
//! the general command loop.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use codec::Command;

use crate::ConnectionEvent;

#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    queue: Mutex<VecDeque<Command>>,
    available: Condvar,
    pending: Mutex<HashMap<u32, Arc<AtomicUsize>>>,
    disconnected: AtomicBool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a connection event into the queue. Closure wakes every waiter so
    /// blocked threads can observe [`Dispatcher::is_disconnected`].
    pub fn on_event(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Command(command) => self.push(command),
            ConnectionEvent::Closed(reason) => {
                tracing::debug!(?reason, "dispatcher saw connection close");
                self.inner.disconnected.store(true, Ordering::SeqCst);
                self.inner.available.notify_all();
            }
        }
    }

    pub fn push(&self, command: Command) {
        let mut queue = self.inner.queue.lock().unwrap();
        queue.push_back(command);
        drop(queue);
        self.inner.available.notify_all();
    }

    /// Pop the next queued command without blocking.
    pub fn try_pop(&self) -> Option<Command> {
        self.inner.queue.lock().unwrap().pop_front()
    }

    /// Block until a command arrives, the connection drops, or `timeout`
    /// elapses. Returns immediately when either condition already holds.
    pub fn wait(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        let mut queue = self.inner.queue.lock().unwrap();
        while queue.is_empty() && !self.is_disconnected() {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let (guard, _timed_out) = self
                .inner
                .available
                .wait_timeout(queue, deadline - now)
                .unwrap();
            queue = guard;
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.inner.disconnected.load(Ordering::SeqCst)
    }

    /// Record that a reply with this correlation id is expected. The counter
    /// is incremented now and decremented when the reply arrives, so a caller
    /// holding the counter can tell how many exchanges are still in flight.
    pub fn register_waiter(&self, id: u32, counter: Arc<AtomicUsize>) {
        counter.fetch_add(1, Ordering::SeqCst);
        self.inner.pending.lock().unwrap().insert(id, counter);
    }

    /// Intercept `command` if it is the response to a registered exchange.
    /// Returns true when the command was consumed here.
    pub fn resolve(&self, command: &Command) -> bool {
        if !command.kind().is_response() {
            return false;
        }
        let waiter = self.inner.pending.lock().unwrap().remove(&command.id());
        match waiter {
            Some(counter) => {
                counter.fetch_sub(1, Ordering::SeqCst);
                tracing::trace!(id = command.id(), kind = ?command.kind(), "resolved response");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use codec::CommandKind;

    use super::*;

    #[test]
    fn commands_pop_in_push_order() {
        let dispatcher = Dispatcher::new();
        for id in 0..4 {
            dispatcher.push(Command::plain(CommandKind::Break, id));
        }
        for id in 0..4 {
            assert_eq!(dispatcher.try_pop().unwrap().id(), id);
        }
        assert!(dispatcher.try_pop().is_none());
    }

    #[test]
    fn resolve_decrements_registered_counter() {
        let dispatcher = Dispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher.register_waiter(7, Arc::clone(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let response = Command::plain(CommandKind::Succeeded, 7);
        assert!(dispatcher.resolve(&response));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // a second identical response no longer matches anything
        assert!(!dispatcher.resolve(&response));
    }

    #[test]
    fn resolve_ignores_non_responses() {
        let dispatcher = Dispatcher::new();
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher.register_waiter(3, Arc::clone(&counter));

        let request = Command::plain(CommandKind::Resume, 3);
        assert!(!dispatcher.resolve(&request));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_returns_after_timeout() {
        let dispatcher = Dispatcher::new();
        let start = Instant::now();
        dispatcher.wait(Duration::from_millis(50));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn wait_returns_immediately_when_queued() {
        let dispatcher = Dispatcher::new();
        dispatcher.push(Command::plain(CommandKind::Resume, 1));
        let start = Instant::now();
        dispatcher.wait(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_returns_immediately_when_disconnected() {
        let dispatcher = Dispatcher::new();
        dispatcher.on_event(ConnectionEvent::Closed(crate::CloseReason::PeerClosed));
        assert!(dispatcher.is_disconnected());
        let start = Instant::now();
        dispatcher.wait(Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
