//! In-memory balance notification bus
//!
//! Broadcast fan-out over `std::sync::mpsc`: each subscriber gets its own
//! channel and a copy of every event published after it subscribed. Publishing
//! never blocks on subscribers and never fails; subscribers whose receiving
//! end has been dropped are pruned on the next publish.

use crate::core::traits::EventPublisher;
use crate::types::BalanceChangedEvent;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Receiving end of a bus subscription
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<BalanceChangedEvent>,
}

impl Subscription {
    /// Block until the next event arrives
    pub fn recv(&self) -> Result<BalanceChangedEvent, RecvError> {
        self.receiver.recv()
    }

    /// Take the next event without blocking
    pub fn try_recv(&self) -> Result<BalanceChangedEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<BalanceChangedEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every event that has already arrived
    pub fn drain(&self) -> Vec<BalanceChangedEvent> {
        self.receiver.try_iter().collect()
    }
}

/// Broadcast bus for balance notifications
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    subscribers: Mutex<Vec<Sender<BalanceChangedEvent>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.lock().push(sender);
        Subscription { receiver }
    }

    /// Number of live subscribers as of the last publish
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: BalanceChangedEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        tracing::trace!(
            subscribers = subscribers.len(),
            old_balance = event.old_balance,
            new_balance = event.new_balance,
            "published balance change"
        );
    }
}
