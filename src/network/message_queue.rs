use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::message::{Message, WireTag};
use crate::{AppError, AppResult};

/// A thread-safe pair of message FIFOs bridging the I/O tasks and the
/// application.
///
/// Completed reads land in the `in` FIFO; the application fills the `out`
/// FIFO and the connection's write loop drains it. Both FIFOs share one lock
/// and every locked section is an O(1) append, peek, pop or emptiness check,
/// so the lock is never held across I/O or logging.
///
/// Peek and pop are separate operations: a consumer can inspect the front
/// message and only remove it once fully processed. The write loop relies on
/// this to retransmit the same message across short writes without losing it.
#[derive(Debug)]
pub struct MessageQueue<T: WireTag> {
    fifos: Mutex<Fifos<T>>,
    in_ready: Notify,
    out_ready: Notify,
}

#[derive(Debug)]
struct Fifos<T: WireTag> {
    incoming: VecDeque<Message<T>>,
    outgoing: VecDeque<Message<T>>,
}

impl<T: WireTag> MessageQueue<T> {
    pub fn new() -> MessageQueue<T> {
        MessageQueue {
            fifos: Mutex::new(Fifos {
                incoming: VecDeque::new(),
                outgoing: VecDeque::new(),
            }),
            in_ready: Notify::new(),
            out_ready: Notify::new(),
        }
    }

    /// Appends to the inbound FIFO and wakes one waiting receiver.
    pub fn push_in(&self, message: Message<T>) {
        self.fifos.lock().incoming.push_back(message);
        self.in_ready.notify_one();
    }

    /// Appends to the outbound FIFO and wakes the write loop.
    pub fn push_out(&self, message: Message<T>) {
        self.fifos.lock().outgoing.push_back(message);
        self.out_ready.notify_one();
    }

    /// Returns a copy of the front inbound message without removing it.
    pub fn peek_in(&self) -> AppResult<Message<T>> {
        self.fifos
            .lock()
            .incoming
            .front()
            .cloned()
            .ok_or(AppError::EmptyQueue)
    }

    /// Returns a copy of the front outbound message without removing it.
    pub fn peek_out(&self) -> AppResult<Message<T>> {
        self.fifos
            .lock()
            .outgoing
            .front()
            .cloned()
            .ok_or(AppError::EmptyQueue)
    }

    /// Removes the front inbound message; a no-op when empty.
    pub fn pop_in(&self) {
        self.fifos.lock().incoming.pop_front();
    }

    /// Removes the front outbound message; a no-op when empty.
    pub fn pop_out(&self) {
        self.fifos.lock().outgoing.pop_front();
    }

    pub fn is_in_empty(&self) -> bool {
        self.fifos.lock().incoming.is_empty()
    }

    pub fn is_out_empty(&self) -> bool {
        self.fifos.lock().outgoing.is_empty()
    }

    /// Waits until an inbound message is available and pops it.
    ///
    /// This is the dispatch-loop entry point: a condition-signalled wait, so
    /// an idle consumer burns no CPU. Interest is registered before the
    /// emptiness check, which closes the race against a concurrent push.
    pub async fn recv_in(&self) -> Message<T> {
        loop {
            let notified = self.in_ready.notified();
            if let Some(message) = self.fifos.lock().incoming.pop_front() {
                return message;
            }
            notified.await;
        }
    }

    /// Waits until the outbound FIFO is non-empty, without popping.
    pub async fn wait_out(&self) {
        loop {
            let notified = self.out_ready.notified();
            if !self.is_out_empty() {
                return;
            }
            notified.await;
        }
    }
}

impl<T: WireTag> Default for MessageQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
