//! Broadcast event stream
//!
//! Fire-and-forget fan-out of accepted events to any number of subscribers,
//! built on `tokio::sync::broadcast`. Emitting never blocks: a subscriber that
//! falls more than `capacity` events behind skips the oldest ones and the gap
//! is counted in [`Subscription::missed`].

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::event::LogEvent;

/// Default per-subscriber lag window
pub const DEFAULT_STREAM_CAPACITY: usize = 1024;

type Sender = broadcast::Sender<Arc<LogEvent>>;

/// Broadcast channel of accepted events
#[derive(Debug)]
pub struct EventStream {
    /// `None` once the stream is closed
    sender: RwLock<Option<Sender>>,
    capacity: usize,
}

impl EventStream {
    /// Create a stream; capacity is clamped to at least 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            sender: RwLock::new(Some(tx)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Push an event to every current subscriber
    ///
    /// Returns `false` if the stream is closed. Having no subscribers is not
    /// an error; the event is simply dropped.
    pub fn emit(&self, event: Arc<LogEvent>) -> bool {
        let sender = self.sender.read().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => {
                let _ = tx.send(event);
                true
            }
            None => false,
        }
    }

    /// Start receiving events emitted from now on
    ///
    /// Subscribing to a closed stream yields a subscription that is already
    /// finished.
    pub fn subscribe(&self) -> Subscription {
        let sender = self.sender.read().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => Subscription::new(tx.subscribe()),
            None => Subscription::finished(),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// End every subscription once it has drained. Idempotent.
    pub fn close(&self) {
        self.sender
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CAPACITY)
    }
}

/// One subscriber's view of an [`EventStream`]
///
/// Yields events in emission order. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<Arc<LogEvent>>,
    missed: u64,
}

impl Subscription {
    fn new(receiver: broadcast::Receiver<Arc<LogEvent>>) -> Self {
        Self {
            receiver,
            missed: 0,
        }
    }

    pub(crate) fn finished() -> Self {
        let (tx, rx) = broadcast::channel(1);
        drop(tx);
        Self::new(rx)
    }

    /// Wait for the next event; `None` once the stream is closed and drained
    pub async fn recv(&mut self) -> Option<Arc<LogEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.missed += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is ready, without waiting
    pub fn try_recv(&mut self) -> Option<Arc<LogEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.missed += skipped,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Blocking variant of [`Subscription::recv`] for synchronous consumers
    ///
    /// Panics if called from within an async runtime, like
    /// `broadcast::Receiver::blocking_recv`.
    pub fn blocking_recv(&mut self) -> Option<Arc<LogEvent>> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.missed += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Events skipped because this subscriber fell behind
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Stop receiving events
    pub fn unsubscribe(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::severity::Severity;

    fn event(message: &str) -> Arc<LogEvent> {
        Arc::new(LogEvent::new(Severity::Info, message))
    }

    #[tokio::test]
    async fn test_stream_delivers_in_order_to_each_subscriber() {
        let stream = EventStream::new(16);
        let mut first = stream.subscribe();
        let mut second = stream.subscribe();

        assert!(stream.emit(event("a")));
        assert!(stream.emit(event("b")));

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.recv().await.unwrap().message(), "a");
            assert_eq!(sub.recv().await.unwrap().message(), "b");
        }
    }

    #[test]
    fn test_stream_emit_without_subscribers() {
        let stream = EventStream::default();
        assert!(stream.emit(event("nobody listening")));
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_stream_lagging_subscriber_never_blocks_emit() {
        let stream = EventStream::new(2);
        let mut slow = stream.subscribe();

        for i in 0..10 {
            assert!(stream.emit(event(&format!("msg {}", i))));
        }

        assert_eq!(slow.try_recv().unwrap().message(), "msg 8");
        assert_eq!(slow.try_recv().unwrap().message(), "msg 9");
        assert!(slow.try_recv().is_none());
        assert_eq!(slow.missed(), 8);
    }

    #[tokio::test]
    async fn test_stream_close_ends_subscriptions_after_drain() {
        let stream = EventStream::new(4);
        let mut sub = stream.subscribe();
        stream.emit(event("last"));

        stream.close();
        stream.close();

        assert!(stream.is_closed());
        assert!(!stream.emit(event("dropped")));
        assert_eq!(sub.recv().await.unwrap().message(), "last");
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_after_close_is_finished() {
        let stream = EventStream::new(4);
        stream.close();
        let mut sub = stream.subscribe();
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_unsubscribe_drops_receiver() {
        let stream = EventStream::new(4);
        let sub = stream.subscribe();
        assert_eq!(stream.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let stream = EventStream::new(0);
        assert_eq!(stream.capacity(), 1);
    }
}
