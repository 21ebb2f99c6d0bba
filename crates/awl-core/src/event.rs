//! Observable handshake outcomes.
//!
//! The puncher reports progress through a closed event set delivered over an
//! explicit publish/subscribe bus. Any number of subscribers may listen;
//! each receives every event in publication order.

use awl_transport::TransportError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Events emitted over the lifetime of one handshake attempt.
///
/// `Connected` and `TimedOut` are mutually exclusive terminal outcomes; at
/// most one of them fires per attempt. `Reachable` fires every time a peer
/// request arrives, so it may repeat.
#[derive(Debug, Clone)]
pub enum PunchEvent {
    /// The peer's requests are getting through to this side
    Reachable,
    /// Bidirectional reachability confirmed; the socket has been handed back
    Connected,
    /// Request attempts exhausted without confirmation
    TimedOut,
    /// The transport faulted while intercepted; terminal
    Error(Arc<TransportError>),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out bus for [`PunchEvent`].
///
/// Subscribers that have been dropped are pruned on the next publish.
pub(crate) struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<PunchEvent>>>,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<PunchEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub(crate) fn publish(&self, event: &PunchEvent) {
        lock(&self.subscribers).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_every_event() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(&PunchEvent::Reachable);
        bus.publish(&PunchEvent::Connected);

        for rx in [&mut first, &mut second] {
            assert!(matches!(rx.try_recv(), Ok(PunchEvent::Reachable)));
            assert!(matches!(rx.try_recv(), Ok(PunchEvent::Connected)));
            assert!(rx.try_recv().is_err());
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);

        bus.publish(&PunchEvent::TimedOut);
        assert!(lock(&bus.subscribers).is_empty());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(&PunchEvent::TimedOut);
    }
}
