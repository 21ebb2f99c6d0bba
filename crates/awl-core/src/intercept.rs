//! Exclusive takeover of a shared transport's notification channels.
//!
//! The handshake must own every datagram arriving on the socket for its
//! duration, yet the socket usually has live subscribers belonging to the
//! host application. The interceptor captures those subscribers as values,
//! detaches them, installs the handshake's own handlers, and reinstalls the
//! originals in their exact order when the handshake window closes.

use awl_transport::{DatagramHandler, DatagramTransport, ErrorHandler, HandlerId};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ordered capture of the subscribers registered before interception.
///
/// Captured exactly once per interception window, consumed exactly once on
/// restore.
struct ListenerSnapshot {
    datagram: Vec<DatagramHandler>,
    error: Vec<ErrorHandler>,
}

/// Snapshot/redirect/restore for a shared transport's subscriber lists.
pub struct SocketInterceptor {
    transport: Arc<dyn DatagramTransport>,
    snapshot: Option<ListenerSnapshot>,
    own_datagram: Option<HandlerId>,
    own_error: Option<HandlerId>,
}

impl SocketInterceptor {
    /// Create an interceptor for `transport`, initially inactive.
    #[must_use]
    pub fn new(transport: Arc<dyn DatagramTransport>) -> Self {
        Self {
            transport,
            snapshot: None,
            own_datagram: None,
            own_error: None,
        }
    }

    /// Detach every current subscriber on both channels and install the two
    /// supplied handlers in their place.
    ///
    /// Must run before the first handshake packet is sent, so no control
    /// traffic ever reaches the host's handlers. A second call while already
    /// intercepted is ignored.
    pub fn intercept(&mut self, on_datagram: DatagramHandler, on_error: ErrorHandler) {
        if self.snapshot.is_some() {
            warn!("already intercepted, ignoring");
            return;
        }

        let datagram = self.transport.datagram_handlers();
        let error = self.transport.error_handlers();
        for (id, _) in &datagram {
            self.transport.remove_datagram_handler(*id);
        }
        for (id, _) in &error {
            self.transport.remove_error_handler(*id);
        }

        self.own_datagram = Some(self.transport.add_datagram_handler(on_datagram));
        self.own_error = Some(self.transport.add_error_handler(on_error));
        self.snapshot = Some(ListenerSnapshot {
            datagram: datagram.into_iter().map(|(_, h)| h).collect(),
            error: error.into_iter().map(|(_, h)| h).collect(),
        });
        debug!("transport intercepted");
    }

    /// Detach the handshake handlers and reinstall every captured subscriber
    /// in original order.
    ///
    /// Idempotent: after the first restore this is a no-op, so it is safe to
    /// call from every handshake exit path.
    pub fn restore(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };

        if let Some(id) = self.own_datagram.take() {
            self.transport.remove_datagram_handler(id);
        }
        if let Some(id) = self.own_error.take() {
            self.transport.remove_error_handler(id);
        }
        for handler in snapshot.datagram {
            self.transport.add_datagram_handler(handler);
        }
        for handler in snapshot.error {
            self.transport.add_error_handler(handler);
        }
        debug!("transport restored");
    }

    /// Deliver an opaque datagram to every captured subscriber, in capture
    /// order.
    ///
    /// Preserves the socket's multi-consumer semantics while intercepted:
    /// application traffic keeps flowing to everyone who was listening.
    pub fn forward(&self, datagram: &[u8], from: SocketAddr) {
        let Some(snapshot) = &self.snapshot else {
            return;
        };
        debug!(
            len = datagram.len(),
            %from,
            subscribers = snapshot.datagram.len(),
            "forwarding application datagram"
        );
        for handler in &snapshot.datagram {
            handler(datagram, from);
        }
    }

    /// Whether an interception window is currently open.
    #[must_use]
    pub fn is_intercepted(&self) -> bool {
        self.snapshot.is_some()
    }
}
