//! Transport trait abstraction over a shared datagram socket.
//!
//! The hole-punching core never owns the socket it punches through. This
//! module defines the `DatagramTransport` trait the core consumes instead:
//! datagram sending plus an ordered subscriber registry for the "datagram
//! received" and "transport error" notification channels. Subscribers are
//! first-class values, so a consumer can snapshot another party's handlers,
//! take the channels over, and later reinstall the originals unchanged.

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error from the underlying socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport is closed
    #[error("transport is closed")]
    Closed,

    /// Address binding failed
    #[error("failed to bind to address: {0}")]
    BindFailed(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Callback invoked for every datagram received on the transport.
///
/// Arguments are the datagram payload and the sender's observed address.
pub type DatagramHandler = Arc<dyn Fn(&[u8], SocketAddr) + Send + Sync>;

/// Callback invoked for every transport-level fault.
///
/// The error is `Arc`-shared because every registered subscriber receives
/// the same fault.
pub type ErrorHandler = Arc<dyn Fn(Arc<TransportError>) + Send + Sync>;

/// Opaque handle identifying one subscription on one transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Registration-ordered subscriber registry for one notification channel.
///
/// Enumeration returns entries in registration order, and removing an entry
/// preserves the relative order of the rest. Both properties are load-bearing
/// for interception: a snapshot taken from the registry must be replayable
/// into an identical registry later.
pub struct HandlerRegistry<H> {
    next_id: u64,
    entries: Vec<(HandlerId, H)>,
}

impl<H: Clone> HandlerRegistry<H> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Register a handler, returning its subscription handle.
    pub fn add(&mut self, handler: H) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, handler));
        id
    }

    /// Remove a handler by handle, returning it if it was registered.
    pub fn remove(&mut self, id: HandlerId) -> Option<H> {
        let index = self.entries.iter().position(|(entry, _)| *entry == id)?;
        Some(self.entries.remove(index).1)
    }

    /// All entries in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(HandlerId, H)> {
        self.entries.clone()
    }

    /// All handler values in registration order, without their handles.
    #[must_use]
    pub fn handlers(&self) -> Vec<H> {
        self.entries.iter().map(|(_, h)| h.clone()).collect()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: Clone> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Async transport over an unreliable datagram socket.
///
/// Implementations must support multiple independent subscribers per
/// channel and dispatch every received datagram (and every fault) to all of
/// them in registration order. The trait deliberately exposes no bind, close,
/// or reconfigure operations: the socket's lifetime stays with the host.
///
/// # Examples
///
/// ```no_run
/// use awl_transport::{DatagramTransport, UdpTransport};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = UdpTransport::bind("127.0.0.1:0".parse()?).await?;
/// let id = transport.add_datagram_handler(Arc::new(|bytes, from| {
///     println!("{} bytes from {from}", bytes.len());
/// }));
/// transport.send_to(b"ping", "127.0.0.1:9000".parse()?).await?;
/// transport.remove_datagram_handler(id);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Send a datagram to a remote address.
    ///
    /// # Errors
    /// Returns `TransportError` if the send operation fails.
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> TransportResult<usize>;

    /// Local address the transport is bound to.
    ///
    /// # Errors
    /// Returns `TransportError` if the address cannot be determined.
    fn local_addr(&self) -> TransportResult<SocketAddr>;

    /// Subscribe to received datagrams.
    fn add_datagram_handler(&self, handler: DatagramHandler) -> HandlerId;

    /// Unsubscribe a datagram handler, returning it if it was registered.
    fn remove_datagram_handler(&self, id: HandlerId) -> Option<DatagramHandler>;

    /// Currently registered datagram handlers, in registration order.
    fn datagram_handlers(&self) -> Vec<(HandlerId, DatagramHandler)>;

    /// Subscribe to transport faults.
    fn add_error_handler(&self, handler: ErrorHandler) -> HandlerId;

    /// Unsubscribe an error handler, returning it if it was registered.
    fn remove_error_handler(&self, id: HandlerId) -> Option<ErrorHandler>;

    /// Currently registered error handlers, in registration order.
    fn error_handlers(&self) -> Vec<(HandlerId, ErrorHandler)>;
}
