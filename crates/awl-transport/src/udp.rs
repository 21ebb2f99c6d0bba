//! Tokio-backed UDP implementation of the transport trait.
//!
//! A pump task owns the receive side: it loops on `recv_from` and dispatches
//! each datagram to every registered subscriber in registration order.
//! Receive errors go to the error channel the same way and do not stop the
//! pump; transient faults (e.g. `ECONNREFUSED` surfaced by a previous send)
//! are a normal part of UDP life.

use crate::transport::{
    DatagramHandler, DatagramTransport, ErrorHandler, HandlerId, HandlerRegistry, TransportError,
    TransportResult,
};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Largest datagram the pump will deliver (maximum UDP payload).
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Socket buffer size applied by [`UdpTransport::bind`].
const SOCKET_BUFFER_SIZE: usize = 256 * 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    socket: Arc<UdpSocket>,
    datagram_handlers: Mutex<HandlerRegistry<DatagramHandler>>,
    error_handlers: Mutex<HandlerRegistry<ErrorHandler>>,
}

/// UDP transport with subscriber-based delivery.
///
/// The wrapped socket is host-owned: the transport never closes or rebinds
/// it. Dropping the transport stops the pump task but leaves the socket to
/// its remaining owners.
///
/// # Examples
///
/// ```no_run
/// use awl_transport::{DatagramTransport, UdpTransport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = UdpTransport::bind("127.0.0.1:0".parse()?).await?;
/// println!("listening on {}", transport.local_addr()?);
/// # Ok(())
/// # }
/// ```
pub struct UdpTransport {
    inner: Arc<Inner>,
    pump: JoinHandle<()>,
}

impl UdpTransport {
    /// Wrap an already-bound socket shared with the host application.
    ///
    /// This is the primary constructor for hole punching: the host keeps its
    /// own `Arc` to the socket and resumes normal traffic on it afterwards.
    #[must_use]
    pub fn from_socket(socket: Arc<UdpSocket>) -> Self {
        let inner = Arc::new(Inner {
            socket,
            datagram_handlers: Mutex::new(HandlerRegistry::new()),
            error_handlers: Mutex::new(HandlerRegistry::new()),
        });
        let pump = tokio::spawn(pump(Arc::clone(&inner)));
        Self { inner, pump }
    }

    /// Bind a fresh socket and wrap it.
    ///
    /// Applies enlarged send/receive buffers via socket2 before handing the
    /// socket to Tokio.
    ///
    /// # Errors
    /// Returns `TransportError::BindFailed` if socket creation or binding
    /// fails.
    pub async fn bind(addr: SocketAddr) -> TransportResult<Self> {
        let domain = if addr.is_ipv4() {
            socket2::Domain::IPV4
        } else {
            socket2::Domain::IPV6
        };

        let socket2 =
            socket2::Socket::new(domain, socket2::Type::DGRAM, Some(socket2::Protocol::UDP))
                .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket2
            .set_recv_buffer_size(SOCKET_BUFFER_SIZE)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket2
            .set_send_buffer_size(SOCKET_BUFFER_SIZE)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket2
            .bind(&addr.into())
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;
        socket2
            .set_nonblocking(true)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        let std_socket: std::net::UdpSocket = socket2.into();
        let socket = UdpSocket::from_std(std_socket)
            .map_err(|e| TransportError::BindFailed(e.to_string()))?;

        Ok(Self::from_socket(Arc::new(socket)))
    }

    /// The shared socket, for hosts that need direct access after punching.
    #[must_use]
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.inner.socket)
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(inner: Arc<Inner>) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        match inner.socket.recv_from(&mut buf).await {
            Ok((len, from)) => {
                let handlers = lock(&inner.datagram_handlers).handlers();
                debug!(len, %from, subscribers = handlers.len(), "datagram received");
                for handler in handlers {
                    handler(&buf[..len], from);
                }
            }
            Err(e) => {
                warn!(error = %e, "receive error");
                let error = Arc::new(TransportError::Io(e));
                for handler in lock(&inner.error_handlers).handlers() {
                    handler(Arc::clone(&error));
                }
            }
        }
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send_to(&self, buf: &[u8], addr: SocketAddr) -> TransportResult<usize> {
        let sent = self.inner.socket.send_to(buf, addr).await?;
        Ok(sent)
    }

    fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.inner.socket.local_addr()?)
    }

    fn add_datagram_handler(&self, handler: DatagramHandler) -> HandlerId {
        lock(&self.inner.datagram_handlers).add(handler)
    }

    fn remove_datagram_handler(&self, id: HandlerId) -> Option<DatagramHandler> {
        lock(&self.inner.datagram_handlers).remove(id)
    }

    fn datagram_handlers(&self) -> Vec<(HandlerId, DatagramHandler)> {
        lock(&self.inner.datagram_handlers).snapshot()
    }

    fn add_error_handler(&self, handler: ErrorHandler) -> HandlerId {
        lock(&self.inner.error_handlers).add(handler)
    }

    fn remove_error_handler(&self, id: HandlerId) -> Option<ErrorHandler> {
        lock(&self.inner.error_handlers).remove(id)
    }

    fn error_handlers(&self) -> Vec<(HandlerId, ErrorHandler)> {
        lock(&self.inner.error_handlers).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = transport.local_addr().unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_dispatch_to_all_subscribers_in_order() {
        let receiver = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let sender = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let log = Arc::new(StdMutex::new(Vec::new()));
        let (tx, mut rx) = mpsc::unbounded_channel();

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            let tx = tx.clone();
            receiver.add_datagram_handler(Arc::new(move |bytes, _| {
                log.lock().unwrap().push((tag, bytes.to_vec()));
                let _ = tx.send(());
            }));
        }

        sender
            .send_to(b"hello", receiver.local_addr().unwrap())
            .await
            .unwrap();

        // Both subscribers signal delivery.
        for _ in 0..2 {
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("delivery timed out")
                .expect("channel closed");
        }

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                ("first", b"hello".to_vec()),
                ("second", b"hello".to_vec())
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_unsubscribes() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let handler: DatagramHandler = Arc::new(|_, _| {});
        let id = transport.add_datagram_handler(Arc::clone(&handler));
        assert_eq!(transport.datagram_handlers().len(), 1);

        let removed = transport.remove_datagram_handler(id).unwrap();
        assert!(Arc::ptr_eq(&removed, &handler));
        assert!(transport.datagram_handlers().is_empty());
    }

    #[tokio::test]
    async fn test_error_channel_registry() {
        let transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();

        let id = transport.add_error_handler(Arc::new(|_| {}));
        assert_eq!(transport.error_handlers().len(), 1);
        assert!(transport.remove_error_handler(id).is_some());
        assert!(transport.error_handlers().is_empty());
    }
}
