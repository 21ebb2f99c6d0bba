//! Hole-punch handshake: retry scheduler plus state machine.
//!
//! One driver task owns all handshake state. It multiplexes exactly two wait
//! points: the retry ticker and the inbound-notification channel fed by the
//! intercepted transport handlers. Because the interceptor holds exclusive
//! subscription on the shared socket for the whole window, every control
//! packet and every forwarded application datagram is processed in one
//! totally ordered flow, and no locking of session state is needed.

use crate::error::{ConfigError, PunchError};
use crate::event::{EventBus, PunchEvent};
use crate::intercept::SocketInterceptor;
use crate::packet::{Packet, PacketType};
use crate::token::SessionToken;
use crate::{DEFAULT_MAX_REQUEST_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT};
use awl_transport::{DatagramHandler, DatagramTransport, ErrorHandler, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Handshake tuning knobs.
#[derive(Debug, Clone)]
pub struct PuncherConfig {
    /// Requests sent before the handshake gives up
    pub max_request_attempts: u32,
    /// Delay between request attempts
    pub request_timeout: Duration,
}

impl Default for PuncherConfig {
    fn default() -> Self {
        Self {
            max_request_attempts: DEFAULT_MAX_REQUEST_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PuncherConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_request_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

/// Terminal handshake outcomes, observable via [`UdpHolePuncher::wait`].
///
/// `TimedOut` is an expected outcome, not an error: the peer may simply
/// never have started its side of the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PunchOutcome {
    /// Bidirectional reachability confirmed
    Connected,
    /// Attempts exhausted without confirmation
    TimedOut,
    /// The handshake was closed before reaching a terminal state
    Aborted,
}

/// Notifications flowing from the intercepted transport into the driver.
enum Inbound {
    Datagram(Vec<u8>, SocketAddr),
    Fault(Arc<TransportError>),
}

/// State of one handshake attempt.
///
/// `receiving_messages` and `delivery_confirmed` are one-way latches;
/// `attempts_remaining` only ever decreases. A fresh session is created for
/// every `connect`.
struct Session {
    attempts_remaining: u32,
    remote_token: Option<Vec<u8>>,
    receiving_messages: bool,
    delivery_confirmed: bool,
}

impl Session {
    fn new(attempts: u32) -> Self {
        Self {
            attempts_remaining: attempts,
            remote_token: None,
            receiving_messages: false,
            delivery_confirmed: false,
        }
    }
}

struct ActiveHandshake {
    /// Taken by `wait`; `None` once the caller holds the join handle.
    driver: Option<JoinHandle<Result<PunchOutcome, PunchError>>>,
    shutdown: mpsc::Sender<()>,
}

/// UDP hole puncher over a host-owned transport.
///
/// Construction generates the instance's session token and validates the
/// configuration; [`connect`](Self::connect) runs the handshake. One
/// handshake at a time: a second `connect` while one is active is rejected.
///
/// Dropping the puncher mid-handshake aborts the driver task, which
/// reinstalls the host's transport subscribers on its way out.
pub struct UdpHolePuncher {
    transport: Arc<dyn DatagramTransport>,
    config: PuncherConfig,
    token: SessionToken,
    events: Arc<EventBus>,
    active: Option<ActiveHandshake>,
}

impl UdpHolePuncher {
    /// Create a puncher for a shared transport.
    ///
    /// # Errors
    /// Returns `ConfigError` for a zero attempt budget or zero timeout; an
    /// invalid handshake never starts.
    pub fn new(
        transport: Arc<dyn DatagramTransport>,
        config: PuncherConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let token = SessionToken::random();
        debug!(%token, "hole puncher initialized");
        Ok(Self {
            transport,
            config,
            token,
            events: Arc::new(EventBus::new()),
            active: None,
        })
    }

    /// Subscribe to handshake events.
    ///
    /// Every subscriber receives every event published after it subscribed,
    /// in publication order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<PunchEvent> {
        self.events.subscribe()
    }

    /// The token this instance sends in its requests.
    #[must_use]
    pub fn local_token(&self) -> &SessionToken {
        &self.token
    }

    /// Start punching toward the peer's publicly reachable address.
    ///
    /// Takes over the transport's notification channels before anything is
    /// sent, then drives the handshake from a background task. Observe the
    /// result via [`subscribe`](Self::subscribe) or [`wait`](Self::wait).
    ///
    /// # Errors
    /// Returns `PunchError::HandshakeActive` if a handshake is already in
    /// progress; the running handshake is not disturbed.
    pub fn connect(&mut self, peer: SocketAddr) -> Result<(), PunchError> {
        if self.active.is_some() {
            return Err(PunchError::HandshakeActive);
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let datagram_tx = inbound_tx.clone();
        let on_datagram: DatagramHandler = Arc::new(move |bytes, from| {
            let _ = datagram_tx.send(Inbound::Datagram(bytes.to_vec(), from));
        });
        let on_error: ErrorHandler = Arc::new(move |fault| {
            let _ = inbound_tx.send(Inbound::Fault(fault));
        });

        // Interception happens on the caller's flow, before the first
        // request leaves, so no control packet can reach the host handlers.
        let mut interceptor = SocketInterceptor::new(Arc::clone(&self.transport));
        interceptor.intercept(on_datagram, on_error);

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let driver = HandshakeDriver {
            transport: Arc::clone(&self.transport),
            peer,
            token: self.token.clone(),
            request_timeout: self.config.request_timeout,
            events: Arc::clone(&self.events),
            interceptor,
            session: Session::new(self.config.max_request_attempts),
        };
        debug!(%peer, "starting punch handshake");
        let handle = tokio::spawn(driver.run(inbound_rx, shutdown_rx));
        self.active = Some(ActiveHandshake {
            driver: Some(handle),
            shutdown: shutdown_tx,
        });
        Ok(())
    }

    /// Wait for the running handshake to finish.
    ///
    /// This is the completion channel for terminal failures: transport
    /// faults come back as `Err`, while timeout and close are ordinary
    /// outcomes.
    ///
    /// # Errors
    /// `PunchError::Idle` if no handshake is running,
    /// `PunchError::Transport` if the transport faulted, or
    /// `PunchError::Driver` if the driver task itself died.
    pub async fn wait(&mut self) -> Result<PunchOutcome, PunchError> {
        let handle = match self.active.as_mut() {
            Some(active) => active.driver.take().ok_or(PunchError::Idle)?,
            None => return Err(PunchError::Idle),
        };
        let outcome = handle.await?;
        self.active = None;
        outcome
    }

    /// Stop the handshake and hand the transport back to its previous
    /// subscribers.
    ///
    /// Safe in any state: before `connect`, during a handshake, after
    /// `Connected` or `TimedOut` already fired, and on repeated calls. Never
    /// re-fires events and never double-restores.
    pub async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let _ = active.shutdown.send(()).await;
        if let Some(driver) = active.driver {
            let _ = driver.await;
        }
    }
}

struct HandshakeDriver {
    transport: Arc<dyn DatagramTransport>,
    peer: SocketAddr,
    token: SessionToken,
    request_timeout: Duration,
    events: Arc<EventBus>,
    interceptor: SocketInterceptor,
    session: Session,
}

impl HandshakeDriver {
    async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
        mut shutdown: mpsc::Receiver<()>,
    ) -> Result<PunchOutcome, PunchError> {
        // First tick fires immediately: the opening request goes out as soon
        // as the handshake starts.
        let mut ticker = tokio::time::interval(self.request_timeout);
        let mut timer_active = true;

        loop {
            tokio::select! {
                _ = ticker.tick(), if timer_active => {
                    if self.session.attempts_remaining > 0 {
                        self.session.attempts_remaining -= 1;
                        self.send_request().await?;
                    } else {
                        warn!(peer = %self.peer, "punch attempts exhausted");
                        self.interceptor.restore();
                        self.events.publish(&PunchEvent::TimedOut);
                        return Ok(PunchOutcome::TimedOut);
                    }
                }
                notification = inbound.recv() => {
                    match notification {
                        Some(Inbound::Datagram(bytes, from)) => {
                            if let Some(outcome) =
                                self.on_datagram(&bytes, from, &mut timer_active).await?
                            {
                                return Ok(outcome);
                            }
                        }
                        Some(Inbound::Fault(fault)) => return Err(self.fail(fault)),
                        // Handler senders dropped: the transport itself is gone.
                        None => return Err(self.fail(Arc::new(TransportError::Closed))),
                    }
                }
                // `Some` from close(); `None` when the puncher was dropped.
                _ = shutdown.recv() => {
                    debug!("handshake closed");
                    self.interceptor.restore();
                    return Ok(PunchOutcome::Aborted);
                }
            }
        }
    }

    /// Single dispatch point for everything arriving on the socket.
    async fn on_datagram(
        &mut self,
        bytes: &[u8],
        from: SocketAddr,
        timer_active: &mut bool,
    ) -> Result<Option<PunchOutcome>, PunchError> {
        match Packet::parse(bytes) {
            Packet::Request(token) => {
                debug!(%from, token = %String::from_utf8_lossy(token), "received punch request");
                // A later request silently overwrites the stored token; the
                // ack always echoes whatever the peer sent most recently.
                self.session.remote_token = Some(token.to_vec());
                self.session.receiving_messages = true;
                self.send_ack(from).await?;
                self.events.publish(&PunchEvent::Reachable);
                Ok(self.check_connected())
            }
            Packet::Ack(token) => {
                if token != self.token.as_bytes() {
                    debug!(%from, "ack token mismatch, dropping");
                    return Ok(None);
                }
                debug!(%from, "request delivery confirmed");
                self.session.delivery_confirmed = true;
                // Our own delivery is confirmed; nothing left to retransmit.
                *timer_active = false;
                Ok(self.check_connected())
            }
            Packet::Opaque(data) => {
                self.interceptor.forward(data, from);
                Ok(None)
            }
        }
    }

    fn check_connected(&mut self) -> Option<PunchOutcome> {
        if self.session.receiving_messages && self.session.delivery_confirmed {
            debug!(peer = %self.peer, "bidirectional reachability confirmed");
            self.interceptor.restore();
            self.events.publish(&PunchEvent::Connected);
            Some(PunchOutcome::Connected)
        } else {
            None
        }
    }

    async fn send_request(&mut self) -> Result<(), PunchError> {
        let datagram = PacketType::Request.compose(self.token.as_bytes());
        debug!(peer = %self.peer, token = %self.token, "sending punch request");
        match self.transport.send_to(&datagram, self.peer).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(Arc::new(e))),
        }
    }

    async fn send_ack(&mut self, to: SocketAddr) -> Result<(), PunchError> {
        let Some(remote_token) = self.session.remote_token.clone() else {
            return Ok(());
        };
        let datagram = PacketType::Ack.compose(&remote_token);
        debug!(%to, "sending punch ack");
        match self.transport.send_to(&datagram, to).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.fail(Arc::new(e))),
        }
    }

    /// Terminal transport failure: restore the socket, tell every event
    /// subscriber, and hand the error to the completion channel.
    fn fail(&mut self, fault: Arc<TransportError>) -> PunchError {
        error!(error = %fault, "transport failure during punch handshake");
        self.interceptor.restore();
        self.events.publish(&PunchEvent::Error(Arc::clone(&fault)));
        PunchError::Transport(fault)
    }
}
