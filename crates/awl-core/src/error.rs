//! Error types for the punch handshake.

use awl_transport::TransportError;
use std::sync::Arc;
use thiserror::Error;

/// Construction-time configuration errors.
///
/// These fail fast: a puncher with an invalid configuration is never built,
/// so an invalid handshake can never start.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_request_attempts` was zero
    #[error("max_request_attempts must be at least 1")]
    NoAttempts,

    /// `request_timeout` was zero
    #[error("request_timeout must be non-zero")]
    ZeroTimeout,
}

/// Handshake failures surfaced to the caller.
///
/// An exhausted retry budget is not an error; it is reported as
/// [`PunchOutcome::TimedOut`](crate::PunchOutcome::TimedOut). A mismatched
/// acknowledgment token is handled internally (logged and dropped) and never
/// surfaces here.
#[derive(Debug, Error)]
pub enum PunchError {
    /// A handshake is already in progress on this puncher
    #[error("a handshake is already active; close it first")]
    HandshakeActive,

    /// No handshake is in progress
    #[error("no handshake in progress")]
    Idle,

    /// The transport faulted while intercepted; terminal for this attempt
    #[error("transport failure: {0}")]
    Transport(Arc<TransportError>),

    /// The driver task failed to run to completion
    #[error("handshake driver failed: {0}")]
    Driver(#[from] tokio::task::JoinError),
}
