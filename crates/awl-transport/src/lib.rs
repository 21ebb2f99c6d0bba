//! # AWL Transport
//!
//! Datagram transport layer for the AWL hole-punching library.
//!
//! This crate provides:
//! - The [`DatagramTransport`] trait: sending plus ordered, enumerable
//!   subscriber registries for the datagram and error notification channels
//! - [`UdpTransport`]: a Tokio-backed UDP implementation that pumps received
//!   datagrams to every registered subscriber
//!
//! The transport is always owned by the host application. Nothing in this
//! crate closes or rebinds a socket on behalf of a consumer; consumers only
//! add and remove their own subscriptions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod transport;
pub mod udp;

pub use transport::{
    DatagramHandler, DatagramTransport, ErrorHandler, HandlerId, HandlerRegistry, TransportError,
    TransportResult,
};
pub use udp::UdpTransport;
