//! Control-packet framing for the punch handshake.
//!
//! Control packets share the socket with arbitrary application traffic. A
//! control datagram is a 2-byte big-endian type code followed by the raw
//! token bytes; the token has no length prefix and runs to the end of the
//! datagram. Anything that does not start with a known code is opaque
//! application data and must be forwarded untouched.
//!
//! Known limitation of the header-less scheme: an application datagram whose
//! first two bytes happen to equal a reserved type code is misclassified as a
//! control packet. The reserved codes sit in a range unused by common
//! protocols, which keeps the collision probability acceptable for the
//! handshake window.

/// Wire code announcing a punch request.
pub const REQUEST_CODE: u16 = 0x9000;

/// Wire code acknowledging a received request.
pub const ACK_CODE: u16 = 0x9001;

/// Control packet kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PacketType {
    /// Hole-punch request carrying the sender's session token
    Request = REQUEST_CODE,
    /// Acknowledgment echoing the request sender's token
    Ack = ACK_CODE,
}

impl PacketType {
    /// Serialize a control packet: type code, then the raw token bytes.
    #[must_use]
    pub fn compose(self, token: &[u8]) -> Vec<u8> {
        let mut datagram = Vec::with_capacity(2 + token.len());
        datagram.extend_from_slice(&(self as u16).to_be_bytes());
        datagram.extend_from_slice(token);
        datagram
    }
}

/// A classified inbound datagram (zero-copy view).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packet<'a> {
    /// Punch request; payload is the peer's token
    Request(&'a [u8]),
    /// Acknowledgment; payload is the echoed token
    Ack(&'a [u8]),
    /// Application data; the entire datagram, unconsumed
    Opaque(&'a [u8]),
}

impl<'a> Packet<'a> {
    /// Classify a received datagram.
    ///
    /// Total: every input classifies. Datagrams shorter than a type code,
    /// or with an unknown leading code, come back as [`Packet::Opaque`]
    /// over the *original* bytes so they can be forwarded verbatim.
    #[must_use]
    pub fn parse(datagram: &'a [u8]) -> Self {
        if datagram.len() < 2 {
            return Self::Opaque(datagram);
        }
        match u16::from_be_bytes([datagram[0], datagram[1]]) {
            REQUEST_CODE => Self::Request(&datagram[2..]),
            ACK_CODE => Self::Ack(&datagram[2..]),
            _ => Self::Opaque(datagram),
        }
    }
}
