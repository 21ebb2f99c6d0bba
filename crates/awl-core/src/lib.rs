//! # AWL Core
//!
//! UDP NAT hole punching over a shared datagram socket.
//!
//! Two peers, each behind a NAT or firewall, exchange a short handshake over
//! a socket the host application already owns, opening both NAT mappings
//! before the host resumes normal traffic on that socket.
//!
//! ## Handshake
//!
//! ```text
//!   peer A                                    peer B
//!     │ ──── REQUEST(token_A) ──────────────▶  │   opens A→B mapping
//!     │  ◀─────────────── REQUEST(token_B) ─── │   opens B→A mapping
//!     │ ──── ACK(token_B) ──────────────────▶  │   B: delivery confirmed
//!     │  ◀─────────────────── ACK(token_A) ─── │   A: delivery confirmed
//!     ▼                                        ▼
//!  connected                               connected
//! ```
//!
//! Each side keeps retransmitting its REQUEST on a bounded timer until its
//! own delivery is acknowledged. A side is `Connected` once it both receives
//! the peer's requests and has its own request acknowledged, in either order.
//!
//! While the handshake runs, the puncher takes exclusive ownership of the
//! socket's notification channels; datagrams that are not handshake control
//! packets are forwarded untouched to the subscribers that were registered
//! before the handshake started, and all of those subscribers are reinstalled
//! when the handshake ends, however it ends.
//!
//! ## Example
//!
//! ```no_run
//! use awl_core::{PunchOutcome, PuncherConfig, UdpHolePuncher};
//! use awl_transport::UdpTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(UdpTransport::bind("0.0.0.0:0".parse()?).await?);
//! let mut puncher = UdpHolePuncher::new(transport, PuncherConfig::default())?;
//!
//! puncher.connect("203.0.113.7:12345".parse()?)?;
//!
//! match puncher.wait().await? {
//!     PunchOutcome::Connected => println!("peer reachable, resume traffic"),
//!     PunchOutcome::TimedOut => println!("peer never answered"),
//!     PunchOutcome::Aborted => println!("handshake closed early"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod intercept;
pub mod packet;
pub mod puncher;
pub mod token;

pub use error::{ConfigError, PunchError};
pub use event::PunchEvent;
pub use intercept::SocketInterceptor;
pub use packet::{Packet, PacketType};
pub use puncher::{PunchOutcome, PuncherConfig, UdpHolePuncher};
pub use token::SessionToken;

use std::time::Duration;

/// Default number of request attempts before giving up.
pub const DEFAULT_MAX_REQUEST_ATTEMPTS: u32 = 10;

/// Default delay between request attempts.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(500);
