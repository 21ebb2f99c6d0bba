//! Per-instance session tokens.

use rand::RngCore;
use std::fmt;

/// Random bytes per token; rendered as 32 hex characters.
const TOKEN_BYTES: usize = 16;

/// Probabilistically unique opaque identifier correlating punch requests
/// with their acknowledgments.
///
/// Tokens are compared byte-wise and never parsed; there is no negotiation
/// or collision detection. Correlation safety rests entirely on the 128-bit
/// token space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random token.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Token bytes as they travel on the wire (the hex text itself).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Token as a printable string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
