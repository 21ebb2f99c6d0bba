//! Property-based tests for AWL.
//!
//! Uses proptest to verify codec and token invariants across large input
//! spaces.

use proptest::prelude::*;

// ============================================================================
// Packet Codec Properties
// ============================================================================

mod packet_properties {
    use super::*;
    use awl_core::packet::{ACK_CODE, REQUEST_CODE};
    use awl_core::{Packet, PacketType};

    proptest! {
        /// Composing then parsing a request yields the token back, for any
        /// token of any length including empty.
        #[test]
        fn request_roundtrip(token in prop::collection::vec(any::<u8>(), 0..512)) {
            let datagram = PacketType::Request.compose(&token);
            prop_assert_eq!(Packet::parse(&datagram), Packet::Request(&token[..]));
        }

        /// Same roundtrip for acknowledgments.
        #[test]
        fn ack_roundtrip(token in prop::collection::vec(any::<u8>(), 0..512)) {
            let datagram = PacketType::Ack.compose(&token);
            prop_assert_eq!(Packet::parse(&datagram), Packet::Ack(&token[..]));
        }

        /// Any leading code outside the reserved pair classifies as opaque,
        /// and the opaque view covers the original datagram byte-for-byte.
        #[test]
        fn unknown_codes_are_opaque(
            code in any::<u16>().prop_filter(
                "exclude control codes",
                |c| *c != REQUEST_CODE && *c != ACK_CODE,
            ),
            payload in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            let mut datagram = code.to_be_bytes().to_vec();
            datagram.extend_from_slice(&payload);
            prop_assert_eq!(Packet::parse(&datagram), Packet::Opaque(&datagram[..]));
        }

        /// Datagrams too short for a type code are opaque and untouched.
        #[test]
        fn short_datagrams_are_opaque(data in prop::collection::vec(any::<u8>(), 0..2)) {
            prop_assert_eq!(Packet::parse(&data), Packet::Opaque(&data[..]));
        }

        /// The composed wire layout is exactly code-then-token.
        #[test]
        fn composed_layout(token in prop::collection::vec(any::<u8>(), 0..64)) {
            let datagram = PacketType::Request.compose(&token);
            prop_assert_eq!(datagram.len(), 2 + token.len());
            prop_assert_eq!(u16::from_be_bytes([datagram[0], datagram[1]]), REQUEST_CODE);
            prop_assert_eq!(&datagram[2..], &token[..]);
        }
    }
}

// ============================================================================
// Session Token Properties
// ============================================================================

mod token_properties {
    use awl_core::SessionToken;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_fixed_width_lowercase_hex() {
        for _ in 0..100 {
            let token = SessionToken::random();
            assert_eq!(token.as_str().len(), 32);
            assert!(
                token
                    .as_str()
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            );
        }
    }

    #[test]
    fn tokens_do_not_collide_in_practice() {
        let tokens: HashSet<String> = (0..1000)
            .map(|_| SessionToken::random().as_str().to_owned())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn token_never_starts_with_control_code() {
        // Hex text is ASCII, so the first two wire bytes of a token can
        // never read as 0x9000/0x9001; a bare token datagram stays opaque.
        for _ in 0..100 {
            let token = SessionToken::random();
            let lead = u16::from_be_bytes([token.as_bytes()[0], token.as_bytes()[1]]);
            assert_ne!(lead, awl_core::packet::REQUEST_CODE);
            assert_ne!(lead, awl_core::packet::ACK_CODE);
        }
    }
}
