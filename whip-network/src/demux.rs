//! Classifies datagrams arriving on the single shared UDP 5-tuple.
//!
//! All of STUN, DTLS, and SRTP/RTP/RTCP share one socket; RFC 7983 assigns
//! disjoint first-byte ranges to each so a single byte of lookahead is
//! enough to route a packet without parsing it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Stun,
    Dtls,
    Rtp,
    Rtcp,
}

/// Classify one datagram by its first two bytes. Returns `None` for an
/// empty packet, which cannot belong to any of the multiplexed protocols.
pub fn classify(packet: &[u8]) -> Option<PacketKind> {
    let first = *packet.first()?;
    match first {
        0x00..=0x03 => Some(PacketKind::Stun),
        0x14..=0x3F => Some(PacketKind::Dtls),
        _ => {
            let second = packet.get(1).copied().unwrap_or(0);
            if (200..=204).contains(&second) {
                Some(PacketKind::Rtcp)
            } else {
                Some(PacketKind::Rtp)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_stun() {
        assert_eq!(classify(&[0x00, 0x01, 0, 0]), Some(PacketKind::Stun));
        assert_eq!(classify(&[0x01, 0x01, 0, 0]), Some(PacketKind::Stun));
    }

    #[test]
    fn classifies_dtls() {
        assert_eq!(classify(&[0x14, 0xFE, 0xFD]), Some(PacketKind::Dtls));
        assert_eq!(classify(&[0x3F, 0x00]), Some(PacketKind::Dtls));
    }

    #[test]
    fn classifies_rtcp_by_second_byte() {
        assert_eq!(classify(&[0x80, 200]), Some(PacketKind::Rtcp));
        assert_eq!(classify(&[0x80, 204]), Some(PacketKind::Rtcp));
    }

    #[test]
    fn classifies_rtp_otherwise() {
        assert_eq!(classify(&[0x80, 111]), Some(PacketKind::Rtp));
        assert_eq!(classify(&[0xB0, 106]), Some(PacketKind::Rtp));
    }

    #[test]
    fn empty_packet_has_no_kind() {
        assert_eq!(classify(&[]), None);
    }
}
