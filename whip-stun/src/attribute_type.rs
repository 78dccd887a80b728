//! STUN attribute types
//!
//! This module defines the attribute types used in STUN messages according to RFC 5389.
//! Attributes provide additional information in STUN messages using Type-Length-Value (TLV) format.

/// STUN attribute types according to RFC 5389.
///
/// Attributes provide additional information in STUN messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// USERNAME (0x0006) - ICE credential pair "remote-ufrag:local-ufrag"
    Username,
    /// MESSAGE-INTEGRITY (0x0008) - HMAC-SHA1 over the message up to this attribute
    MessageIntegrity,
    /// USE-CANDIDATE (0x0025) - ICE nomination flag, zero-length
    UseCandidate,
    /// XOR-MAPPED-ADDRESS (0x0020) - XOR'd reflexive transport address (recommended)
    XorMappedAddress,
    /// FINGERPRINT (0x8028) - CRC32 checksum XORed with a fixed constant
    Fingerprint,
}

impl AttributeType {
    /// Converts the attribute type to its RFC 5389 value.
    ///
    /// # Returns
    /// The u16 representation of the attribute type
    pub fn to_u16(self) -> u16 {
        match self {
            AttributeType::Username => 0x0006,
            AttributeType::MessageIntegrity => 0x0008,
            AttributeType::XorMappedAddress => 0x0020,
            AttributeType::UseCandidate => 0x0025,
            AttributeType::Fingerprint => 0x8028,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_type_to_u16() {
        assert_eq!(AttributeType::XorMappedAddress.to_u16(), 0x0020);
        assert_eq!(AttributeType::Username.to_u16(), 0x0006);
        assert_eq!(AttributeType::MessageIntegrity.to_u16(), 0x0008);
        assert_eq!(AttributeType::UseCandidate.to_u16(), 0x0025);
        assert_eq!(AttributeType::Fingerprint.to_u16(), 0x8028);
    }
}
