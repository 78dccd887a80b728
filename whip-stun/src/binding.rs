//! Binding Request/Response construction for a single ICE-lite connectivity
//! check, per RFC 5389 plus the ICE USERNAME/USE-CANDIDATE conventions from
//! RFC 8445.
//!
//! Only the two message shapes a publisher ever needs are covered: the
//! Binding Request it sends to nominate the one candidate pair it has, and
//! the Binding Response it sends back when the remote probes the same pair.
//! Neither the magic cookie nor MESSAGE-INTEGRITY on *inbound* messages is
//! validated here — with a single candidate and a single remote there is
//! nothing to disambiguate.

use crate::attribute_type::AttributeType;
use crate::message::Message;
use crate::message_type::MessageType;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const FINGERPRINT_XOR: u32 = 0x5354_554E;
const MESSAGE_INTEGRITY_ATTR_LEN: u16 = 24; // 4-byte TLV header + 20-byte HMAC-SHA1
const FINGERPRINT_ATTR_LEN: u16 = 8; // 4-byte TLV header + 4-byte CRC32

/// Builds a Binding Request nominating the single host candidate pair.
///
/// `username` must already be formatted as `"<remote-ufrag>:<local-ufrag>"`.
/// `remote_password` keys the MESSAGE-INTEGRITY HMAC.
pub fn build_binding_request(
    transaction_id: [u8; 12],
    username: &str,
    remote_password: &str,
) -> Vec<u8> {
    let mut message = Message::new(MessageType::Request, transaction_id);
    message.add_attribute(AttributeType::Username, username.as_bytes());
    message.add_attribute(AttributeType::UseCandidate, &[]);
    finish_with_integrity_and_fingerprint(message, remote_password.as_bytes())
}

/// Builds a Binding Response to an incoming connectivity check, echoing the
/// request's transaction ID and keying MESSAGE-INTEGRITY with the local ICE
/// password.
pub fn build_binding_response(transaction_id: [u8; 12], local_password: &str) -> Vec<u8> {
    let message = Message::new(MessageType::Response, transaction_id);
    finish_with_integrity_and_fingerprint(message, local_password.as_bytes())
}

fn finish_with_integrity_and_fingerprint(mut message: Message, integrity_key: &[u8]) -> Vec<u8> {
    // RFC 5389 15.4: the header's length field must already count the
    // MESSAGE-INTEGRITY attribute before the HMAC covering it is computed.
    let attrs_before_mi = message.attributes_bytes().len() as u16;
    message
        .header
        .set_message_length(attrs_before_mi + MESSAGE_INTEGRITY_ATTR_LEN);
    let preimage = message.encode();

    let mut mac = HmacSha1::new_from_slice(integrity_key).expect("HMAC accepts any key length");
    mac.update(&preimage);
    let tag = mac.finalize().into_bytes();

    message.add_attribute(AttributeType::MessageIntegrity, &tag);

    // RFC 5389 15.5: FINGERPRINT covers everything before it, with the
    // length field counting the FINGERPRINT attribute itself.
    let attrs_before_fp = message.attributes_bytes().len() as u16;
    message
        .header
        .set_message_length(attrs_before_fp + FINGERPRINT_ATTR_LEN);
    let preimage = message.encode();
    let crc = crc32fast::hash(&preimage) ^ FINGERPRINT_XOR;

    message.add_attribute(AttributeType::Fingerprint, &crc.to_be_bytes());
    message.encode()
}

/// `true` if the first two bytes classify this datagram as a Binding
/// Request (`0x0001`).
pub fn is_binding_request(packet: &[u8]) -> bool {
    packet.len() >= 2 && packet[0] == 0x00 && packet[1] == 0x01
}

/// `true` if the first two bytes classify this datagram as a Binding
/// Response (`0x0101`).
pub fn is_binding_response(packet: &[u8]) -> bool {
    packet.len() >= 2 && packet[0] == 0x01 && packet[1] == 0x01
}
