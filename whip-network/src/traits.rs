//! Common interface implemented by each per-codec RTP muxer.

use crate::codec::rtp::RtpPacket;

/// Turns encoded access units into RTP packets for one media stream.
///
/// A single call to `packetize` may return zero, one, or several packets
/// (fragmentation). Implementors own their own sequence number and timestamp
/// counters and advance them as packets are produced.
pub trait RtpPacketizer {
    fn packetize(&mut self, data: &[u8]) -> Vec<RtpPacket>;
    fn get_payload_type(&self) -> u8;
    fn get_ssrc(&self) -> u32;
    fn get_timestamp(&self) -> u32;
    fn get_sequence_number(&self) -> u16;
}
