//! RTP send path: turns encoded access units into SRTP datagrams.
//!
//! Ties the H.264/Opus packetizers together with the STAP-A aggregation
//! fixup and SRTP protection. A packet that fails to encrypt is dropped and
//! logged rather than failing the session — steady-state media loss is
//! recoverable, a broken session is not.

use crate::config::RTP_AND_SRTP_OVERHEAD;
use crate::session::h264;
use logging::Logger;
use whip_network::{fixup_stap_a, H264RtpPacketizer, OpusRtpPacketizer, RtpPacket, SrtpContext};

pub struct VideoSendState {
    packetizer: H264RtpPacketizer,
    nal_length_size: Option<u8>,
    sps: Vec<u8>,
    pps: Vec<u8>,
}

impl VideoSendState {
    pub fn new(packetizer: H264RtpPacketizer, nal_length_size: Option<u8>, sps: Vec<u8>, pps: Vec<u8>) -> Self {
        Self {
            packetizer,
            nal_length_size,
            sps,
            pps,
        }
    }

    /// Packetizes one access unit, prefixing a fresh SPS+PPS unit ahead of
    /// every keyframe so a receiver that joins mid-stream can always decode
    /// from the next IDR.
    fn packetize_access_unit(&mut self, access_unit: &[u8]) -> Result<Vec<RtpPacket>, crate::error::WhipError> {
        let (annexb, is_keyframe) = match self.nal_length_size {
            Some(length_size) => (
                h264::convert_avcc_au_to_annexb(access_unit, length_size)?,
                h264::is_keyframe_avcc(access_unit, length_size)?,
            ),
            None => (access_unit.to_vec(), h264::is_keyframe_annexb(access_unit)),
        };

        let mut packets = Vec::new();
        if is_keyframe {
            let prefix = h264::keyframe_prefix(&self.sps, &self.pps);
            packets.extend(self.packetizer.packetize(&prefix));
        }
        packets.extend(self.packetizer.packetize(&annexb));

        for packet in &mut packets {
            fixup_stap_a(packet);
        }

        Ok(packets)
    }
}

/// Encrypts and sends one video access unit, returning the number of
/// datagrams written. SRTP failures on individual packets are soft drops.
///
/// `pkt_size` is the full on-wire UDP datagram budget (the same value the
/// packetizer was itself budgeted against via
/// [`PublisherConfig::max_rtp_payload_size`](crate::config::PublisherConfig::max_rtp_payload_size));
/// this guard checks the packetizer's own output rather than trusting it,
/// so a caller-supplied packetizer that wasn't sized consistently still
/// can't put an oversized datagram on the wire.
pub fn send_video_access_unit(
    state: &mut VideoSendState,
    srtp: &mut SrtpContext,
    access_unit: &[u8],
    pkt_size: usize,
    send: &mut impl FnMut(&[u8]) -> std::io::Result<usize>,
    logger: &Logger,
) -> Result<usize, crate::error::WhipError> {
    let packets = state.packetize_access_unit(access_unit)?;
    let mut sent = 0;
    for packet in &packets {
        let on_wire_size = packet.payload.len() + RTP_AND_SRTP_OVERHEAD;
        if on_wire_size > pkt_size {
            logger.warn(&format!(
                "dropping oversized video packet ({on_wire_size} bytes over the {pkt_size} budget)"
            ));
            continue;
        }
        match srtp.protect(packet) {
            Ok(srtp_bytes) => {
                if let Err(err) = send(&srtp_bytes) {
                    logger.warn(&format!("video send failed: {err}"));
                } else {
                    sent += 1;
                }
            }
            Err(err) => logger.warn(&format!("dropping video packet: SRTP protect failed: {err}")),
        }
    }
    Ok(sent)
}

pub struct AudioSendState {
    packetizer: OpusRtpPacketizer,
}

impl AudioSendState {
    pub fn new(packetizer: OpusRtpPacketizer) -> Self {
        Self { packetizer }
    }
}

/// Encrypts and sends one Opus frame.
pub fn send_audio_frame(
    state: &mut AudioSendState,
    srtp: &mut SrtpContext,
    frame: &[u8],
    send: &mut impl FnMut(&[u8]) -> std::io::Result<usize>,
    logger: &Logger,
) -> Result<usize, crate::error::WhipError> {
    let packets = state.packetizer.packetize(frame);
    let mut sent = 0;
    for packet in &packets {
        match srtp.protect(packet) {
            Ok(srtp_bytes) => {
                if let Err(err) = send(&srtp_bytes) {
                    logger.warn(&format!("audio send failed: {err}"));
                } else {
                    sent += 1;
                }
            }
            Err(err) => logger.warn(&format!("dropping audio packet: SRTP protect failed: {err}")),
        }
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::LogLevel;

    fn test_logger() -> Logger {
        let dir = tempfile::tempdir().unwrap();
        Logger::new(dir.path().join("test.log"), LogLevel::Debug).unwrap()
    }

    #[test]
    fn keyframe_access_unit_is_prefixed_with_sps_pps() {
        let packetizer = H264RtpPacketizer::new(106, 1200, 30.0);
        let mut state = VideoSendState::new(packetizer, None, vec![0x67, 0xAA], vec![0x68, 0xBB]);

        let idr_au = [0x00, 0x00, 0x00, 0x01, 0x65, 0x01, 0x02];
        let packets = state.packetize_access_unit(&idr_au).unwrap();

        // SPS + PPS + the IDR slice itself: three single-NAL packets.
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].payload[0] & 0x1F, 0x07);
        assert_eq!(packets[1].payload[0] & 0x1F, 0x08);
        assert_eq!(packets[2].payload[0] & 0x1F, 0x05);
    }

    #[test]
    fn non_keyframe_access_unit_has_no_prefix() {
        let packetizer = H264RtpPacketizer::new(106, 1200, 30.0);
        let mut state = VideoSendState::new(packetizer, None, vec![0x67, 0xAA], vec![0x68, 0xBB]);

        let non_idr_au = [0x00, 0x00, 0x00, 0x01, 0x41, 0x01, 0x02];
        let packets = state.packetize_access_unit(&non_idr_au).unwrap();

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].payload[0] & 0x1F, 0x01);
    }

    #[test]
    fn oversized_packet_is_dropped_not_fatal() {
        let pkt_size = 1200;
        // Budgeted the same way `PublisherConfig::max_rtp_payload_size` budgets
        // the packetizer it hands to a real session, so its own fragments
        // already respect the guard below instead of tripping it.
        let packetizer = H264RtpPacketizer::new(106, pkt_size - RTP_AND_SRTP_OVERHEAD, 30.0);
        let mut state = VideoSendState::new(packetizer, None, vec![0x67], vec![0x68]);
        let mut srtp = SrtpContext::new([0u8; 16], [0u8; 14]);
        let logger = test_logger();

        let large_au_nal = {
            let mut nal = vec![0x00, 0x00, 0x00, 0x01, 0x41];
            nal.extend(vec![0xAA; 2000]);
            nal
        };

        let mut sent_packets: Vec<Vec<u8>> = Vec::new();
        let mut send = |bytes: &[u8]| -> std::io::Result<usize> {
            sent_packets.push(bytes.to_vec());
            Ok(bytes.len())
        };

        let sent = send_video_access_unit(&mut state, &mut srtp, &large_au_nal, pkt_size, &mut send, &logger).unwrap();
        // Fragments stay within budget individually; none should be dropped here.
        assert_eq!(sent, sent_packets.len());
        assert!(sent > 0);
    }
}
