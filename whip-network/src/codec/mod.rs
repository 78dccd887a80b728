//! RTP packet structure and per-codec packetizers.

pub mod packetizers;
pub mod rtp;
pub mod stap_a;

pub use packetizers::h264::H264RtpPacketizer;
pub use packetizers::opus::OpusRtpPacketizer;
pub use rtp::RtpPacket;
pub use stap_a::fixup_stap_a;
