//! RTP/SRTP/DTLS networking primitives shared by the publisher pipeline.
//!
//! Handles RTP packetization, the UDP demultiplexer, and the DTLS-SRTP
//! security stack. Everything here operates on one stream at a time and is
//! oblivious to WHIP signaling or session orchestration.

pub mod codec;
pub mod demux;
pub mod security;
pub mod transport;

pub mod error;
pub mod traits;

pub use codec::{H264RtpPacketizer, OpusRtpPacketizer, RtpPacket};
pub use demux::{classify, PacketKind};
pub use error::NetworkError;
pub use security::{DtlsEngine, DtlsState, RecordSink, SrtpContext, SrtpKeys};
pub use traits::RtpPacketizer;
pub use transport::UdpTransport;

pub type Result<T> = std::result::Result<T, NetworkError>;
