mod packetizer;

pub use packetizer::H264RtpPacketizer;
