mod packetizer;

pub use packetizer::OpusRtpPacketizer;
