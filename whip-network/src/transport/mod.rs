//! UDP transport carrying the single multiplexed 5-tuple.

mod udp;

pub use udp::UdpTransport;
