//! Security primitives: DTLS handshake and SRTP packet protection.

pub mod dtls;
pub mod srtp;

pub use dtls::{DtlsEngine, DtlsState, RecordSink, SrtpKeys};
pub use srtp::SrtpContext;
