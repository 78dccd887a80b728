//! DTLS-SRTP handshake support, server/passive role only.

mod certificate;
mod engine;

pub use certificate::compute_fingerprint;
pub use dimpl::DtlsCertificate;
pub use engine::{DtlsEngine, DtlsState, RecordSink};

/// SRTP key material exported once the DTLS handshake finishes.
#[derive(Debug, Clone)]
pub struct SrtpKeys {
    pub local_master_key: [u8; 16],
    pub local_master_salt: [u8; 14],
    pub remote_master_key: [u8; 16],
    pub remote_master_salt: [u8; 14],
}
