//! Top-level error type for the publisher session.
//!
//! Every lower-layer error (STUN, SDP, network/DTLS/SRTP) is folded into one
//! of the six kinds below before it crosses a session API boundary.

use std::fmt;

pub type Result<T> = std::result::Result<T, WhipError>;

#[derive(Debug)]
pub enum WhipError {
    InvalidArgument(String),
    InvalidData(String),
    Io(std::io::Error),
    Timeout(String),
    OutOfMemory(String),
    Unimplemented(String),
}

impl fmt::Display for WhipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhipError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            WhipError::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            WhipError::Io(err) => write!(f, "I/O error: {}", err),
            WhipError::Timeout(msg) => write!(f, "timeout: {}", msg),
            WhipError::OutOfMemory(msg) => write!(f, "out of memory: {}", msg),
            WhipError::Unimplemented(msg) => write!(f, "unimplemented: {}", msg),
        }
    }
}

impl std::error::Error for WhipError {}

impl From<std::io::Error> for WhipError {
    fn from(err: std::io::Error) -> Self {
        WhipError::Io(err)
    }
}

impl From<whip_stun::StunError> for WhipError {
    fn from(err: whip_stun::StunError) -> Self {
        WhipError::InvalidData(err.to_string())
    }
}

impl From<whip_sdp::WhipSdpError> for WhipError {
    fn from(err: whip_sdp::WhipSdpError) -> Self {
        match err {
            whip_sdp::WhipSdpError::TooLarge { .. } => WhipError::InvalidData(err.to_string()),
            _ => WhipError::InvalidData(err.to_string()),
        }
    }
}

impl From<whip_network::NetworkError> for WhipError {
    fn from(err: whip_network::NetworkError) -> Self {
        match err {
            whip_network::NetworkError::Io(e) => WhipError::Io(e),
            whip_network::NetworkError::WouldBlock => {
                WhipError::Io(std::io::Error::from(std::io::ErrorKind::WouldBlock))
            }
            whip_network::NetworkError::Config(msg) => WhipError::InvalidArgument(msg),
            other => WhipError::InvalidData(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_reads_naturally() {
        let err = WhipError::Timeout("handshake exceeded 5000ms".to_string());
        assert_eq!(err.to_string(), "timeout: handshake exceeded 5000ms");
    }

    #[test]
    fn is_error_trait_object_safe() {
        let err = WhipError::InvalidArgument("pkt_size too small".to_string());
        let _: &dyn std::error::Error = &err;
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        let err: WhipError = io_err.into();
        assert!(matches!(err, WhipError::Io(_)));
    }
}
