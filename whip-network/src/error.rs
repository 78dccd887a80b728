//! Network error types
//!
//! This module defines the error types used throughout the network module.
//! All errors are wrapped in `NetworkError` enum for consistent error handling.

use std::fmt;
pub type Result<T> = std::result::Result<T, NetworkError>;

/// Network-related errors
#[derive(Debug)]
pub enum NetworkError {
    Config(String),
    Network(String),
    Rtp(String),
    CryptoError(String),
    InvalidPacket(String),
    SecurityError(String),
    TransportError(String),
    WouldBlock,
    Io(std::io::Error),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Config(msg) => write!(f, "Config error: {}", msg),
            NetworkError::Network(msg) => write!(f, "Network error: {}", msg),
            NetworkError::Rtp(msg) => write!(f, "RTP error: {}", msg),
            NetworkError::CryptoError(msg) => write!(f, "Crypto error: {}", msg),
            NetworkError::InvalidPacket(msg) => write!(f, "Invalid packet: {}", msg),
            NetworkError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            NetworkError::TransportError(msg) => write!(f, "Transport error: {}", msg),
            NetworkError::WouldBlock => write!(f, "Operation would block"),
            NetworkError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = NetworkError::Config("Invalid MTU size".to_string());
        assert_eq!(err.to_string(), "Config error: Invalid MTU size");
    }

    #[test]
    fn test_error_display_network() {
        let err = NetworkError::Network("Connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: Connection refused");
    }

    #[test]
    fn test_error_display_rtp() {
        let err = NetworkError::Rtp("Invalid packet format".to_string());
        assert_eq!(err.to_string(), "RTP error: Invalid packet format");
    }

    #[test]
    fn test_error_is_error_trait() {
        let err = NetworkError::Network("Test".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
