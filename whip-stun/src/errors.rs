//! STUN error types
//!
//! This module defines the error types used throughout the STUN implementation.
//! All errors are wrapped in `StunError` enum for consistent error handling across
//! STUN protocol operations.

/// Errors that can occur during STUN operations.
#[derive(Debug, Clone, PartialEq)]
pub enum StunError {
    /// Invalid message format
    InvalidMessageFormat,
    /// Invalid message type
    InvalidMessageType(u16),
    /// Invalid attribute type
    InvalidAttributeType(u16),
    /// Invalid magic cookie
    InvalidMagicCookie,
    /// Invalid transaction ID
    InvalidTransactionId,
    /// Invalid attribute format
    InvalidAttributeFormat,
    /// Invalid address family
    InvalidAddressFamily(u8),
    /// Invalid IP address
    InvalidIpAddress,
    /// Invalid port number
    InvalidPort,
    /// Message too short
    MessageTooShort,
    /// Attribute too short
    AttributeTooShort,
    /// Socket bind error
    SocketBindError(String),
    /// Socket operation error
    SocketError(String),
    /// Timeout waiting for response
    Timeout,
    /// Transaction ID mismatch
    TransactionIdMismatch,
    /// Unexpected message type
    UnexpectedMessageType,
}

impl std::fmt::Display for StunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StunError::InvalidMessageFormat => write!(f, "Invalid message format"),
            StunError::InvalidMessageType(t) => write!(f, "Invalid message type: 0x{:04X}", t),
            StunError::InvalidAttributeType(t) => write!(f, "Invalid attribute type: 0x{:04X}", t),
            StunError::InvalidMagicCookie => write!(f, "Invalid magic cookie"),
            StunError::InvalidTransactionId => write!(f, "Invalid transaction ID"),
            StunError::InvalidAttributeFormat => write!(f, "Invalid attribute format"),
            StunError::InvalidAddressFamily(fam) => {
                write!(f, "Invalid address family: 0x{:02X}", fam)
            }
            StunError::InvalidIpAddress => write!(f, "Invalid IP address"),
            StunError::InvalidPort => write!(f, "Invalid port number"),
            StunError::MessageTooShort => write!(f, "Message too short"),
            StunError::AttributeTooShort => write!(f, "Attribute too short"),
            StunError::SocketBindError(e) => write!(f, "Socket bind error: {}", e),
            StunError::SocketError(e) => write!(f, "Socket error: {}", e),
            StunError::Timeout => write!(f, "Timeout waiting for response"),
            StunError::TransactionIdMismatch => write!(f, "Transaction ID mismatch"),
            StunError::UnexpectedMessageType => write!(f, "Unexpected message type"),
        }
    }
}

impl std::error::Error for StunError {}

impl From<std::io::Error> for StunError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => StunError::Timeout,
            _ => StunError::SocketError(err.to_string()),
        }
    }
}
