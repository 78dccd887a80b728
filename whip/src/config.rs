//! Publisher session configuration.

use logging::Logger;

const MIN_RECOMMENDED_PKT_SIZE: usize = 532;

/// RTP header (12 bytes) + SRTP authentication tag (10 bytes): the overhead
/// every packetized payload grows by once it is protected and put on the
/// wire. Packetizers are budgeted to leave this much room so their own
/// output never itself needs re-checking against `pkt_size`.
pub const RTP_AND_SRTP_OVERHEAD: usize = 22;

/// Configuration for a WHIP publishing session.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    handshake_timeout_ms: u64,
    pkt_size: usize,
    authorization: Option<String>,
}

impl PublisherConfig {
    pub fn handshake_timeout_ms(&self) -> u64 {
        self.handshake_timeout_ms
    }

    pub fn pkt_size(&self) -> usize {
        self.pkt_size
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// Maximum payload a packetizer may hand to a single RTP packet so that,
    /// once the RTP header and SRTP authentication tag are added on top, the
    /// resulting datagram still fits within `pkt_size`.
    pub fn max_rtp_payload_size(&self) -> usize {
        self.pkt_size.saturating_sub(RTP_AND_SRTP_OVERHEAD)
    }

    pub fn builder() -> PublisherConfigBuilder {
        PublisherConfigBuilder::default()
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 5000,
            pkt_size: 1200,
            authorization: None,
        }
    }
}

/// Builder for [`PublisherConfig`].
#[derive(Debug, Clone, Default)]
pub struct PublisherConfigBuilder {
    config: PublisherConfig,
}

impl PublisherConfigBuilder {
    pub fn with_handshake_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.handshake_timeout_ms = timeout_ms;
        self
    }

    pub fn with_pkt_size(mut self, pkt_size: usize) -> Self {
        self.config.pkt_size = pkt_size;
        self
    }

    pub fn with_authorization(mut self, token: impl Into<String>) -> Self {
        self.config.authorization = Some(token.into());
        self
    }

    /// Finalizes the config, logging a warning through `logger` if `pkt_size`
    /// is small enough to fragment media unreasonably.
    pub fn build(self, logger: &Logger) -> PublisherConfig {
        if self.config.pkt_size < MIN_RECOMMENDED_PKT_SIZE {
            logger.warn(&format!(
                "pkt_size {} is below the recommended minimum of {}",
                self.config.pkt_size, MIN_RECOMMENDED_PKT_SIZE
            ));
        }
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PublisherConfig::default();
        assert_eq!(config.handshake_timeout_ms(), 5000);
        assert_eq!(config.pkt_size(), 1200);
        assert_eq!(config.authorization(), None);
    }

    #[test]
    fn max_rtp_payload_size_subtracts_rtp_and_srtp_overhead() {
        let config = PublisherConfig::default();
        assert_eq!(config.max_rtp_payload_size(), 1178);
    }

    #[test]
    fn builder_overrides_fields() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Logger::new(dir.path().join("test.log"), logging::LogLevel::Warn).unwrap();
        let config = PublisherConfig::builder()
            .with_handshake_timeout_ms(8000)
            .with_pkt_size(600)
            .with_authorization("secret-token")
            .build(&logger);

        assert_eq!(config.handshake_timeout_ms(), 8000);
        assert_eq!(config.pkt_size(), 600);
        assert_eq!(config.authorization(), Some("secret-token"));
    }
}
