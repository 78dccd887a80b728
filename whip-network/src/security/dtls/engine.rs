//! DTLS handshake engine, server/passive role only.
//!
//! Wraps `dimpl`'s Sans-IO state machine with a push model: every record the
//! engine needs to send is handed to a [`RecordSink`] exactly once, instead
//! of being buffered for the caller to drain in bulk. This keeps the engine
//! agnostic of how the caller actually writes to the wire (a UDP socket here,
//! a test double in unit tests).

use super::SrtpKeys;
use crate::error::NetworkError;
use dimpl::{Config, Dtls, DtlsCertificate, KeyingMaterial, Output, SrtpProfile};
use std::io;
use std::sync::Arc;
use std::time::Instant;

/// Destination for outbound DTLS records.
///
/// Implementors must treat each call as one datagram: the engine never
/// concatenates multiple handshake records into a single write.
pub trait RecordSink {
    fn write_record(&mut self, record: &[u8]) -> io::Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtlsState {
    Handshaking,
    Connected,
    Closed,
    Failed,
}

const HANDSHAKE_CONTENT_TYPE: u8 = 22;

pub struct DtlsEngine<S> {
    dtls: Dtls,
    cert: DtlsCertificate,
    fingerprint: String,
    sink: S,
    state: DtlsState,
    srtp_keys: Option<SrtpKeys>,
    last_outbound_signature: Option<(u8, u8)>,
    retransmit_count: u32,
}

impl<S: RecordSink> DtlsEngine<S> {
    /// Create a passive (server-role) DTLS engine with a fresh self-signed
    /// certificate and drive it until its initial output (if any) is
    /// flushed to `sink`.
    pub fn new(sink: S) -> Result<Self, NetworkError> {
        let cert = dimpl::certificate::generate_self_signed_certificate()
            .map_err(|e| NetworkError::SecurityError(format!("certificate generation failed: {e}")))?;

        let x509 = openssl::x509::X509::from_der(&cert.certificate)
            .map_err(|e| NetworkError::SecurityError(format!("certificate is not valid DER: {e}")))?;
        let fingerprint = super::certificate::compute_fingerprint(&x509)
            .map_err(NetworkError::SecurityError)?;

        let config = Arc::new(Config::default());
        let mut dtls = Dtls::new(config, cert.clone());
        // Passive role: the publisher always answers, never offers DTLS.
        dtls.set_active(false);

        let mut engine = DtlsEngine {
            dtls,
            cert,
            fingerprint,
            sink,
            state: DtlsState::Handshaking,
            srtp_keys: None,
            last_outbound_signature: None,
            retransmit_count: 0,
        };

        engine
            .dtls
            .handle_timeout(Instant::now())
            .map_err(|e| NetworkError::SecurityError(format!("dtls init failed: {e:?}")))?;
        engine.drain_output()?;
        Ok(engine)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn certificate(&self) -> &DtlsCertificate {
        &self.cert
    }

    pub fn state(&self) -> &DtlsState {
        &self.state
    }

    pub fn retransmit_count(&self) -> u32 {
        self.retransmit_count
    }

    /// Feed one datagram classified as DTLS by the demultiplexer.
    pub fn handle_packet(&mut self, packet: &[u8]) -> Result<(), NetworkError> {
        if self.state == DtlsState::Closed || self.state == DtlsState::Failed {
            return Ok(());
        }
        match self.dtls.handle_packet(packet) {
            Ok(()) => {}
            Err(e) => {
                self.state = DtlsState::Failed;
                return Err(NetworkError::SecurityError(format!("dtls handshake failed: {e:?}")));
            }
        }
        self.drain_output()
    }

    /// Drive retransmission timers. Should be called roughly every
    /// handshake retry tick by the connection driver.
    pub fn handle_timeout(&mut self, now: Instant) -> Result<(), NetworkError> {
        if self.state == DtlsState::Closed || self.state == DtlsState::Failed {
            return Ok(());
        }
        self.dtls
            .handle_timeout(now)
            .map_err(|e| NetworkError::SecurityError(format!("dtls timeout handling failed: {e:?}")))?;
        self.drain_output()
    }

    pub fn take_srtp_keys(&mut self) -> Option<SrtpKeys> {
        self.srtp_keys.take()
    }

    pub fn is_connected(&self) -> bool {
        self.state == DtlsState::Connected
    }

    fn drain_output(&mut self) -> Result<(), NetworkError> {
        let mut scratch = vec![0u8; 2048];
        loop {
            match self.dtls.poll_output(&mut scratch) {
                Output::Packet(packet) => {
                    self.note_retransmit(packet);
                    self.sink
                        .write_record(packet)
                        .map_err(NetworkError::Io)?;
                }
                Output::Timeout(_) => break,
                Output::Connected => self.state = DtlsState::Connected,
                Output::PeerCert(_der) => {
                    // Fingerprint verification against the SDP answer happens
                    // one layer up, in the session orchestrator.
                }
                Output::KeyingMaterial(km, profile) => {
                    self.srtp_keys = Some(extract_srtp_keys(&km, &profile)?);
                }
                Output::ApplicationData(_) => {
                    // DataChannel payload is never produced by a publisher-only session.
                }
            }
        }
        Ok(())
    }

    /// Track consecutive identical (content-type, handshake-type) outbound
    /// records as flight retransmissions, without relying on dimpl exposing
    /// a retransmit counter itself.
    fn note_retransmit(&mut self, record: &[u8]) {
        let signature = record_signature(record);
        if signature.is_some() && signature == self.last_outbound_signature {
            self.retransmit_count += 1;
        }
        self.last_outbound_signature = signature;
    }

    /// Observe an inbound `close_notify` alert, transitioning to `Closed`
    /// without touching session-level state.
    pub fn note_closed(&mut self) {
        if self.state == DtlsState::Connected {
            self.state = DtlsState::Closed;
        }
    }
}

fn record_signature(record: &[u8]) -> Option<(u8, u8)> {
    if record.len() < 14 || record[0] != HANDSHAKE_CONTENT_TYPE {
        return record.first().map(|&ct| (ct, 0));
    }
    Some((record[0], record[13]))
}

fn extract_srtp_keys(km: &KeyingMaterial, profile: &SrtpProfile) -> Result<SrtpKeys, NetworkError> {
    let (key_len, salt_len) = match profile {
        SrtpProfile::Aes128CmSha1_80 => (16usize, 14usize),
        other => {
            return Err(NetworkError::SecurityError(format!(
                "unsupported SRTP profile {other:?}, only AES_CM_128_HMAC_SHA1_80 is offered"
            )))
        }
    };

    let expected_len = key_len * 2 + salt_len * 2;
    if km.len() != expected_len {
        return Err(NetworkError::SecurityError(format!(
            "invalid keying material length: {} (expected {expected_len})",
            km.len()
        )));
    }

    // dimpl lays keying material out as client_key|client_salt|server_key|server_salt.
    // The session is always the passive/server role, so local=server_*, remote=client_*.
    let client_key = &km[0..key_len];
    let client_salt = &km[key_len..key_len + salt_len];
    let server_key = &km[key_len + salt_len..key_len + salt_len + key_len];
    let server_salt = &km[key_len + salt_len + key_len..expected_len];

    let mut local_master_key = [0u8; 16];
    let mut local_master_salt = [0u8; 14];
    let mut remote_master_key = [0u8; 16];
    let mut remote_master_salt = [0u8; 14];

    local_master_key.copy_from_slice(server_key);
    local_master_salt.copy_from_slice(server_salt);
    remote_master_key.copy_from_slice(client_key);
    remote_master_salt.copy_from_slice(client_salt);

    Ok(SrtpKeys {
        local_master_key,
        local_master_salt,
        remote_master_key,
        remote_master_salt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        records: Vec<Vec<u8>>,
    }

    impl RecordSink for RecordingSink {
        fn write_record(&mut self, record: &[u8]) -> io::Result<usize> {
            self.records.push(record.to_vec());
            Ok(record.len())
        }
    }

    #[test]
    fn passive_engine_emits_no_flight_until_client_hello_arrives() {
        let sink = RecordingSink { records: Vec::new() };
        let engine = DtlsEngine::new(sink).expect("engine construction");
        // A passive/server engine never speaks first.
        assert_eq!(engine.sink.records.len(), 0);
        assert_eq!(*engine.state(), DtlsState::Handshaking);
    }

    #[test]
    fn fingerprint_is_uppercase_colon_separated_sha256() {
        let sink = RecordingSink { records: Vec::new() };
        let engine = DtlsEngine::new(sink).expect("engine construction");
        let fp = engine.fingerprint();
        let parts: Vec<&str> = fp.split(':').collect();
        assert_eq!(parts.len(), 32);
        for part in parts {
            assert_eq!(part.len(), 2);
            assert!(part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }
}
