//! ICE connectivity check + DTLS-SRTP handshake driver (single shared UDP
//! socket, single known remote, ICE-lite host candidate only).
//!
//! Event loop shape: drain all pending outbound records, poll the socket for
//! one inbound datagram, periodically drive timers, sleep briefly. Bounded
//! on the outside by the configured handshake timeout; the inner send/recv
//! cycle runs up to [`MAX_INNER_RETRIES`] times between timeout checks so a
//! quiet link doesn't busy-loop on the clock.

use crate::error::{Result, WhipError};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use whip_network::{classify, DtlsEngine, PacketKind, RecordSink, SrtpKeys, UdpTransport};
use whip_stun::{build_binding_request, build_binding_response, is_binding_request};
use logging::Logger;

const INNER_SLEEP: Duration = Duration::from_millis(5);
const MAX_INNER_RETRIES: u32 = 10;
const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

pub struct IceCredentials<'a> {
    pub local_ufrag: &'a str,
    pub local_pwd: &'a str,
    pub remote_ufrag: &'a str,
    pub remote_pwd: &'a str,
}

/// Adapts the shared, interior-mutable [`UdpTransport`] handle to the
/// [`RecordSink`] contract: one `send_to` call per outbound DTLS record,
/// never a batched write.
///
/// The socket is shared (`Rc<RefCell<_>>`) rather than exclusively borrowed
/// because the DTLS engine has to exist — and its certificate's fingerprint
/// has to be known — before the SDP offer is built, well before the
/// handshake itself starts driving packets over the same socket the rest of
/// the session later uses for RTP/RTCP.
pub struct SharedUdpSink(Rc<RefCell<UdpTransport>>);

impl RecordSink for SharedUdpSink {
    fn write_record(&mut self, record: &[u8]) -> std::io::Result<usize> {
        self.0
            .borrow_mut()
            .send(record)
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}

/// Creates the passive DTLS engine for this session. Called once at session
/// init, ahead of the offer, so its self-signed certificate's fingerprint is
/// available to advertise before any ICE/DTLS traffic is possible.
pub fn create_dtls_engine(transport: Rc<RefCell<UdpTransport>>) -> Result<DtlsEngine<SharedUdpSink>> {
    DtlsEngine::new(SharedUdpSink(transport)).map_err(WhipError::from)
}

/// Drives ICE connectivity checks and the DTLS handshake to completion over
/// `transport`, returning the negotiated SRTP keying material.
///
/// `transport` must already have its remote address set to the answer's
/// host candidate. `dtls_engine` must have been created by
/// [`create_dtls_engine`] over the same transport handle.
pub fn run_handshake(
    transport: &Rc<RefCell<UdpTransport>>,
    dtls_engine: &mut DtlsEngine<SharedUdpSink>,
    credentials: &IceCredentials,
    handshake_timeout_ms: u64,
    logger: &Logger,
) -> Result<SrtpKeys> {
    send_ice_nomination(transport, credentials, logger)?;

    let start = Instant::now();
    let timeout = Duration::from_millis(handshake_timeout_ms);
    let mut last_timeout_check = Instant::now();

    while !dtls_engine.is_connected() {
        if start.elapsed() > timeout {
            return Err(WhipError::Timeout(format!(
                "DTLS handshake did not complete within {handshake_timeout_ms}ms"
            )));
        }

        for _ in 0..MAX_INNER_RETRIES {
            match transport.borrow_mut().receive() {
                Ok(Some((packet, _from))) => match classify(&packet) {
                    Some(PacketKind::Dtls) => {
                        dtls_engine.handle_packet(&packet)?;
                    }
                    Some(PacketKind::Stun) => {
                        respond_to_ice_probe(transport, &packet, credentials, logger)?;
                    }
                    _ => {
                        // RTP/RTCP before the handshake completes has nowhere
                        // to go yet; drop it silently.
                    }
                },
                Ok(None) => {}
                Err(err) => return Err(err.into()),
            }

            if last_timeout_check.elapsed() > TIMEOUT_CHECK_INTERVAL {
                dtls_engine.handle_timeout(Instant::now())?;
                last_timeout_check = Instant::now();
            }

            if dtls_engine.is_connected() {
                break;
            }
            std::thread::sleep(INNER_SLEEP);
        }
    }

    logger.info(&format!(
        "DTLS handshake complete after {} retransmitted flight(s)",
        dtls_engine.retransmit_count()
    ));

    dtls_engine
        .take_srtp_keys()
        .ok_or_else(|| WhipError::InvalidData("DTLS connected without exporting SRTP keys".to_string()))
}

/// Sends the single Binding Request nominating the one candidate pair this
/// ICE-lite session ever considers.
fn send_ice_nomination(
    transport: &Rc<RefCell<UdpTransport>>,
    credentials: &IceCredentials,
    logger: &Logger,
) -> Result<()> {
    use rand::RngCore;
    let mut transaction_id = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut transaction_id);

    let username = format!("{}:{}", credentials.remote_ufrag, credentials.local_ufrag);
    let request = build_binding_request(transaction_id, &username, credentials.remote_pwd);
    transport.borrow_mut().send(&request)?;
    logger.debug("sent ICE Binding Request nominating the single host candidate pair");
    Ok(())
}

fn respond_to_ice_probe(
    transport: &Rc<RefCell<UdpTransport>>,
    packet: &[u8],
    credentials: &IceCredentials,
    logger: &Logger,
) -> Result<()> {
    if !is_binding_request(packet) || packet.len() < 20 {
        return Ok(());
    }
    let mut transaction_id = [0u8; 12];
    transaction_id.copy_from_slice(&packet[8..20]);

    let response = build_binding_response(transaction_id, credentials.local_pwd);
    transport.borrow_mut().send(&response)?;
    logger.debug("answered inbound ICE connectivity check");
    Ok(())
}
