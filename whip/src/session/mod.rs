//! Session orchestrator: wires ICE/DTLS handshake, SRTP, H.264/Opus
//! packetization and WHIP signaling into the one state machine a publisher
//! runs through from construction to teardown.

pub mod h264;
pub mod handshake;
pub mod rtp_send;
pub mod state;

use crate::config::PublisherConfig;
use crate::error::{Result, WhipError};
use crate::session::h264::AvcDecoderConfig;
use crate::session::handshake::{create_dtls_engine, run_handshake, IceCredentials, SharedUdpSink};
use crate::session::rtp_send::{send_audio_frame, send_video_access_unit, AudioSendState, VideoSendState};
use crate::session::state::SessionState;
use crate::signaling::WhipSignaling;
use logging::Logger;
use rand::RngCore;
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use whip_network::{classify, DtlsEngine, DtlsState, H264RtpPacketizer, OpusRtpPacketizer, PacketKind, SrtpContext, UdpTransport};
use whip_sdp::{build_offer, parse_answer, OfferParams};
use whip_stun::{build_binding_response, is_binding_request};

pub const AUDIO_PAYLOAD_TYPE: u8 = 111;
pub const VIDEO_PAYLOAD_TYPE: u8 = 106;
pub const OPUS_SAMPLE_RATE: u32 = 48_000;
pub const OPUS_CHANNELS: u8 = 2;

/// Caps how much of an unrecognized inbound datagram gets logged during
/// steady-state polling, so a misbehaving peer can't flood the log.
const SCRATCH_BUFFER_SIZE: usize = 4096;

/// DTLS record content type for alerts (RFC 6347 §4.1), used to recognize
/// an inbound `close_notify` without routing it through the handshake FSM.
const DTLS_ALERT_CONTENT_TYPE: u8 = 21;

/// A WHIP publisher session: one H.264 video stream plus one Opus audio
/// stream, signaled once over HTTP and carried over one DTLS-SRTP-secured
/// UDP 5-tuple for the rest of its life.
pub struct PublisherSession {
    state: SessionState,
    config: PublisherConfig,
    logger: Logger,
    signaling: WhipSignaling,

    local_ufrag: String,
    local_pwd: String,
    remote_ufrag: Option<String>,
    remote_pwd: Option<String>,

    audio_ssrc: u32,
    video_ssrc: u32,
    video_fps: f64,
    decoder_config: Option<AvcDecoderConfig>,

    resource_url: Option<String>,
    transport: Rc<RefCell<UdpTransport>>,
    dtls_engine: Option<DtlsEngine<SharedUdpSink>>,

    audio_send: Option<AudioSendState>,
    video_send: Option<VideoSendState>,
    audio_srtp_send: Option<SrtpContext>,
    video_srtp_send: Option<SrtpContext>,
    rtcp_srtp_send: Option<SrtpContext>,
    recv_srtp: Option<SrtpContext>,

    scratch: Vec<u8>,
}

impl PublisherSession {
    /// Binds the session's single UDP socket, generates local ICE
    /// credentials and the DTLS certificate, and returns a session in
    /// `Init`. `video_fps` paces the H.264 packetizer's RTP timestamps
    /// (Opus's own clock runs independently, see
    /// [`rtp_send`](crate::session::rtp_send)).
    pub fn new(whip_endpoint: impl Into<String>, config: PublisherConfig, video_fps: f64, logger: Logger) -> Result<Self> {
        let bind_addr: SocketAddr = "0.0.0.0:0".parse().expect("static address always parses");
        let transport = Rc::new(RefCell::new(UdpTransport::new(bind_addr, logger.clone())?));
        let dtls_engine = create_dtls_engine(Rc::clone(&transport))?;

        let mut rng = rand::thread_rng();
        let local_ufrag = random_hex(&mut rng, 4);
        let local_pwd = random_hex(&mut rng, 16);
        let audio_ssrc = rng.next_u32();
        let video_ssrc = rng.next_u32();

        let authorization = config.authorization().map(str::to_string);
        let signaling = WhipSignaling::new(whip_endpoint, authorization);

        Ok(Self {
            state: SessionState::Init,
            config,
            logger,
            signaling,
            local_ufrag,
            local_pwd,
            remote_ufrag: None,
            remote_pwd: None,
            audio_ssrc,
            video_ssrc,
            video_fps,
            decoder_config: None,
            resource_url: None,
            transport,
            dtls_engine: Some(dtls_engine),
            audio_send: None,
            video_send: None,
            audio_srtp_send: None,
            video_srtp_send: None,
            rtcp_srtp_send: None,
            recv_srtp: None,
            scratch: vec![0u8; SCRATCH_BUFFER_SIZE],
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Supplies the video track's decoder configuration, accepting either
    /// ISOM (AVCC) or Annex-B extradata. Must be called before
    /// [`PublisherSession::connect`] so the offer's `profile-level-id` can be
    /// read off the SPS; access units submitted later are expected to use
    /// whichever framing this extradata used (length-prefixed for AVCC,
    /// start-code delimited for Annex-B).
    pub fn set_video_extradata(&mut self, extradata: &[u8]) -> Result<()> {
        self.decoder_config = Some(h264::parse_video_extradata(extradata)?);
        Ok(())
    }

    fn advance(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(WhipError::InvalidData(format!(
                "illegal session state transition from {} to {next}",
                self.state
            )));
        }
        self.logger.debug(&format!("session state {} -> {next}", self.state));
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, err: WhipError) -> WhipError {
        let _ = self.advance(SessionState::Failed);
        self.logger.error(&format!("session setup failed: {err}"));
        err
    }

    /// Runs the full publish handshake: build and POST the offer, parse the
    /// answer, connect the UDP 5-tuple, complete ICE + DTLS, derive SRTP
    /// contexts. On success the session is `Ready` and media can be sent.
    pub fn connect(&mut self) -> Result<()> {
        match self.try_connect() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn try_connect(&mut self) -> Result<()> {
        let decoder_config = self
            .decoder_config
            .clone()
            .ok_or_else(|| WhipError::InvalidArgument("video extradata must be set before connecting".to_string()))?;

        self.advance(SessionState::Offer)?;
        let offer = build_offer(&OfferParams {
            local_ufrag: &self.local_ufrag,
            local_pwd: &self.local_pwd,
            fingerprint: self.dtls_engine.as_ref().expect("engine created at init").fingerprint(),
            audio_payload_type: AUDIO_PAYLOAD_TYPE,
            audio_sample_rate: OPUS_SAMPLE_RATE,
            audio_channels: OPUS_CHANNELS,
            audio_ssrc: self.audio_ssrc,
            video_payload_type: VIDEO_PAYLOAD_TYPE,
            video_ssrc: self.video_ssrc,
            profile_idc: decoder_config.profile_idc(),
            profile_iop: decoder_config.profile_iop(),
            level_idc: decoder_config.level_idc(),
        });

        let (resource_url, answer) = self.signaling.publish(&offer, &self.logger)?;
        self.resource_url = Some(resource_url);
        self.advance(SessionState::Answer)?;

        let answer_info = parse_answer(&answer)?;
        self.remote_ufrag = Some(answer_info.ice_ufrag.clone());
        self.remote_pwd = Some(answer_info.ice_pwd.clone());
        self.advance(SessionState::Negotiated)?;

        let remote_addr: SocketAddr = format!("{}:{}", answer_info.candidate_host, answer_info.candidate_port)
            .parse()
            .map_err(|_| WhipError::InvalidData("answer candidate is not a valid UDP address".to_string()))?;
        self.transport.borrow_mut().set_remote(remote_addr);
        self.advance(SessionState::UdpConnected)?;

        self.advance(SessionState::IceConnecting)?;
        let credentials = IceCredentials {
            local_ufrag: &self.local_ufrag,
            local_pwd: &self.local_pwd,
            remote_ufrag: self.remote_ufrag.as_deref().expect("set above"),
            remote_pwd: self.remote_pwd.as_deref().expect("set above"),
        };
        let mut dtls_engine = self.dtls_engine.take().expect("engine created at init");
        let handshake_result = run_handshake(
            &self.transport,
            &mut dtls_engine,
            &credentials,
            self.config.handshake_timeout_ms(),
            &self.logger,
        );
        self.dtls_engine = Some(dtls_engine);
        let srtp_keys = handshake_result?;
        self.advance(SessionState::IceConnected)?;
        self.advance(SessionState::DtlsFinished)?;

        self.audio_srtp_send = Some(SrtpContext::new(srtp_keys.local_master_key, srtp_keys.local_master_salt));
        self.video_srtp_send = Some(SrtpContext::new(srtp_keys.local_master_key, srtp_keys.local_master_salt));
        self.rtcp_srtp_send = Some(SrtpContext::new(srtp_keys.local_master_key, srtp_keys.local_master_salt));
        self.recv_srtp = Some(SrtpContext::new(srtp_keys.remote_master_key, srtp_keys.remote_master_salt));
        self.advance(SessionState::SrtpFinished)?;

        let max_payload_size = self.config.max_rtp_payload_size();
        let mut video_packetizer = H264RtpPacketizer::new(VIDEO_PAYLOAD_TYPE, max_payload_size, self.video_fps);
        video_packetizer.set_ssrc(self.video_ssrc);
        self.video_send = Some(VideoSendState::new(
            video_packetizer,
            decoder_config.nal_length_size,
            decoder_config.sps.clone(),
            decoder_config.pps.clone(),
        ));

        let mut audio_packetizer = OpusRtpPacketizer::new(AUDIO_PAYLOAD_TYPE, max_payload_size, OPUS_SAMPLE_RATE, 20);
        audio_packetizer.set_ssrc(self.audio_ssrc);
        self.audio_send = Some(AudioSendState::new(audio_packetizer));

        self.advance(SessionState::Ready)?;
        self.logger.info("session ready, media may now flow");
        Ok(())
    }

    /// Encrypts and sends one H.264 access unit. The access unit is AVCC
    /// length-prefixed if extradata was, Annex-B otherwise.
    pub fn send_video_access_unit(&mut self, access_unit: &[u8]) -> Result<usize> {
        self.require_ready()?;
        let pkt_size = self.config.pkt_size();
        let video_send = self.video_send.as_mut().expect("set up when Ready");
        let srtp = self.video_srtp_send.as_mut().expect("set up when Ready");
        let transport = Rc::clone(&self.transport);
        let mut send = move |bytes: &[u8]| transport.borrow_mut().send(bytes).map_err(std::io::Error::other);
        send_video_access_unit(video_send, srtp, access_unit, pkt_size, &mut send, &self.logger)
    }

    /// Encrypts and sends one Opus frame (48 kHz, stereo).
    pub fn send_audio_frame(&mut self, frame: &[u8]) -> Result<usize> {
        self.require_ready()?;
        let audio_send = self.audio_send.as_mut().expect("set up when Ready");
        let srtp = self.audio_srtp_send.as_mut().expect("set up when Ready");
        let transport = Rc::clone(&self.transport);
        let mut send = move |bytes: &[u8]| transport.borrow_mut().send(bytes).map_err(std::io::Error::other);
        send_audio_frame(audio_send, srtp, frame, &mut send, &self.logger)
    }

    fn require_ready(&self) -> Result<()> {
        if self.state != SessionState::Ready {
            return Err(WhipError::InvalidData(format!(
                "media cannot be sent before the session reaches Ready (currently {})",
                self.state
            )));
        }
        // A close_notify observed after Ready doesn't rewind session state
        // (it stays Ready/monotonic); it just turns further sends into I/O
        // errors instead of silently writing to a dead peer.
        if let Some(engine) = &self.dtls_engine {
            if *engine.state() == DtlsState::Closed {
                return Err(WhipError::Io(std::io::Error::from(std::io::ErrorKind::NotConnected)));
            }
        }
        Ok(())
    }

    /// Drains one inbound datagram, answering ICE keepalives and feeding
    /// DTLS alerts to the engine. RTCP is classified but not yet acted on
    /// (no congestion control or retransmission is implemented).
    ///
    /// Reads go through [`UdpTransport::receive`], which always sizes its
    /// buffer to the datagram actually read rather than to a stale pointer
    /// size, so there is nothing here to replicate from the `SSL_read`
    /// buffer-size bug this crate deliberately does not carry over.
    pub fn poll(&mut self) -> Result<()> {
        let received = self.transport.borrow_mut().receive()?;
        let Some((packet, _from)) = received else {
            return Ok(());
        };

        match classify(&packet) {
            Some(PacketKind::Stun) if is_binding_request(&packet) && packet.len() >= 20 => {
                let mut transaction_id = [0u8; 12];
                transaction_id.copy_from_slice(&packet[8..20]);
                let response = build_binding_response(transaction_id, &self.local_pwd);
                self.transport.borrow_mut().send(&response)?;
            }
            Some(PacketKind::Dtls) if packet.first() == Some(&DTLS_ALERT_CONTENT_TYPE) => {
                if let Some(engine) = self.dtls_engine.as_mut() {
                    engine.note_closed();
                }
                self.logger.info("received DTLS close_notify; subsequent sends will surface as I/O errors");
            }
            Some(PacketKind::Dtls) => {
                if let Some(engine) = self.dtls_engine.as_mut() {
                    if let Err(err) = engine.handle_packet(&packet) {
                        self.logger.warn(&format!("post-handshake DTLS record rejected: {err}"));
                    }
                }
            }
            Some(PacketKind::Rtcp) => {
                let len = packet.len().min(self.scratch.len());
                self.logger.debug(&format!("received {len}-byte RTCP packet (no feedback handling implemented)"));
            }
            _ => {}
        }
        Ok(())
    }

    /// Tears the session down: DELETEs the WHIP resource if one was ever
    /// captured. Failures are logged only, per the non-fatal teardown
    /// contract.
    pub fn close(&mut self) {
        if let Some(resource_url) = self.resource_url.take() {
            self.signaling.teardown(&resource_url, &self.logger);
        }
    }
}

fn random_hex(rng: &mut impl RngCore, byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logging::LogLevel;

    fn test_logger() -> Logger {
        let dir = tempfile::tempdir().unwrap();
        Logger::new(dir.path().join("test.log"), LogLevel::Debug).unwrap()
    }

    #[test]
    fn new_session_starts_in_init_with_distinct_ssrcs() {
        let logger = test_logger();
        let session = PublisherSession::new("https://whip.example.com/publish", PublisherConfig::default(), 30.0, logger).unwrap();
        assert_eq!(session.state(), SessionState::Init);
        assert_ne!(session.audio_ssrc, session.video_ssrc);
        assert_eq!(session.local_ufrag.len(), 8);
        assert_eq!(session.local_pwd.len(), 32);
    }

    #[test]
    fn sending_media_before_ready_is_rejected() {
        let logger = test_logger();
        let mut session = PublisherSession::new("https://whip.example.com/publish", PublisherConfig::default(), 30.0, logger).unwrap();
        let result = session.send_video_access_unit(&[0x00, 0x00, 0x00, 0x01, 0x41]);
        assert!(matches!(result, Err(WhipError::InvalidData(_))));
    }

    #[test]
    fn connect_without_video_extradata_fails_fast_and_marks_session_failed() {
        let logger = test_logger();
        let mut session = PublisherSession::new("https://whip.example.com/publish", PublisherConfig::default(), 30.0, logger).unwrap();
        let result = session.connect();
        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Failed);
    }
}
