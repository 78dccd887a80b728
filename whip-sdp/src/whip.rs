//! SDP offer/answer shapes specific to a single-audio/single-video WHIP
//! publish session.
//!
//! Unlike [`SessionDescription`](crate::SessionDescription), which models
//! RFC 4566 generically, this module builds and reads the one fixed offer
//! shape a publisher ever emits and the minimal set of answer lines it ever
//! needs back. The offer is produced as a flat string, matching the
//! line-for-line `snprintf`-style construction it is grounded on rather than
//! a generic attribute builder, because every line's wording is fixed.

use std::fmt;

/// Caps both the offer this crate produces and any answer it is willing to
/// parse, mirroring the bound a publisher enforces against a misbehaving
/// signaling peer.
pub const MAX_SDP_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhipSdpError {
    TooLarge { actual: usize },
    MissingIceUfrag,
    MissingIcePwd,
    MissingCandidate,
    UnsupportedCandidateTransport(String),
    NotHostCandidate,
    MalformedCandidateLine(String),
}

impl fmt::Display for WhipSdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhipSdpError::TooLarge { actual } => {
                write!(f, "SDP exceeds {MAX_SDP_SIZE} bytes (got {actual})")
            }
            WhipSdpError::MissingIceUfrag => write!(f, "answer has no a=ice-ufrag: line"),
            WhipSdpError::MissingIcePwd => write!(f, "answer has no a=ice-pwd: line"),
            WhipSdpError::MissingCandidate => write!(f, "answer has no usable a=candidate: line"),
            WhipSdpError::UnsupportedCandidateTransport(proto) => {
                write!(f, "candidate transport '{proto}' is not udp")
            }
            WhipSdpError::NotHostCandidate => write!(f, "candidate is not a host candidate"),
            WhipSdpError::MalformedCandidateLine(line) => {
                write!(f, "could not parse candidate line: {line}")
            }
        }
    }
}

impl std::error::Error for WhipSdpError {}

/// Fields required to render the fixed offer body.
pub struct OfferParams<'a> {
    pub local_ufrag: &'a str,
    pub local_pwd: &'a str,
    pub fingerprint: &'a str,
    pub audio_payload_type: u8,
    pub audio_sample_rate: u32,
    pub audio_channels: u8,
    pub audio_ssrc: u32,
    pub video_payload_type: u8,
    pub video_ssrc: u32,
    /// `profile_idc`, `profile_iop` (constraint flags byte), `level_idc` as
    /// pulled from the SPS, rendered as `profile-level-id=PPIILL`.
    pub profile_idc: u8,
    pub profile_iop: u8,
    pub level_idc: u8,
}

/// Renders the WHIP offer body. Always contains exactly one audio (`mid:0`)
/// and one video (`mid:1`) media section, bundled together.
pub fn build_offer(params: &OfferParams) -> String {
    let mut sdp = String::new();
    sdp.push_str("v=0\r\n");
    sdp.push_str("o=- 0 0 IN IP4 127.0.0.1\r\n");
    sdp.push_str("s=-\r\n");
    sdp.push_str("t=0 0\r\n");
    sdp.push_str("a=group:BUNDLE 0 1\r\n");
    sdp.push_str("a=extmap-allow-mixed\r\n");
    sdp.push_str("a=msid-semantic: WMS\r\n");

    sdp.push_str(&format!("m=audio 9 UDP/TLS/RTP/SAVPF {}\r\n", params.audio_payload_type));
    sdp.push_str("c=IN IP4 0.0.0.0\r\n");
    sdp.push_str(&format!("a=ice-ufrag:{}\r\n", params.local_ufrag));
    sdp.push_str(&format!("a=ice-pwd:{}\r\n", params.local_pwd));
    sdp.push_str(&format!("a=fingerprint:sha-256 {}\r\n", params.fingerprint));
    sdp.push_str("a=setup:passive\r\n");
    sdp.push_str("a=mid:0\r\n");
    sdp.push_str("a=sendonly\r\n");
    sdp.push_str("a=msid:- audio\r\n");
    sdp.push_str("a=rtcp-mux\r\n");
    sdp.push_str(&format!(
        "a=rtpmap:{} opus/{}/{}\r\n",
        params.audio_payload_type, params.audio_sample_rate, params.audio_channels
    ));
    sdp.push_str(&format!("a=ssrc:{} cname:whip-publisher\r\n", params.audio_ssrc));
    sdp.push_str(&format!("a=ssrc:{} msid:- audio\r\n", params.audio_ssrc));

    sdp.push_str(&format!("m=video 9 UDP/TLS/RTP/SAVPF {}\r\n", params.video_payload_type));
    sdp.push_str("c=IN IP4 0.0.0.0\r\n");
    sdp.push_str(&format!("a=ice-ufrag:{}\r\n", params.local_ufrag));
    sdp.push_str(&format!("a=ice-pwd:{}\r\n", params.local_pwd));
    sdp.push_str(&format!("a=fingerprint:sha-256 {}\r\n", params.fingerprint));
    sdp.push_str("a=setup:passive\r\n");
    sdp.push_str("a=mid:1\r\n");
    sdp.push_str("a=sendonly\r\n");
    sdp.push_str("a=msid:- video\r\n");
    sdp.push_str("a=rtcp-mux\r\n");
    sdp.push_str("a=rtcp-rsize\r\n");
    sdp.push_str(&format!("a=rtpmap:{} H264/90000\r\n", params.video_payload_type));
    sdp.push_str(&format!(
        "a=fmtp:{} level-asymmetry-allowed=1;packetization-mode=1;profile-level-id={:02X}{:02X}{:02X}\r\n",
        params.video_payload_type, params.profile_idc, params.profile_iop, params.level_idc
    ));
    sdp.push_str(&format!("a=ssrc:{} cname:whip-publisher\r\n", params.video_ssrc));
    sdp.push_str(&format!("a=ssrc:{} msid:- video\r\n", params.video_ssrc));

    sdp
}

/// The subset of the answer a publisher actually consumes: the remote ICE
/// credentials and one UDP host candidate to connect the single 5-tuple to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerInfo {
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub candidate_host: String,
    pub candidate_port: u16,
}

/// Parses only the lines a publisher needs: the first `a=ice-ufrag:`, the
/// first `a=ice-pwd:`, and the first UDP host `a=candidate:` line. All other
/// SDP content (media sections, additional candidates, RTCP feedback, ...)
/// is ignored, matching a minimal non-validating line scan rather than a
/// full RFC 4566 parse.
pub fn parse_answer(answer: &str) -> Result<AnswerInfo, WhipSdpError> {
    if answer.len() > MAX_SDP_SIZE {
        return Err(WhipSdpError::TooLarge { actual: answer.len() });
    }

    let mut ice_ufrag: Option<String> = None;
    let mut ice_pwd: Option<String> = None;
    let mut candidate: Option<(String, u16)> = None;

    for raw_line in answer.lines() {
        let line = raw_line.trim_end_matches('\r');

        if ice_ufrag.is_none() {
            if let Some(rest) = line.strip_prefix("a=ice-ufrag:") {
                ice_ufrag = Some(rest.to_string());
                continue;
            }
        }
        if ice_pwd.is_none() {
            if let Some(rest) = line.strip_prefix("a=ice-pwd:") {
                ice_pwd = Some(rest.to_string());
                continue;
            }
        }
        if candidate.is_none() {
            if let Some(rest) = line.strip_prefix("a=candidate:") {
                if let Some(parsed) = parse_host_candidate(rest)? {
                    candidate = Some(parsed);
                }
            }
        }
    }

    let ice_ufrag = ice_ufrag.ok_or(WhipSdpError::MissingIceUfrag)?;
    let ice_pwd = ice_pwd.ok_or(WhipSdpError::MissingIcePwd)?;
    let (candidate_host, candidate_port) = candidate.ok_or(WhipSdpError::MissingCandidate)?;

    Ok(AnswerInfo {
        ice_ufrag,
        ice_pwd,
        candidate_host,
        candidate_port,
    })
}

/// Parses `<foundation> <component> <transport> <priority> <addr> <port> typ <type> ...`
/// returning `Ok(None)` for candidates that simply aren't UDP host candidates
/// (these are skipped, not fatal) and `Err` only for a malformed line that
/// claims to be host/UDP but cannot be parsed.
fn parse_host_candidate(rest: &str) -> Result<Option<(String, u16)>, WhipSdpError> {
    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 8 {
        return Ok(None);
    }

    let transport = fields[2];
    let addr = fields[4];
    let port_str = fields[5];
    let typ_keyword = fields[6];
    let typ_value = fields[7];

    if typ_keyword != "typ" || typ_value != "host" {
        return Ok(None);
    }

    if !transport.eq_ignore_ascii_case("udp") {
        return Err(WhipSdpError::UnsupportedCandidateTransport(transport.to_string()));
    }

    let port: u16 = port_str
        .parse()
        .map_err(|_| WhipSdpError::MalformedCandidateLine(rest.to_string()))?;

    Ok(Some((addr.to_string(), port)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> OfferParams<'static> {
        OfferParams {
            local_ufrag: "abcd1234",
            local_pwd: "0123456789abcdef0123456789abcdef",
            fingerprint: "AA:BB:CC",
            audio_payload_type: 111,
            audio_sample_rate: 48000,
            audio_channels: 2,
            audio_ssrc: 1111,
            video_payload_type: 106,
            video_ssrc: 2222,
            profile_idc: 0x42,
            profile_iop: 0x00,
            level_idc: 0x1F,
        }
    }

    #[test]
    fn offer_has_bundle_and_exact_h264_fmtp_line() {
        let sdp = build_offer(&sample_params());
        assert!(sdp.starts_with("v=0\r\n"));
        assert!(sdp.contains("a=group:BUNDLE 0 1\r\n"));
        assert!(sdp.contains("a=extmap-allow-mixed\r\n"));
        assert!(sdp.contains(
            "a=fmtp:106 level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001F\r\n"
        ));
        assert!(sdp.contains("a=rtpmap:111 opus/48000/2\r\n"));
        assert!(sdp.contains("a=rtpmap:106 H264/90000\r\n"));
        // No a=fmtp line for the audio payload type.
        assert!(!sdp.contains("a=fmtp:111"));
    }

    #[test]
    fn offer_stays_within_size_cap() {
        let sdp = build_offer(&sample_params());
        assert!(sdp.len() <= MAX_SDP_SIZE);
    }

    #[test]
    fn parses_first_udp_host_candidate_and_credentials() {
        let answer = "v=0\r\n\
            o=- 1 1 IN IP4 127.0.0.1\r\n\
            s=-\r\n\
            t=0 0\r\n\
            a=ice-ufrag:remoteufrag\r\n\
            a=ice-pwd:remotepasswordvalue0123456789ab\r\n\
            a=candidate:1 1 udp 2130706431 192.0.2.10 9000 typ host\r\n";

        let parsed = parse_answer(answer).unwrap();
        assert_eq!(parsed.ice_ufrag, "remoteufrag");
        assert_eq!(parsed.ice_pwd, "remotepasswordvalue0123456789ab");
        assert_eq!(parsed.candidate_host, "192.0.2.10");
        assert_eq!(parsed.candidate_port, 9000);
    }

    #[test]
    fn rejects_answer_missing_candidate() {
        let answer = "a=ice-ufrag:u\r\na=ice-pwd:p\r\n";
        assert_eq!(parse_answer(answer), Err(WhipSdpError::MissingCandidate));
    }

    #[test]
    fn rejects_oversized_answer() {
        let answer = "a=ice-ufrag:u\r\n".repeat(1000);
        assert!(matches!(parse_answer(&answer), Err(WhipSdpError::TooLarge { .. })));
    }

    #[test]
    fn skips_non_udp_or_relay_candidates_before_the_real_one() {
        let answer = "a=ice-ufrag:u\r\n\
            a=ice-pwd:p\r\n\
            a=candidate:1 1 udp 2130706431 10.0.0.5 9000 typ relay\r\n\
            a=candidate:2 1 udp 2130706431 10.0.0.9 9001 typ host\r\n";
        let parsed = parse_answer(answer).unwrap();
        assert_eq!(parsed.candidate_host, "10.0.0.9");
        assert_eq!(parsed.candidate_port, 9001);
    }
}
