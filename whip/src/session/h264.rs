//! H.264 extradata/bitstream handling, scoped to exactly what the publisher
//! needs: pulling SPS/PPS out of either ISOM (AVCC) or Annex-B extradata,
//! converting length-prefixed access units to the Annex-B form the RTP
//! packetizer expects, and recognizing IDR access units so a fresh SPS+PPS
//! pair can be sent ahead of them. Parsing the rest of the bitstream (slice
//! headers, macroblocks, ...) is out of scope; it is treated as an opaque
//! payload.

use crate::error::{Result, WhipError};

const NAL_HEADER_LEN: usize = 1;
const IDR_NAL_TYPE: u8 = 5;
const ANNEX_B_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// SPS/PPS pulled out of either ISOM AVCC or Annex-B extradata.
#[derive(Debug, Clone)]
pub struct AvcDecoderConfig {
    /// `Some(n)` for AVCC extradata, where access units are length-prefixed
    /// with an `n`-byte field (1, 2, or 4) that must be rewritten to Annex-B
    /// start codes before packetizing. `None` for Annex-B extradata, whose
    /// access units are already start-code delimited.
    pub nal_length_size: Option<u8>,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

impl AvcDecoderConfig {
    pub fn profile_idc(&self) -> u8 {
        self.sps[NAL_HEADER_LEN]
    }

    pub fn profile_iop(&self) -> u8 {
        self.sps[NAL_HEADER_LEN + 1]
    }

    pub fn level_idc(&self) -> u8 {
        self.sps[NAL_HEADER_LEN + 2]
    }
}

/// Parses `extradata` as either ISOM `avcC` (identified by its `0x01`
/// version byte) or Annex-B (identified by a start code), pulling the SPS
/// and PPS out of either shape so the offer's `profile-level-id` and the
/// [`keyframe_prefix`] can always be derived, regardless of which form the
/// encoder handed the publisher.
pub fn parse_video_extradata(extradata: &[u8]) -> Result<AvcDecoderConfig> {
    if extradata.len() < 4 || extradata[0] != 1 {
        if find_start_code(extradata, 0).is_none() {
            return Err(WhipError::InvalidData(
                "extradata is neither ISOM AVCC nor Annex-B".to_string(),
            ));
        }
        let (sps, pps) = parse_annexb_sps_pps(extradata)?;
        return Ok(AvcDecoderConfig {
            nal_length_size: None,
            sps,
            pps,
        });
    }
    if extradata.len() < 7 {
        return Err(WhipError::InvalidData(
            "AVCC extradata truncated before nal length size / SPS count bytes".to_string(),
        ));
    }

    let nal_length_size = (extradata[4] & 0x03) + 1;
    if nal_length_size == 3 {
        return Err(WhipError::InvalidData(
            "AVCC nal length size of 3 is not a valid value (must be 1, 2, or 4)".to_string(),
        ));
    }

    let nb_sps = extradata[5] & 0x1F;
    if nb_sps != 1 {
        return Err(WhipError::InvalidData(format!(
            "expected exactly one SPS in extradata, found {nb_sps}"
        )));
    }

    let mut offset = 6;
    let sps_size = read_u16(extradata, offset)? as usize;
    offset += 2;
    let sps = read_slice(extradata, offset, sps_size)?.to_vec();
    offset += sps_size;

    let nb_pps = *extradata
        .get(offset)
        .ok_or_else(|| WhipError::InvalidData("extradata truncated before pps count".to_string()))?;
    offset += 1;
    if nb_pps != 1 {
        return Err(WhipError::InvalidData(format!(
            "expected exactly one PPS in extradata, found {nb_pps}"
        )));
    }

    let pps_size = read_u16(extradata, offset)? as usize;
    offset += 2;
    let pps = read_slice(extradata, offset, pps_size)?.to_vec();

    if sps.len() < NAL_HEADER_LEN + 3 {
        return Err(WhipError::InvalidData("SPS too short to contain profile/level bytes".to_string()));
    }

    Ok(AvcDecoderConfig {
        nal_length_size: Some(nal_length_size),
        sps,
        pps,
    })
}

const SPS_NAL_TYPE: u8 = 7;
const PPS_NAL_TYPE: u8 = 8;

/// Finds the first SPS (type 7) and first PPS (type 8) NAL unit in
/// start-code-delimited Annex-B extradata.
fn parse_annexb_sps_pps(extradata: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut sps = None;
    let mut pps = None;
    for nal in annexb_nal_units(extradata) {
        let Some(&header) = nal.first() else { continue };
        match header & 0x1F {
            SPS_NAL_TYPE if sps.is_none() => sps = Some(nal.to_vec()),
            PPS_NAL_TYPE if pps.is_none() => pps = Some(nal.to_vec()),
            _ => {}
        }
    }

    let sps = sps.ok_or_else(|| WhipError::InvalidData("Annex-B extradata contains no SPS (NAL type 7)".to_string()))?;
    let pps = pps.ok_or_else(|| WhipError::InvalidData("Annex-B extradata contains no PPS (NAL type 8)".to_string()))?;
    if sps.len() < NAL_HEADER_LEN + 3 {
        return Err(WhipError::InvalidData("SPS too short to contain profile/level bytes".to_string()));
    }
    Ok((sps, pps))
}

/// Splits Annex-B data on 3- or 4-byte start codes and returns each NAL
/// unit's bytes (header included, start code excluded).
fn annexb_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut start_codes = Vec::new();
    let mut i = 0;
    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            let code_begin = if i > 0 && data[i - 1] == 0 { i - 1 } else { i };
            start_codes.push((code_begin, i + 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut units = Vec::with_capacity(start_codes.len());
    for (idx, &(_, nal_begin)) in start_codes.iter().enumerate() {
        let nal_end = start_codes.get(idx + 1).map(|&(code_begin, _)| code_begin).unwrap_or(data.len());
        if nal_begin < nal_end {
            units.push(&data[nal_begin..nal_end]);
        }
    }
    units
}

/// Rewrites a length-prefixed (AVCC) access unit into Annex-B, replacing
/// every `nal_length_size`-byte length field with a 4-byte start code so the
/// existing RTP packetizer (which splits on start codes) can consume it
/// unmodified.
pub fn convert_avcc_au_to_annexb(au: &[u8], nal_length_size: u8) -> Result<Vec<u8>> {
    let length_size = nal_length_size as usize;
    let mut out = Vec::with_capacity(au.len() + 16);
    let mut offset = 0;

    while offset < au.len() {
        let nal_len = read_be_length(au, offset, length_size)?;
        offset += length_size;
        let nal = read_slice(au, offset, nal_len)?;
        out.extend_from_slice(&ANNEX_B_START_CODE);
        out.extend_from_slice(nal);
        offset += nal_len;
    }

    Ok(out)
}

/// Whether a length-prefixed access unit's first NAL unit is an IDR slice.
pub fn is_keyframe_avcc(au: &[u8], nal_length_size: u8) -> Result<bool> {
    let length_size = nal_length_size as usize;
    let nal_len = read_be_length(au, 0, length_size)?;
    let nal = read_slice(au, length_size, nal_len)?;
    Ok(is_idr_nal(nal))
}

/// Whether an Annex-B access unit's first NAL unit is an IDR slice.
pub fn is_keyframe_annexb(au: &[u8]) -> bool {
    let Some(start) = find_start_code(au, 0) else {
        return false;
    };
    match au.get(start) {
        Some(&nal_header) => nal_header & 0x1F == IDR_NAL_TYPE,
        None => false,
    }
}

fn is_idr_nal(nal: &[u8]) -> bool {
    match nal.first() {
        Some(&header) => header & 0x1F == IDR_NAL_TYPE,
        None => false,
    }
}

/// Builds the Annex-B SPS+PPS sequence header emitted once before a
/// keyframe's own access unit, synthesizing a fresh decoder-config packet
/// rather than relying on the remote having cached an earlier one.
pub fn keyframe_prefix(sps: &[u8], pps: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(sps.len() + pps.len() + 8);
    out.extend_from_slice(&ANNEX_B_START_CODE);
    out.extend_from_slice(sps);
    out.extend_from_slice(&ANNEX_B_START_CODE);
    out.extend_from_slice(pps);
    out
}

fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if from + 4 <= data.len() && data[from..from + 4] == ANNEX_B_START_CODE {
        return Some(from + 4);
    }
    if from + 3 <= data.len() && data[from..from + 3] == ANNEX_B_START_CODE[1..] {
        return Some(from + 3);
    }
    None
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let bytes = read_slice(data, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_be_length(data: &[u8], offset: usize, length_size: usize) -> Result<usize> {
    let bytes = read_slice(data, offset, length_size)?;
    let mut value = 0usize;
    for &b in bytes {
        value = (value << 8) | b as usize;
    }
    Ok(value)
}

fn read_slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset + len)
        .ok_or_else(|| WhipError::InvalidData("AVCC extradata or access unit truncated".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_avcc_extradata(nal_length_size_minus_one: u8, sps: &[u8], pps: &[u8]) -> Vec<u8> {
        let mut data = vec![1, 0x42, 0x00, 0x1F, 0xFC | nal_length_size_minus_one, 0xE1];
        data.extend_from_slice(&(sps.len() as u16).to_be_bytes());
        data.extend_from_slice(sps);
        data.push(1);
        data.extend_from_slice(&(pps.len() as u16).to_be_bytes());
        data.extend_from_slice(pps);
        data
    }

    #[test]
    fn parses_sps_pps_and_profile_bytes_with_4_byte_length_size() {
        let sps = [0x67, 0x42, 0x00, 0x1F, 0xAA, 0xBB];
        let pps = [0x68, 0xCE, 0x3C, 0x80];
        let extradata = sample_avcc_extradata(0x03, &sps, &pps);

        let config = parse_video_extradata(&extradata).unwrap();
        assert_eq!(config.nal_length_size, Some(4));
        assert_eq!(config.sps, sps);
        assert_eq!(config.pps, pps);
        assert_eq!(config.profile_idc(), 0x42);
        assert_eq!(config.profile_iop(), 0x00);
        assert_eq!(config.level_idc(), 0x1F);
    }

    #[test]
    fn rejects_nal_length_size_of_three() {
        let sps = [0x67, 0x42, 0x00, 0x1F];
        let pps = [0x68, 0xCE];
        let extradata = sample_avcc_extradata(0x02, &sps, &pps);
        let result = parse_video_extradata(&extradata);
        assert!(matches!(result, Err(WhipError::InvalidData(_))));
    }

    #[test]
    fn rejects_truncated_avcc_header_instead_of_panicking() {
        for len in 0..7 {
            let extradata = vec![1u8; len];
            let result = parse_video_extradata(&extradata);
            assert!(matches!(result, Err(WhipError::InvalidData(_))), "len={len}");
        }
    }

    #[test]
    fn annexb_extradata_parses_sps_and_pps_with_no_length_size() {
        let mut extradata = Vec::new();
        extradata.extend_from_slice(&ANNEX_B_START_CODE);
        extradata.extend_from_slice(&[0x67, 0x42, 0x00, 0x1F, 0xAA]);
        extradata.extend_from_slice(&ANNEX_B_START_CODE);
        extradata.extend_from_slice(&[0x68, 0xCE, 0x3C, 0x80]);

        let config = parse_video_extradata(&extradata).unwrap();
        assert_eq!(config.nal_length_size, None);
        assert_eq!(config.sps, vec![0x67, 0x42, 0x00, 0x1F, 0xAA]);
        assert_eq!(config.pps, vec![0x68, 0xCE, 0x3C, 0x80]);
        assert_eq!(config.profile_idc(), 0x42);
        assert_eq!(config.level_idc(), 0x1F);
    }

    #[test]
    fn annexb_extradata_missing_pps_is_invalid_data() {
        let mut extradata = Vec::new();
        extradata.extend_from_slice(&ANNEX_B_START_CODE);
        extradata.extend_from_slice(&[0x67, 0x42, 0x00, 0x1F, 0xAA]);

        let result = parse_video_extradata(&extradata);
        assert!(matches!(result, Err(WhipError::InvalidData(_))));
    }

    #[test]
    fn converts_avcc_access_unit_to_annex_b() {
        let mut au = Vec::new();
        au.extend_from_slice(&4u32.to_be_bytes());
        au.extend_from_slice(&[0x65, 0x01, 0x02, 0x03]);

        let annexb = convert_avcc_au_to_annexb(&au, 4).unwrap();
        assert_eq!(&annexb[0..4], &ANNEX_B_START_CODE);
        assert_eq!(&annexb[4..], &[0x65, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn recognizes_idr_access_units() {
        let mut idr_au = Vec::new();
        idr_au.extend_from_slice(&2u16.to_be_bytes());
        idr_au.extend_from_slice(&[0x65, 0x00]);
        assert!(is_keyframe_avcc(&idr_au, 2).unwrap());

        let mut non_idr_au = Vec::new();
        non_idr_au.extend_from_slice(&2u16.to_be_bytes());
        non_idr_au.extend_from_slice(&[0x41, 0x00]);
        assert!(!is_keyframe_avcc(&non_idr_au, 2).unwrap());
    }

    #[test]
    fn keyframe_prefix_wraps_sps_and_pps_with_start_codes() {
        let sps = [0x67, 0xAA];
        let pps = [0x68, 0xBB];
        let prefix = keyframe_prefix(&sps, &pps);
        assert_eq!(&prefix[0..4], &ANNEX_B_START_CODE);
        assert_eq!(&prefix[4..6], &sps);
        assert_eq!(&prefix[6..10], &ANNEX_B_START_CODE);
        assert_eq!(&prefix[10..12], &pps);
    }
}
