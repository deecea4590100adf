//! Turns depacketized NAL units into frames: parameter sets (SPS/PPS and
//! the H.265 VPS) are cached rather than delivered, and keyframes go out
//! with the cached sets prepended so every keyframe is self-contained.

use bytes::{BufMut, Bytes, BytesMut};
use failure::{bail, Error};

use crate::codec::{CodecId, Frame, START_CODE};

/// Returns the NAL unit header byte following the start code. Accepts
/// both three- and four-byte start codes.
fn nal_header(unit: &[u8]) -> Result<u8, Error> {
    if unit.len() >= 4 && unit[0] == 0x00 && unit[1] == 0x00 {
        if unit[2] == 0x01 {
            return Ok(unit[3]);
        }
        if unit.len() >= 5 && unit[2] == 0x00 && unit[3] == 0x01 {
            return Ok(unit[4]);
        }
    }
    bail!("NAL unit without a valid start code");
}

#[derive(Debug)]
pub(crate) struct VideoAggregator {
    codec: CodecId,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    vps: Option<Bytes>,
}

impl VideoAggregator {
    /// `sps`/`pps`/`vps` are out-of-band parameter sets from the SDP,
    /// each already Annex-B framed.
    pub(crate) fn new(codec: CodecId, sps: Option<Bytes>, pps: Option<Bytes>, vps: Option<Bytes>) -> Self {
        VideoAggregator { codec, sps, pps, vps }
    }

    pub(crate) fn push(
        &mut self,
        unit: Bytes,
        timestamp: u32,
        on_frame: &mut dyn FnMut(Frame),
    ) -> Result<(), Error> {
        let hdr = nal_header(&unit)?;
        match self.codec {
            CodecId::H264 => match hdr & 0x1F {
                5 => {
                    let data = prepend(&[&self.sps, &self.pps], &unit);
                    on_frame(Frame {
                        codec: self.codec,
                        data,
                        timestamp,
                        is_key: true,
                    });
                }
                7 => cache(&mut self.sps, unit),
                8 => cache(&mut self.pps, unit),
                _ => on_frame(Frame {
                    codec: self.codec,
                    data: unit,
                    timestamp,
                    is_key: false,
                }),
            },
            CodecId::H265 => match (hdr >> 1) & 0x3F {
                16..=21 => {
                    let data = prepend(&[&self.vps, &self.sps, &self.pps], &unit);
                    on_frame(Frame {
                        codec: self.codec,
                        data,
                        timestamp,
                        is_key: true,
                    });
                }
                32 => cache(&mut self.vps, unit),
                33 => cache(&mut self.sps, unit),
                34 => cache(&mut self.pps, unit),
                _ => on_frame(Frame {
                    codec: self.codec,
                    data: unit,
                    timestamp,
                    is_key: false,
                }),
            },
            other => bail!("no aggregation for codec {:?}", other),
        }
        Ok(())
    }
}

/// Replaces a cached parameter set only when the bytes changed.
fn cache(slot: &mut Option<Bytes>, unit: Bytes) {
    if slot.as_deref() != Some(&unit[..]) {
        *slot = Some(unit);
    }
}

fn prepend(sets: &[&Option<Bytes>], unit: &Bytes) -> Bytes {
    let extra: usize = sets.iter().filter_map(|s| s.as_ref().map(Bytes::len)).sum();
    let mut out = BytesMut::with_capacity(extra + unit.len());
    for set in sets {
        if let Some(set) = set {
            out.put_slice(set);
        }
    }
    out.put_slice(unit);
    out.freeze()
}

/// Decodes one base64 parameter set and frames it with a start code.
pub(crate) fn decode_parameter_set(b64: &str) -> Option<Bytes> {
    let raw = base64::decode(b64.trim()).ok()?;
    if raw.is_empty() {
        return None;
    }
    let mut out = BytesMut::with_capacity(START_CODE.len() + raw.len());
    out.put_slice(&START_CODE);
    out.put_slice(&raw);
    Some(out.freeze())
}

/// Extracts SPS and PPS from an H.264 `fmtp` parameter string
/// (`sprop-parameter-sets=<sps>,<pps>`).
pub(crate) fn h264_parameter_sets(fmtp: &str) -> (Option<Bytes>, Option<Bytes>) {
    for param in fmtp.split(';') {
        if let Some(v) = param.trim().strip_prefix("sprop-parameter-sets=") {
            let mut sets = v.split(',');
            let sps = sets.next().and_then(decode_parameter_set);
            let pps = sets.next().and_then(decode_parameter_set);
            return (sps, pps);
        }
    }
    (None, None)
}

/// Extracts VPS, SPS, and PPS from an H.265 `fmtp` parameter string
/// (separate `sprop-vps=`/`sprop-sps=`/`sprop-pps=` keys).
pub(crate) fn h265_parameter_sets(fmtp: &str) -> (Option<Bytes>, Option<Bytes>, Option<Bytes>) {
    let mut vps = None;
    let mut sps = None;
    let mut pps = None;
    for param in fmtp.split(';') {
        let param = param.trim();
        if let Some(v) = param.strip_prefix("sprop-vps=") {
            vps = decode_parameter_set(v);
        } else if let Some(v) = param.strip_prefix("sprop-sps=") {
            sps = decode_parameter_set(v);
        } else if let Some(v) = param.strip_prefix("sprop-pps=") {
            pps = decode_parameter_set(v);
        }
    }
    (vps, sps, pps)
}
