//! Codec identification and RTP depacketization dispatch.

pub mod h264;
pub mod h265;

use bytes::Bytes;
use failure::Error;

use crate::rtp;

/// Annex-B start code; every emitted unit and cached parameter set
/// begins with these four bytes.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Callback receiving one Annex-B framed unit and its RTP timestamp.
pub type AnnexBSink<'a> = &'a mut dyn FnMut(Bytes, u32) -> Result<(), Error>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodecId {
    Unsupported,
    H264,
    H265,
    Aac,
    G711A,
    G711U,
}

impl CodecId {
    /// Maps an SDP `rtpmap` encoding name. Dispatch is by name, never by
    /// payload type number.
    pub fn from_encoding_name(name: &str) -> CodecId {
        match name {
            "H264" => CodecId::H264,
            "H265" => CodecId::H265,
            "PCMA" => CodecId::G711A,
            "PCMU" => CodecId::G711U,
            // Cameras disagree on the capitalization.
            n if n.eq_ignore_ascii_case("MPEG4-GENERIC") => CodecId::Aac,
            _ => CodecId::Unsupported,
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, CodecId::H264 | CodecId::H265)
    }
}

/// A complete access unit (video, Annex-B framed) or raw payload (audio)
/// delivered to the application.
#[derive(Clone, Debug)]
pub struct Frame {
    pub codec: CodecId,
    pub data: Bytes,
    pub timestamp: u32,
    pub is_key: bool,
}

/// Per-stream depacketization state. Video codecs reassemble fragmented
/// NAL units; audio payloads are forwarded as-is.
#[derive(Debug)]
pub enum Depacketizer {
    H264(h264::Depacketizer),
    H265(h265::Depacketizer),
    Passthrough,
}

impl Depacketizer {
    pub fn new(codec: CodecId) -> Option<Depacketizer> {
        match codec {
            CodecId::H264 => Some(Depacketizer::H264(h264::Depacketizer::new())),
            CodecId::H265 => Some(Depacketizer::H265(h265::Depacketizer::new())),
            CodecId::Aac | CodecId::G711A | CodecId::G711U => Some(Depacketizer::Passthrough),
            CodecId::Unsupported => None,
        }
    }

    pub fn push(&mut self, pkt: &rtp::Packet, sink: AnnexBSink<'_>) -> Result<(), Error> {
        match self {
            Depacketizer::H264(d) => d.push(pkt, sink),
            Depacketizer::H265(d) => d.push(pkt, sink),
            Depacketizer::Passthrough => sink(pkt.payload.clone(), pkt.timestamp),
        }
    }
}
