//! DESCRIBE/SETUP response plumbing: base-URL resolution, control URL
//! joining, `Session` and `Transport` header parsing, and planning of
//! per-stream channels from a parsed session description.

use failure::{bail, format_err, Error};
use log::{debug, warn};

use super::video::{h264_parameter_sets, h265_parameter_sets, VideoAggregator};
use crate::codec::{CodecId, Depacketizer};
use crate::message::Response;
use crate::sdp;

/// Per-stream runtime state. Interleaved channel ids stay unassigned
/// until the SETUP response supplies the authoritative pair.
#[derive(Debug)]
pub(crate) struct MediaChannel {
    pub(crate) uri: String,
    pub(crate) codec: CodecId,
    pub(crate) is_video: bool,
    pub(crate) rtp_channel: Option<u8>,
    pub(crate) rtcp_channel: Option<u8>,
    pub(crate) depacketizer: Depacketizer,
}

#[derive(Debug)]
pub(crate) struct SessionMedia {
    pub(crate) channels: Vec<MediaChannel>,
    pub(crate) video: Option<VideoAggregator>,
}

/// Base URL for control URIs per RFC 2326 section C.1.1: `Content-Base`,
/// then `Content-Location`, then the request URL; always `/`-terminated.
pub(crate) fn base_url(response: &Response, request_url: &str) -> String {
    let mut base = response
        .header("Content-Base")
        .or_else(|| response.header("Content-Location"))
        .unwrap_or(request_url)
        .to_owned();
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

pub(crate) fn join_control(base: &str, control: &str) -> String {
    if control.starts_with("rtsp://") || control.starts_with("rtsps://") {
        control.to_owned()
    } else if control == "*" {
        base.to_owned()
    } else if let Some(tail) = control.strip_prefix('/') {
        format!("{}{}", base, tail)
    } else {
        format!("{}{}", base, control)
    }
}

/// Splits a `Session: <id>[;timeout=<n>]` header value.
pub(crate) fn parse_session(value: &str) -> (String, Option<u64>) {
    let mut parts = value.split(';');
    let id = parts.next().unwrap_or("").trim().to_owned();
    let mut timeout = None;
    for part in parts {
        if let Some(t) = part.trim().strip_prefix("timeout=") {
            timeout = t.trim().parse().ok();
        }
    }
    (id, timeout)
}

/// Finds the `interleaved=<rtp>-<rtcp>` parameter in a `Transport` value.
pub(crate) fn parse_interleaved(value: &str) -> Result<(u8, u8), Error> {
    for part in value.split(';') {
        if let Some(range) = part.trim().strip_prefix("interleaved=") {
            let (rtp, rtcp) = range
                .split_once('-')
                .ok_or_else(|| format_err!("bad interleaved parameter {:?}", range))?;
            let rtp = rtp
                .parse()
                .map_err(|_| format_err!("bad interleaved channel {:?}", rtp))?;
            let rtcp = rtcp
                .parse()
                .map_err(|_| format_err!("bad interleaved channel {:?}", rtcp))?;
            return Ok((rtp, rtcp));
        }
    }
    bail!("Transport header has no interleaved parameter: {:?}", value)
}

/// `Transport` value for the i-th SETUP: channels 2i and 2i+1.
pub(crate) fn transport_for(index: usize) -> String {
    format!(
        "RTP/AVP/TCP;unicast;interleaved={}-{};mode=PLAY",
        2 * index,
        2 * index + 1
    )
}

/// Builds the channel list from a DESCRIBE result. Video must be H.264
/// or H.265; audio streams with unrecognized encodings are skipped, as
/// are non-audio/video streams.
pub(crate) fn plan_media(sdp: &sdp::SessionDescription, base: &str) -> Result<SessionMedia, Error> {
    let mut channels = Vec::new();
    let mut video = None;
    for m in &sdp.medias {
        let rtpmap = match &m.rtpmap {
            Some(r) => r,
            None => {
                debug!("skipping {} stream without an rtpmap", m.media);
                continue;
            }
        };
        let codec = CodecId::from_encoding_name(&rtpmap.encoding_name);
        let is_video = m.media == "video";
        if is_video {
            let fmtp = m.fmtp.as_ref().map(|f| f.parameters.as_str()).unwrap_or("");
            match codec {
                CodecId::H264 => {
                    let (sps, pps) = h264_parameter_sets(fmtp);
                    video = Some(VideoAggregator::new(codec, sps, pps, None));
                }
                CodecId::H265 => {
                    let (vps, sps, pps) = h265_parameter_sets(fmtp);
                    video = Some(VideoAggregator::new(codec, sps, pps, vps));
                }
                _ => bail!("unsupported video codec {:?}", rtpmap.encoding_name),
            }
        } else if m.media == "audio" {
            if codec == CodecId::Unsupported {
                warn!("skipping audio stream with unsupported encoding {:?}", rtpmap.encoding_name);
                continue;
            }
        } else {
            debug!("skipping {} stream", m.media);
            continue;
        }
        let control = m.control.as_deref().unwrap_or("");
        let depacketizer = Depacketizer::new(codec)
            .ok_or_else(|| format_err!("no depacketizer for {:?}", rtpmap.encoding_name))?;
        channels.push(MediaChannel {
            uri: join_control(base, control),
            codec,
            is_video,
            rtp_channel: None,
            rtcp_channel: None,
            depacketizer,
        });
    }
    if channels.is_empty() {
        bail!("session description has no usable media streams");
    }
    Ok(SessionMedia { channels, video })
}
