//! RTP fixed-header parsing (RFC 3550 section 5.1).

use bytes::Bytes;
use failure::{bail, Error};

/// Version, padding/extension/marker flags, CSRC list, and payload with
/// padding already trimmed.
#[derive(Debug)]
pub struct Packet {
    pub version: u8,
    pub padding: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: Vec<u32>,
    pub extension: Option<Extension>,
    pub payload: Bytes,
}

/// A profile-defined header extension: 16-bit profile tag followed by a
/// length-prefixed run of 32-bit words.
#[derive(Debug)]
pub struct Extension {
    pub profile: u16,
    pub data: Bytes,
}

impl Packet {
    pub fn parse(data: Bytes) -> Result<Packet, Error> {
        if data.len() < 12 {
            bail!("RTP packet of {} bytes is shorter than the fixed header", data.len());
        }
        let b0 = data[0];
        let b1 = data[1];
        let version = b0 >> 6;
        let padding = (b0 & 0x20) != 0;
        let has_extension = (b0 & 0x10) != 0;
        let csrc_count = usize::from(b0 & 0x0F);
        let marker = (b1 & 0x80) != 0;
        let payload_type = b1 & 0x7F;
        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let mut pos = 12;
        if data.len() < pos + 4 * csrc_count {
            bail!("RTP packet truncated in CSRC list (csrc_count={})", csrc_count);
        }
        let mut csrc = Vec::with_capacity(csrc_count);
        for i in 0..csrc_count {
            let at = pos + 4 * i;
            csrc.push(u32::from_be_bytes([
                data[at],
                data[at + 1],
                data[at + 2],
                data[at + 3],
            ]));
        }
        pos += 4 * csrc_count;
        let extension = if has_extension {
            if data.len() < pos + 4 {
                bail!("RTP packet truncated in extension header");
            }
            let profile = u16::from_be_bytes([data[pos], data[pos + 1]]);
            let words = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
            pos += 4;
            if data.len() < pos + 4 * words {
                bail!("RTP packet truncated in extension data ({} words)", words);
            }
            let ext = data.slice(pos..pos + 4 * words);
            pos += 4 * words;
            Some(Extension { profile, data: ext })
        } else {
            None
        };
        let mut end = data.len();
        if padding {
            let pad = usize::from(data[end - 1]);
            if pad == 0 || pos + pad > end {
                bail!("RTP packet with bad padding count {}", pad);
            }
            end -= pad;
        }
        let payload = data.slice(pos..end);
        Ok(Packet {
            version,
            padding,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            extension,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Packet;
    use bytes::Bytes;

    fn header(b0: u8, b1: u8, seq: u16, ts: u32, ssrc: u32) -> Vec<u8> {
        let mut v = vec![b0, b1];
        v.extend_from_slice(&seq.to_be_bytes());
        v.extend_from_slice(&ts.to_be_bytes());
        v.extend_from_slice(&ssrc.to_be_bytes());
        v
    }

    #[test]
    fn minimal_packet_has_empty_payload() {
        let pkt = Packet::parse(Bytes::from(header(0x80, 96, 0x1234, 0xdeadbeef, 0x42))).unwrap();
        assert_eq!(pkt.version, 2);
        assert!(!pkt.padding);
        assert!(!pkt.marker);
        assert_eq!(pkt.payload_type, 96);
        assert_eq!(pkt.sequence_number, 0x1234);
        assert_eq!(pkt.timestamp, 0xdeadbeef);
        assert_eq!(pkt.ssrc, 0x42);
        assert!(pkt.csrc.is_empty());
        assert!(pkt.extension.is_none());
        assert!(pkt.payload.is_empty());
    }

    #[test]
    fn too_short_rejected() {
        Packet::parse(Bytes::from_static(&[0x80; 11])).unwrap_err();
    }

    #[test]
    fn round_trip_fields() {
        // CC=2, X=1, P=1, marker, PT=97.
        let mut raw = header(0xB2, 0x80 | 97, 7, 1000, 0xabcd0123);
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(&2u32.to_be_bytes());
        // Extension: profile 0xbede, one word.
        raw.extend_from_slice(&[0xbe, 0xde, 0x00, 0x01, 1, 2, 3, 4]);
        // Payload, then two bytes of padding (count included).
        raw.extend_from_slice(&[0xaa, 0xbb, 0xcc]);
        raw.extend_from_slice(&[0x00, 0x02]);
        let pkt = Packet::parse(Bytes::from(raw)).unwrap();
        assert_eq!(pkt.version, 2);
        assert!(pkt.padding);
        assert!(pkt.marker);
        assert_eq!(pkt.payload_type, 97);
        assert_eq!(pkt.sequence_number, 7);
        assert_eq!(pkt.timestamp, 1000);
        assert_eq!(pkt.ssrc, 0xabcd0123);
        assert_eq!(pkt.csrc, vec![1, 2]);
        let ext = pkt.extension.as_ref().unwrap();
        assert_eq!(ext.profile, 0xbede);
        assert_eq!(&ext.data[..], &[1, 2, 3, 4]);
        assert_eq!(&pkt.payload[..], &[0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn truncated_csrc_rejected() {
        let raw = header(0x81, 96, 1, 2, 3);
        Packet::parse(Bytes::from(raw)).unwrap_err();
    }

    #[test]
    fn truncated_extension_rejected() {
        let mut raw = header(0x90, 96, 1, 2, 3);
        raw.extend_from_slice(&[0xbe, 0xde, 0x00, 0x02, 0, 0, 0, 0]);
        Packet::parse(Bytes::from(raw)).unwrap_err();
    }

    #[test]
    fn bad_padding_rejected() {
        let mut raw = header(0xA0, 96, 1, 2, 3);
        raw.push(200);
        Packet::parse(Bytes::from(raw)).unwrap_err();
    }
}
