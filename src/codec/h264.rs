//! H.264 RTP depacketization (RFC 6184): single NAL packets plus
//! FU-A/FU-B reassembly into Annex-B access units.

use bytes::{BufMut, Bytes, BytesMut};
use failure::{bail, Error};
use log::warn;

use crate::codec::{AnnexBSink, START_CODE};
use crate::rtp;

/// Reassembles NAL units into an accumulator that always begins with a
/// four-byte start code; between emissions it holds nothing else.
#[derive(Debug)]
pub struct Depacketizer {
    acc: BytesMut,
}

impl Depacketizer {
    pub fn new() -> Self {
        let mut acc = BytesMut::new();
        acc.put_slice(&START_CODE);
        Depacketizer { acc }
    }

    pub fn push(&mut self, pkt: &rtp::Packet, sink: AnnexBSink<'_>) -> Result<(), Error> {
        let payload = &pkt.payload;
        if payload.is_empty() {
            bail!("empty H.264 payload at seq {:04x}", pkt.sequence_number);
        }
        // https://tools.ietf.org/html/rfc6184#section-5.2
        match payload[0] & 0x1F {
            1..=23 => {
                self.acc.put_slice(payload);
                self.emit(pkt.timestamp, sink)
            }
            28 => self.push_fu(pkt, 2, sink),
            29 => self.push_fu(pkt, 4, sink),
            t => bail!(
                "unsupported H.264 packetization type {} at seq {:04x}",
                t,
                pkt.sequence_number
            ),
        }
    }

    // +---------------+
    // |0|1|2|3|4|5|6|7|
    // +-+-+-+-+-+-+-+-+
    // |S|E|R|  Type   |
    // +---------------+
    fn push_fu(&mut self, pkt: &rtp::Packet, prefix_len: usize, sink: AnnexBSink<'_>) -> Result<(), Error> {
        let payload = &pkt.payload;
        if payload.len() <= prefix_len {
            bail!(
                "fragmentation unit of {} bytes is too short at seq {:04x}",
                payload.len(),
                pkt.sequence_number
            );
        }
        let fu_header = payload[1];
        let start = (fu_header & 0x80) != 0;
        let end = (fu_header & 0x40) != 0;
        if start {
            if self.acc.len() > START_CODE.len() {
                warn!(
                    "fragment start at seq {:04x} with {} buffered bytes; dropping partial NAL (packet loss?)",
                    pkt.sequence_number,
                    self.acc.len()
                );
                self.acc.truncate(START_CODE.len());
            }
            self.acc.put_u8((payload[0] & 0xE0) | (fu_header & 0x1F));
        }
        self.acc.put_slice(&payload[prefix_len..]);
        if end {
            self.emit(pkt.timestamp, sink)?;
        }
        Ok(())
    }

    fn emit(&mut self, timestamp: u32, sink: AnnexBSink<'_>) -> Result<(), Error> {
        let unit = Bytes::copy_from_slice(&self.acc);
        self.acc.truncate(START_CODE.len());
        sink(unit, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::Depacketizer;
    use crate::rtp;
    use bytes::Bytes;

    fn packet(seq: u16, ts: u32, payload: &[u8]) -> rtp::Packet {
        let mut raw = vec![0x80, 96];
        raw.extend_from_slice(&seq.to_be_bytes());
        raw.extend_from_slice(&ts.to_be_bytes());
        raw.extend_from_slice(&1u32.to_be_bytes());
        raw.extend_from_slice(payload);
        rtp::Packet::parse(Bytes::from(raw)).unwrap()
    }

    fn collect(d: &mut Depacketizer, pkts: &[rtp::Packet]) -> Vec<(Vec<u8>, u32)> {
        let mut out = Vec::new();
        for p in pkts {
            d.push(p, &mut |unit, ts| {
                out.push((unit.to_vec(), ts));
                Ok(())
            })
            .unwrap();
        }
        out
    }

    #[test]
    fn single_nal() {
        let mut d = Depacketizer::new();
        let out = collect(&mut d, &[packet(1, 90000, &[0x67, 0x42, 0x00, 0x1e])]);
        assert_eq!(out, vec![(vec![0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1e], 90000)]);
        assert_eq!(d.acc.len(), 4, "accumulator holds only the start code between units");
    }

    #[test]
    fn fu_a_reassembly() {
        let mut d = Depacketizer::new();
        let mut out = Vec::new();
        // Start fragment of an IDR slice, then the end fragment.
        d.push(&packet(1, 1000, &[0x7C, 0x85, 0xAA]), &mut |unit, ts| {
            out.push((unit.to_vec(), ts));
            Ok(())
        })
        .unwrap();
        assert!(out.is_empty());
        assert!(d.acc.len() > 4);
        d.push(&packet(2, 1000, &[0x7C, 0x45, 0xBB]), &mut |unit, ts| {
            out.push((unit.to_vec(), ts));
            Ok(())
        })
        .unwrap();
        // Reconstructed header: (0x7C & 0xE0) | (0x85 & 0x1F) = 0x65.
        assert_eq!(out, vec![(vec![0, 0, 0, 1, 0x65, 0xAA, 0xBB], 1000)]);
        assert_eq!(d.acc.len(), 4);
    }

    #[test]
    fn fu_b_uses_longer_prefix() {
        let mut d = Depacketizer::new();
        // FU-B carries a two-byte DON after the FU header.
        let out = collect(
            &mut d,
            &[
                packet(1, 5, &[0x7D, 0x85, 0x00, 0x01, 0xAA]),
                packet(2, 5, &[0x7D, 0x45, 0x00, 0x02, 0xBB]),
            ],
        );
        assert_eq!(out, vec![(vec![0, 0, 0, 1, 0x65, 0xAA, 0xBB], 5)]);
        assert_eq!(d.acc.len(), 4);
    }

    #[test]
    fn start_bit_discards_stale_fragment() {
        let mut d = Depacketizer::new();
        let mut out = Vec::new();
        // Start without end, then another start: the first unit was lost.
        d.push(&packet(1, 1000, &[0x7C, 0x85, 0xAA]), &mut |_, _| {
            panic!("nothing should be emitted")
        })
        .unwrap();
        d.push(&packet(3, 2000, &[0x7C, 0x85, 0xCC]), &mut |_, _| {
            panic!("nothing should be emitted")
        })
        .unwrap();
        d.push(&packet(4, 2000, &[0x7C, 0x45, 0xDD]), &mut |unit, ts| {
            out.push((unit.to_vec(), ts));
            Ok(())
        })
        .unwrap();
        assert_eq!(out, vec![(vec![0, 0, 0, 1, 0x65, 0xCC, 0xDD], 2000)]);
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let mut d = Depacketizer::new();
        // STAP-A (24) is not handled.
        d.push(&packet(1, 0, &[0x78, 0x00]), &mut |_, _| Ok(()))
            .unwrap_err();
        assert_eq!(d.acc.len(), 4);
    }

    #[test]
    fn empty_payload_is_an_error() {
        let mut d = Depacketizer::new();
        d.push(&packet(1, 0, &[]), &mut |_, _| Ok(())).unwrap_err();
    }
}
