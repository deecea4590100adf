//! H.265 RTP depacketization (RFC 7798): single NAL packets plus FU
//! reassembly. Aggregation (AP) and PACI packets are not handled.

use bytes::{BufMut, Bytes, BytesMut};
use failure::{bail, Error};
use log::warn;

use crate::codec::{AnnexBSink, START_CODE};
use crate::rtp;

/// Payload structure types from RFC 7798 section 4.4.
const TYPE_AP: u8 = 48;
const TYPE_FU: u8 = 49;
const TYPE_PACI: u8 = 50;

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
        if payload.len() < 2 {
            bail!("H.265 payload of {} bytes at seq {:04x} is too short", payload.len(), pkt.sequence_number);
        }
        match (payload[0] >> 1) & 0x3F {
            TYPE_AP => bail!("H.265 aggregation packet at seq {:04x} is not supported", pkt.sequence_number),
            TYPE_FU => self.push_fu(pkt, sink),
            TYPE_PACI => bail!("H.265 PACI packet at seq {:04x} is not supported", pkt.sequence_number),
            _ => {
                self.acc.put_slice(payload);
                self.emit(pkt.timestamp, sink)
            }
        }
    }

    // +---------------+
    // |0|1|2|3|4|5|6|7|
    // +-+-+-+-+-+-+-+-+
    // |S|E|  FuType   |
    // +---------------+
    fn push_fu(&mut self, pkt: &rtp::Packet, sink: AnnexBSink<'_>) -> Result<(), Error> {
        let payload = &pkt.payload;
        // Two-byte PayloadHdr, one-byte FU header, then at least one byte.
        if payload.len() <= 3 {
            bail!(
                "H.265 fragmentation unit of {} bytes is too short at seq {:04x}",
                payload.len(),
                pkt.sequence_number
            );
        }
        let fu_header = payload[2];
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
            // Rebuild the two-byte NAL unit header from the FU type.
            self.acc.put_u8((payload[0] & 0x81) | ((fu_header & 0x3F) << 1));
            self.acc.put_u8(payload[1]);
        }
        self.acc.put_slice(&payload[3..]);
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
