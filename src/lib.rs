//! RTSP 1.0 client for pulling live H.264/H.265 (and G.711/AAC audio)
//! over TCP-interleaved RTP. Whole Annex-B access units are delivered to
//! an application callback; see [client::Client].

use bytes::{Buf, Bytes, BytesMut};

pub mod auth;
pub mod client;
pub mod codec;
pub mod message;
pub mod rtp;
pub mod sdp;

pub use client::{Client, Credentials};
pub use codec::{CodecId, Frame};

/// One unit from the server: an RTSP response or an interleaved binary
/// frame from a `$`-prefixed channel.
#[derive(Debug)]
pub enum Message {
    Response(message::Response),
    Data { channel: u8, payload: Bytes },
}

/// Demultiplexes the single TCP byte stream into RTSP responses and
/// interleaved RTP/RTCP frames, and serializes outgoing requests.
pub struct Codec {}

impl tokio_util::codec::Decoder for Codec {
    type Item = Message;
    type Error = failure::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        // https://tools.ietf.org/html/rfc2326#section-10.12
        if src[0] == b'$' {
            if src.len() < 4 {
                return Ok(None);
            }
            let len = usize::from(u16::from_be_bytes([src[2], src[3]]));
            if src.len() < 4 + len {
                src.reserve(4 + len - src.len());
                return Ok(None);
            }
            let channel = src[1];
            let payload = src.split_to(4 + len).freeze().slice(4..);
            return Ok(Some(Message::Data { channel, payload }));
        }
        match message::Response::parse(&src[..])? {
            None => Ok(None),
            Some(resp) => {
                src.advance(resp.total_len);
                Ok(Some(Message::Response(resp)))
            }
        }
    }
}

impl tokio_util::codec::Encoder<message::Request> for Codec {
    type Error = failure::Error;

    fn encode(&mut self, item: message::Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.write(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Codec, Message};
    use bytes::BytesMut;
    use tokio_util::codec::Decoder;

    #[test]
    fn demuxes_data_frame_ahead_of_response() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"$\x00\x00\x0C");
        buf.extend_from_slice(&[0x80, 96, 0, 1, 0, 0, 0, 2, 0, 0, 0, 3]);
        buf.extend_from_slice(b"RTSP/1.0 200 OK\r\nCSeq: 9\r\n\r\n");
        let mut codec = Codec {};
        match codec.decode(&mut buf).unwrap().unwrap() {
            Message::Data { channel, payload } => {
                assert_eq!(channel, 0);
                assert_eq!(payload.len(), 12);
            }
            other => panic!("expected data frame, got {:?}", other),
        }
        match codec.decode(&mut buf).unwrap().unwrap() {
            Message::Response(resp) => {
                assert_eq!(resp.status, 200);
                assert_eq!(resp.header("CSeq"), Some("9"));
            }
            other => panic!("expected response, got {:?}", other),
        }
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn zero_length_frame_consumes_four_bytes() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"$\x05\x00\x00rest");
        let mut codec = Codec {};
        match codec.decode(&mut buf).unwrap().unwrap() {
            Message::Data { channel, payload } => {
                assert_eq!(channel, 5);
                assert!(payload.is_empty());
            }
            other => panic!("expected data frame, got {:?}", other),
        }
        assert_eq!(&buf[..], b"rest");
    }

    #[test]
    fn partial_data_frame_waits() {
        let mut codec = Codec {};
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"$\x00");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\x00\x05abc");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"de");
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn garbage_is_an_error() {
        let mut codec = Codec {};
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"HTTP/1.1 200 OK\r\n\r\n");
        codec.decode(&mut buf).unwrap_err();
    }
}
