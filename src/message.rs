//! RTSP/1.0 message types: request serialization and response parsing.

use bytes::{BufMut, Bytes, BytesMut};
use failure::{bail, Error};
use std::fmt;

/// Largest header section accepted before the parser gives up on finding
/// the `\r\n\r\n` terminator.
const MAX_HEADER_LEN: usize = 8192;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    Options,
    Describe,
    Setup,
    Play,
    Teardown,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Options => "OPTIONS",
            Method::Describe => "DESCRIBE",
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request. Every request carries `Content-Length` and a
/// RFC 1123 `Date`; DESCRIBE and PLAY additionally carry
/// `Accept: application/sdp`.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, uri: &str) -> Self {
        let mut req = Request {
            method,
            uri: uri.to_owned(),
            headers: Vec::new(),
            body: Vec::new(),
        };
        req.set_header("Content-Length", "0");
        req.set_header("Date", &date_value());
        if let Method::Describe | Method::Play = method {
            req.set_header("Accept", "application/sdp");
        }
        req
    }

    /// Sets a header, replacing any previous value of the same name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let Some(slot) = self.headers.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value.to_owned();
            return;
        }
        self.headers.push((name.to_owned(), value.to_owned()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn write(&self, dst: &mut BytesMut) {
        dst.reserve(64 + self.uri.len() + 32 * self.headers.len() + self.body.len());
        dst.put_slice(self.method.as_str().as_bytes());
        dst.put_u8(b' ');
        dst.put_slice(self.uri.as_bytes());
        dst.put_slice(b" RTSP/1.0\r\n");
        for (name, value) in &self.headers {
            dst.put_slice(name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        dst.put_slice(&self.body);
    }
}

/// RFC 1123 date, always GMT.
fn date_value() -> String {
    time::now_utc()
        .strftime("%a, %d %b %Y %H:%M:%S GMT")
        .expect("fixed format string is valid")
        .to_string()
}

/// An incoming response. `total_len` is the number of bytes the message
/// occupied in the receive buffer, including the body.
#[derive(Debug)]
pub struct Response {
    pub version: String,
    pub status: u16,
    pub reason: String,
    headers: Vec<(String, String)>,
    pub body: Bytes,
    pub total_len: usize,
}

impl Response {
    /// Parses a response from the front of `data`. Returns `Ok(None)` when
    /// more bytes are needed and an error when the buffer can never become
    /// a valid response.
    pub fn parse(data: &[u8]) -> Result<Option<Response>, Error> {
        const MAGIC: &[u8] = b"RTSP/1.0";
        if !data.starts_with(MAGIC) {
            if data.len() < MAGIC.len() && MAGIC.starts_with(data) {
                return Ok(None);
            }
            bail!("response does not begin with RTSP/1.0");
        }
        let hdr_end = match find_header_end(data) {
            Some(i) => i,
            None if data.len() < MAX_HEADER_LEN => return Ok(None),
            None => bail!("response header section exceeds {} bytes", MAX_HEADER_LEN),
        };
        let head = std::str::from_utf8(&data[..hdr_end])
            .map_err(|_| failure::format_err!("response header section is not UTF-8"))?;
        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or("");
        let mut tokens = status_line.splitn(3, ' ');
        let (version, status, reason) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(v), Some(s), Some(r)) => (v, s, r),
            _ => bail!("malformed status line {:?}", status_line),
        };
        let status: u16 = match status.parse() {
            Ok(s) => s,
            Err(_) => bail!("unparseable status code in {:?}", status_line),
        };
        let mut headers = Vec::new();
        for line in lines {
            match line.split_once(':') {
                Some((name, value)) => headers.push((name.to_owned(), value.trim().to_owned())),
                None => bail!("header line without a colon: {:?}", line),
            }
        }
        let mut total_len = hdr_end + 4;
        let mut body = Bytes::new();
        if let Some((_, v)) = headers.iter().find(|(n, _)| n == "Content-Length") {
            let content_len: usize = match v.trim().parse() {
                Ok(l) => l,
                Err(_) => bail!("unparseable Content-Length {:?}", v),
            };
            if data.len() < total_len + content_len {
                return Ok(None);
            }
            body = Bytes::copy_from_slice(&data[total_len..total_len + content_len]);
            total_len += content_len;
        }
        Ok(Some(Response {
            version: version.to_owned(),
            status,
            reason: reason.to_owned(),
            headers,
            body,
            total_len,
        }))
    }

    /// Looks a header up by exact name, as received.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.version, self.status, self.reason)?;
        for (name, value) in &self.headers {
            write!(f, "\n{}: {}", name, value)?;
        }
        Ok(())
    }
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}
