//! Minimal SDP parsing: just the pieces an RTSP `DESCRIBE` body needs —
//! `m=` lines plus the `control`, `rtpmap`, and `fmtp` attributes. Other
//! line types are ignored and unrecognized attributes retained verbatim.

use failure::{bail, format_err, Error};

#[derive(Debug, Default)]
pub struct SessionDescription {
    /// Session-level `a=control` value, if any.
    pub control: Option<String>,
    pub attributes: Vec<Attribute>,
    pub medias: Vec<MediaDescription>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

/// One `m=<media> <port> <proto> <fmt>...` section and its attributes.
#[derive(Debug)]
pub struct MediaDescription {
    pub media: String,
    pub ports: Vec<u16>,
    pub proto: String,
    pub formats: Vec<u8>,
    pub rtpmap: Option<Rtpmap>,
    pub fmtp: Option<Fmtp>,
    pub control: Option<String>,
    pub attributes: Vec<Attribute>,
}

/// `a=rtpmap:<payload type> <encoding name>/<clock rate>[/<encoding parameters>]`
#[derive(Debug, PartialEq, Eq)]
pub struct Rtpmap {
    pub payload_type: u8,
    pub encoding_name: String,
    pub clock_rate: u32,
    pub encoding_params: Option<String>,
}

/// `a=fmtp:<format> <format specific parameters>`
#[derive(Debug, PartialEq, Eq)]
pub struct Fmtp {
    pub format: u8,
    pub parameters: String,
}

pub fn parse(sdp: &str) -> Result<SessionDescription, Error> {
    let mut session = SessionDescription::default();
    // Split on either line ending; `\r\n` leaves empty segments behind.
    for line in sdp.split(|c| c == '\r' || c == '\n').filter(|l| !l.is_empty()) {
        if let Some(rest) = line.strip_prefix("m=") {
            session.medias.push(MediaDescription::parse(rest)?);
        } else if let Some(rest) = line.strip_prefix("a=") {
            let attr = Attribute::parse(rest);
            let media = session.medias.last_mut();
            match attr.name.as_str() {
                "control" => {
                    let value = attr.value.unwrap_or_default();
                    match media {
                        Some(m) => m.control = Some(value),
                        None => session.control = Some(value),
                    }
                }
                "rtpmap" => {
                    let media = media.ok_or_else(|| format_err!("rtpmap attribute before any m= line"))?;
                    let value = attr
                        .value
                        .ok_or_else(|| format_err!("rtpmap attribute with no value"))?;
                    media.rtpmap = Some(Rtpmap::parse(&value)?);
                }
                "fmtp" => {
                    let media = media.ok_or_else(|| format_err!("fmtp attribute before any m= line"))?;
                    let value = attr
                        .value
                        .ok_or_else(|| format_err!("fmtp attribute with no value"))?;
                    media.fmtp = Some(Fmtp::parse(&value)?);
                }
                _ => match media {
                    Some(m) => m.attributes.push(attr),
                    None => session.attributes.push(attr),
                },
            }
        }
    }
    Ok(session)
}

impl Attribute {
    fn parse(s: &str) -> Attribute {
        match s.split_once(':') {
            Some((name, value)) => Attribute {
                name: name.to_owned(),
                value: Some(value.to_owned()),
            },
            None => Attribute {
                name: s.to_owned(),
                value: None,
            },
        }
    }
}

impl MediaDescription {
    fn parse(s: &str) -> Result<MediaDescription, Error> {
        let tokens: Vec<&str> = s.split(' ').collect();
        if tokens.len() < 4 {
            bail!("malformed media description {:?}", s);
        }
        // `<port>/<count>` announces a contiguous range.
        let ports = match tokens[1].split_once('/') {
            Some((first, count)) => {
                let first: u16 = first
                    .parse()
                    .map_err(|_| format_err!("bad port in media description {:?}", s))?;
                let count: u16 = count
                    .parse()
                    .map_err(|_| format_err!("bad port count in media description {:?}", s))?;
                (0..count).map(|i| first + i).collect()
            }
            None => vec![tokens[1]
                .parse()
                .map_err(|_| format_err!("bad port in media description {:?}", s))?],
        };
        let formats = tokens[3..]
            .iter()
            .map(|t| {
                t.parse()
                    .map_err(|_| format_err!("bad format {:?} in media description {:?}", t, s))
            })
            .collect::<Result<Vec<u8>, Error>>()?;
        Ok(MediaDescription {
            media: tokens[0].to_owned(),
            ports,
            proto: tokens[2].to_owned(),
            formats,
            rtpmap: None,
            fmtp: None,
            control: None,
            attributes: Vec::new(),
        })
    }
}

impl Rtpmap {
    fn parse(s: &str) -> Result<Rtpmap, Error> {
        let (pt, rest) = s
            .split_once(' ')
            .ok_or_else(|| format_err!("malformed rtpmap {:?}", s))?;
        let payload_type: u8 = pt.parse().map_err(|_| format_err!("bad payload type in rtpmap {:?}", s))?;
        let mut parts = rest.split('/');
        let encoding_name = parts
            .next()
            .ok_or_else(|| format_err!("malformed rtpmap {:?}", s))?
            .to_owned();
        let clock_rate: u32 = parts
            .next()
            .ok_or_else(|| format_err!("rtpmap without clock rate {:?}", s))?
            .parse()
            .map_err(|_| format_err!("bad clock rate in rtpmap {:?}", s))?;
        let encoding_params = parts.next().map(str::to_owned);
        Ok(Rtpmap {
            payload_type,
            encoding_name,
            clock_rate,
            encoding_params,
        })
    }
}

impl Fmtp {
    fn parse(s: &str) -> Result<Fmtp, Error> {
        let (format, parameters) = match s.split_once(' ') {
            Some((f, p)) => (f, p),
            None => (s, ""),
        };
        let format: u8 = format
            .parse()
            .map_err(|_| format_err!("bad format number in fmtp {:?}", s))?;
        Ok(Fmtp {
            format,
            parameters: parameters.to_owned(),
        })
    }
}
