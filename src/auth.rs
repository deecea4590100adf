//! RTSP Digest authentication (the RFC 2069 subset cameras speak: no
//! qop, no cnonce, MD5 only).

use failure::{bail, format_err, Error};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestAuth {
    pub realm: String,
    pub nonce: String,
}

impl DigestAuth {
    /// Parses a `WWW-Authenticate` header value. Anything other than a
    /// Digest challenge is an error; there is no Basic fallback.
    pub fn parse(challenge: &str) -> Result<DigestAuth, Error> {
        let challenge = challenge.trim();
        let rest = challenge
            .strip_prefix("Digest")
            .ok_or_else(|| format_err!("only Digest authentication is supported, got {:?}", challenge))?;
        let mut realm = None;
        let mut nonce = None;
        for part in rest.split(',') {
            let part = part.trim();
            if let Some(v) = part.strip_prefix("realm=") {
                realm = Some(unquote(v));
            } else if let Some(v) = part.strip_prefix("nonce=") {
                nonce = Some(unquote(v));
            }
        }
        match (realm, nonce) {
            (Some(realm), Some(nonce)) => Ok(DigestAuth { realm, nonce }),
            _ => bail!("digest challenge missing realm or nonce: {:?}", challenge),
        }
    }

    /// Builds an `Authorization` header value for the given request.
    ///
    /// `response = MD5(MD5(user:realm:pw) ":" nonce ":" MD5(method:uri))`
    pub fn authorization(&self, username: &str, password: &str, method: &str, uri: &str) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", username, self.realm, password));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        let response = md5_hex(&format!("{}:{}:{}", ha1, self.nonce, ha2));
        format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            username, self.realm, self.nonce, uri, response
        )
    }
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input))
}

fn unquote(v: &str) -> String {
    v.trim().trim_matches('"').to_owned()
}
