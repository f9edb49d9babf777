//! HTTP Digest authentication for RTSP (RFC 2617 §3, as used by RFC 2326 §22).
//!
//! When a camera answers `401 Unauthorized`, its `WWW-Authenticate` header
//! carries a challenge:
//!
//! ```text
//! WWW-Authenticate: Digest realm="AXIS_ACCC8E000000", nonce="0024e47aY398...", stale=FALSE
//! ```
//!
//! The client repeats the request with an `Authorization` header whose
//! `response` proves knowledge of the password without sending it:
//!
//! ```text
//! HA1      = MD5(username:realm:password)
//! HA2      = MD5(method:uri)
//! response = MD5(HA1:nonce:HA2)                        (no qop)
//! response = MD5(HA1:nonce:nc:cnonce:qop:HA2)          (qop=auth)
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, RetrieverError};

static REALM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\brealm\s*=\s*"([^"]*)""#).expect("static regex"));
static NONCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bnonce\s*=\s*"([^"]*)""#).expect("static regex"));
static QOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bqop\s*=\s*(?:"([^"]*)"|([^,\s]+))"#).expect("static regex")
});
static OPAQUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bopaque\s*=\s*"([^"]*)""#).expect("static regex"));

/// Nonce count. Every challenge is answered exactly once per request, and
/// nonces are never reused across a new 401, so this stays at 1.
pub const NONCE_COUNT: &str = "00000001";

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    /// Selected quality of protection. When the server offers a list
    /// (`qop="auth,auth-int"`), `auth` is chosen if present.
    pub qop: Option<String>,
    pub opaque: Option<String>,
}

impl DigestChallenge {
    /// Parses the value of a `WWW-Authenticate` header.
    ///
    /// Fails with [`RetrieverError::AuthChallengeMissing`] if `realm` or
    /// `nonce` is absent.
    pub fn parse(www_authenticate: &str) -> Result<Self> {
        let capture = |re: &Regex| {
            re.captures(www_authenticate)
                .and_then(|c| c.get(1).or_else(|| c.get(2)))
                .map(|m| m.as_str().to_owned())
        };
        let realm = capture(&REALM).ok_or(RetrieverError::AuthChallengeMissing)?;
        let nonce = capture(&NONCE).ok_or(RetrieverError::AuthChallengeMissing)?;
        let qop = capture(&QOP).and_then(|q| select_qop(&q));
        let opaque = capture(&OPAQUE);
        Ok(Self {
            realm,
            nonce,
            qop,
            opaque,
        })
    }
}

fn select_qop(offered: &str) -> Option<String> {
    let mut options = offered.split(',').map(str::trim).filter(|s| !s.is_empty());
    let first = options.clone().next()?;
    if options.any(|o| o.eq_ignore_ascii_case("auth")) {
        return Some("auth".to_owned());
    }
    Some(first.to_owned())
}

/// Computes `Authorization` header values for one set of credentials.
///
/// Stateless apart from generating a fresh client nonce per call.
#[derive(Clone)]
pub struct DigestAuthenticator {
    username: String,
    password: String,
}

impl std::fmt::Debug for DigestAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestAuthenticator")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl DigestAuthenticator {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Builds the `Authorization` value, generating a random 8-byte client nonce.
    pub fn authorize(&self, challenge: &DigestChallenge, method: &str, uri: &str) -> String {
        let cnonce = format!("{:016x}", rand::random::<u64>());
        self.authorize_with_cnonce(challenge, method, uri, &cnonce)
    }

    /// Builds the `Authorization` value with a caller-chosen client nonce.
    ///
    /// The cnonce only matters when the challenge carries a `qop`.
    pub fn authorize_with_cnonce(
        &self,
        challenge: &DigestChallenge,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> String {
        let ha1 = self.ha1(&challenge.realm);
        let ha2 = ha2(method, uri);

        let mut header = match &challenge.qop {
            Some(qop) => {
                let response = md5_hex(&format!(
                    "{ha1}:{}:{NONCE_COUNT}:{cnonce}:{qop}:{ha2}",
                    challenge.nonce
                ));
                format!(
                    "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", \
                     response=\"{}\", algorithm=\"MD5\", qop={}, nc={}, cnonce=\"{}\"",
                    self.username,
                    challenge.realm,
                    challenge.nonce,
                    uri,
                    response,
                    qop,
                    NONCE_COUNT,
                    cnonce
                )
            }
            None => {
                let response = md5_hex(&format!("{ha1}:{}:{ha2}", challenge.nonce));
                format!(
                    "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", \
                     response=\"{}\", algorithm=\"MD5\"",
                    self.username, challenge.realm, challenge.nonce, uri, response
                )
            }
        };
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(", opaque=\"{opaque}\""));
        }
        header
    }

    /// `MD5(username:realm:password)`.
    pub fn ha1(&self, realm: &str) -> String {
        md5_hex(&format!("{}:{}:{}", self.username, realm, self.password))
    }
}

/// `MD5(method:uri)`.
pub fn ha2(method: &str, uri: &str) -> String {
    md5_hex(&format!("{method}:{uri}"))
}

/// Lowercase hex MD5 digest.
pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}
