use crate::error::{ParseErrorKind, Result, RetrieverError};

/// A parsed RTSP response (RFC 2326 §7).
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 2\r\n
/// Content-Type: application/sdp\r\n
/// Content-Length: 142\r\n
/// \r\n
/// v=0\r\n...
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2.
#[derive(Debug, Clone)]
pub struct RtspResponse {
    pub status_code: u16,
    pub reason: String,
    /// Headers as ordered (name, value) pairs, names stored as received.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RtspResponse {
    /// Parse one complete response: status line, headers, blank line and
    /// (optionally) the body.
    pub fn parse(raw: &str) -> Result<Self> {
        let (head, body) = match raw.find("\r\n\r\n") {
            Some(i) => (&raw[..i], &raw[i + 4..]),
            None => match raw.find("\n\n") {
                Some(i) => (&raw[..i], &raw[i + 2..]),
                None => (raw, ""),
            },
        };
        let mut lines = head.lines();

        let status_line = lines
            .next()
            .ok_or(RetrieverError::parse(ParseErrorKind::InvalidStatusLine))?;
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("RTSP/") {
            return Err(RetrieverError::parse(ParseErrorKind::InvalidStatusLine));
        }
        let status_code: u16 = parts
            .next()
            .and_then(|c| c.trim().parse().ok())
            .ok_or(RetrieverError::parse(ParseErrorKind::InvalidStatusLine))?;
        let reason = parts.next().unwrap_or_default().trim().to_string();

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let colon_pos = line
                .find(':')
                .ok_or(RetrieverError::parse(ParseErrorKind::InvalidHeader))?;
            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            headers.push((name, value));
        }

        Ok(RtspResponse {
            status_code,
            reason,
            headers,
            body: body.to_string(),
        })
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn cseq(&self) -> Option<u32> {
        self.get_header("CSeq").and_then(|v| v.parse().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Length of the header block including its terminating blank line, if the
/// buffer holds one.
pub fn header_len(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Value of `Content-Length` in a header block, 0 if absent or unparsable.
pub fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Total length of the first complete text message in `buf` (headers plus
/// any declared body), or `None` if more bytes are needed.
///
/// ```
/// use retriever::protocol::response::message_len;
///
/// assert_eq!(message_len(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n$"), Some(28));
/// assert_eq!(message_len(b"RTSP/1.0 200 OK\r\nContent-Length: 3\r\n\r\nv="), None);
/// ```
pub fn message_len(buf: &[u8]) -> Option<usize> {
    let head = header_len(buf)?;
    let total = head + content_length(&buf[..head]);
    (buf.len() >= total).then_some(total)
}
