use std::fmt;

/// RTSP methods issued by the client (RFC 2326 §10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Describe,
    Setup,
    Play,
    GetParameter,
    Teardown,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Describe => "DESCRIBE",
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::GetParameter => "GET_PARAMETER",
            Method::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing RTSP request (RFC 2326 §6).
///
/// Serializes to:
///
/// ```text
/// METHOD uri RTSP/1.0\r\n
/// CSeq: n\r\n
/// User-Agent: ...\r\n
/// [Session: id\r\n]
/// [extra headers\r\n]
/// [Authorization: ...\r\n]
/// \r\n
/// ```
///
/// Chain [`header`](Self::header) and friends, then call
/// [`serialize`](Self::serialize).
///
/// ```
/// use retriever::protocol::request::{Method, RtspRequest};
///
/// let req = RtspRequest::new(Method::Describe, "rtsp://cam/stream", 1, "test/1.0")
///     .header("Accept", "application/sdp");
/// assert_eq!(
///     req.serialize(),
///     "DESCRIBE rtsp://cam/stream RTSP/1.0\r\n\
///      CSeq: 1\r\n\
///      User-Agent: test/1.0\r\n\
///      Accept: application/sdp\r\n\r\n"
/// );
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct RtspRequest {
    pub method: Method,
    pub uri: String,
    pub cseq: u32,
    pub user_agent: String,
    pub session: Option<String>,
    /// Extra headers in insertion order.
    pub headers: Vec<(String, String)>,
    pub authorization: Option<String>,
}

impl RtspRequest {
    pub fn new(method: Method, uri: &str, cseq: u32, user_agent: &str) -> Self {
        RtspRequest {
            method,
            uri: uri.to_string(),
            cseq,
            user_agent: user_agent.to_string(),
            session: None,
            headers: Vec::new(),
            authorization: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn session(mut self, id: Option<&str>) -> Self {
        self.session = id.map(str::to_string);
        self
    }

    pub fn authorization(mut self, value: Option<String>) -> Self {
        self.authorization = value;
        self
    }

    pub fn serialize(&self) -> String {
        let mut out = format!("{} {} RTSP/1.0\r\n", self.method, self.uri);
        out.push_str(&format!("CSeq: {}\r\n", self.cseq));
        out.push_str(&format!("User-Agent: {}\r\n", self.user_agent));
        if let Some(session) = &self.session {
            out.push_str(&format!("Session: {session}\r\n"));
        }
        for (name, value) in &self.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        if let Some(auth) = &self.authorization {
            out.push_str(&format!("Authorization: {auth}\r\n"));
        }
        out.push_str("\r\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_setup_with_session_and_auth() {
        let req = RtspRequest::new(Method::Setup, "rtsp://cam/s/trackID=2", 4, "ua")
            .session(Some("ABCDEF"))
            .header("Transport", "RTP/AVP/TCP;unicast;interleaved=2-3")
            .authorization(Some("Digest x".into()));
        let s = req.serialize();
        assert!(s.starts_with("SETUP rtsp://cam/s/trackID=2 RTSP/1.0\r\nCSeq: 4\r\nUser-Agent: ua\r\n"));
        let session = s.find("Session: ABCDEF\r\n").unwrap();
        let transport = s.find("Transport: ").unwrap();
        let auth = s.find("Authorization: Digest x\r\n").unwrap();
        assert!(session < transport && transport < auth);
        assert!(s.ends_with("\r\n\r\n"));
    }

    #[test]
    fn no_session_no_auth() {
        let s = RtspRequest::new(Method::Teardown, "rtsp://cam/s", 9, "ua").serialize();
        assert!(!s.contains("Session:"));
        assert!(!s.contains("Authorization:"));
    }

    #[test]
    fn method_names() {
        assert_eq!(Method::GetParameter.to_string(), "GET_PARAMETER");
        assert_eq!(Method::Teardown.as_str(), "TEARDOWN");
    }
}
