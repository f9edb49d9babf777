use super::DEFAULT_SESSION_TIMEOUT_SECS;

/// Interleaved channel pair carried in a `Transport` header (RFC 2326 §12.39).
///
/// ## Wire format example
///
/// ```text
/// Client → Server:
///   Transport: RTP/AVP/TCP;unicast;interleaved=0-1
///
/// Server → Client:
///   Transport: RTP/AVP/TCP;unicast;interleaved=0-1;ssrc=1A2B3C4D;mode="PLAY"
/// ```
///
/// RTP for the track arrives on `rtp_channel`, RTCP on `rtcp_channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterleavedChannels {
    pub rtp_channel: u8,
    pub rtcp_channel: u8,
}

impl InterleavedChannels {
    pub const VIDEO: Self = Self::new(0);
    pub const APPLICATION: Self = Self::new(2);

    /// The pair `rtp-(rtp+1)`.
    pub const fn new(rtp_channel: u8) -> Self {
        InterleavedChannels {
            rtp_channel,
            rtcp_channel: rtp_channel.wrapping_add(1),
        }
    }

    /// The `Transport` request value asking for this pair.
    pub fn request_header(&self) -> String {
        format!(
            "RTP/AVP/TCP;unicast;interleaved={}-{}",
            self.rtp_channel, self.rtcp_channel
        )
    }

    /// Parse the `interleaved=a-b` (or `interleaved=a`) parameter of a
    /// `Transport` header value.
    ///
    /// ```
    /// use retriever::session::transport::InterleavedChannels;
    ///
    /// let ch = InterleavedChannels::parse("RTP/AVP/TCP;unicast;interleaved=2-3;mode=\"PLAY\"").unwrap();
    /// assert_eq!(ch.rtp_channel, 2);
    /// assert_eq!(ch.rtcp_channel, 3);
    ///
    /// assert!(InterleavedChannels::parse("RTP/AVP;unicast;client_port=8000-8001").is_none());
    /// ```
    pub fn parse(header: &str) -> Option<Self> {
        for part in header.split(';') {
            let part = part.trim();
            if let Some(channels) = part.strip_prefix("interleaved=") {
                let mut ids = channels.split('-');
                let rtp_channel: u8 = ids.next()?.trim().parse().ok()?;
                let rtcp_channel = match ids.next() {
                    Some(id) => id.trim().parse().ok()?,
                    None => rtp_channel.wrapping_add(1),
                };
                return Some(InterleavedChannels {
                    rtp_channel,
                    rtcp_channel,
                });
            }
        }
        None
    }
}

/// Parsed `Session` response header (RFC 2326 §12.37).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHeader {
    /// Session id, without any `;` parameters.
    pub id: String,
    /// `timeout=` in seconds, 60 when absent.
    pub timeout_secs: u64,
}

impl SessionHeader {
    /// ```
    /// use retriever::session::transport::SessionHeader;
    ///
    /// let s = SessionHeader::parse("12345678;timeout=30").unwrap();
    /// assert_eq!(s.id, "12345678");
    /// assert_eq!(s.timeout_secs, 30);
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(';');
        let id = parts.next()?.trim();
        if id.is_empty() {
            return None;
        }
        let timeout_secs = parts
            .filter_map(|p| p.trim().strip_prefix("timeout="))
            .find_map(|t| t.trim().parse().ok())
            .unwrap_or(DEFAULT_SESSION_TIMEOUT_SECS);
        Some(SessionHeader {
            id: id.to_string(),
            timeout_secs,
        })
    }
}
