//! Error types for the RTSP retriever library.

use std::fmt;

/// Errors that can occur while retrieving data from an RTSP source.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Session establishment** (fatal for the session attempt):
///   [`AuthChallengeMissing`](Self::AuthChallengeMissing),
///   [`RequestFailed`](Self::RequestFailed),
///   [`TrackNotFound`](Self::TrackNotFound).
/// - **Per packet** (recovered locally, never fatal):
///   [`TruncatedPacket`](Self::TruncatedPacket),
///   [`NoXmlStart`](Self::NoXmlStart), [`InvalidUtf8`](Self::InvalidUtf8),
///   [`MalformedXml`](Self::MalformedXml).
/// - **Connection**: [`Io`](Self::Io),
///   [`ConnectionClosed`](Self::ConnectionClosed), [`Timeout`](Self::Timeout),
///   [`Cancelled`](Self::Cancelled).
/// - **Usage**: [`InvalidState`](Self::InvalidState),
///   [`AlreadyRunning`](Self::AlreadyRunning), [`Config`](Self::Config).
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered 401 without a usable Digest challenge
    /// (no `WWW-Authenticate` header, or one lacking `realm`/`nonce`).
    #[error("missing or incomplete Digest challenge")]
    AuthChallengeMissing,

    /// A request got a non-2xx final response (after at most one 401 retry).
    #[error("{method} failed: {status} {reason}")]
    RequestFailed {
        method: &'static str,
        status: u16,
        reason: String,
    },

    /// The SDP has no `a=control:` line for the requested media kind.
    #[error("no {media} track in SDP")]
    TrackNotFound { media: String },

    /// Buffer shorter than the RTP header it declares.
    #[error("truncated RTP packet: need {needed} bytes, got {len}")]
    TruncatedPacket { needed: usize, len: usize },

    /// A completed application message contained no `<` byte.
    #[error("XML start marker '<' not found in accumulated data")]
    NoXmlStart,

    /// A completed application message was not valid UTF-8.
    #[error("failed to decode XML: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A completed application message did not look like XML.
    #[error("malformed XML message")]
    MalformedXml,

    /// The peer closed the control connection.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Nothing arrived within the configured window.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A wait was abandoned because the retriever is stopping.
    #[error("cancelled by stop request")]
    Cancelled,

    /// Failed to parse an RTSP response or SDP body.
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// An operation was called out of order (e.g. PLAY before SETUP).
    #[error("{op} not allowed in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: crate::session::SessionState,
    },

    /// [`RetrieverHandle::start`](crate::RetrieverHandle::start) was called
    /// while already running.
    #[error("retriever already running")]
    AlreadyRunning,

    /// Invalid URL or configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RetrieverError {
    /// The coarse kind reported to consumers through error events.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::AuthChallengeMissing => ErrorKind::AuthChallengeMissing,
            Self::RequestFailed { .. } => ErrorKind::RequestFailed,
            Self::TrackNotFound { .. } => ErrorKind::TrackNotFound,
            Self::TruncatedPacket { .. } => ErrorKind::TruncatedPacket,
            Self::NoXmlStart => ErrorKind::NoXmlStart,
            Self::InvalidUtf8(_) => ErrorKind::InvalidUtf8,
            Self::MalformedXml => ErrorKind::MalformedXml,
            Self::ConnectionClosed => ErrorKind::ConnectionClosed,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Parse { .. } => ErrorKind::Protocol,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::AlreadyRunning | Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        Self::Parse { kind }
    }
}

impl From<url::ParseError> for RetrieverError {
    fn from(e: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {e}"))
    }
}

/// Error category carried by [`ErrorReport`](crate::event::ErrorReport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthChallengeMissing,
    RequestFailed,
    TrackNotFound,
    TruncatedPacket,
    NoXmlStart,
    InvalidUtf8,
    MalformedXml,
    ConnectionClosed,
    Timeout,
    Cancelled,
    Io,
    Protocol,
    InvalidState,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthChallengeMissing => "auth challenge missing",
            Self::RequestFailed => "request failed",
            Self::TrackNotFound => "track not found",
            Self::TruncatedPacket => "truncated packet",
            Self::NoXmlStart => "no XML start",
            Self::InvalidUtf8 => "invalid UTF-8",
            Self::MalformedXml => "malformed XML",
            Self::ConnectionClosed => "connection closed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Io => "I/O",
            Self::Protocol => "protocol",
            Self::InvalidState => "invalid state",
            Self::Config => "configuration",
        };
        f.write_str(s)
    }
}

/// Specific kind of RTSP/SDP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Response did not start with `RTSP/1.0 <code> <reason>`.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// DESCRIBE response carried no `v=` line.
    MissingSdp,
    /// SETUP response carried no `Session` header.
    MissingSession,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::MissingSdp => write!(f, "SDP not found in response"),
            Self::MissingSession => write!(f, "Session header not found in SETUP response"),
        }
    }
}

/// Convenience alias for `Result<T, RetrieverError>`.
pub type Result<T> = std::result::Result<T, RetrieverError>;
