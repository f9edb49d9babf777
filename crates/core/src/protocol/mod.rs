//! RTSP client protocol (RFC 2326).
//!
//! This module handles the text-based RTSP signaling: building requests,
//! parsing responses, answering Digest challenges and reading SDP.
//!
//! ## RTSP message format (RFC 2326 §4)
//!
//! RTSP messages follow HTTP/1.1 syntax with a different method set:
//!
//! ```text
//! DESCRIBE rtsp://server/stream RTSP/1.0\r\n
//! CSeq: 2\r\n
//! Accept: application/sdp\r\n
//! \r\n
//! ```
//!
//! ## Methods issued
//!
//! | Method | RFC section | Purpose |
//! |--------|-------------|---------|
//! | DESCRIBE | §10.2 | Retrieve SDP session description |
//! | SETUP | §10.4 | Negotiate interleaved TCP transport |
//! | PLAY | §10.5 | Start media delivery |
//! | GET_PARAMETER | §10.8 | Keepalive |
//! | TEARDOWN | §10.7 | Destroy session |

pub mod auth;
pub mod request;
pub mod response;
pub mod sdp;

pub use auth::{DigestAuthenticator, DigestChallenge};
pub use request::{Method, RtspRequest};
pub use response::RtspResponse;
pub use sdp::{MediaKind, MediaTrack};
