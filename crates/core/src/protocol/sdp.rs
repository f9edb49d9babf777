//! SDP (Session Description Protocol) track discovery (RFC 4566 / RFC 8866).
//!
//! Reads the body of a DESCRIBE response. The lines that matter here:
//!
//! ```text
//! v=0                                          ← start of the description
//! m=video 0 RTP/AVP 96                         ← media section: kind, formats
//! a=rtpmap:96 H264/90000                       ← encoding / clock rate
//! a=fmtp:96 packetization-mode=1;sprop-parameter-sets=Z0IAKeKQ...,aM48gA==
//! a=control:rtsp://cam/axis-media/media.amp/trackID=1
//! m=application 0 RTP/AVP 98
//! a=rtpmap:98 vnd.onvif.metadata/90000
//! a=control:trackID=2
//! ```
//!
//! An `a=control:` line belongs to the media section opened by the
//! preceding `m=` line. Session-level control attributes are ignored.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::error::{ParseErrorKind, Result, RetrieverError};

/// Media kind from an `m=` line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Application,
    Other(String),
}

impl MediaKind {
    /// Media type of an `m=` line, compared without regard to case.
    pub fn from_sdp(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "video" => MediaKind::Video,
            "application" => MediaKind::Application,
            other => MediaKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Application => "application",
            MediaKind::Other(s) => s,
        }
    }
}

/// One media section of an SDP description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub kind: MediaKind,
    /// Control attribute as written in the SDP (possibly relative).
    pub control: Option<String>,
    /// First format listed on the `m=` line.
    pub payload_type: Option<u8>,
    /// `a=rtpmap` encoding name, e.g. `H264` or `vnd.onvif.metadata`.
    pub encoding: Option<String>,
    pub clock_rate: Option<u32>,
    /// Raw `a=fmtp` parameters for the track's payload type.
    pub fmtp: Option<String>,
}

impl MediaTrack {
    fn new(kind: MediaKind, payload_type: Option<u8>) -> Self {
        MediaTrack {
            kind,
            control: None,
            payload_type,
            encoding: None,
            clock_rate: None,
            fmtp: None,
        }
    }

    /// H.264 parameter sets (SPS, PPS) from `sprop-parameter-sets`, if present.
    ///
    /// Entries that are not valid base64 are skipped.
    pub fn sprop_parameter_sets(&self) -> Vec<Vec<u8>> {
        let Some(fmtp) = &self.fmtp else {
            return Vec::new();
        };
        fmtp.split(';')
            .filter_map(|p| p.trim().strip_prefix("sprop-parameter-sets="))
            .flat_map(|sets| sets.split(','))
            .filter_map(|set| match STANDARD.decode(set.trim()) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping undecodable parameter set");
                    None
                }
            })
            .collect()
    }

    /// Absolute control URL for SETUP.
    pub fn control_url(&self, base_url: &str) -> Option<String> {
        self.control.as_deref().map(|c| resolve_control(base_url, c))
    }
}

/// Returns the SDP portion of a DESCRIBE body: everything from the first `v=`.
pub fn extract_sdp(body: &str) -> Result<&str> {
    body.find("v=")
        .map(|i| &body[i..])
        .ok_or(RetrieverError::parse(ParseErrorKind::MissingSdp))
}

/// All media sections, in order of appearance.
pub fn parse_tracks(sdp: &str) -> Vec<MediaTrack> {
    let mut tracks: Vec<MediaTrack> = Vec::new();
    for line in sdp.lines().map(str::trim) {
        if let Some(media) = line.strip_prefix("m=") {
            let mut fields = media.split_whitespace();
            let kind = MediaKind::from_sdp(fields.next().unwrap_or_default());
            let payload_type = fields.nth(2).and_then(|pt| pt.parse().ok());
            tracks.push(MediaTrack::new(kind, payload_type));
            continue;
        }
        let Some(track) = tracks.last_mut() else {
            continue;
        };
        if let Some(control) = line.strip_prefix("a=control:") {
            if track.control.is_none() {
                track.control = Some(control.trim().to_string());
            }
        } else if let Some(rtpmap) = line.strip_prefix("a=rtpmap:") {
            let Some((pt, enc)) = rtpmap.split_once(' ') else {
                continue;
            };
            if pt.parse::<u8>().ok() != track.payload_type {
                continue;
            }
            let mut parts = enc.trim().split('/');
            track.encoding = parts.next().map(str::to_string);
            track.clock_rate = parts.next().and_then(|r| r.parse().ok());
        } else if let Some(fmtp) = line.strip_prefix("a=fmtp:") {
            if let Some((pt, params)) = fmtp.split_once(' ') {
                if pt.parse::<u8>().ok() == track.payload_type {
                    track.fmtp = Some(params.trim().to_string());
                }
            }
        }
    }
    tracks
}

/// The first track of `kind` that has a control attribute.
///
/// ```
/// use retriever::protocol::sdp::{find_track, MediaKind};
///
/// let sdp = "v=0\r\nm=video 0 RTP/AVP 96\r\na=control:trackID=1\r\n\
///            m=application 0 RTP/AVP 98\r\na=control:trackID=2\r\n";
/// let track = find_track(sdp, &MediaKind::Application).unwrap();
/// assert_eq!(track.control.as_deref(), Some("trackID=2"));
/// assert_eq!(track.payload_type, Some(98));
/// ```
pub fn find_track(sdp: &str, kind: &MediaKind) -> Option<MediaTrack> {
    parse_tracks(sdp)
        .into_iter()
        .find(|t| &t.kind == kind && t.control.is_some())
}

/// Resolve a control attribute against the request base URL.
///
/// Absolute `rtsp://` controls are used as-is; anything else is appended to
/// the base with a single `/`.
///
/// ```
/// use retriever::protocol::sdp::resolve_control;
///
/// assert_eq!(resolve_control("rtsp://cam/media/", "trackID=1"), "rtsp://cam/media/trackID=1");
/// assert_eq!(resolve_control("rtsp://cam/media", "rtsp://other/x"), "rtsp://other/x");
/// ```
pub fn resolve_control(base_url: &str, control: &str) -> String {
    if control.starts_with("rtsp://") {
        control.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), control)
    }
}
