//! Capture timestamps carried in the ONVIF replay RTP header extension.
//!
//! Axis (and other ONVIF) cameras can tag each RTP packet with the wall
//! clock time at which the frame was captured. The extension is selected by
//! the profile id [`REPLAY_EXTENSION_ID`] and its body is:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  NTP timestamp (seconds)                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  NTP timestamp (fraction)                     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |C|E|D|T|         reserved              |       CSeq            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use std::fmt;

use chrono::{DateTime, Utc};

use super::rtp::RtpPacket;

/// Profile id of the ONVIF replay extension.
pub const REPLAY_EXTENSION_ID: u16 = 0xABAC;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const MIN_EXTENSION_LEN: usize = 12;

/// Decoded capture time. Advisory: cameras may send stale or wrong clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureTimestamp {
    pub ntp_seconds: u32,
    pub ntp_fraction: u32,
    /// Clean point (keyframe).
    pub c: bool,
    /// End of a contiguous section.
    pub e: bool,
    /// Discontinuity.
    pub d: bool,
    /// Terminal: last packet before the stream ends.
    pub t: bool,
    /// Low byte of the CSeq of the request that started this stream.
    pub cseq: u8,
}

impl CaptureTimestamp {
    /// Extract the capture timestamp from a packet, if it carries one.
    ///
    /// Other extension ids, and replay extensions shorter than 12 bytes,
    /// yield `None`. This is "unavailable", not an error.
    pub fn from_packet(pkt: &RtpPacket<'_>) -> Option<Self> {
        let ext = pkt.extension()?;
        if ext.profile != REPLAY_EXTENSION_ID {
            tracing::trace!(profile = format_args!("{:#06X}", ext.profile), "ignoring non-replay extension");
            return None;
        }
        Self::from_extension(ext.data)
    }

    /// Decode the body of a replay extension.
    pub fn from_extension(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_EXTENSION_LEN {
            tracing::trace!(len = data.len(), "replay extension too short");
            return None;
        }
        let ntp_seconds = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let ntp_fraction = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let flags = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        Some(Self {
            ntp_seconds,
            ntp_fraction,
            c: (flags >> 31) & 1 == 1,
            e: (flags >> 30) & 1 == 1,
            d: (flags >> 29) & 1 == 1,
            t: (flags >> 28) & 1 == 1,
            cseq: (flags & 0xFF) as u8,
        })
    }

    /// Seconds since the Unix epoch, with the fraction as a float.
    ///
    /// `ntp_seconds - 2208988800 + ntp_fraction / 2^32`. Times before 1970
    /// come out negative.
    pub fn unix_time(&self) -> f64 {
        f64::from(self.ntp_seconds) - NTP_UNIX_OFFSET as f64
            + f64::from(self.ntp_fraction) / 4_294_967_296.0
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = i64::from(self.ntp_seconds) - NTP_UNIX_OFFSET as i64;
        let nanos = ((u64::from(self.ntp_fraction) * 1_000_000_000) >> 32) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

impl fmt::Display for CaptureTimestamp {
    /// Formats as e.g. `2022-09-02 17:46:40.000000 UTC`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.6f UTC")),
            None => write!(f, "<invalid NTP time {}.{}>", self.ntp_seconds, self.ntp_fraction),
        }
    }
}
