//! Reassembly of XML application data (ONVIF metadata) from RTP fragments.
//!
//! A metadata document is split across consecutive RTP packets; the packet
//! carrying the last fragment has the marker bit set. The payloads are
//! concatenated until then.
//!
//! Some cameras put a few bytes of framing in front of the document. The
//! reassembler drops everything before the first `<`. This is a heuristic
//! that tolerates such prefixes, not something the RTP payload format
//! guarantees. Whatever follows the document is passed through untouched.

use super::rtp::RtpPacket;
use crate::error::{Result, RetrieverError};

/// Accumulates application payload fragments until a marker-bit packet.
///
/// The accumulator is cleared after every marker-bit packet, whatever the
/// outcome: there is no cross-message retry.
#[derive(Debug, Default)]
pub struct FragmentReassembler {
    buf: Vec<u8>,
}

impl FragmentReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one parsed RTP packet.
    ///
    /// Returns `Ok(None)` while the message is incomplete, `Ok(Some(xml))`
    /// on completion, and an error when the completed message is unusable.
    pub fn push(&mut self, pkt: &RtpPacket<'_>) -> Result<Option<String>> {
        self.push_fragment(pkt.payload(), pkt.mark())
    }

    /// Feed one payload fragment.
    pub fn push_fragment(&mut self, payload: &[u8], marker: bool) -> Result<Option<String>> {
        self.buf.extend_from_slice(payload);
        if !marker {
            return Ok(None);
        }
        let buf = std::mem::take(&mut self.buf);
        decode_message(&buf).map(Some)
    }

    /// Bytes accumulated toward the current message.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        if !self.buf.is_empty() {
            tracing::debug!(discarded = self.buf.len(), "discarding partial XML message");
        }
        self.buf.clear();
    }
}

fn decode_message(buf: &[u8]) -> Result<String> {
    let start = buf
        .iter()
        .position(|&b| b == b'<')
        .ok_or(RetrieverError::NoXmlStart)?;
    if start > 0 {
        tracing::trace!(skipped = start, "dropping bytes before XML start");
    }
    let text = std::str::from_utf8(&buf[start..])?;
    if !text.trim_start().starts_with('<') {
        return Err(RetrieverError::MalformedXml);
    }
    Ok(text.to_owned())
}
