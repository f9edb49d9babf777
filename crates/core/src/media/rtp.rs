use crate::error::{Result, RetrieverError};

/// The minimum length of an RTP header (no CSRCs or extension).
pub const MIN_HEADER_LEN: usize = 12;

/// A validated, borrowed view of one RTP packet (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// |            contributing source (CSRC) identifiers             |
/// |                             ....                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      defined by profile       |            length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                        header extension                       |
/// |                             ....                              |
/// ```
///
/// [`parse`](Self::parse) does all bounds checking up front; the accessors
/// never panic afterwards. Padding is not stripped: the payload is
/// everything after the header (and extension, when present).
#[derive(Debug, Clone, Copy)]
pub struct RtpPacket<'a> {
    data: &'a [u8],
    payload_start: usize,
    extension: Option<RtpExtension<'a>>,
}

/// RTP header extension (RFC 3550 §5.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpExtension<'a> {
    /// The 16-bit "defined by profile" field. Identifies the extension.
    pub profile: u16,
    /// Extension length in 32-bit words, excluding the 4-byte extension header.
    pub length_words: u16,
    /// The extension body (`4 * length_words` bytes).
    pub data: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Validate a raw datagram.
    ///
    /// Returns [`RetrieverError::TruncatedPacket`] when the buffer is
    /// shorter than the fixed header, the CSRC list, or the declared
    /// extension. No partial packet is ever returned.
    ///
    /// ```
    /// use retriever::media::rtp::RtpPacket;
    ///
    /// let raw = [0x80, 0xE0, 0x00, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, b'<', b'a', b'/', b'>'];
    /// let pkt = RtpPacket::parse(&raw).unwrap();
    /// assert!(pkt.mark());
    /// assert_eq!(pkt.payload_type(), 96);
    /// assert_eq!(pkt.payload(), b"<a/>");
    ///
    /// assert!(RtpPacket::parse(&raw[..11]).is_err());
    /// ```
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let len = data.len();
        if len < MIN_HEADER_LEN {
            return Err(RetrieverError::TruncatedPacket {
                needed: MIN_HEADER_LEN,
                len,
            });
        }

        let csrc_count = usize::from(data[0] & 0b0000_1111);
        let csrc_end = MIN_HEADER_LEN + 4 * csrc_count;
        if len < csrc_end {
            return Err(RetrieverError::TruncatedPacket {
                needed: csrc_end,
                len,
            });
        }

        let has_extension = (data[0] & 0b0001_0000) != 0;
        let (payload_start, extension) = if has_extension {
            if len < csrc_end + 4 {
                return Err(RetrieverError::TruncatedPacket {
                    needed: csrc_end + 4,
                    len,
                });
            }
            let profile = u16::from_be_bytes([data[csrc_end], data[csrc_end + 1]]);
            let length_words = u16::from_be_bytes([data[csrc_end + 2], data[csrc_end + 3]]);
            let ext_end = csrc_end + 4 + 4 * usize::from(length_words);
            if len < ext_end {
                return Err(RetrieverError::TruncatedPacket {
                    needed: ext_end,
                    len,
                });
            }
            let extension = RtpExtension {
                profile,
                length_words,
                data: &data[csrc_end + 4..ext_end],
            };
            (ext_end, Some(extension))
        } else {
            (csrc_end, None)
        };

        let pkt = Self {
            data,
            payload_start,
            extension,
        };
        if pkt.version() != 2 {
            tracing::trace!(version = pkt.version(), "RTP packet with unexpected version");
        }
        Ok(pkt)
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.data[0] >> 6
    }

    #[inline]
    pub fn has_padding(&self) -> bool {
        (self.data[0] & 0b0010_0000) != 0
    }

    #[inline]
    pub fn has_extension(&self) -> bool {
        self.extension.is_some()
    }

    #[inline]
    pub fn csrc_count(&self) -> u8 {
        self.data[0] & 0b0000_1111
    }

    /// Marker bit. Signals the last packet of a frame or message.
    #[inline]
    pub fn mark(&self) -> bool {
        (self.data[1] & 0b1000_0000) != 0
    }

    #[inline]
    pub fn payload_type(&self) -> u8 {
        self.data[1] & 0b0111_1111
    }

    #[inline]
    pub fn sequence_number(&self) -> u16 {
        u16::from_be_bytes([self.data[2], self.data[3]])
    }

    #[inline]
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.data[4], self.data[5], self.data[6], self.data[7]])
    }

    #[inline]
    pub fn ssrc(&self) -> u32 {
        u32::from_be_bytes([self.data[8], self.data[9], self.data[10], self.data[11]])
    }

    /// Contributing source identifiers, in header order.
    pub fn csrcs(&self) -> impl Iterator<Item = u32> + 'a {
        let end = MIN_HEADER_LEN + 4 * usize::from(self.csrc_count());
        self.data[MIN_HEADER_LEN..end]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
    }

    pub fn extension(&self) -> Option<&RtpExtension<'a>> {
        self.extension.as_ref()
    }

    /// Total header length including CSRCs and extension.
    pub fn header_len(&self) -> usize {
        self.payload_start
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.data[self.payload_start..]
    }
}

/// Serializes RTP packets. Used by simulators and tests that need to play
/// the sending side.
#[derive(Debug, Clone, Default)]
pub struct RtpPacketBuilder {
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub mark: bool,
    pub csrcs: Vec<u32>,
    /// `(profile, body)`; the body is zero-padded to a multiple of 4 bytes.
    pub extension: Option<(u16, Vec<u8>)>,
}

impl RtpPacketBuilder {
    pub fn new(payload_type: u8) -> Self {
        Self {
            payload_type,
            ..Default::default()
        }
    }

    pub fn build(&self, payload: &[u8]) -> Vec<u8> {
        let csrc_count = self.csrcs.len().min(15);
        let mut first_byte: u8 = (2 << 6) | csrc_count as u8;
        if self.extension.is_some() {
            first_byte |= 0b0001_0000;
        }
        let second_byte: u8 = ((self.mark as u8) << 7) | (self.payload_type & 0x7f);

        let mut out = Vec::with_capacity(MIN_HEADER_LEN + 4 * csrc_count + payload.len());
        out.push(first_byte);
        out.push(second_byte);
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.ssrc.to_be_bytes());
        for csrc in &self.csrcs[..csrc_count] {
            out.extend_from_slice(&csrc.to_be_bytes());
        }
        if let Some((profile, body)) = &self.extension {
            let words = body.len().div_ceil(4);
            out.extend_from_slice(&profile.to_be_bytes());
            out.extend_from_slice(&(words as u16).to_be_bytes());
            out.extend_from_slice(body);
            out.resize(out.len() + (words * 4 - body.len()), 0);
        }
        out.extend_from_slice(payload);
        out
    }
}
