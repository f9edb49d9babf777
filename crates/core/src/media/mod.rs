//! RTP packet parsing and payload handling.
//!
//! Every interleaved data packet is parsed into an [`rtp::RtpPacket`] view,
//! then handed to the stream-specific consumer:
//!
//! - **Video**: the raw payload is forwarded as-is. Depacketization and
//!   decoding belong to an external media pipeline.
//! - **Application data** (ONVIF metadata): payload fragments are glued back
//!   into XML documents by [`xml::FragmentReassembler`], and can be
//!   summarized with [`onvif::SceneSummary`].
//!
//! Either stream may carry the ONVIF replay header extension, decoded by
//! [`timestamp::CaptureTimestamp`].
//!
//! ## RTP overview (RFC 3550)
//!
//! Every RTP packet carries a 12-byte fixed header containing:
//!
//! - **Sequence number** (16-bit, wrapping): reordering and loss detection.
//! - **Timestamp** (32-bit): media clock, typically 90 kHz for video.
//! - **SSRC** (32-bit): randomly chosen to identify the sender.
//! - **Marker bit**: set on the last packet of a frame or XML document.

pub mod onvif;
pub mod rtp;
pub mod timestamp;
pub mod xml;

pub use rtp::RtpPacket;
pub use timestamp::CaptureTimestamp;
pub use xml::FragmentReassembler;
