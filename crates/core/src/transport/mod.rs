//! Network transport for RTSP signaling and interleaved media.
//!
//! Everything travels over a single TCP connection:
//!
//! - **Control** ([`tcp`]): RTSP requests and responses, with bounded read
//!   and write timeouts.
//! - **Media** ([`interleaved`]): once playing, RTP/RTCP packets are
//!   multiplexed onto the same connection using `$` framing
//!   (RFC 2326 §10.12) and split out per channel.

pub mod interleaved;
pub mod tcp;

pub use interleaved::{ChannelDemux, ChannelHandler, DemuxExit};
pub use tcp::Connection;
