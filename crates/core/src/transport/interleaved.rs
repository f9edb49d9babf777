//! Interleaved RTP/RTCP demultiplexing (RFC 2326 §10.12).
//!
//! With TCP transport the server writes media onto the RTSP control
//! connection, each packet framed as:
//!
//! ```text
//! +------+---------+----------------+----------------------+
//! | 0x24 | channel | length (u16 BE)| length bytes of RTP  |
//! +------+---------+----------------+----------------------+
//! ```
//!
//! Anything not starting with `$` is a textual RTSP message (for example
//! the reply to a keepalive) and runs up to a blank line plus any declared
//! `Content-Length` body.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::{Buf, BytesMut};

use crate::error::{Result, RetrieverError};
use crate::protocol::response::message_len;

use super::tcp::Connection;

/// Leading byte of an interleaved frame (`$`).
pub const INTERLEAVED_MAGIC: u8 = 0x24;

const FRAME_HEADER_LEN: usize = 4;

/// Text without a terminating blank line is dropped past this size.
pub const MAX_TEXT_MESSAGE_LEN: usize = 64 * 1024;

/// Total length (header included) of the `$` frame at the start of `buf`,
/// if it is complete.
pub fn frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < FRAME_HEADER_LEN || buf[0] != INTERLEAVED_MAGIC {
        return None;
    }
    let len = FRAME_HEADER_LEN + usize::from(u16::from_be_bytes([buf[2], buf[3]]));
    (buf.len() >= len).then_some(len)
}

/// Consumer of the packets of one interleaved channel.
pub trait ChannelHandler: Send {
    fn handle_packet(&mut self, packet: &[u8]);
}

impl<F> ChannelHandler for F
where
    F: FnMut(&[u8]) + Send,
{
    fn handle_packet(&mut self, packet: &[u8]) {
        self(packet)
    }
}

/// Why [`ChannelDemux::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxExit {
    /// The stop flag was set.
    Stopped,
    /// The server closed the connection.
    ConnectionClosed,
}

/// Routes interleaved packets to per-channel handlers.
#[derive(Default)]
pub struct ChannelDemux {
    handlers: HashMap<u8, Box<dyn ChannelHandler>>,
}

impl ChannelDemux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `channel`, replacing any previous one.
    pub fn register(&mut self, channel: u8, handler: impl ChannelHandler + 'static) {
        self.handlers.insert(channel, Box::new(handler));
    }

    pub fn channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.handlers.keys().copied()
    }

    /// Consume every complete frame and text message at the front of `buf`.
    ///
    /// Packets go to their channel's handler; text messages are returned.
    /// Stops early, leaving the rest buffered, once `stop` is set.
    pub fn drain(&mut self, buf: &mut BytesMut, stop: &AtomicBool) -> Vec<String> {
        let mut messages = Vec::new();
        while buf.len() >= FRAME_HEADER_LEN {
            if buf[0] == INTERLEAVED_MAGIC {
                let Some(len) = frame_len(buf) else {
                    break;
                };
                let frame = buf.split_to(len);
                self.dispatch(frame[1], &frame[FRAME_HEADER_LEN..]);
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            } else if let Some(len) = message_len(buf) {
                let raw = buf.split_to(len);
                messages.push(String::from_utf8_lossy(&raw).into_owned());
            } else {
                if buf.len() > MAX_TEXT_MESSAGE_LEN {
                    let discard = buf
                        .iter()
                        .position(|&b| b == INTERLEAVED_MAGIC)
                        .unwrap_or(buf.len());
                    tracing::warn!(discarded = discard, "dropping undelimited text on control connection");
                    buf.advance(discard);
                    continue;
                }
                break;
            }
        }
        messages
    }

    fn dispatch(&mut self, channel: u8, packet: &[u8]) {
        match self.handlers.get_mut(&channel) {
            Some(handler) => handler.handle_packet(packet),
            None => tracing::debug!(channel, len = packet.len(), "no handler for channel"),
        }
    }

    /// Read from `conn` and dispatch until stopped or the peer closes.
    ///
    /// `on_idle` runs before every read; it is where the session sends its
    /// keepalives. Text messages are logged and otherwise ignored.
    pub fn run(
        &mut self,
        conn: &mut Connection,
        stop: &AtomicBool,
        mut on_idle: impl FnMut(&mut Connection) -> Result<()>,
    ) -> Result<DemuxExit> {
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(DemuxExit::Stopped);
            }
            on_idle(conn)?;
            match conn.fill() {
                Ok(Some(_)) => {}
                Ok(None) => continue,
                Err(RetrieverError::ConnectionClosed) => return Ok(DemuxExit::ConnectionClosed),
                Err(e) => return Err(e),
            }
            for message in self.drain(conn.buffer_mut(), stop) {
                let status = message.lines().next().unwrap_or_default();
                tracing::debug!(status, "RTSP message during playback");
            }
        }
    }
}
