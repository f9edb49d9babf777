use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};

use crate::error::{Result, RetrieverError};
use crate::protocol::response::{RtspResponse, message_len};

use super::interleaved::{INTERLEAVED_MAGIC, frame_len};

const READ_CHUNK: usize = 4096;

/// The RTSP control connection.
///
/// Owns the TCP socket and the receive buffer shared by request/response
/// exchanges and the interleaved demux. Reads use a short socket timeout so
/// callers can poll a stop flag between them.
pub struct Connection {
    stream: TcpStream,
    buf: BytesMut,
    peer_addr: SocketAddr,
}

impl Connection {
    /// Open a connection to `host:port`.
    ///
    /// Every resolved address is tried with `connect_timeout`; reads then
    /// time out after `read_timeout` and writes after `connect_timeout`.
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(read_timeout))?;
                    stream.set_write_timeout(Some(connect_timeout))?;
                    stream.set_nodelay(true)?;
                    tracing::info!(peer_addr = %addr, "connected");
                    return Ok(Connection {
                        stream,
                        buf: BytesMut::with_capacity(READ_CHUNK * 4),
                        peer_addr: addr,
                    });
                }
                Err(e) => {
                    tracing::debug!(peer_addr = %addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(match last_err {
            Some(e) if e.kind() == ErrorKind::TimedOut => RetrieverError::Timeout(connect_timeout),
            Some(e) => RetrieverError::Io(e),
            None => RetrieverError::Config(format!("{host}:{port} did not resolve to any address")),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data)?;
        Ok(())
    }

    /// Received bytes not yet consumed.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// One bounded read into the buffer.
    ///
    /// Returns `Ok(None)` when the read timed out with nothing received,
    /// and [`RetrieverError::ConnectionClosed`] on end of stream.
    pub fn fill(&mut self) -> Result<Option<usize>> {
        let mut chunk = [0u8; READ_CHUNK];
        match self.stream.read(&mut chunk) {
            Ok(0) => Err(RetrieverError::ConnectionClosed),
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                Ok(Some(n))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read the next RTSP response, waiting at most `timeout`.
    ///
    /// Interleaved `$` frames that arrive first are discarded. When `stop`
    /// is given it is checked after every read that timed out, and a set
    /// flag ends the wait with [`RetrieverError::Cancelled`].
    pub fn read_response(
        &mut self,
        timeout: Duration,
        stop: Option<&AtomicBool>,
    ) -> Result<RtspResponse> {
        let deadline = Instant::now() + timeout;
        loop {
            while self.buf.first() == Some(&INTERLEAVED_MAGIC) {
                match frame_len(&self.buf) {
                    Some(len) => {
                        tracing::trace!(channel = self.buf[1], len, "skipping interleaved frame");
                        self.buf.advance(len);
                    }
                    None => break,
                }
            }
            if self.buf.first().is_some_and(|&b| b != INTERLEAVED_MAGIC) {
                if let Some(len) = message_len(&self.buf) {
                    let raw = self.buf.split_to(len);
                    let text = String::from_utf8_lossy(&raw);
                    tracing::trace!(peer_addr = %self.peer_addr, response = %text, "received");
                    return RtspResponse::parse(&text);
                }
            }
            if Instant::now() >= deadline {
                return Err(RetrieverError::Timeout(timeout));
            }
            if self.fill()?.is_none() && stop.is_some_and(|s| s.load(Ordering::SeqCst)) {
                tracing::debug!(peer_addr = %self.peer_addr, "response wait cancelled");
                return Err(RetrieverError::Cancelled);
            }
        }
    }

    /// Shut the socket down. Dropping the connection closes it as well.
    pub fn close(self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::trace!(error = %e, "shutdown on closed socket");
        }
        tracing::debug!(peer_addr = %self.peer_addr, "connection closed");
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer_addr", &self.peer_addr)
            .field("buffered", &self.buf.len())
            .finish()
    }
}
